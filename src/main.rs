#![cfg_attr(not(test), deny(clippy::panic))]

use clap::Parser;
use party_rooms::config;
use party_rooms::logging;
use party_rooms::websocket;

/// Party rooms -- room coordination and channel relay for multiplayer party games
#[derive(Parser, Debug)]
#[command(name = "party-rooms-server")]
#[command(about = "Room directory, channel relay and turn engine host for party games")]
#[command(version)]
struct Cli {
    /// Validate configuration and exit without starting the server.
    #[arg(long, short = 'c', conflicts_with = "print_config")]
    validate_config: bool,

    /// Print the loaded configuration to stdout (as JSON) and exit.
    #[arg(long, conflicts_with = "validate_config")]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = config::load();

    if cli.print_config {
        let json = serde_json::to_string_pretty(&cfg)
            .map_err(|e| anyhow::anyhow!("Failed to serialize config: {e}"))?;
        println!("{json}");
        return Ok(());
    }

    // load() only reports validation errors; fail hard here.
    let validation_result = config::validate_config(&cfg);

    if cli.validate_config {
        match validation_result {
            Ok(()) => {
                println!("Configuration validation passed");
                println!();
                println!("Configuration summary:");
                println!("  Port: {}", cfg.port);
                println!("  Max players per room: {}", cfg.server.default_max_players);
                println!("  Room code length: {}", cfg.protocol.room_code_length);
                println!(
                    "  Create room limit: {} per {} ms",
                    cfg.rate_limit.create_room.max_requests, cfg.rate_limit.create_room.window_ms
                );
                println!(
                    "  Participants (free/plus): {}/{}",
                    cfg.engine.free_tier_participants, cfg.engine.plus_tier_participants
                );
                return Ok(());
            }
            Err(e) => {
                eprintln!("Configuration validation failed:\n{e}");
                std::process::exit(1);
            }
        }
    }

    validation_result?;

    // Dropping the guard flushes the file writer.
    let _log_guard = logging::init_with_config(&cfg.logging);

    websocket::run_server(cfg).await
}
