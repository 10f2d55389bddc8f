//! Configuration validation functions.

use super::rate_limit::BucketLimit;
use super::Config;

/// Reject configurations the server cannot run with.
pub fn validate_config(config: &Config) -> anyhow::Result<()> {
    let protocol = &config.protocol;
    let server = &config.server;

    if protocol.room_code_length < 4 || protocol.room_code_length > 12 {
        anyhow::bail!(
            "protocol.room_code_length must be between 4 and 12 (configured: {})",
            protocol.room_code_length
        );
    }
    if protocol.max_display_name_length == 0 {
        anyhow::bail!("protocol.max_display_name_length must be greater than zero");
    }
    if protocol.max_game_id_length == 0 {
        anyhow::bail!("protocol.max_game_id_length must be greater than zero");
    }
    if protocol.min_players < 2 {
        anyhow::bail!(
            "protocol.min_players must be at least 2 (configured: {})",
            protocol.min_players
        );
    }
    if protocol.max_players_limit < protocol.min_players {
        anyhow::bail!(
            "protocol.max_players_limit ({}) must not be below protocol.min_players ({})",
            protocol.max_players_limit,
            protocol.min_players
        );
    }
    if server.default_max_players < protocol.min_players
        || server.default_max_players > protocol.max_players_limit
    {
        anyhow::bail!(
            "server.default_max_players must be between {} and {} (configured: {})",
            protocol.min_players,
            protocol.max_players_limit,
            server.default_max_players
        );
    }
    if server.room_code_attempts == 0 {
        anyhow::bail!("server.room_code_attempts must be greater than zero");
    }
    if server.channel_capacity == 0 {
        anyhow::bail!("server.channel_capacity must be greater than zero");
    }
    if server.room_cleanup_interval == 0 {
        anyhow::bail!("server.room_cleanup_interval must be greater than zero");
    }
    if server.resubscribe_initial_delay_ms > server.resubscribe_max_delay_ms {
        anyhow::bail!(
            "server.resubscribe_initial_delay_ms ({}) exceeds server.resubscribe_max_delay_ms ({})",
            server.resubscribe_initial_delay_ms,
            server.resubscribe_max_delay_ms
        );
    }

    let buckets = [
        ("create_room", config.rate_limit.create_room),
        ("join_room", config.rate_limit.join_room),
        ("game_action", config.rate_limit.game_action),
        ("send_clue", config.rate_limit.send_clue),
    ];
    for (name, limit) in buckets {
        validate_bucket(name, limit)?;
    }

    let engine = &config.engine;
    if engine.max_rounds == 0 {
        anyhow::bail!("engine.max_rounds must be greater than zero");
    }
    if engine.free_tier_participants < 2 {
        anyhow::bail!("engine.free_tier_participants must be at least 2");
    }
    if engine.plus_tier_participants < engine.free_tier_participants {
        anyhow::bail!(
            "engine.plus_tier_participants ({}) must not be below engine.free_tier_participants ({})",
            engine.plus_tier_participants,
            engine.free_tier_participants
        );
    }
    if engine.daily_slice_len == 0 {
        anyhow::bail!("engine.daily_slice_len must be greater than zero");
    }

    match config.logging.rotation.as_str() {
        "daily" | "hourly" | "never" => {}
        other => anyhow::bail!(
            "logging.rotation must be one of daily, hourly, never (configured: {other})"
        ),
    }

    config.websocket.validate()
}

fn validate_bucket(name: &str, limit: BucketLimit) -> anyhow::Result<()> {
    if limit.max_requests == 0 {
        anyhow::bail!("rate_limit.{name}.max_requests must be greater than zero");
    }
    if limit.window_ms == 0 {
        anyhow::bail!("rate_limit.{name}.window_ms must be greater than zero");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn rejects_zero_bucket() {
        let mut config = Config::default();
        config.rate_limit.send_clue.max_requests = 0;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("send_clue"));
    }

    #[test]
    fn rejects_default_players_outside_limits() {
        let mut config = Config::default();
        config.server.default_max_players = 30;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn rejects_unknown_rotation() {
        let mut config = Config::default();
        config.logging.rotation = "weekly".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn rejects_tier_ceilings_out_of_order() {
        let mut config = Config::default();
        config.engine.plus_tier_participants = 4;
        assert!(validate_config(&config).is_err());
    }
}
