//! Configuration loading and environment parsing.

use super::validation::validate_config;
use super::Config;
use serde_json::Value;
use std::fs;
use std::path::Path;

const ENV_PREFIX: &str = "PARTY_ROOMS__";

/// Load configuration with the following precedence (highest first):
/// 1) `PARTY_ROOMS_CONFIG_JSON` env var containing raw JSON
/// 2) If `PARTY_ROOMS_CONFIG_STDIN=true/1`, read JSON from stdin
/// 3) File pointed by `PARTY_ROOMS_CONFIG_PATH`
/// 4) config.json in the current working directory
/// 5) Defaults compiled into the binary
///
/// Individual fields can be overridden with `PARTY_ROOMS__` prefixed variables using
/// "__" as the nesting separator, e.g. `PARTY_ROOMS__PORT=8080` or
/// `PARTY_ROOMS__RATE_LIMIT__CREATE_ROOM__MAX_REQUESTS=3`.
///
/// Parse failures are reported on stderr and the defaults are kept. Validation errors
/// are reported but not propagated; `main` validates again and fails hard.
#[must_use]
pub fn load() -> Config {
    use std::env;
    use std::io::Read;
    use std::path::PathBuf;

    let defaults = Config::default();
    let mut merged =
        serde_json::to_value(&defaults).unwrap_or_else(|_| Value::Object(serde_json::Map::new()));

    // Lowest precedence first so later merges win.
    merge_file_source(&mut merged, &PathBuf::from("config.json"));

    if let Ok(path) = env::var("PARTY_ROOMS_CONFIG_PATH") {
        merge_file_source(&mut merged, &PathBuf::from(path));
    }

    if let Ok(val) = env::var("PARTY_ROOMS_CONFIG_STDIN") {
        if env_var_truthy(&val) {
            let mut buf = String::new();
            if let Err(e) = std::io::stdin().read_to_string(&mut buf) {
                eprintln!("Failed to read config from stdin: {e}");
            } else if let Some(value) = parse_json_document(&buf, "stdin") {
                merge_values(&mut merged, value);
            }
        }
    }

    if let Ok(json) = env::var("PARTY_ROOMS_CONFIG_JSON") {
        if let Some(value) = parse_json_document(&json, "PARTY_ROOMS_CONFIG_JSON") {
            merge_values(&mut merged, value);
        }
    }

    apply_env_overrides(&mut merged, env::vars());

    let config = match serde_json::from_value::<Config>(merged) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to deserialize config; using defaults: {e}");
            defaults
        }
    };

    if let Err(e) = validate_config(&config) {
        eprintln!("Configuration validation error: {e}");
    }

    config
}

/// Load a single JSON file layered over the defaults, failing on any error.
pub fn load_file(path: &Path) -> anyhow::Result<Config> {
    let contents = fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let source: Value = serde_json::from_str(&contents)?;

    let mut merged = serde_json::to_value(Config::default())?;
    merge_values(&mut merged, source);

    let config: Config = serde_json::from_value(merged)?;
    validate_config(&config)?;
    Ok(config)
}

fn parse_json_document(raw: &str, label: &str) -> Option<Value> {
    if raw.trim().is_empty() {
        return None;
    }

    match serde_json::from_str(raw) {
        Ok(value) => Some(value),
        Err(err) => {
            eprintln!("Failed to parse config from {label}: {err}");
            None
        }
    }
}

fn merge_file_source(target: &mut Value, path: &Path) {
    if path.as_os_str().is_empty() || !path.exists() {
        return;
    }

    match fs::read_to_string(path) {
        Ok(contents) => {
            if let Some(value) = parse_json_document(&contents, &format!("file {}", path.display()))
            {
                merge_values(target, value);
            }
        }
        Err(err) => {
            eprintln!("Failed to read config from {}: {}", path.display(), err);
        }
    }
}

pub(crate) fn merge_values(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(target_map), Value::Object(source_map)) => {
            for (key, value) in source_map {
                match target_map.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        target_map.insert(key, value);
                    }
                }
            }
        }
        (target_slot, source_value) => {
            *target_slot = source_value;
        }
    }
}

pub(crate) fn apply_env_overrides<I>(root: &mut Value, vars: I)
where
    I: IntoIterator<Item = (String, String)>,
{
    for (key, raw_value) in vars {
        let Some(stripped) = key.strip_prefix(ENV_PREFIX) else {
            continue;
        };

        let segments: Vec<String> = stripped
            .split("__")
            .filter(|segment| !segment.is_empty())
            .map(str::to_ascii_lowercase)
            .collect();

        if segments.is_empty() {
            continue;
        }

        set_nested_value(root, &segments, parse_env_value(&raw_value));
    }
}

fn env_var_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes"
    )
}

fn parse_env_value(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.contains(',') && !trimmed.starts_with('"') {
        return Value::Array(
            trimmed
                .split(',')
                .map(|segment| parse_scalar(segment.trim()))
                .collect(),
        );
    }

    parse_scalar(trimmed)
}

fn parse_scalar(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::String(String::new());
    }

    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn set_nested_value(target: &mut Value, segments: &[String], value: Value) {
    let Some((first, rest)) = segments.split_first() else {
        *target = value;
        return;
    };

    if !target.is_object() {
        *target = Value::Object(serde_json::Map::new());
    }
    let Value::Object(map) = target else {
        return;
    };

    if rest.is_empty() {
        map.insert(first.clone(), value);
        return;
    }

    let entry = map
        .entry(first.clone())
        .or_insert_with(|| Value::Object(serde_json::Map::new()));
    set_nested_value(entry, rest, value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn env_overrides_set_nested_fields() {
        let mut root = serde_json::to_value(Config::default()).unwrap();
        apply_env_overrides(
            &mut root,
            vec![
                ("PARTY_ROOMS__PORT".to_string(), "9100".to_string()),
                (
                    "PARTY_ROOMS__RATE_LIMIT__CREATE_ROOM__MAX_REQUESTS".to_string(),
                    "3".to_string(),
                ),
                ("UNRELATED".to_string(), "1".to_string()),
            ],
        );

        let config: Config = serde_json::from_value(root).unwrap();
        assert_eq!(config.port, 9100);
        assert_eq!(config.rate_limit.create_room.max_requests, 3);
        assert_eq!(config.rate_limit.create_room.window_ms, 60_000);
    }

    #[test]
    fn env_override_lists_split_on_commas() {
        let mut root = serde_json::to_value(Config::default()).unwrap();
        apply_env_overrides(
            &mut root,
            vec![(
                "PARTY_ROOMS__PROTOCOL__DISPLAY_NAME_VALIDATION__ALLOWED_SYMBOLS".to_string(),
                "\"-\",\"!\"".to_string(),
            )],
        );
        let config: Config = serde_json::from_value(root).unwrap();
        assert_eq!(
            config.protocol.display_name_validation.allowed_symbols,
            vec!['-', '!']
        );
    }

    #[test]
    fn load_file_layers_over_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"port": 4000, "server": {{"default_max_players": 6}}, "logging": {{"level": "debug"}}}}"#
        )
        .unwrap();

        let config = load_file(file.path()).expect("config should load");
        assert_eq!(config.port, 4000);
        assert_eq!(config.server.default_max_players, 6);
        assert_eq!(config.server.room_code_attempts, 10);
        assert_eq!(config.logging.level, Some(super::super::LogLevel::Debug));
    }

    #[test]
    fn load_file_rejects_invalid_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"server": {{"default_max_players": 1}}}}"#).unwrap();

        assert!(load_file(file.path()).is_err());
    }
}
