use crate::config::ProtocolConfig;

use super::room_codes::is_room_code_char;

pub fn validate_room_code_with_config(code: &str, config: &ProtocolConfig) -> Result<(), String> {
    if code.is_empty() {
        return Err("Room code cannot be empty".to_string());
    }
    if code.chars().count() != config.room_code_length {
        return Err(format!(
            "Room code must be exactly {} characters",
            config.room_code_length
        ));
    }
    if !code.chars().all(is_room_code_char) {
        return Err("Room code contains invalid characters".to_string());
    }
    Ok(())
}

pub fn validate_display_name_with_config(
    name: &str,
    config: &ProtocolConfig,
) -> Result<(), String> {
    if name.is_empty() {
        return Err("Display name cannot be empty".to_string());
    }
    if name.chars().count() > config.max_display_name_length {
        return Err(format!(
            "Display name too long (max {} characters)",
            config.max_display_name_length
        ));
    }

    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err("Display name cannot be blank".to_string());
    }
    if trimmed.len() != name.len() {
        return Err("Display name cannot have leading or trailing whitespace".to_string());
    }

    let rules = &config.display_name_validation;
    for ch in name.chars() {
        if ch == ' ' {
            if rules.allow_spaces {
                continue;
            }
            return Err("Display name cannot contain spaces".to_string());
        }

        if ch.is_whitespace() || ch.is_control() {
            return Err("Display name cannot contain whitespace characters".to_string());
        }

        let is_alphanumeric = if rules.allow_unicode_alphanumeric {
            ch.is_alphanumeric()
        } else {
            ch.is_ascii_alphanumeric()
        };

        if is_alphanumeric || rules.is_allowed_symbol(ch) {
            continue;
        }

        return Err("Display name contains invalid characters".to_string());
    }

    Ok(())
}

pub fn validate_game_id_with_config(game_id: &str, config: &ProtocolConfig) -> Result<(), String> {
    if game_id.is_empty() {
        return Err("Game id cannot be empty".to_string());
    }
    if game_id.len() > config.max_game_id_length {
        return Err(format!(
            "Game id too long (max {} characters)",
            config.max_game_id_length
        ));
    }
    if !game_id
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
    {
        return Err("Game id may only contain lowercase letters, digits, '-' and '_'".to_string());
    }
    Ok(())
}

/// `current_members` is the room's current member count; capacity may not drop below it.
pub fn validate_max_players_with_config(
    max_players: u8,
    current_members: usize,
    config: &ProtocolConfig,
) -> Result<(), String> {
    if max_players < config.min_players {
        return Err(format!(
            "Max players must be at least {}",
            config.min_players
        ));
    }
    if max_players > config.max_players_limit {
        return Err(format!(
            "Max players cannot exceed {}",
            config.max_players_limit
        ));
    }
    if usize::from(max_players) < current_members {
        return Err(format!(
            "Max players cannot be below the current member count ({current_members})"
        ));
    }
    Ok(())
}
