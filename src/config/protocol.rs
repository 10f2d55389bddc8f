//! Protocol configuration: room code shape and display name rules.

use super::defaults::{
    default_allow_spaces_in_names, default_allow_unicode_names, default_allowed_name_symbols,
    default_max_display_name_length, default_max_game_id_length, default_max_players_limit,
    default_min_players, default_room_code_length,
};
use serde::{Deserialize, Serialize};

/// Protocol configuration.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProtocolConfig {
    /// Length of generated room codes
    #[serde(default = "default_room_code_length")]
    pub room_code_length: usize,
    /// Maximum length for display names (characters, not bytes)
    #[serde(default = "default_max_display_name_length")]
    pub max_display_name_length: usize,
    /// Maximum length for game identifiers
    #[serde(default = "default_max_game_id_length")]
    pub max_game_id_length: usize,
    /// Smallest max-players value a host may configure
    #[serde(default = "default_min_players")]
    pub min_players: u8,
    /// Largest max-players value a host may configure
    #[serde(default = "default_max_players_limit")]
    pub max_players_limit: u8,
    /// Display name validation rules
    #[serde(default)]
    pub display_name_validation: DisplayNameValidationConfig,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            room_code_length: default_room_code_length(),
            max_display_name_length: default_max_display_name_length(),
            max_game_id_length: default_max_game_id_length(),
            min_players: default_min_players(),
            max_players_limit: default_max_players_limit(),
            display_name_validation: DisplayNameValidationConfig::default(),
        }
    }
}

/// Display name validation configuration.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DisplayNameValidationConfig {
    /// Allow non-ASCII letters/digits (Unicode alphanumerics)
    #[serde(default = "default_allow_unicode_names")]
    pub allow_unicode_alphanumeric: bool,
    /// Permit spaces between words
    #[serde(default = "default_allow_spaces_in_names")]
    pub allow_spaces: bool,
    /// Symbol characters accepted in addition to alphanumerics
    #[serde(default = "default_allowed_name_symbols")]
    pub allowed_symbols: Vec<char>,
}

impl Default for DisplayNameValidationConfig {
    fn default() -> Self {
        Self {
            allow_unicode_alphanumeric: default_allow_unicode_names(),
            allow_spaces: default_allow_spaces_in_names(),
            allowed_symbols: default_allowed_name_symbols(),
        }
    }
}

impl DisplayNameValidationConfig {
    pub fn is_allowed_symbol(&self, ch: char) -> bool {
        self.allowed_symbols.contains(&ch)
    }
}
