//! Turn engine defaults and subscription tier ceilings.

use super::defaults::{
    default_daily_slice_len, default_free_tier_participants, default_max_rounds,
    default_plus_tier_participants, default_turn_seconds,
};
use serde::{Deserialize, Serialize};

/// Engine configuration shared by every game the host runs.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EngineSettings {
    /// Rounds played before the game ends
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,
    /// Optional score that ends the game early
    #[serde(default)]
    pub target_score: Option<i32>,
    /// Seconds allotted to one turn (advisory, enforced by the host client)
    #[serde(default = "default_turn_seconds")]
    pub turn_seconds: u32,
    /// Participant ceiling for the free tier
    #[serde(default = "default_free_tier_participants")]
    pub free_tier_participants: usize,
    /// Participant ceiling for the paid tier
    #[serde(default = "default_plus_tier_participants")]
    pub plus_tier_participants: usize,
    /// Items in the daily challenge slice
    #[serde(default = "default_daily_slice_len")]
    pub daily_slice_len: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_rounds: default_max_rounds(),
            target_score: None,
            turn_seconds: default_turn_seconds(),
            free_tier_participants: default_free_tier_participants(),
            plus_tier_participants: default_plus_tier_participants(),
            daily_slice_len: default_daily_slice_len(),
        }
    }
}
