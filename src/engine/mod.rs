//! Deterministic turn engine.
//!
//! A game is a [`GameRules`] implementation plus the shared state machine in
//! [`state`]: deck draw without replacement, turn rotation, scoring and win
//! detection. The room host runs the engine through [`GameHost`] and publishes
//! snapshots; other members follow along with a [`GameMirror`].

pub mod charades;
pub mod deck;
pub mod host;
pub mod phase;
pub mod state;
pub mod tiers;

pub use charades::Charades;
pub use deck::Deck;
pub use host::{GameHost, GameMirror, MirrorUpdate};
pub use phase::{transition, Event, Phase};
pub use state::{
    advance_turn, apply_outcome, draw_next, evaluate_winner, Outcome, Participant, TurnCounters,
    TurnState,
};
pub use tiers::{EngineConfig, StaticTierLookup, SubscriptionTier, TierLookup};

use crate::error::RoomError;
use crate::protocol::PlayerId;

/// Game-specific rules plugged into the shared engine.
pub trait GameRules: Send + Sync {
    /// Stable id selected on the room.
    fn game_id(&self) -> &'static str;

    /// Item pool the deck is built from.
    fn prompts(&self) -> Vec<String>;

    /// Points awarded for `outcome` in `state`'s current turn.
    fn score(&self, state: &TurnState, outcome: Outcome) -> Vec<(PlayerId, i32)>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("at least {min} participants are required (have {actual})")]
    TooFewParticipants { min: usize, actual: usize },
    #[error("the {tier} tier allows at most {limit} participants (have {actual})")]
    TooManyParticipants {
        tier: SubscriptionTier,
        limit: usize,
        actual: usize,
    },
    #[error("tier lookup failed: {0}")]
    TierLookup(String),
    #[error("snapshot could not be encoded: {0}")]
    Snapshot(String),
}

impl From<EngineError> for RoomError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::TooFewParticipants { .. } | EngineError::TooManyParticipants { .. } => {
                RoomError::InvalidInput(err.to_string())
            }
            EngineError::TierLookup(_) | EngineError::Snapshot(_) => {
                RoomError::Persistence(anyhow::Error::new(err))
            }
        }
    }
}
