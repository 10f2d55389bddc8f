//! Subscription tiers and per-game engine configuration.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use super::EngineError;
use crate::config::EngineSettings;
use crate::protocol::PlayerId;

/// Fewest participants any game can run with.
pub const MIN_PARTICIPANTS: usize = 2;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    #[default]
    Free,
    Plus,
}

impl SubscriptionTier {
    pub fn participant_limit(&self, settings: &EngineSettings) -> usize {
        match self {
            Self::Free => settings.free_tier_participants,
            Self::Plus => settings.plus_tier_participants,
        }
    }
}

impl std::fmt::Display for SubscriptionTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Free => "free",
            Self::Plus => "plus",
        })
    }
}

/// Read-only view of who pays for what.
#[async_trait]
pub trait TierLookup: Send + Sync {
    async fn tier_for(&self, identity: &PlayerId) -> anyhow::Result<SubscriptionTier>;
}

/// In-memory tier table with a default for unknown identities.
#[derive(Debug, Default)]
pub struct StaticTierLookup {
    default: SubscriptionTier,
    tiers: DashMap<PlayerId, SubscriptionTier>,
}

impl StaticTierLookup {
    pub fn new(default: SubscriptionTier) -> Self {
        Self {
            default,
            tiers: DashMap::new(),
        }
    }

    pub fn set(&self, identity: PlayerId, tier: SubscriptionTier) {
        self.tiers.insert(identity, tier);
    }
}

#[async_trait]
impl TierLookup for StaticTierLookup {
    async fn tier_for(&self, identity: &PlayerId) -> anyhow::Result<SubscriptionTier> {
        Ok(self
            .tiers
            .get(identity)
            .map(|tier| *tier)
            .unwrap_or(self.default))
    }
}

/// Resolved settings for one game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub max_rounds: u32,
    pub target_score: Option<i32>,
    pub turn_seconds: u32,
    pub tier: SubscriptionTier,
    pub max_participants: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from_settings(&EngineSettings::default(), SubscriptionTier::Free)
    }
}

impl EngineConfig {
    pub fn from_settings(settings: &EngineSettings, tier: SubscriptionTier) -> Self {
        Self {
            max_rounds: settings.max_rounds,
            target_score: settings.target_score,
            turn_seconds: settings.turn_seconds,
            tier,
            max_participants: tier.participant_limit(settings),
        }
    }

    /// Configuration for a game hosted by `host` with `participants` players, sized by
    /// the host's tier.
    pub async fn for_host(
        settings: &EngineSettings,
        tiers: &dyn TierLookup,
        host: &PlayerId,
        participants: usize,
    ) -> Result<Self, EngineError> {
        let tier = tiers
            .tier_for(host)
            .await
            .map_err(|err| EngineError::TierLookup(err.to_string()))?;
        let config = Self::from_settings(settings, tier);
        config.check_participants(participants)?;
        Ok(config)
    }

    pub fn check_participants(&self, participants: usize) -> Result<(), EngineError> {
        if participants < MIN_PARTICIPANTS {
            return Err(EngineError::TooFewParticipants {
                min: MIN_PARTICIPANTS,
                actual: participants,
            });
        }
        if participants > self.max_participants {
            return Err(EngineError::TooManyParticipants {
                tier: self.tier,
                limit: self.max_participants,
                actual: participants,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn tier_sets_the_participant_ceiling() {
        let settings = EngineSettings::default();
        let lookup = StaticTierLookup::new(SubscriptionTier::Free);
        let paying = Uuid::new_v4();
        lookup.set(paying, SubscriptionTier::Plus);

        let free = EngineConfig::for_host(&settings, &lookup, &Uuid::new_v4(), 8)
            .await
            .unwrap();
        assert_eq!(free.max_participants, 8);

        let err = EngineConfig::for_host(&settings, &lookup, &Uuid::new_v4(), 9)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::TooManyParticipants { limit: 8, .. }));

        let plus = EngineConfig::for_host(&settings, &lookup, &paying, 16)
            .await
            .unwrap();
        assert_eq!(plus.tier, SubscriptionTier::Plus);
        assert_eq!(plus.max_participants, 16);
    }

    #[test]
    fn at_least_two_participants() {
        let config = EngineConfig::default();
        assert!(matches!(
            config.check_participants(1),
            Err(EngineError::TooFewParticipants { min: 2, actual: 1 })
        ));
        assert!(config.check_participants(2).is_ok());
    }
}
