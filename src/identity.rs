//! Per-connection identity.
//!
//! Identities are opaque UUIDs. A reconnecting client may present the identity it was
//! given earlier to resume its room memberships; authentication happens upstream.

use crate::protocol::PlayerId;
use uuid::Uuid;

/// Resolves the identity a connection acts under.
pub trait IdentityProvider: Send + Sync {
    /// `presented` is the raw value supplied by the client, if any.
    fn resolve(&self, presented: Option<&str>) -> PlayerId;
}

/// Accepts a well-formed presented identity, otherwise issues a fresh one.
#[derive(Debug, Default, Clone, Copy)]
pub struct ResumableIdentityProvider;

impl IdentityProvider for ResumableIdentityProvider {
    fn resolve(&self, presented: Option<&str>) -> PlayerId {
        presented
            .and_then(|raw| Uuid::parse_str(raw.trim()).ok())
            .filter(|id| !id.is_nil())
            .unwrap_or_else(Uuid::new_v4)
    }
}
