use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::time::{Duration, Instant};

use crate::config::{BucketLimit, RateLimitConfig};
use crate::protocol::PlayerId;

/// Named admission buckets. Each identity has an independent window per bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateBucket {
    CreateRoom,
    JoinRoom,
    GameAction,
    SendClue,
}

impl RateBucket {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreateRoom => "createRoom",
            Self::JoinRoom => "joinRoom",
            Self::GameAction => "gameAction",
            Self::SendClue => "sendClue",
        }
    }
}

impl std::fmt::Display for RateBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sliding-window admission control keyed by (bucket, identity).
///
/// State is in-memory and per-process. The limiter is constructed by the server and
/// shared with the coordinator; it is advisory under multi-process deployment.
pub struct RoomRateLimiter {
    config: RateLimitConfig,
    /// Admitted request timestamps inside the current window, oldest first
    entries: DashMap<(RateBucket, PlayerId), VecDeque<Instant>>,
}

impl RoomRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            entries: DashMap::new(),
        }
    }

    fn limit_for(&self, bucket: RateBucket) -> BucketLimit {
        match bucket {
            RateBucket::CreateRoom => self.config.create_room,
            RateBucket::JoinRoom => self.config.join_room,
            RateBucket::GameAction => self.config.game_action,
            RateBucket::SendClue => self.config.send_clue,
        }
    }

    /// Admit one request for `player_id` in `bucket`, or report how long until a slot frees.
    pub fn check(&self, bucket: RateBucket, player_id: &PlayerId) -> Result<(), RateLimitError> {
        let limit = self.limit_for(bucket);
        let window = limit.window();
        let now = Instant::now();

        let mut entry = self.entries.entry((bucket, *player_id)).or_default();
        let timestamps = entry.value_mut();
        while let Some(oldest) = timestamps.front() {
            if now.duration_since(*oldest) >= window {
                timestamps.pop_front();
            } else {
                break;
            }
        }

        if timestamps.len() < limit.max_requests as usize {
            timestamps.push_back(now);
            return Ok(());
        }

        let retry_after = timestamps
            .front()
            .map(|oldest| window.saturating_sub(now.duration_since(*oldest)))
            .unwrap_or(window);
        Err(RateLimitError::LimitExceeded {
            bucket,
            retry_after,
        })
    }

    /// Admit one request in every bucket, or in none of them.
    pub fn check_all(
        &self,
        buckets: &[RateBucket],
        player_id: &PlayerId,
    ) -> Result<(), RateLimitError> {
        for (admitted, bucket) in buckets.iter().enumerate() {
            if let Err(err) = self.check(*bucket, player_id) {
                for earlier in &buckets[..admitted] {
                    self.refund(*earlier, player_id);
                }
                return Err(err);
            }
        }
        Ok(())
    }

    fn refund(&self, bucket: RateBucket, player_id: &PlayerId) {
        if let Some(mut timestamps) = self.entries.get_mut(&(bucket, *player_id)) {
            timestamps.pop_back();
        }
    }

    /// Requests still available to `player_id` in `bucket` right now.
    pub fn remaining(&self, bucket: RateBucket, player_id: &PlayerId) -> u32 {
        let limit = self.limit_for(bucket);
        let window = limit.window();
        let now = Instant::now();
        let used = self
            .entries
            .get(&(bucket, *player_id))
            .map(|entry| {
                entry
                    .iter()
                    .filter(|at| now.duration_since(**at) < window)
                    .count()
            })
            .unwrap_or(0);
        limit.max_requests.saturating_sub(used as u32)
    }

    /// Clean up entries whose newest request is older than every window.
    pub fn cleanup_old_entries(&self) -> usize {
        let now = Instant::now();
        let threshold = self.config.longest_window();
        let before = self.entries.len();
        self.entries.retain(|_, timestamps| {
            timestamps
                .back()
                .is_some_and(|newest| now.duration_since(*newest) < threshold)
        });
        before.saturating_sub(self.entries.len())
    }

    pub fn tracked_entries(&self) -> usize {
        self.entries.len()
    }

    /// Start a background task to periodically clean up old entries
    pub fn start_cleanup_task(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        let rate_limiter = Arc::clone(&self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(rate_limiter.config.longest_window());
            loop {
                interval.tick().await;
                let removed = rate_limiter.cleanup_old_entries();
                if removed > 0 {
                    tracing::debug!(removed, "Pruned idle rate limit entries");
                }
            }
        })
    }
}

/// Rate limiting errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum RateLimitError {
    #[error("{bucket} rate limit exceeded. Try again in {} seconds.", .retry_after.as_secs().max(1))]
    LimitExceeded {
        bucket: RateBucket,
        retry_after: Duration,
    },
}

impl RateLimitError {
    pub fn bucket(&self) -> RateBucket {
        match self {
            Self::LimitExceeded { bucket, .. } => *bucket,
        }
    }

    pub fn retry_after(&self) -> Duration {
        match self {
            Self::LimitExceeded { retry_after, .. } => *retry_after,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn limiter() -> RoomRateLimiter {
        RoomRateLimiter::new(RateLimitConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn sixth_create_in_window_is_rejected() {
        let limiter = limiter();
        let player = Uuid::new_v4();

        for _ in 0..5 {
            assert!(limiter.check(RateBucket::CreateRoom, &player).is_ok());
        }
        let err = limiter
            .check(RateBucket::CreateRoom, &player)
            .unwrap_err();
        assert_eq!(err.bucket(), RateBucket::CreateRoom);
        assert!(err.retry_after() <= Duration::from_secs(60));
        assert!(err.retry_after() > Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn window_slides_instead_of_resetting() {
        let limiter = limiter();
        let player = Uuid::new_v4();

        for _ in 0..3 {
            limiter.check(RateBucket::CreateRoom, &player).unwrap();
        }
        tokio::time::advance(Duration::from_secs(30)).await;
        for _ in 0..2 {
            limiter.check(RateBucket::CreateRoom, &player).unwrap();
        }
        assert!(limiter.check(RateBucket::CreateRoom, &player).is_err());

        // The first three fall out of the window; the later two are still counted.
        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(limiter.remaining(RateBucket::CreateRoom, &player), 3);
        for _ in 0..3 {
            limiter.check(RateBucket::CreateRoom, &player).unwrap();
        }
        assert!(limiter.check(RateBucket::CreateRoom, &player).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn buckets_and_players_are_independent() {
        let limiter = limiter();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        for _ in 0..5 {
            limiter.check(RateBucket::CreateRoom, &alice).unwrap();
        }
        assert!(limiter.check(RateBucket::CreateRoom, &alice).is_err());
        assert!(limiter.check(RateBucket::JoinRoom, &alice).is_ok());
        assert!(limiter.check(RateBucket::CreateRoom, &bob).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn check_all_admits_every_bucket_or_none() {
        let limiter = limiter();
        let player = Uuid::new_v4();
        let clue = [RateBucket::GameAction, RateBucket::SendClue];

        for _ in 0..20 {
            limiter.check_all(&clue, &player).unwrap();
        }
        let err = limiter.check_all(&clue, &player).unwrap_err();
        assert_eq!(err.bucket(), RateBucket::SendClue);
        assert_eq!(limiter.remaining(RateBucket::GameAction, &player), 80);
        assert_eq!(limiter.remaining(RateBucket::SendClue, &player), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cleanup_removes_idle_entries() {
        let limiter = limiter();
        let player = Uuid::new_v4();
        limiter.check(RateBucket::GameAction, &player).unwrap();
        assert_eq!(limiter.tracked_entries(), 1);

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(limiter.cleanup_old_entries(), 1);
        assert_eq!(limiter.tracked_entries(), 0);
    }

    #[test]
    fn error_message_names_bucket() {
        let err = RateLimitError::LimitExceeded {
            bucket: RateBucket::SendClue,
            retry_after: Duration::from_millis(200),
        };
        assert_eq!(
            err.to_string(),
            "sendClue rate limit exceeded. Try again in 1 seconds."
        );
    }
}
