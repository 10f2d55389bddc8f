use std::sync::Arc;
use std::time::Duration;

use super::PartyServer;

impl PartyServer {
    /// Periodically delete finished and idle rooms. Runs until the task is aborted.
    pub async fn cleanup_task(&self) {
        let mut interval =
            tokio::time::interval(Duration::from_secs(self.config.server.room_cleanup_interval));

        loop {
            interval.tick().await;
            match self.coordinator.cleanup_stale_rooms().await {
                Ok(0) => {}
                Ok(count) => tracing::info!(count, "Cleaned up stale rooms"),
                Err(err) => tracing::warn!(error = %err, "Stale room cleanup failed"),
            }
        }
    }

    /// Spawn the room sweeper and the rate limiter's pruning loop.
    pub fn spawn_maintenance(self: &Arc<Self>) -> Vec<tokio::task::JoinHandle<()>> {
        let server = Arc::clone(self);
        vec![
            tokio::spawn(async move { server.cleanup_task().await }),
            Arc::clone(&self.rate_limiter).start_cleanup_task(),
        ]
    }
}
