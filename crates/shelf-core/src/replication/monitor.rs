//! Feeds [`Connectivity`] from periodic health checks of the remote host.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::connectivity::Connectivity;
use crate::remote::ProductsApi;

/// Checks the remote's health on an interval and flips the shared flag.
///
/// The replicator marks the flag offline when a cycle cannot reach the
/// remote; the first successful check afterwards marks it online again,
/// which wakes the replication loop for one immediate cycle.
pub struct ConnectivityMonitor<A> {
    api: Arc<A>,
    connectivity: Connectivity,
    interval: Duration,
}

impl<A: ProductsApi> ConnectivityMonitor<A> {
    pub fn new(api: Arc<A>, connectivity: Connectivity, interval: Duration) -> Self {
        Self {
            api,
            connectivity,
            interval,
        }
    }

    /// Check once and publish the result. Returns the new online state.
    pub async fn check(&self) -> bool {
        let online = match self.api.health().await {
            Ok(()) => true,
            Err(error) if error.is_unreachable() => {
                tracing::debug!("Health check failed: {error}");
                false
            }
            Err(error) => {
                tracing::debug!("Health check answered with an error: {error}");
                true
            }
        };
        self.connectivity.set_online(online);
        online
    }

    /// Spawn the check loop. The first check runs right away.
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval.max(Duration::from_millis(10)));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.check().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockProductsApi;

    #[tokio::test(flavor = "multi_thread")]
    async fn check_tracks_reachability() {
        let api = Arc::new(MockProductsApi::default());
        let connectivity = Connectivity::online();
        let monitor =
            ConnectivityMonitor::new(Arc::clone(&api), connectivity.clone(), Duration::from_secs(60));

        api.set_unreachable(true);
        assert!(!monitor.check().await);
        assert!(!connectivity.is_online());

        api.set_unreachable(false);
        assert!(monitor.check().await);
        assert!(connectivity.is_online());
        assert_eq!(api.health_calls(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn background_check_restores_online() {
        let api = Arc::new(MockProductsApi::default());
        let connectivity = Connectivity::offline();
        let mut online = connectivity.subscribe();
        let task =
            ConnectivityMonitor::new(Arc::clone(&api), connectivity.clone(), Duration::from_millis(20))
                .start();

        tokio::time::timeout(Duration::from_secs(5), online.wait_for(|online| *online))
            .await
            .unwrap()
            .unwrap();
        assert!(api.health_calls() >= 1);

        task.abort();
    }
}
