use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::spotify::{NowPlayingClient, TrackSnapshot};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Drives a [`NowPlayingClient`] the way a display does: one optional code
/// exchange on start-up, then a poll on a fixed interval.
pub struct NowPlayingPoller {
    client: Arc<NowPlayingClient>,
    interval: Duration,
}

impl NowPlayingPoller {
    /// A zero interval falls back to the default of five seconds.
    pub fn new(client: Arc<NowPlayingClient>, interval: Duration) -> Self {
        let interval = if interval.is_zero() {
            warn!("Poll interval must be non-zero, using {:?}", DEFAULT_POLL_INTERVAL);
            DEFAULT_POLL_INTERVAL
        } else {
            interval
        };

        Self { client, interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn client(&self) -> &NowPlayingClient {
        &self.client
    }

    /// Exchanges a redirect-provided code unless already authenticated.
    /// Returns whether the client is authenticated afterwards.
    pub async fn bootstrap(&self, code: Option<&str>) -> bool {
        match code {
            Some(code) if !self.client.is_authenticated() => {
                info!("Authorization code found, exchanging for token");
                if !self.client.exchange_code_for_token(code).await {
                    warn!("Token exchange failed");
                }
            }
            Some(_) => debug!("Already authenticated, ignoring authorization code"),
            None => {}
        }

        self.client.is_authenticated()
    }

    /// What to display after one poll. `None` when not authenticated, in
    /// which case the display is left as it was.
    pub async fn poll_once(&self) -> Option<TrackSnapshot> {
        if !self.client.is_authenticated() {
            debug!("Not authenticated with Spotify");
            return None;
        }

        Some(
            self.client
                .currently_playing()
                .await
                .unwrap_or_else(TrackSnapshot::nothing_playing),
        )
    }

    /// Polls immediately and then once per interval until `shutdown`
    /// resolves. Ticks missed by a slow request are delayed, not bunched.
    pub async fn run<F, S>(&self, mut on_update: F, shutdown: S)
    where
        F: FnMut(&TrackSnapshot),
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("Polling now playing every {:?}", self.interval);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Stopped polling");
                    break;
                }
                _ = ticker.tick() => {
                    if let Some(snapshot) = self.poll_once().await {
                        on_update(&snapshot);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::store::MemoryStore;

    fn poller() -> NowPlayingPoller {
        let config = Config::new("client-id", "client-secret");
        let client = NowPlayingClient::new(&config, Arc::new(MemoryStore::new())).unwrap();
        NowPlayingPoller::new(Arc::new(client), Duration::from_millis(10))
    }

    #[test]
    fn test_zero_interval_falls_back_to_default() {
        let config = Config::new("client-id", "client-secret");
        let client = NowPlayingClient::new(&config, Arc::new(MemoryStore::new())).unwrap();
        let poller = NowPlayingPoller::new(Arc::new(client), Duration::ZERO);

        assert_eq!(poller.interval(), DEFAULT_POLL_INTERVAL);
    }

    #[tokio::test]
    async fn test_poll_once_unauthenticated_leaves_display() {
        assert_eq!(poller().poll_once().await, None);
    }

    #[tokio::test]
    async fn test_bootstrap_without_code() {
        assert!(!poller().bootstrap(None).await);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown_without_updates_when_unauthenticated() {
        let poller = poller();
        let mut updates = 0;

        poller
            .run(
                |_| updates += 1,
                tokio::time::sleep(Duration::from_millis(50)),
            )
            .await;

        assert_eq!(updates, 0);
    }
}
