//! Dual-rate background refresh of the snapshot cache
//!
//! Two independent loops: a fast one for the cheap traffic/connection polls
//! and a slow one for the expensive per-proxy latency probes. Decoupling the
//! cadences keeps multi-second probe rounds from throttling the sub-second
//! counters. Each loop refreshes once immediately, then on every tick of its
//! own interval; an over-long activation delays that loop's own next tick
//! but never overlaps itself and never affects the other loop.

use crate::cache::SnapshotCache;
use crate::client::{ClientError, MihomoClient};
use crate::types::{LatencyMap, PROBE_FAILED};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Background refresher feeding a [`SnapshotCache`].
#[derive(Debug, Clone)]
pub struct Poller {
    client: Arc<MihomoClient>,
    cache: Arc<SnapshotCache>,
}

impl Poller {
    #[must_use]
    pub fn new(client: Arc<MihomoClient>, cache: Arc<SnapshotCache>) -> Self {
        Self { client, cache }
    }

    /// Spawn the fast and slow refresh loops.
    ///
    /// Both run until `shutdown` fires; cancellation is observed at each
    /// loop boundary and additionally aborts in-flight API calls. The
    /// returned handles let the caller await loop termination on shutdown.
    pub fn spawn(
        &self,
        fast_interval: Duration,
        slow_interval: Duration,
        shutdown: &CancellationToken,
    ) -> (JoinHandle<()>, JoinHandle<()>) {
        let fast = {
            let poller = self.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                let mut ticker = new_ticker(fast_interval);
                loop {
                    tokio::select! {
                        () = shutdown.cancelled() => {
                            debug!("fast refresh loop stopping");
                            return;
                        }
                        // The first tick completes immediately.
                        _ = ticker.tick() => poller.refresh_fast(&shutdown).await,
                    }
                }
            })
        };
        let slow = {
            let poller = self.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                let mut ticker = new_ticker(slow_interval);
                loop {
                    tokio::select! {
                        () = shutdown.cancelled() => {
                            debug!("slow refresh loop stopping");
                            return;
                        }
                        _ = ticker.tick() => poller.refresh_slow(&shutdown).await,
                    }
                }
            })
        };
        (fast, slow)
    }

    /// One fast-loop activation: refresh traffic and connections
    /// concurrently. Each sub-task swaps its own snapshot on success; a
    /// failure is logged and leaves that snapshot stale without disturbing
    /// the other sub-task.
    pub async fn refresh_fast(&self, shutdown: &CancellationToken) {
        let traffic = async {
            match self.client.traffic(shutdown).await {
                Ok(traffic) => self.cache.store_traffic(traffic),
                Err(ClientError::Cancelled) => debug!("traffic refresh cancelled"),
                Err(e) => warn!("error getting traffic: {e}"),
            }
        };
        let connections = async {
            match self.client.connections(shutdown).await {
                Ok(connections) => self.cache.store_connections(connections),
                Err(ClientError::Cancelled) => debug!("connection refresh cancelled"),
                Err(e) => warn!("error getting connections: {e}"),
            }
        };
        tokio::join!(traffic, connections);
    }

    /// One slow-loop activation: list proxies, probe every concrete endpoint
    /// concurrently, then swap the latency snapshot wholesale.
    ///
    /// If the proxy list itself cannot be fetched the activation is skipped
    /// and the previous snapshot stays in place. Individual probe failures
    /// are recorded as [`PROBE_FAILED`]; proxies that vanished since the
    /// last cycle drop out because the whole map is replaced.
    pub async fn refresh_slow(&self, shutdown: &CancellationToken) {
        let proxies = match self.client.proxies(shutdown).await {
            Ok(proxies) => proxies,
            Err(ClientError::Cancelled) => {
                debug!("proxy list refresh cancelled");
                return;
            }
            Err(e) => {
                warn!("error getting proxies: {e}");
                return;
            }
        };

        let mut probes = JoinSet::new();
        for (name, info) in proxies.proxies {
            if !info.kind.is_probe_target() {
                continue;
            }
            let client = Arc::clone(&self.client);
            let shutdown = shutdown.clone();
            probes.spawn(async move {
                let delay = match client.proxy_delay(&name, &shutdown).await {
                    Ok(delay) => delay,
                    Err(e) => {
                        debug!("delay probe for '{name}' failed: {e}");
                        PROBE_FAILED
                    }
                };
                (name, delay)
            });
        }

        let mut latencies = LatencyMap::with_capacity(probes.len());
        while let Some(joined) = probes.join_next().await {
            match joined {
                Ok((name, delay)) => {
                    latencies.insert(name, delay);
                }
                Err(e) => warn!("delay probe task failed to complete: {e}"),
            }
        }

        self.cache.store_latencies(latencies);
    }
}

/// Interval whose first tick fires immediately and which delays (rather
/// than bursts) after an over-long activation.
fn new_ticker(period: Duration) -> tokio::time::Interval {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}
