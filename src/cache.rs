//! Shared snapshot store written by the refresh loops and read at scrape time
//!
//! Three independent snapshot families live behind one reader/writer lock.
//! Writers swap an `Arc` reference and release the lock immediately; the
//! fetch that produced the snapshot never happens under the lock. Readers
//! clone the three references and never block on in-progress refreshes, so a
//! scrape always observes fully-formed (possibly stale) data.

use crate::types::{ConnectionsResponse, LatencyMap, Traffic};
use std::sync::{Arc, RwLock};

/// Point-in-time view of all three snapshot families.
///
/// Each field is `None` until its refresh loop has succeeded at least once.
#[derive(Debug, Clone, Default)]
pub struct Snapshots {
    pub traffic: Option<Arc<Traffic>>,
    pub connections: Option<Arc<ConnectionsResponse>>,
    pub latencies: Option<Arc<LatencyMap>>,
}

/// Lock-protected store for the most recent snapshots.
#[derive(Debug, Default)]
pub struct SnapshotCache {
    inner: RwLock<Snapshots>,
}

impl SnapshotCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the traffic snapshot wholesale.
    pub fn store_traffic(&self, traffic: Traffic) {
        let traffic = Arc::new(traffic);
        self.write().traffic = Some(traffic);
    }

    /// Replace the connection snapshot wholesale.
    pub fn store_connections(&self, connections: ConnectionsResponse) {
        let connections = Arc::new(connections);
        self.write().connections = Some(connections);
    }

    /// Replace the latency snapshot wholesale.
    ///
    /// Proxies absent from `latencies` disappear from the exported series;
    /// the previous map is not merged into the new one.
    pub fn store_latencies(&self, latencies: LatencyMap) {
        let latencies = Arc::new(latencies);
        self.write().latencies = Some(latencies);
    }

    /// Read the current snapshots.
    ///
    /// Cheap (three `Arc` clones under a shared read lock) and non-blocking
    /// with respect to in-flight refreshes.
    #[must_use]
    pub fn snapshot(&self) -> Snapshots {
        self.inner
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Snapshots> {
        self.inner
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
