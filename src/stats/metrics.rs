//! Hub statistics snapshot

/// Point-in-time statistics reported by the hub worker
///
/// Counters are cumulative since the hub was spawned; `tenants` and
/// `viewers` reflect the registry at the moment the snapshot was taken.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HubStats {
    /// Tenants with at least one registered viewer
    pub tenants: usize,
    /// Registered viewers across all tenants
    pub viewers: usize,
    /// Broadcasts processed
    pub broadcasts: u64,
    /// Frames queued into viewer mailboxes
    pub frames_delivered: u64,
    /// Viewers disconnected because their mailbox was full
    pub evictions: u64,
}

impl HubStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Average number of viewers reached per broadcast
    pub fn mean_fanout(&self) -> f64 {
        if self.broadcasts > 0 {
            self.frames_delivered as f64 / self.broadcasts as f64
        } else {
            0.0
        }
    }
}
