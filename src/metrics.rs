use super::*;

/// Metrics collaborator (§6.3): counters and gauges named in the spec,
/// exposed over `/status` by [`http_server`]. Styled after `metatron.rs`'s
/// `AtomicU64` bookkeeping.
pub(crate) trait MetricsSink: Send + Sync {
    fn inc_shares_accepted(&self);
    fn inc_shares_rejected(&self);
    fn set_clients_active(&self, count: usize);
    fn set_upstream_connected(&self, connected: bool);
    fn set_last_notify_unix(&self, unix_secs: i64);
    fn set_last_set_difficulty(&self, difficulty: f64);
}

#[derive(serde::Serialize)]
pub(crate) struct MetricsSnapshot {
    pub(crate) shares_accepted: u64,
    pub(crate) shares_rejected: u64,
    pub(crate) clients_active: u64,
    pub(crate) upstream_connected: bool,
    pub(crate) last_notify_unix: i64,
    pub(crate) last_set_difficulty: f64,
}

pub(crate) struct AtomicMetrics {
    shares_accepted: AtomicU64,
    shares_rejected: AtomicU64,
    clients_active: AtomicU64,
    upstream_connected: AtomicBool,
    last_notify_unix: std::sync::atomic::AtomicI64,
    last_set_difficulty_bits: AtomicU64,
}

impl Default for AtomicMetrics {
    fn default() -> Self {
        Self {
            shares_accepted: AtomicU64::new(0),
            shares_rejected: AtomicU64::new(0),
            clients_active: AtomicU64::new(0),
            upstream_connected: AtomicBool::new(false),
            last_notify_unix: std::sync::atomic::AtomicI64::new(0),
            last_set_difficulty_bits: AtomicU64::new(0),
        }
    }
}

impl AtomicMetrics {
    pub(crate) fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            shares_accepted: self.shares_accepted.load(Ordering::Relaxed),
            shares_rejected: self.shares_rejected.load(Ordering::Relaxed),
            clients_active: self.clients_active.load(Ordering::Relaxed),
            upstream_connected: self.upstream_connected.load(Ordering::Relaxed),
            last_notify_unix: self.last_notify_unix.load(Ordering::Relaxed),
            last_set_difficulty: f64::from_bits(self.last_set_difficulty_bits.load(Ordering::Relaxed)),
        }
    }
}

impl MetricsSink for AtomicMetrics {
    fn inc_shares_accepted(&self) {
        self.shares_accepted.fetch_add(1, Ordering::Relaxed);
    }

    fn inc_shares_rejected(&self) {
        self.shares_rejected.fetch_add(1, Ordering::Relaxed);
    }

    fn set_clients_active(&self, count: usize) {
        self.clients_active.store(count as u64, Ordering::Relaxed);
    }

    fn set_upstream_connected(&self, connected: bool) {
        self.upstream_connected.store(connected, Ordering::Relaxed);
    }

    fn set_last_notify_unix(&self, unix_secs: i64) {
        self.last_notify_unix.store(unix_secs, Ordering::Relaxed);
    }

    fn set_last_set_difficulty(&self, difficulty: f64) {
        self.last_set_difficulty_bits.store(difficulty.to_bits(), Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let metrics = AtomicMetrics::default();
        metrics.inc_shares_accepted();
        metrics.inc_shares_accepted();
        metrics.inc_shares_rejected();
        metrics.set_clients_active(3);
        metrics.set_upstream_connected(true);
        metrics.set_last_set_difficulty(2.5);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.shares_accepted, 2);
        assert_eq!(snapshot.shares_rejected, 1);
        assert_eq!(snapshot.clients_active, 3);
        assert!(snapshot.upstream_connected);
        assert_eq!(snapshot.last_set_difficulty, 2.5);
    }
}
