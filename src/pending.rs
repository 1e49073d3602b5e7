use super::*;

/// Correlates an upstream id back to the client and original id that
/// produced it (§4.5).
pub(crate) struct PendingEntry {
    pub(crate) client: std::sync::Weak<ClientHandle>,
    pub(crate) original_id: Option<Id>,
    pub(crate) method: String,
    pub(crate) sent_at: Instant,
}

/// Keyed by the upstream id assigned when forwarding. Reset wholesale on
/// every fresh upstream session; never shared across sessions.
#[derive(Default)]
pub(crate) struct PendingTable {
    entries: Mutex<HashMap<i64, PendingEntry>>,
}

impl PendingTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&self, upstream_id: i64, entry: PendingEntry) {
        self.entries.lock().insert(upstream_id, entry);
    }

    /// Consults the table once; a hit removes the entry (take-and-remove).
    pub(crate) fn take(&self, upstream_id: i64) -> Option<PendingEntry> {
        self.entries.lock().remove(&upstream_id)
    }

    /// Clears every entry atomically, e.g. when the upstream session ends.
    pub(crate) fn clear(&self) {
        self.entries.lock().clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> PendingEntry {
        PendingEntry {
            client: std::sync::Weak::new(),
            original_id: Some(Id::Number(7)),
            method: "mining.submit".into(),
            sent_at: Instant::now(),
        }
    }

    #[test]
    fn take_removes_entry_once() {
        let table = PendingTable::new();
        table.insert(1, entry());

        let taken = table.take(1);
        assert!(taken.is_some());
        assert_eq!(taken.unwrap().original_id, Some(Id::Number(7)));

        assert!(table.take(1).is_none());
    }

    #[test]
    fn take_on_unknown_id_is_none() {
        let table = PendingTable::new();
        assert!(table.take(42).is_none());
    }

    #[test]
    fn clear_drops_all_entries() {
        let table = PendingTable::new();
        table.insert(1, entry());
        table.insert(2, entry());
        assert_eq!(table.len(), 2);

        table.clear();
        assert_eq!(table.len(), 0);
        assert!(table.take(1).is_none());
    }
}
