use super::*;

type Entry = (std::sync::Weak<ClientHandle>, Id);

/// Parks a client's `mining.subscribe` while the upstream is not ready
/// (§4.4). Pure bookkeeping: callers decide what "ready" means and what a
/// flushed entry's response looks like.
#[derive(Default)]
pub(crate) struct SubscribeQueue {
    entries: Mutex<HashMap<ClientId, Entry>>,
}

impl SubscribeQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Enqueues `(client, id)` unless `is_ready` — evaluated under the same
    /// lock `flush` drains under — reports readiness, in which case the
    /// caller is responsible for responding immediately instead. A later
    /// call for the same client overwrites the earlier id.
    ///
    /// Returns `true` when the caller should respond immediately.
    pub(crate) fn enqueue(
        &self,
        client: &Arc<ClientHandle>,
        id: Id,
        is_ready: impl FnOnce() -> bool,
    ) -> bool {
        let mut entries = self.entries.lock();

        if is_ready() {
            return true;
        }

        entries.insert(client.id(), (Arc::downgrade(client), id));
        false
    }

    /// Atomically drains every queued entry.
    pub(crate) fn flush(&self) -> Vec<Entry> {
        self.entries.lock().drain().map(|(_, entry)| entry).collect()
    }

    /// Removes a client's queued entry, e.g. on disconnect.
    pub(crate) fn remove(&self, client: ClientId) {
        self.entries.lock().remove(&client);
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }
}
