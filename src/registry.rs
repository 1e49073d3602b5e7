use super::*;

/// The set of live clients, consulted for broadcast and closed out on
/// accept/disconnect (§5: read lock for broadcast, write lock for
/// accept/close).
#[derive(Default)]
pub(crate) struct Registry {
    clients: RwLock<HashMap<ClientId, Arc<ClientHandle>>>,
    next_id: AtomicU64,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn next_client_id(&self) -> ClientId {
        ClientId::from_raw(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) async fn insert(&self, handle: Arc<ClientHandle>) {
        self.clients.write().await.insert(handle.id(), handle);
    }

    pub(crate) async fn remove(&self, id: ClientId) {
        self.clients.write().await.remove(&id);
    }

    /// Fans `message` out to every connected client. Wrapped in one `Arc`
    /// up front so a notify with many subscribers clones a refcount per
    /// client instead of the whole JSON value.
    pub(crate) async fn broadcast(&self, message: Message) {
        let message = Arc::new(message);
        let clients = self.clients.read().await;
        for client in clients.values() {
            client.send(Arc::clone(&message));
        }
    }

    /// Records the difficulty the upstream just set on every connected
    /// client's own session state, alongside the `mining.set_difficulty`
    /// frame `broadcast` already delivers to their sockets.
    pub(crate) async fn set_difficulty_for_all(&self, difficulty: Difficulty) {
        let clients = self.clients.read().await;
        for client in clients.values() {
            client.with_state(|s| s.difficulty = difficulty);
        }
    }

    pub(crate) async fn get(&self, id: ClientId) -> Option<Arc<ClientHandle>> {
        self.clients.read().await.get(&id).cloned()
    }

    pub(crate) async fn len(&self) -> usize {
        self.clients.read().await.len()
    }
}
