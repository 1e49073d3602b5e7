use super::*;

/// Per-client difficulty collaborator (§6.3). Vardiff itself is out of
/// scope as a feature; the router still needs a concrete seam to call
/// `record_outcome` into, so a no-op passthrough ships by default.
pub(crate) trait DifficultyController: Send + Sync {
    fn record_outcome(&self, client: &Arc<ClientHandle>, accepted: bool);
    fn on_subscribe(&self, client: &Arc<ClientHandle>);
}

pub(crate) struct NoopDifficultyController;

impl DifficultyController for NoopDifficultyController {
    fn record_outcome(&self, _client: &Arc<ClientHandle>, _accepted: bool) {}
    fn on_subscribe(&self, _client: &Arc<ClientHandle>) {}
}
