use super::*;

/// Admission collaborator consulted by the accept loop (§6.3). Out of
/// scope as a feature — only the trait seam and a permissive default ship
/// here; a real deployment supplies its own ban/throttle policy.
pub(crate) trait RateLimiter: Send + Sync {
    fn allow(&self, peer: SocketAddr) -> bool;
    fn release(&self, peer: SocketAddr);
}

pub(crate) struct AllowAll;

impl RateLimiter for AllowAll {
    fn allow(&self, _peer: SocketAddr) -> bool {
        true
    }

    fn release(&self, _peer: SocketAddr) {}
}
