use super::*;

/// Width, in bytes, of the per-client prefix carved out of `extranonce1`.
/// Must satisfy `0 < PREFIX_BYTES < 8`; see [`ExtranonceAllocator::new`].
pub(crate) const DEFAULT_PREFIX_BYTES: usize = 1;

/// A client's assigned slice of the upstream nonce space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Assignment {
    pub(crate) prefix: Extranonce,
    pub(crate) trim: usize,
}

/// Process-scoped (supervisor-owned, not a true global) monotonic counter
/// handing out disjoint `extranonce2` prefixes to concurrent miners.
pub(crate) struct ExtranonceAllocator {
    counter: AtomicU64,
    prefix_bytes: usize,
}

impl ExtranonceAllocator {
    pub(crate) fn new(prefix_bytes: usize) -> Self {
        assert!(
            prefix_bytes > 0 && prefix_bytes < 8,
            "prefix_bytes must satisfy 0 < prefix_bytes < 8, got {prefix_bytes}"
        );

        Self {
            counter: AtomicU64::new(0),
            prefix_bytes,
        }
    }

    /// Assigns a fresh prefix, or `None` if `upstream_enonce2_size` is too
    /// small to carve one out (the client then shares the upstream's
    /// unsliced extranonce).
    pub(crate) fn allocate(&self, upstream_enonce2_size: usize) -> Option<Assignment> {
        if upstream_enonce2_size <= self.prefix_bytes {
            return None;
        }

        let modulus = 1u64 << (8 * self.prefix_bytes);
        let value = self.counter.fetch_add(1, Ordering::Relaxed) % modulus;

        let bytes = value.to_be_bytes();
        let prefix = Extranonce::from_bytes(&bytes[bytes.len() - self.prefix_bytes..]);

        Some(Assignment {
            prefix,
            trim: self.prefix_bytes,
        })
    }
}

/// `extranonce1' = upstream.extranonce1 ∥ prefix` (§4.3).
pub(crate) fn effective_extranonce1(upstream_enonce1: &Extranonce, prefix: Option<&Extranonce>) -> Extranonce {
    match prefix {
        Some(prefix) => upstream_enonce1.concat(prefix),
        None => upstream_enonce1.clone(),
    }
}

/// `extranonce2_size' = upstream.extranonce2_size − trim` (§4.3).
pub(crate) fn effective_extranonce2_size(upstream_enonce2_size: usize, trim: usize) -> usize {
    upstream_enonce2_size - trim
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_allocation_is_prefix_zero() {
        let allocator = ExtranonceAllocator::new(1);
        let assignment = allocator.allocate(4).unwrap();
        assert_eq!(assignment.prefix.to_string(), "00");
        assert_eq!(assignment.trim, 1);
    }

    #[test]
    fn allocations_increment_and_cycle_modulo_256() {
        let allocator = ExtranonceAllocator::new(1);
        for expected in 0..300u32 {
            let assignment = allocator.allocate(4).unwrap();
            assert_eq!(
                assignment.prefix.to_string(),
                format!("{:02X}", expected % 256)
            );
        }
    }

    #[test]
    fn skips_allocation_when_enonce2_size_too_small() {
        let allocator = ExtranonceAllocator::new(1);
        assert!(allocator.allocate(1).is_none());
        assert!(allocator.allocate(0).is_none());
    }

    #[test]
    fn no_two_of_256_concurrent_allocations_collide() {
        let allocator = ExtranonceAllocator::new(1);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..256 {
            let assignment = allocator.allocate(4).unwrap();
            assert!(seen.insert(assignment.prefix));
        }
    }

    #[test]
    fn effective_extranonce1_concatenates_prefix() {
        let upstream: Extranonce = "deadbeef".parse().unwrap();
        let prefix: Extranonce = "00".parse().unwrap();
        assert_eq!(
            effective_extranonce1(&upstream, Some(&prefix)).to_string(),
            "DEADBEEF00"
        );
        assert_eq!(effective_extranonce1(&upstream, None), upstream);
    }

    #[test]
    fn effective_extranonce2_size_subtracts_trim() {
        assert_eq!(effective_extranonce2_size(4, 1), 3);
    }
}
