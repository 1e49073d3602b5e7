use super::*;

/// Upper bound on the exponent `r` in `clamp(min × 2^r, min, max)` (§4.2).
const MAX_EXPONENT: u32 = 3;

const JITTER_MAX_MS: u64 = 250;

/// `backoff(min, max) = clamp(min × 2^r, min, max) + uniform_jitter(0, 250ms)`.
pub(crate) fn backoff(min: Duration, max: Duration, attempt: u32) -> Duration {
    let exponent = attempt.min(MAX_EXPONENT);
    let scaled = min
        .checked_mul(1u32 << exponent)
        .unwrap_or(max)
        .clamp(min, max);

    let jitter = Duration::from_millis(rand::rng().random_range(0..=JITTER_MAX_MS));

    scaled + jitter
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIN: Duration = Duration::from_millis(500);
    const MAX: Duration = Duration::from_millis(30_000);

    #[test]
    fn first_attempt_is_close_to_min() {
        let delay = backoff(MIN, MAX, 0);
        assert!(delay >= MIN);
        assert!(delay <= MIN + Duration::from_millis(JITTER_MAX_MS));
    }

    #[test]
    fn exponent_is_clamped_at_three() {
        let at_cap = backoff(MIN, MAX, 3);
        let beyond_cap = backoff(MIN, MAX, 10);
        assert!(at_cap.as_millis() <= MAX.as_millis() + u128::from(JITTER_MAX_MS));
        assert!(beyond_cap.as_millis() <= MAX.as_millis() + u128::from(JITTER_MAX_MS));
    }

    #[test]
    fn never_exceeds_max_plus_jitter() {
        for attempt in 0..8 {
            let delay = backoff(MIN, MAX, attempt);
            assert!(delay <= MAX + Duration::from_millis(JITTER_MAX_MS));
        }
    }

    #[test]
    fn never_below_min() {
        for attempt in 0..8 {
            assert!(backoff(MIN, MAX, attempt) >= MIN);
        }
    }
}
