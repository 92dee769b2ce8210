//! Exponential backoff with jitter.

use rand::Rng;
use std::time::Duration;

/// Delay before retry number `attempt` (1-based): `base × 2^(attempt-1)`,
/// capped at `max`, plus up to 10% jitter (still never above `max`).
pub fn backoff_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let base_ms = base.as_millis() as u64;
    let max_ms = max.as_millis() as u64;

    let exponential_base = 2u64.saturating_pow(attempt - 1);
    let capped_delay = base_ms.saturating_mul(exponential_base).min(max_ms);

    // Apply jitter (0 to 10% of the delay)
    let jitter_range = capped_delay / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis((capped_delay + jitter).min(max_ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles() {
        let base = Duration::from_millis(100);
        let max = Duration::from_secs(5);

        let b1 = backoff_delay(1, base, max);
        assert!(b1 >= Duration::from_millis(100) && b1 < Duration::from_millis(110));

        let b3 = backoff_delay(3, base, max);
        assert!(b3 >= Duration::from_millis(400) && b3 < Duration::from_millis(440));
    }

    #[test]
    fn test_backoff_is_capped() {
        let max = Duration::from_secs(5);
        assert_eq!(backoff_delay(30, Duration::from_millis(500), max), max);
        assert_eq!(backoff_delay(0, Duration::from_millis(500), max), Duration::ZERO);
    }
}
