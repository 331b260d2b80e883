use std::time::{SystemTime, UNIX_EPOCH};

/// Sleeps for an exponentially growing, jittered delay for retry attempt
/// `attempt` (1-indexed), bounded by `max_ms`.
pub async fn backoff(attempt: u32, initial_ms: u64, max_ms: u64) {
    let delay = backoff_delay_ms(attempt, initial_ms, max_ms);
    tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
}

fn backoff_delay_ms(attempt: u32, initial_ms: u64, max_ms: u64) -> u64 {
    let base = initial_ms.saturating_mul(1u64 << attempt.min(16).saturating_sub(1));
    let capped = base.min(max_ms);
    let jitter = capped / 4;
    let random_offset = u64::from(
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.subsec_nanos())
            .unwrap_or(0),
    ) % (jitter * 2 + 1);
    (capped.saturating_sub(jitter) + random_offset).min(max_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_never_exceeds_max() {
        for attempt in 1..20 {
            let delay = backoff_delay_ms(attempt, 1000, 30_000);
            assert!(delay <= 30_000);
        }
    }

    #[test]
    fn delay_grows_with_attempt_before_capping() {
        let first = backoff_delay_ms(1, 1000, 30_000);
        let third = backoff_delay_ms(3, 1000, 30_000);
        assert!(third >= first);
    }
}
