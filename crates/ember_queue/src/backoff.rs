//! Retry backoff schedule.

use rand::Rng;
use std::time::Duration;

/// Delay before the next attempt of a job that has failed `attempt` times.
///
/// Exponential in the attempt counter (1-based) with an additive jitter of
/// at most half the step. Because the jitter ceiling is half the doubling
/// step, consecutive delays are strictly increasing until the cap is
/// reached: attempt n draws from `[d, 1.5d]` and attempt n+1 from
/// `[2d, 3d]`.
pub fn backoff_delay(attempt: u32, base: Duration, cap: Duration) -> Duration {
    let exponent = attempt.saturating_sub(1).min(20);
    let step = base
        .saturating_mul(2u32.saturating_pow(exponent))
        .min(cap);

    let jitter_ceiling_ms = (step.as_millis() / 2) as u64;
    let jitter = if jitter_ceiling_ms == 0 {
        Duration::ZERO
    } else {
        Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ceiling_ms))
    };

    step + jitter
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: Duration = Duration::from_secs(1);
    const CAP: Duration = Duration::from_secs(60);

    #[test]
    fn delay_stays_within_the_step_and_its_half_jitter() {
        for attempt in 1..=6u32 {
            let step = BASE * 2u32.pow(attempt - 1);
            let delay = backoff_delay(attempt, BASE, CAP);
            assert!(delay >= step, "attempt {attempt}: {delay:?} below {step:?}");
            assert!(
                delay <= step + step / 2,
                "attempt {attempt}: {delay:?} above jitter ceiling"
            );
        }
    }

    #[test]
    fn consecutive_delays_strictly_increase_below_the_cap() {
        for _ in 0..50 {
            let mut previous = Duration::ZERO;
            for attempt in 1..=6u32 {
                let delay = backoff_delay(attempt, BASE, CAP);
                assert!(
                    delay > previous,
                    "attempt {attempt}: {delay:?} not above {previous:?}"
                );
                previous = delay;
            }
        }
    }

    #[test]
    fn the_cap_bounds_the_step() {
        let delay = backoff_delay(30, BASE, CAP);
        assert!(delay >= CAP);
        assert!(delay <= CAP + CAP / 2);
    }

    #[test]
    fn huge_attempt_counters_do_not_overflow() {
        let delay = backoff_delay(u32::MAX, BASE, CAP);
        assert!(delay <= CAP + CAP / 2);
    }
}
