//! Reconnect backoff: exponential with a cap and jitter, shared by every
//! retry loop in the agent rather than inlined sleep math.

use rand::Rng;
use std::time::Duration;

const BASE: Duration = Duration::from_secs(1);
const CAP: Duration = Duration::from_secs(30);
const JITTER_FRACTION: f64 = 0.2;

pub struct Backoff {
    attempt: u32,
}

impl Backoff {
    pub fn new() -> Self {
        Self { attempt: 0 }
    }

    /// Delay for the current attempt, then advance to the next. Doubles the
    /// base delay per attempt up to `CAP`, then applies up to ±20% jitter so
    /// a fleet of agents reconnecting together doesn't do so in lockstep.
    pub fn next_delay(&mut self) -> Duration {
        let exponent = self.attempt.min(5);
        self.attempt += 1;
        let unjittered = BASE.saturating_mul(1 << exponent).min(CAP);
        jitter(unjittered)
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}

fn jitter(base: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let factor = 1.0 + rng.gen_range(-JITTER_FRACTION..=JITTER_FRACTION);
    Duration::from_secs_f64((base.as_secs_f64() * factor).max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_then_caps() {
        let mut backoff = Backoff::new();
        let first = backoff.next_delay();
        assert!(first.as_secs_f64() <= BASE.as_secs_f64() * (1.0 + JITTER_FRACTION) + 0.01);

        for _ in 0..20 {
            let delay = backoff.next_delay();
            assert!(delay <= CAP.mul_f64(1.0 + JITTER_FRACTION) + Duration::from_millis(1));
        }
    }

    #[test]
    fn reset_returns_to_base_delay() {
        let mut backoff = Backoff::new();
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        let delay = backoff.next_delay();
        assert!(delay.as_secs_f64() <= BASE.as_secs_f64() * (1.0 + JITTER_FRACTION) + 0.01);
    }
}
