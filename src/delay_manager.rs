use std::thread;
use std::time::Duration;

use log::debug;
use rand::Rng;

use crate::error::{PromoError, Result};

/// Paces requests: one wait per fetch, optionally spread over
/// `[0.5, 1.5] x delay` so the request rhythm is less regular.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DelayManager {
    base: Duration,
    jitter: bool,
}

impl DelayManager {
    pub fn new(base: Duration, jitter: bool) -> Self {
        DelayManager { base, jitter }
    }

    pub fn from_secs_f64(secs: f64, jitter: bool) -> Result<Self> {
        if !secs.is_finite() || secs < 0.0 {
            return Err(PromoError::invalid_argument(format!(
                "delay must be a non-negative number of seconds, got {}",
                secs
            )));
        }
        let base = Duration::try_from_secs_f64(secs)
            .map_err(|e| PromoError::invalid_argument(format!("delay {} is out of range: {}", secs, e)))?;
        Ok(DelayManager::new(base, jitter))
    }

    pub fn none() -> Self {
        DelayManager::new(Duration::ZERO, false)
    }

    pub fn base(&self) -> Duration {
        self.base
    }

    pub fn next_delay(&self) -> Duration {
        if !self.jitter || self.base.is_zero() {
            return self.base;
        }
        let mut rng = rand::thread_rng();
        self.base.mul_f64(rng.gen_range(0.5..=1.5))
    }

    pub fn wait(&self) {
        let delay = self.next_delay();
        if delay.is_zero() {
            return;
        }
        debug!("Waiting for {:.2} seconds...", delay.as_secs_f64());
        thread::sleep(delay);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_negative_and_nan() {
        assert!(DelayManager::from_secs_f64(-0.5, false).is_err());
        assert!(DelayManager::from_secs_f64(f64::NAN, false).is_err());
        assert!(DelayManager::from_secs_f64(f64::INFINITY, true).is_err());
    }

    #[test]
    fn test_fixed_delay_is_exact() {
        let delay = DelayManager::from_secs_f64(1.25, false).unwrap();
        assert_eq!(delay.next_delay(), Duration::from_millis(1250));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let delay = DelayManager::from_secs_f64(2.0, true).unwrap();
        for _ in 0..100 {
            let d = delay.next_delay();
            assert!(d >= Duration::from_secs(1) && d <= Duration::from_secs(3), "{:?}", d);
        }
    }

    #[test]
    fn test_zero_delay_returns_immediately() {
        let start = std::time::Instant::now();
        DelayManager::none().wait();
        assert!(start.elapsed() < Duration::from_millis(50));
    }
}
