//! Back-off configuration for per-segment retries.

use std::time::Duration;

/// Configuration for exponential back-off between segment attempts.
///
/// The first retry waits `initial_delay`; every further retry multiplies the
/// previous delay by `factor`. Every delay, the first included, is capped at
/// `max_delay`, so delay `k` is `min(initial_delay * factor^k, max_delay)`.
/// A segment is attempted at most `max_attempts` times.
///
/// # Default Values
/// - `initial_delay`: 1 second
/// - `factor`: 2.0
/// - `max_delay`: 30 seconds
/// - `max_attempts`: 20
///
/// A `factor` below 1.0 shrinks the delays; one of exactly 1.0 keeps them
/// constant.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffConfig {
    /// Delay used for the first retry after a failed attempt.
    pub initial_delay: Duration,
    /// Multiplier applied to the delay after each retry.
    pub factor: f64,
    /// Ceiling applied to every delay.
    pub max_delay: Duration,
    /// Total number of attempts per segment, including the first.
    pub max_attempts: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(1000),
            factor: 2.0,
            max_delay: Duration::from_millis(30_000),
            max_attempts: 20,
        }
    }
}

impl BackoffConfig {
    /// Replace values that cannot describe a schedule.
    ///
    /// `max_attempts` is raised to at least one and a `factor` that is not
    /// finite or is negative becomes 1.0. Delays are left alone; the cap is
    /// applied by [`delays`](Self::delays).
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    ///
    /// use wirestream::client::BackoffConfig;
    ///
    /// let cfg = BackoffConfig {
    ///     initial_delay: Duration::from_millis(50),
    ///     factor: f64::NAN,
    ///     max_delay: Duration::from_millis(10),
    ///     max_attempts: 0,
    /// };
    ///
    /// let normalized = cfg.normalized();
    /// assert_eq!(normalized.initial_delay, Duration::from_millis(50));
    /// assert_eq!(normalized.max_delay, Duration::from_millis(10));
    /// assert_eq!(normalized.factor, 1.0);
    /// assert_eq!(normalized.max_attempts, 1);
    /// ```
    #[must_use]
    pub fn normalized(mut self) -> Self {
        if !self.factor.is_finite() || self.factor < 0.0 {
            self.factor = 1.0;
        }
        self.max_attempts = self.max_attempts.max(1);
        self
    }

    /// Iterate over the delays slept before the second, third, ... attempt.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    ///
    /// use wirestream::client::BackoffConfig;
    ///
    /// let cfg = BackoffConfig {
    ///     initial_delay: Duration::from_millis(100),
    ///     factor: 3.0,
    ///     max_delay: Duration::from_millis(1000),
    ///     max_attempts: 5,
    /// };
    /// let delays: Vec<_> = cfg.delays().take(4).collect();
    /// assert_eq!(
    ///     delays,
    ///     [100, 300, 900, 1000].map(Duration::from_millis).to_vec()
    /// );
    /// ```
    #[must_use]
    pub fn delays(&self) -> BackoffDelays {
        let config = self.normalized();
        BackoffDelays {
            next: config.initial_delay.min(config.max_delay),
            factor: config.factor,
            max_delay: config.max_delay,
        }
    }
}

/// Unbounded iterator over back-off delays.
#[derive(Clone, Debug)]
pub struct BackoffDelays {
    next: Duration,
    factor: f64,
    max_delay: Duration,
}

impl Iterator for BackoffDelays {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let current = self.next;
        // Only overflow can fail here; the factor is finite and non-negative.
        self.next = Duration::try_from_secs_f64(current.as_secs_f64() * self.factor)
            .map_or(self.max_delay, |grown| grown.min(self.max_delay));
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = BackoffConfig::default();
        assert_eq!(cfg.initial_delay, Duration::from_secs(1));
        assert_eq!(cfg.max_delay, Duration::from_secs(30));
        assert!((cfg.factor - 2.0).abs() < f64::EPSILON);
        assert_eq!(cfg.max_attempts, 20);
    }

    #[test]
    fn default_schedule_saturates_at_max_delay() {
        let delays: Vec<_> = BackoffConfig::default().delays().take(7).collect();
        let expected = [1, 2, 4, 8, 16, 30, 30].map(Duration::from_secs).to_vec();
        assert_eq!(delays, expected);
    }

    #[rstest]
    #[case(0)]
    #[case(1)]
    #[case(5)]
    fn delay_k_is_capped_power(#[case] k: u32) {
        let cfg = BackoffConfig {
            initial_delay: Duration::from_millis(10),
            factor: 2.0,
            max_delay: Duration::from_millis(100),
            max_attempts: 10,
        };
        let delay = cfg.delays().nth(k as usize).expect("unbounded iterator");
        let expected = Duration::from_millis(10 * 2_u64.pow(k)).min(Duration::from_millis(100));
        assert_eq!(delay, expected);
    }

    #[test]
    fn non_finite_factor_is_flattened() {
        let cfg = BackoffConfig {
            factor: f64::NAN,
            ..BackoffConfig::default()
        };
        let delays: Vec<_> = cfg.delays().take(3).collect();
        assert_eq!(delays, vec![Duration::from_secs(1); 3]);
    }

    #[test]
    fn inverted_delays_cap_every_delay() {
        let cfg = BackoffConfig {
            initial_delay: Duration::from_millis(50),
            factor: 2.0,
            max_delay: Duration::from_millis(10),
            max_attempts: 5,
        };
        let delays: Vec<_> = cfg.delays().take(4).collect();
        assert_eq!(delays, vec![Duration::from_millis(10); 4]);
    }

    #[test]
    fn factor_below_one_shrinks_delays() {
        let cfg = BackoffConfig {
            initial_delay: Duration::from_millis(80),
            factor: 0.5,
            max_delay: Duration::from_millis(100),
            max_attempts: 5,
        };
        let delays: Vec<_> = cfg.delays().take(3).collect();
        assert_eq!(delays, [80, 40, 20].map(Duration::from_millis).to_vec());
        assert!((cfg.normalized().factor - 0.5).abs() < f64::EPSILON);
    }

    #[rstest]
    #[case(f64::INFINITY)]
    #[case(-2.0)]
    fn unusable_factor_keeps_delays_constant(#[case] factor: f64) {
        let cfg = BackoffConfig {
            factor,
            ..BackoffConfig::default()
        };
        let delays: Vec<_> = cfg.delays().take(3).collect();
        assert_eq!(delays, vec![Duration::from_secs(1); 3]);
    }

    #[test]
    fn huge_factor_saturates_without_panicking() {
        let cfg = BackoffConfig {
            factor: f64::MAX,
            max_delay: Duration::MAX,
            ..BackoffConfig::default()
        };
        let delays: Vec<_> = cfg.delays().take(3).collect();
        assert_eq!(delays[2], Duration::MAX);
    }
}
