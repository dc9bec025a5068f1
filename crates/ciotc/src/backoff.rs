use rand::Rng;
use std::time::Duration;

/// Exponential backoff with additive random jitter.
///
/// Each call to [`next_delay`](Self::next_delay) returns the current delay and
/// then grows it to `current * factor + U[0, jitter)`, capped at `max`.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    min: Duration,
    max: Duration,
    factor: f64,
    jitter: Duration,
    current: Duration,
}

impl Default for ExponentialBackoff {
    /// 1 s minimum, 60 s maximum, factor 2.5, up to 500 ms jitter.
    fn default() -> Self {
        Self::new(
            Duration::from_millis(1000),
            Duration::from_millis(60_000),
            2.5,
            Duration::from_millis(500),
        )
    }
}

impl ExponentialBackoff {
    /// Creates a new `ExponentialBackoff` starting at `min`.
    ///
    /// # Examples
    ///
    /// ```
    /// use ciotc::backoff::ExponentialBackoff;
    /// use std::time::Duration;
    /// let mut backoff = ExponentialBackoff::new(
    ///     Duration::from_millis(1000),
    ///     Duration::from_millis(60_000),
    ///     2.5,
    ///     Duration::ZERO,
    /// );
    /// assert_eq!(backoff.next_delay(), Duration::from_millis(1000));
    /// assert_eq!(backoff.next_delay(), Duration::from_millis(2500));
    /// ```
    #[must_use]
    pub const fn new(min: Duration, max: Duration, factor: f64, jitter: Duration) -> Self {
        Self {
            min,
            max,
            factor,
            jitter,
            current: min,
        }
    }

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_precision_loss,
        clippy::cast_sign_loss
    )]
    /// Returns the delay to wait now and advances the internal state.
    pub fn next_delay(&mut self) -> Duration {
        if self.current < self.min {
            self.current = self.min;
        }
        let delay = self.current;

        let current_ms = self.current.as_millis().min(u128::from(u64::MAX)) as u64;
        let jitter_ms = self.jitter.as_millis().min(u128::from(u64::MAX)) as u64;
        let jitter = if jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..jitter_ms)
        };

        // Float-to-int casts saturate, so a huge product lands on u64::MAX.
        let next_ms = ((current_ms as f64 * self.factor) as u64).saturating_add(jitter);
        self.current = Duration::from_millis(next_ms).min(self.max);

        delay
    }

    /// Drops the delay back to the minimum.
    pub fn reset(&mut self) {
        self.current = self.min;
    }

    /// The delay the next call to [`next_delay`](Self::next_delay) will return.
    #[must_use]
    pub fn current(&self) -> Duration {
        self.current.max(self.min)
    }
}
