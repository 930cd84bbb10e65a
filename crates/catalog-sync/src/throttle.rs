//! Pacing of remote-mutating calls.
//!
//! Write paths are serialized and spaced out so a batch does not trip the
//! remote account's rate limits. The pacing policy is configuration, so tests
//! can switch it off entirely.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::trace;

/// Pacing policy for mutating calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleConfig {
    /// No pacing at all.
    Disabled,
    /// At least this much time between two consecutive calls.
    FixedInterval(Duration),
    /// Token bucket refilled at `per_second`, holding at most `burst` tokens.
    TokenBucket { per_second: u32, burst: u32 },
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self::FixedInterval(Duration::from_millis(250))
    }
}

#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    max_tokens: f64,
    refill_rate: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(per_second: u32, burst: u32) -> Self {
        let max_tokens = f64::from(burst.max(1));
        Self {
            tokens: max_tokens,
            max_tokens,
            refill_rate: f64::from(per_second.max(1)),
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill);
        self.tokens = (self.tokens + elapsed.as_secs_f64() * self.refill_rate).min(self.max_tokens);
        self.last_refill = now;
    }

    /// Takes a token, or returns how long to wait for one.
    fn try_acquire(&mut self) -> Result<(), Duration> {
        self.refill();
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else {
            let needed = 1.0 - self.tokens;
            Err(Duration::from_secs_f64(needed / self.refill_rate))
        }
    }
}

#[derive(Debug)]
enum ThrottleState {
    Disabled,
    Interval {
        every: Duration,
        last: Option<Instant>,
    },
    Bucket(TokenBucket),
}

/// Gate awaited before every remote-mutating call.
#[derive(Debug)]
pub struct MutationThrottle {
    state: Mutex<ThrottleState>,
}

impl MutationThrottle {
    /// Creates a throttle for the given policy.
    #[must_use]
    pub fn new(config: ThrottleConfig) -> Self {
        let state = match config {
            ThrottleConfig::Disabled => ThrottleState::Disabled,
            ThrottleConfig::FixedInterval(every) if every.is_zero() => ThrottleState::Disabled,
            ThrottleConfig::FixedInterval(every) => ThrottleState::Interval { every, last: None },
            ThrottleConfig::TokenBucket { per_second, burst } => {
                ThrottleState::Bucket(TokenBucket::new(per_second, burst))
            }
        };
        Self {
            state: Mutex::new(state),
        }
    }

    /// A throttle that never waits.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(ThrottleConfig::Disabled)
    }

    /// Waits until the next mutating call may proceed.
    pub async fn acquire(&self) {
        loop {
            let mut state = self.state.lock().await;
            match &mut *state {
                ThrottleState::Disabled => return,
                ThrottleState::Interval { every, last } => {
                    // The lock stays held while sleeping so callers queue up in order.
                    if let Some(prev) = *last {
                        let ready_at = prev + *every;
                        let now = Instant::now();
                        if ready_at > now {
                            trace!(wait_ms = (ready_at - now).as_millis() as u64, "Throttling mutation");
                            tokio::time::sleep_until(ready_at).await;
                        }
                    }
                    *last = Some(Instant::now());
                    return;
                }
                ThrottleState::Bucket(bucket) => {
                    let outcome = bucket.try_acquire();
                    drop(state);
                    match outcome {
                        Ok(()) => return,
                        Err(wait) => {
                            trace!(wait_ms = wait.as_millis() as u64, "Token bucket empty");
                            tokio::time::sleep(wait).await;
                        }
                    }
                }
            }
        }
    }
}
