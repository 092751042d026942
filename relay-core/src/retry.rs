//! Bounded retry with a fixed backoff, shared by the client resend loop and the
//! processing node's forward-and-ack loop.

use std::time::Duration;

/// Attempt budget plus the pause between consecutive attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    /// Client send: 3 attempts, 500 ms apart.
    pub const CLIENT_SEND: RetryPolicy = RetryPolicy::new(3, Duration::from_millis(500));
    /// Processing forward-and-ack: 3 attempts, 100 ms apart.
    pub const FORWARD: RetryPolicy = RetryPolicy::new(3, Duration::from_millis(100));

    pub const fn new(attempts: u32, delay: Duration) -> Self {
        Self { attempts, delay }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Begin a fresh attempt sequence.
    pub fn start(&self) -> Attempts {
        Attempts {
            policy: *self,
            used: 0,
        }
    }
}

/// Counter for one retry sequence. The host sleeps for [`Attempts::backoff`]
/// before every attempt but the first.
#[derive(Debug, Clone)]
pub struct Attempts {
    policy: RetryPolicy,
    used: u32,
}

impl Attempts {
    /// Claim the next attempt. Returns its 1-based number, or `None` once the budget is spent.
    pub fn next_attempt(&mut self) -> Option<u32> {
        if self.used >= self.policy.attempts {
            return None;
        }
        self.used += 1;
        Some(self.used)
    }

    /// Pause owed before the attempt about to start; zero for the first one.
    pub fn backoff(&self) -> Duration {
        if self.used <= 1 {
            Duration::ZERO
        } else {
            self.policy.delay
        }
    }

    pub fn used(&self) -> u32 {
        self.used
    }

    pub fn is_exhausted(&self) -> bool {
        self.used >= self.policy.attempts
    }
}
