//! Blocking retry policy shared by link join, broker connect, and stream open.
//!
//! The firmware has a single cooperative loop.  A retry in progress
//! **blocks that loop**: no messages are delivered and no audio is serviced
//! until [`RetryPolicy::run`] returns.  Keeping the attempt bound and the
//! inter-attempt delay in one value makes that cost visible at every call
//! site.

use embedded_hal::delay::DelayNs;

/// How many times to try and how long to wait between tries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// `None` retries forever.
    max_attempts: Option<u32>,
    delay_ms: u32,
    /// Wait before every attempt (including the first) instead of after
    /// every failed one.
    delay_first: bool,
}

/// Result of [`RetryPolicy::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOutcome {
    Succeeded { attempts: u32 },
    Exhausted { attempts: u32 },
}

impl RetryOutcome {
    pub fn attempts(self) -> u32 {
        match self {
            Self::Succeeded { attempts } | Self::Exhausted { attempts } => attempts,
        }
    }
}

impl RetryPolicy {
    /// Give up after `max_attempts` failures.
    pub const fn bounded(max_attempts: u32, delay_ms: u32) -> Self {
        Self {
            max_attempts: Some(max_attempts),
            delay_ms,
            delay_first: false,
        }
    }

    /// Never give up.
    pub const fn unbounded(delay_ms: u32) -> Self {
        Self {
            max_attempts: None,
            delay_ms,
            delay_first: false,
        }
    }

    /// Sleep before each attempt rather than after each failure.
    pub const fn delay_before_attempt(mut self) -> Self {
        self.delay_first = true;
        self
    }

    pub fn delay_ms(&self) -> u32 {
        self.delay_ms
    }

    /// Call `attempt(n)` (1-based) until it returns `true` or the bound is
    /// reached.  A zero bound still makes one attempt.
    pub fn run<D: DelayNs>(
        &self,
        delay: &mut D,
        mut attempt: impl FnMut(u32) -> bool,
    ) -> RetryOutcome {
        let mut n: u32 = 0;
        loop {
            n = n.saturating_add(1);
            if self.delay_first {
                delay.delay_ms(self.delay_ms);
            }
            if attempt(n) {
                return RetryOutcome::Succeeded { attempts: n };
            }
            if self.max_attempts.is_some_and(|max| n >= max) {
                return RetryOutcome::Exhausted { attempts: n };
            }
            if !self.delay_first {
                delay.delay_ms(self.delay_ms);
            }
        }
    }
}
