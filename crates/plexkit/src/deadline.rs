//! Operation deadlines.
//!
//! A [`Deadline`] bounds a whole command run. Each HTTP call gets the
//! per-call timeout or whatever is left of the overall budget, whichever is
//! smaller.

use crate::error::{Error, Result};
use std::time::{Duration, Instant};

/// Default timeout for a single remote call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(60);

/// Default budget for a whole operation.
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(120);

/// Overall time budget shared by every call of one operation.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    budget: Duration,
    per_call: Duration,
}

impl Deadline {
    /// Start a deadline now.
    #[must_use]
    pub fn new(budget: Duration, per_call: Duration) -> Self {
        Self {
            started: Instant::now(),
            budget,
            per_call,
        }
    }

    /// Time left before the budget is exhausted.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.budget.saturating_sub(self.started.elapsed())
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.remaining().is_zero()
    }

    /// Timeout to use for the next call.
    ///
    /// Fails with [`Error::Timeout`] once the budget is gone, so no request
    /// is started that could not finish in time.
    pub fn call_timeout(&self) -> Result<Duration> {
        let remaining = self.remaining();
        if remaining.is_zero() {
            return Err(Error::Timeout(format!(
                "operation exceeded {}s",
                self.budget.as_secs()
            )));
        }
        Ok(self.per_call.min(remaining))
    }
}

impl Default for Deadline {
    fn default() -> Self {
        Self::new(DEFAULT_OPERATION_TIMEOUT, DEFAULT_CALL_TIMEOUT)
    }
}
