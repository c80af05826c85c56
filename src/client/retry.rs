//! Retry and model-fallback policy.
//!
//! The policy is a pure value: it produces the full attempt plan for one
//! cell up front, so the retry/fallback behavior is testable without any
//! network I/O. The generation client just walks the plan.

use std::time::Duration;

/// Which configured model an attempt targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelChoice {
    Primary,
    Fallback,
}

/// One planned attempt for a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt {
    /// 1-based attempt number across the whole plan
    pub number: u32,
    /// Model to use for this attempt
    pub model: ModelChoice,
    /// Delay to sleep before issuing this attempt
    pub delay: Duration,
}

/// Retry policy: `max_retries` primary attempts with linearly increasing
/// delay, then exactly one fallback attempt.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Full attempt plan for one cell.
    ///
    /// The delay before attempt n is `base_delay × (n - 1)`: the first
    /// attempt fires immediately and each retry waits one step longer.
    pub fn plan(&self) -> Vec<Attempt> {
        (1..=self.max_retries + 1)
            .map(|number| Attempt {
                number,
                model: if number <= self.max_retries {
                    ModelChoice::Primary
                } else {
                    ModelChoice::Fallback
                },
                delay: self.base_delay * (number - 1),
            })
            .collect()
    }
}
