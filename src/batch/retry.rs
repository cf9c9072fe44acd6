use std::time::Duration;

use super::types::AttemptOutcome;

/// How an attempt's outcome feeds the retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// 2xx, stop immediately
    Done,
    /// 429, timeout or transport error
    TransientRemote,
    /// Validation errors, not-found and everything else
    TerminalRemote,
}

/// Per-item retry settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_cap: Duration,
    /// Treat 5xx like a transient failure. Off by default: the remote's
    /// 5xx responses have always been reported to the user as-is.
    pub retry_server_errors: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_cap: Duration::from_secs(30),
            retry_server_errors: false,
        }
    }
}

impl RetryPolicy {
    /// Delay slept before attempt number `attempt` (0-based): `min(2^attempt, cap)` seconds
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let secs = 2u64.checked_pow(attempt).unwrap_or(u64::MAX);
        Duration::from_secs(secs).min(self.backoff_cap)
    }

    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    pub fn classify(&self, outcome: &AttemptOutcome) -> FailureClass {
        match outcome {
            AttemptOutcome::Success(_) => FailureClass::Done,
            AttemptOutcome::RateLimited { .. }
            | AttemptOutcome::Timeout
            | AttemptOutcome::Transport(_) => FailureClass::TransientRemote,
            AttemptOutcome::Invalid(_) => FailureClass::TerminalRemote,
            AttemptOutcome::Rejected { status, .. } => {
                if self.retry_server_errors && (500..600).contains(status) {
                    FailureClass::TransientRemote
                } else {
                    FailureClass::TerminalRemote
                }
            }
        }
    }
}
