//! Rate-limited batch execution of independent remote operations.
//!
//! Items are split into fixed-size groups. Every item of a group runs
//! concurrently on the calling task; the next group starts only after the
//! whole group has settled and a fixed inter-batch delay has elapsed.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use tokio_util::sync::CancellationToken;

use super::retry::{FailureClass, RetryPolicy};
use super::types::{AttemptOutcome, OperationResult, Outcome, WorkItem};

/// A remote operation the executor can drive for a single work item.
#[async_trait]
pub trait RemoteOperation: Send + Sync {
    /// Label used in log lines
    fn name(&self) -> &'static str;

    /// Login recorded on the result, if the operation has one
    fn login_of(&self, _item: &WorkItem) -> Option<String> {
        None
    }

    /// Perform one attempt. Must not retry on its own.
    async fn attempt(&self, item: &WorkItem) -> AttemptOutcome;

    /// Whether a terminal error message means "this already exists"
    fn is_duplicate_conflict(&self, _message: &str) -> bool {
        false
    }

    /// Secondary check run before turning a duplicate conflict into a skip
    async fn confirm_exists(&self, _item: &WorkItem) -> bool {
        false
    }
}

/// Sleeps between attempts and between batches.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Work for one `run_batch` call.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub items: Vec<WorkItem>,
    pub batch_size: usize,
    pub inter_batch_delay: Duration,
}

pub struct BatchExecutor {
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    cancel: CancellationToken,
}

impl BatchExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            sleeper: Arc::new(TokioSleeper),
            cancel: CancellationToken::new(),
        }
    }

    #[cfg(test)]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Run every item and return exactly one result per item, in group order.
    pub async fn run_batch(
        &self,
        request: BatchRequest,
        operation: &dyn RemoteOperation,
    ) -> Vec<OperationResult> {
        let batch_size = request.batch_size.max(1);
        let total = request.items.len();
        let groups = total.div_ceil(batch_size);
        let mut results = Vec::with_capacity(total);

        for (group_idx, group) in request.items.chunks(batch_size).enumerate() {
            let first = group.first().map(|item| item.index).unwrap_or_default();
            let last = group.last().map(|item| item.index).unwrap_or_default();
            tracing::info!(
                "{} batch {}/{}: items {}-{}",
                operation.name(),
                group_idx + 1,
                groups,
                first,
                last
            );

            let tasks = group
                .iter()
                .map(|item| self.execute_with_retry(item, operation));
            results.extend(join_all(tasks).await);

            if group_idx + 1 < groups {
                tracing::info!(
                    "Waiting {:?} before next {} batch",
                    request.inter_batch_delay,
                    operation.name()
                );
                // Remaining items resolve as cancelled on their own
                self.pause(request.inter_batch_delay).await;
            }
        }

        results
    }

    /// Drive one item through up to `max_attempts` sequential attempts.
    pub async fn execute_with_retry(
        &self,
        item: &WorkItem,
        operation: &dyn RemoteOperation,
    ) -> OperationResult {
        let outcome = self.drive(item, operation).await;
        OperationResult {
            index: item.index,
            login: operation.login_of(item),
            outcome,
        }
    }

    async fn drive(&self, item: &WorkItem, operation: &dyn RemoteOperation) -> Outcome {
        let name = operation.name();
        let attempts = self.policy.attempts();

        for attempt in 0..attempts {
            if attempt > 0 {
                let delay = self.policy.backoff_delay(attempt);
                tracing::info!(
                    "{} #{}: attempt {}/{}, backing off {:?}",
                    name,
                    item.index,
                    attempt + 1,
                    attempts,
                    delay
                );
                if !self.pause(delay).await {
                    return Outcome::cancelled();
                }
            }

            let outcome = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Outcome::cancelled(),
                outcome = operation.attempt(item) => outcome,
            };
            let is_last = attempt + 1 == attempts;
            let class = self.policy.classify(&outcome);

            match outcome {
                AttemptOutcome::Success(response_data) => {
                    tracing::info!("{} #{}: done", name, item.index);
                    return Outcome::Success { response_data };
                }
                AttemptOutcome::RateLimited { body } => {
                    tracing::warn!(
                        "{} #{}: 429 Too Many Requests, attempt {}/{}",
                        name,
                        item.index,
                        attempt + 1,
                        attempts
                    );
                    if is_last {
                        tracing::error!("{} #{}: detailed error: {}", name, item.index, body);
                        return Outcome::Failure {
                            error_message: "429 Too Many Requests".to_string(),
                            detailed_body: Some(body),
                        };
                    }
                }
                AttemptOutcome::Timeout => {
                    tracing::warn!(
                        "{} #{}: request timed out, attempt {}/{}",
                        name,
                        item.index,
                        attempt + 1,
                        attempts
                    );
                    if is_last {
                        return Outcome::failure("request timed out");
                    }
                }
                AttemptOutcome::Transport(error) => {
                    tracing::warn!(
                        "{} #{}: transport error {}, attempt {}/{}",
                        name,
                        item.index,
                        error,
                        attempt + 1,
                        attempts
                    );
                    if is_last {
                        return Outcome::failure(error);
                    }
                }
                AttemptOutcome::Invalid(message) => {
                    tracing::error!("{} #{}: {}", name, item.index, message);
                    return Outcome::failure(message);
                }
                AttemptOutcome::Rejected {
                    status,
                    message,
                    body,
                } => {
                    if class == FailureClass::TransientRemote && !is_last {
                        tracing::warn!(
                            "{} #{}: server error {}, attempt {}/{}",
                            name,
                            item.index,
                            status,
                            attempt + 1,
                            attempts
                        );
                        continue;
                    }

                    if operation.is_duplicate_conflict(&message) {
                        let exists = tokio::select! {
                            biased;
                            _ = self.cancel.cancelled() => return Outcome::cancelled(),
                            exists = operation.confirm_exists(item) => exists,
                        };
                        if exists {
                            tracing::info!("{} #{}: already listed, skipping", name, item.index);
                            return Outcome::Skipped { reason: message };
                        }
                    }

                    tracing::error!("{} #{}: error {} - {}", name, item.index, status, message);
                    tracing::error!("{} #{}: detailed error: {}", name, item.index, body);
                    return Outcome::Failure {
                        error_message: message,
                        detailed_body: Some(body),
                    };
                }
            }
        }

        Outcome::failure("max attempts exceeded")
    }

    /// Sleep unless cancelled first. Returns false on cancellation.
    async fn pause(&self, delay: Duration) -> bool {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            _ = self.sleeper.sleep(delay) => true,
        }
    }
}
