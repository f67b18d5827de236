//! Caller-side retry with exponential backoff.
//!
//! The provisioner and the deployer never retry on their own. Only
//! transient failures are retried here; auth, validation, not-found and
//! conflict fail on the first attempt.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use berth_core::{Error, Result, Step};
use berth_deployer::{DeployPlan, DeployResult, StepOutcome, WorkloadDeployer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. At least 1.
    pub attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// Wait before retry number `retry` (1-based): the base doubled per
    /// retry, capped at the maximum.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.base_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempts run out.
    pub async fn run<T, F, Fut>(
        &self,
        step: Step,
        target: &str,
        cancel: &CancellationToken,
        mut op: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.attempts => {
                    let wait = self.backoff(attempt);
                    warn!(
                        %step, %target, attempt, ?wait, error = %err,
                        "transient failure, retrying"
                    );
                    if !self.pause(wait, cancel).await {
                        return Err(Error::Cancelled {
                            step,
                            target: target.to_string(),
                        });
                    }
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Submit `plan`, re-submitting while every failure is transient.
    ///
    /// Re-submission is safe because objects that made it are found
    /// unchanged. Outcomes are merged so an object created on an earlier
    /// attempt is still reported as created.
    pub async fn submit(
        &self,
        deployer: &WorkloadDeployer,
        plan: DeployPlan,
        cancel: &CancellationToken,
    ) -> DeployResult {
        let mut result = deployer.submit(plan.clone(), cancel).await;
        let mut attempt = 1;

        while result.is_retryable() && attempt < self.attempts {
            let wait = self.backoff(attempt);
            warn!(
                attempt,
                ?wait,
                deployment = result.deployment.label(),
                service = result.service.label(),
                "deploy incomplete, re-submitting"
            );
            if !self.pause(wait, cancel).await {
                return cancel_failed(result);
            }

            let next = deployer.submit(plan.clone(), cancel).await;
            result = DeployResult {
                deployment: next.deployment.after(&result.deployment),
                service: next.service.after(&result.service),
                plan: next.plan,
            };
            attempt += 1;
        }

        debug!(attempts = attempt, "deploy finished");
        result
    }

    /// Sleep for `wait`. False when cancelled first.
    async fn pause(&self, wait: Duration, cancel: &CancellationToken) -> bool {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(wait) => true,
        }
    }
}

/// Steps still failing when the caller gave up are reported as cancelled.
fn cancel_failed(result: DeployResult) -> DeployResult {
    let cancelled = |outcome: StepOutcome, step: Step, target: String| match outcome {
        StepOutcome::Failed(_) => StepOutcome::Failed(Error::Cancelled { step, target }),
        other => other,
    };
    DeployResult {
        deployment: cancelled(
            result.deployment,
            Step::Deployment,
            format!("deployment {}", result.plan.deployment.key()),
        ),
        service: cancelled(
            result.service,
            Step::Service,
            format!("service {}", result.plan.service.key()),
        ),
        plan: result.plan,
    }
}
