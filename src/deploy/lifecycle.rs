use crate::config::PollPolicy;
use crate::deploy::{DeployError, Result};
use crate::provider::{CreateOutcome, StackProvider, UpdateOutcome};
use crate::types::{StackIdentity, StackStatus};
use std::path::Path;
use std::sync::Arc;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnsureCreated {
    pub created: bool,
    pub already_existed: bool,
}

/// Drives a single stack through create, update and delete.
pub struct StackLifecycleController {
    provider: Arc<dyn StackProvider>,
    policy: PollPolicy,
    cancel: CancellationToken,
}

impl StackLifecycleController {
    pub fn new(provider: Arc<dyn StackProvider>, policy: PollPolicy) -> Self {
        Self {
            provider,
            policy,
            cancel: CancellationToken::new(),
        }
    }

    /// Lets a caller abandon any poll in progress.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Creates the stack unless it already exists.
    ///
    /// The current status is checked first so an existing stack never sees a
    /// create request. If that check fails the create request decides, since
    /// the provider answers "already exists" for a live stack anyway.
    pub async fn ensure_created(
        &self,
        stack: &StackIdentity,
        stage: &str,
        template_source: &Path,
    ) -> Result<EnsureCreated> {
        match self.provider.stack_status(stack).await {
            Ok(StackStatus::NotExists) | Ok(StackStatus::DeleteComplete) => {}
            Ok(status) => {
                info!(stack = %stack, %status, "stack already exists, proceeding to update");
                return Ok(EnsureCreated {
                    created: false,
                    already_existed: true,
                });
            }
            Err(e) => {
                debug!(stack = %stack, error = %e, "stack status unknown, attempting create");
            }
        }

        let outcome = self
            .provider
            .create_stack(stack, stage, template_source)
            .await
            .map_err(|source| DeployError::StackCreateFailed {
                stack: stack.to_string(),
                source,
            })?;

        match outcome {
            CreateOutcome::Accepted => {
                info!(stack = %stack, "creating stack");
                Ok(EnsureCreated {
                    created: true,
                    already_existed: false,
                })
            }
            CreateOutcome::AlreadyExists => {
                info!(stack = %stack, "stack already exists, proceeding to update");
                Ok(EnsureCreated {
                    created: false,
                    already_existed: true,
                })
            }
        }
    }

    /// Submits an update. Acceptance only; poll for completion separately.
    pub async fn apply_update(
        &self,
        stack: &StackIdentity,
        template_url: &Url,
    ) -> Result<UpdateOutcome> {
        let outcome = self
            .provider
            .update_stack(stack, template_url)
            .await
            .map_err(|source| DeployError::StackUpdateRejected {
                stack: stack.to_string(),
                source,
            })?;

        if outcome == UpdateOutcome::NoChanges {
            info!(stack = %stack, "stack template unchanged, nothing to update");
        } else {
            info!(stack = %stack, template = %template_url, "updating stack");
        }
        Ok(outcome)
    }

    /// Submits deletion. Acceptance only; poll for completion separately.
    pub async fn delete_stack(&self, stack: &StackIdentity) -> Result<()> {
        self.provider
            .delete_stack(stack)
            .await
            .map_err(|source| DeployError::StackDeleteRejected {
                stack: stack.to_string(),
                source,
            })?;

        info!(stack = %stack, "deleting stack");
        Ok(())
    }

    /// Queries the stack until it reaches a terminal status and returns it.
    ///
    /// In-progress answers are re-queried at the policy interval. Failed
    /// queries back off exponentially and escalate to `PollTransport` once
    /// `max_consecutive_errors` fail in a row. The deadline and the
    /// cancellation token are honoured between queries. A stack the provider
    /// does not know is polled again.
    pub async fn poll_until_terminal(&self, stack: &StackIdentity) -> Result<StackStatus> {
        self.poll(stack, &[]).await
    }

    /// Polls until a terminal status or one of `accepted` shows up.
    async fn poll(&self, stack: &StackIdentity, accepted: &[StackStatus]) -> Result<StackStatus> {
        let started = Instant::now();
        let deadline = self.policy.deadline.map(|d| started + d);
        let mut attempt: u32 = 0;
        let mut consecutive_errors: u32 = 0;

        loop {
            if self.cancel.is_cancelled() {
                return Err(DeployError::PollCancelled {
                    stack: stack.to_string(),
                });
            }

            attempt += 1;
            let delay = match self.provider.stack_status(stack).await {
                Ok(status) if status.is_terminal() || accepted.contains(&status) => {
                    debug!(stack = %stack, %status, attempt, "stack settled");
                    return Ok(status);
                }
                Ok(status) => {
                    consecutive_errors = 0;
                    if status.is_in_progress() {
                        debug!(stack = %stack, %status, attempt, "stack still in progress");
                    } else {
                        debug!(stack = %stack, %status, attempt, "stack not visible yet");
                    }
                    self.policy.interval
                }
                Err(source) => {
                    consecutive_errors += 1;
                    if consecutive_errors >= self.policy.max_consecutive_errors {
                        return Err(DeployError::PollTransport {
                            stack: stack.to_string(),
                            attempts: consecutive_errors,
                            source,
                        });
                    }
                    warn!(
                        stack = %stack,
                        error = %source,
                        consecutive_errors,
                        "stack status query failed, backing off"
                    );
                    self.policy.backoff(consecutive_errors)
                }
            };

            let mut wake_at = Instant::now() + delay;
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    return Err(DeployError::PollTimeout {
                        stack: stack.to_string(),
                        elapsed: started.elapsed(),
                    });
                }
                wake_at = wake_at.min(deadline);
            }

            tokio::select! {
                biased;

                () = self.cancel.cancelled() => {
                    return Err(DeployError::PollCancelled {
                        stack: stack.to_string(),
                    });
                }

                () = sleep_until(wake_at) => {}
            }
        }
    }

    /// Polls and requires the stack to settle on one of `expected`.
    pub async fn wait_for(
        &self,
        stack: &StackIdentity,
        expected: &[StackStatus],
    ) -> Result<StackStatus> {
        let status = self.poll(stack, expected).await?;

        if expected.contains(&status) {
            return Ok(status);
        }

        if status == StackStatus::Failed {
            return Err(DeployError::StackFailed {
                stack: stack.to_string(),
                status,
            });
        }

        Err(DeployError::UnexpectedStatus {
            stack: stack.to_string(),
            expected: expected
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" or "),
            actual: status,
        })
    }
}
