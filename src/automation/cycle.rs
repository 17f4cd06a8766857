//! The cycle orchestrator and continuous loop.

use crate::app::AppContext;
use crate::automation::steps::{CycleSteps, ReviewReport};
use crate::broadcast::Event;
use crate::error::{OttoError, Result};
use crate::task::{Task, TaskStatus};
use colored::Colorize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Bounds the test/fix loop inside a cycle.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 5 }
    }
}

/// How one cycle ended.
#[derive(Debug)]
pub enum CycleOutcome {
    /// A task was taken through to commit.
    Success {
        task: Task,
        /// Test runs it took for the suite to pass.
        iterations: u32,
        review: ReviewReport,
        duration: Duration,
    },
    /// Nothing was pending.
    NoTasks,
    /// The cycle aborted; the task (if one was selected) is `failed`.
    Error {
        task: Option<Task>,
        message: String,
        duration: Duration,
    },
}

/// Drives tasks through the step sequence, one cycle at a time.
pub struct AutomationLoop {
    ctx: Arc<AppContext>,
    steps: Box<dyn CycleSteps>,
    policy: RetryPolicy,
}

impl AutomationLoop {
    #[must_use]
    pub fn new(ctx: Arc<AppContext>, steps: Box<dyn CycleSteps>) -> Self {
        let policy = RetryPolicy {
            max_attempts: ctx.config.max_fix_attempts,
        };
        Self { ctx, steps, policy }
    }

    /// Override the retry policy.
    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Run one complete cycle: pick the oldest pending task and take it
    /// through implement, test/fix, review, and commit.
    ///
    /// Step-level failures are folded into [`CycleOutcome::Error`]; the
    /// selected task is transitioned to `failed` on every abort path.
    ///
    /// # Errors
    ///
    /// Returns an error only for faults outside the step sequence, such
    /// as the task disappearing from the store mid-cycle.
    pub async fn run_cycle(&self) -> Result<CycleOutcome> {
        let started = Instant::now();

        let Some(task) = self.ctx.store.read().await.first_pending() else {
            return Ok(CycleOutcome::NoTasks);
        };

        info!("{} {}", "Starting task:".cyan(), task.title);
        self.ctx
            .status
            .write()
            .await
            .set_current_task(Some(task.title.clone()));
        let task = self.set_status(task.id, TaskStatus::InProgress).await?;

        // Implement
        let implementation = match self.steps.implement(&task).await {
            Ok(report) if report.success => report,
            Ok(report) => {
                return self.abort(task, started, format!("implementation failed: {}", report.output)).await;
            }
            Err(e) => {
                return self.abort(task, started, format!("implementation error: {e}")).await;
            }
        };
        info!("Implementation done: {}", implementation.output.lines().next().unwrap_or(""));

        // Test, fixing failures up to the policy bound
        let mut iterations = 0;
        let mut passing = false;
        while iterations < self.policy.max_attempts {
            iterations += 1;
            let tests = match self.steps.run_tests(&task).await {
                Ok(report) => report,
                Err(e) => {
                    return self.abort(task, started, format!("test run error: {e}")).await;
                }
            };
            if tests.all_passed {
                passing = true;
                break;
            }
            warn!("Tests failing (attempt {}/{})", iterations, self.policy.max_attempts);
            match self.steps.debug_and_fix(&task, &tests).await {
                Ok(fix) if fix.success => {}
                Ok(fix) => {
                    return self.abort(task, started, format!("fix attempt failed: {}", fix.output)).await;
                }
                Err(e) => {
                    return self.abort(task, started, format!("fix error: {e}")).await;
                }
            }
        }
        if !passing {
            let err = OttoError::MaxAttempts {
                max: self.policy.max_attempts,
            };
            return self.abort(task, started, err.to_string()).await;
        }

        // Advisory review; a failure here never blocks the commit.
        let review = match self.steps.final_review(&task).await {
            Ok(review) => review,
            Err(e) => {
                warn!("Final review failed: {}", e);
                ReviewReport {
                    approved: false,
                    summary: format!("review unavailable: {e}"),
                }
            }
        };

        // Commit
        match self.steps.commit_and_push(&task).await {
            Ok(report) if report.success => {}
            Ok(report) => {
                return self.abort(task, started, format!("commit failed: {}", report.output)).await;
            }
            Err(e) => {
                return self.abort(task, started, format!("commit error: {e}")).await;
            }
        }

        let task = self.set_status(task.id, TaskStatus::Completed).await?;
        let duration = started.elapsed();
        info!("{} {} ({:.1}s)", "Completed:".green(), task.title, duration.as_secs_f64());

        Ok(CycleOutcome::Success {
            task,
            iterations,
            review,
            duration,
        })
    }

    /// Run cycles until cancelled, sleeping between them.
    pub async fn run_continuous(&self, cancel: CancellationToken) {
        info!("{}", "Automation loop started".bold());
        loop {
            if cancel.is_cancelled() {
                break;
            }
            self.ctx.status.write().await.begin_cycle();

            let backoff = match self.run_cycle().await {
                Ok(outcome) => {
                    self.record_outcome(&outcome).await;
                    self.ctx.config.cycle_interval
                }
                Err(e) => {
                    error!("Unexpected cycle failure: {}", e);
                    self.ctx.status.write().await.record_error();
                    self.ctx.broadcaster.publish(&Event::AutomationError {
                        message: e.to_string(),
                    });
                    self.ctx.config.error_backoff
                }
            };

            let status = self.ctx.status.read().await.clone();
            self.ctx.broadcaster.publish(&Event::StatusUpdate(status));

            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(backoff) => {}
            }
        }
        info!("Automation loop stopped");
    }

    async fn record_outcome(&self, outcome: &CycleOutcome) {
        let mut status = self.ctx.status.write().await;
        status.set_current_task(None);
        match outcome {
            CycleOutcome::Success { duration, .. } => status.record_duration(*duration),
            CycleOutcome::NoTasks => {}
            CycleOutcome::Error { message, duration, .. } => {
                status.record_duration(*duration);
                status.record_error();
                drop(status);
                self.ctx.broadcaster.publish(&Event::AutomationError {
                    message: message.clone(),
                });
            }
        }
    }

    async fn set_status(&self, id: uuid::Uuid, status: TaskStatus) -> Result<Task> {
        let task = self.ctx.store.write().await.set_status(id, status)?;
        self.ctx.broadcaster.publish(&Event::TaskUpdated(task.clone()));
        Ok(task)
    }

    async fn abort(
        &self,
        task: Task,
        started: Instant,
        message: String,
    ) -> Result<CycleOutcome> {
        error!("{} {}: {}", "Cycle aborted".red(), task.title, message);
        let task = self.set_status(task.id, TaskStatus::Failed).await?;
        Ok(CycleOutcome::Error {
            task: Some(task),
            message,
            duration: started.elapsed(),
        })
    }
}
