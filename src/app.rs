//! Shared application state.
//!
//! One [`AppContext`] is created at startup and shared (behind an
//! `Arc`) by the HTTP handlers, the WebSocket endpoint, and the
//! automation loop. All mutable state sits behind async locks; there
//! are no globals.

use crate::automation::{AutomationLoop, AutomationStatus, CycleSteps, LiveSteps, SimulatedSteps};
use crate::broadcast::{Broadcaster, Event};
use crate::config::Config;
use crate::error::Result;
use crate::planner::AnthropicClient;
use crate::store::{ChatLog, TaskStore};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Handle to a running automation loop.
struct AutomationHandle {
    token: CancellationToken,
    join: JoinHandle<()>,
}

/// Everything the service shares between its moving parts.
pub struct AppContext {
    pub config: Config,
    pub store: RwLock<TaskStore>,
    pub chat: RwLock<ChatLog>,
    pub status: RwLock<AutomationStatus>,
    pub broadcaster: Broadcaster,
    automation: Mutex<Option<AutomationHandle>>,
}

impl AppContext {
    #[must_use]
    pub fn new(config: Config) -> Arc<Self> {
        Arc::new(Self {
            config,
            store: RwLock::new(TaskStore::new()),
            chat: RwLock::new(ChatLog::new()),
            status: RwLock::new(AutomationStatus::default()),
            broadcaster: Broadcaster::new(),
            automation: Mutex::new(None),
        })
    }

    /// Build the step implementation matching the configuration:
    /// live model-driven steps with an API key, simulated steps without.
    ///
    /// # Errors
    ///
    /// Returns an error if the live client cannot be constructed.
    pub fn build_steps(&self) -> Result<Box<dyn CycleSteps>> {
        if self.config.simulation_mode() {
            info!("No API key configured, automation runs in simulation mode");
            Ok(Box::new(SimulatedSteps))
        } else {
            let client = Arc::new(AnthropicClient::new(&self.config)?);
            Ok(Box::new(LiveSteps::new(&self.config, client)))
        }
    }

    /// Start the continuous automation loop. Idempotent: a second call
    /// while running is a no-op.
    ///
    /// Returns `true` if a new loop was started.
    ///
    /// # Errors
    ///
    /// Returns an error if the step implementation cannot be built.
    pub async fn start_automation(self: &Arc<Self>) -> Result<bool> {
        let mut slot = self.automation.lock().await;
        if let Some(handle) = slot.as_ref() {
            if !handle.join.is_finished() {
                return Ok(false);
            }
        }

        let steps = self.build_steps()?;
        let token = CancellationToken::new();
        let automation = AutomationLoop::new(Arc::clone(self), steps);
        let loop_token = token.clone();
        let join = tokio::spawn(async move {
            automation.run_continuous(loop_token).await;
        });

        self.status.write().await.start();
        let status = self.status.read().await.clone();
        self.broadcaster.publish(&Event::AutomationStarted(status));

        *slot = Some(AutomationHandle { token, join });
        Ok(true)
    }

    /// Stop the automation loop if it is running. Idempotent.
    ///
    /// Returns `true` if a running loop was stopped.
    pub async fn stop_automation(&self) -> bool {
        let mut slot = self.automation.lock().await;
        let Some(handle) = slot.take() else {
            return false;
        };

        handle.token.cancel();
        if handle.join.await.is_err() {
            tracing::warn!("Automation loop task panicked");
        }

        self.status.write().await.stop();
        let status = self.status.read().await.clone();
        self.broadcaster.publish(&Event::AutomationStopped(status));
        true
    }

    /// Whether the automation loop is currently running.
    pub async fn automation_running(&self) -> bool {
        self.automation
            .lock()
            .await
            .as_ref()
            .is_some_and(|h| !h.join.is_finished())
    }
}
