//! Shared automation status reported over the API and WebSocket.

use serde::{Deserialize, Serialize};

/// Point-in-time view of the background loop.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AutomationStatus {
    /// Whether the continuous loop is running.
    pub running: bool,
    /// Title of the task currently being worked on, if any.
    pub current_task: Option<String>,
    /// Cycles completed since the loop started.
    pub loop_count: u64,
    /// Human-readable duration of the last completed cycle.
    pub last_cycle_duration: Option<String>,
    /// Cycles that ended in an error since the loop started.
    pub error_count: u64,
}

impl AutomationStatus {
    /// Mark the loop started, resetting per-run counters.
    pub fn start(&mut self) {
        self.running = true;
        self.loop_count = 0;
        self.error_count = 0;
        self.current_task = None;
        self.last_cycle_duration = None;
    }

    /// Mark the loop stopped.
    pub fn stop(&mut self) {
        self.running = false;
        self.current_task = None;
    }

    /// Record the start of a new cycle.
    pub fn begin_cycle(&mut self) {
        self.loop_count += 1;
    }

    /// Record the task a cycle is working on.
    pub fn set_current_task(&mut self, title: Option<String>) {
        self.current_task = title;
    }

    /// Record how long the last cycle took.
    pub fn record_duration(&mut self, duration: std::time::Duration) {
        self.last_cycle_duration = Some(format!("{:.1}s", duration.as_secs_f64()));
    }

    /// Record a cycle that ended in an error.
    pub fn record_error(&mut self) {
        self.error_count += 1;
    }
}
