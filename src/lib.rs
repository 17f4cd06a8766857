//! Otto - task automation glue service.
//!
//! Otto fronts an in-memory task store with an HTTP/WebSocket API and
//! runs a background loop that picks pending tasks, plans shell
//! commands with a language model, executes them under an allow-list
//! policy, and drives each task through a test/fix/commit cycle.
//!
//! # Architecture
//!
//! - [`task`] / [`store`] - domain types and in-memory storage
//! - [`classify`] - keyword classification of task descriptions
//! - [`context`] / [`planner`] / [`executor`] - the plan-and-run core
//! - [`automation`] - the cycle orchestrator and continuous loop
//! - [`broadcast`] - event fan-out to WebSocket subscribers
//! - [`server`] - axum REST + WebSocket surface
//! - [`app`] - shared state tying it all together

pub mod app;
pub mod automation;
pub mod broadcast;
pub mod chat;
pub mod classify;
pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod planner;
pub mod server;
pub mod store;
pub mod task;

pub use app::AppContext;
pub use automation::{AutomationLoop, AutomationStatus, CycleOutcome, CycleSteps, MockCycleSteps};
pub use broadcast::{Broadcaster, Event};
pub use classify::{classify, TaskKind};
pub use config::Config;
pub use error::{OttoError, Result};
pub use executor::{CommandExecutor, CommandPolicy, ExecutionReport};
pub use planner::{AnthropicClient, CommandPlan, LlmClient, MockLlmClient, Planner};
pub use store::{ChatLog, TaskStore};
pub use task::{ChatMessage, MessageRole, Task, TaskDraft, TaskPatch, TaskPriority, TaskStatus};
