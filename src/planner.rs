//! Command planning via a language model.
//!
//! The planner asks the model to reply in a strict two-section format
//! (`ANALYSIS:` prose, then `COMMANDS:` with one `- ` bullet per shell
//! command) and parses that reply into a [`CommandPlan`]. Replies that
//! break the contract are rejected and the completion retried once.

use crate::classify::TaskKind;
use crate::config::Config;
use crate::context::ProjectSnapshot;
use crate::error::{OttoError, Result};
use crate::task::Task;
use async_trait::async_trait;
use regex::Regex;
use serde_json::json;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// API version header value required by the completion endpoint.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Token cap for completion requests.
const MAX_TOKENS: u32 = 1024;

/// Abstraction over a text-completion backend.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send a prompt and return the model's text reply.
    async fn complete(&self, prompt: &str) -> anyhow::Result<String>;

    /// Model identifier, for logging.
    fn model_name(&self) -> &str;
}

/// HTTP client for the Anthropic Messages API.
pub struct AnthropicClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl AnthropicClient {
    /// Build a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration carries no API key.
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| OttoError::config("no API key configured"))?;
        Ok(Self {
            http: reqwest::Client::new(),
            base_url: config.api_base_url.clone(),
            api_key,
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String> {
        let body = json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "messages": [{"role": "user", "content": prompt}],
        });

        let response = self
            .http
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            anyhow::bail!("completion request failed ({status}): {detail}");
        }

        let value: serde_json::Value = response.json().await?;
        value["content"][0]["text"]
            .as_str()
            .map(ToString::to_string)
            .ok_or_else(|| anyhow::anyhow!("completion response had no text content"))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Scripted client for tests and simulation mode.
///
/// Responses are consumed in order; once the script runs out the last
/// response repeats. `with_fail_count` makes the first N calls fail.
pub struct MockLlmClient {
    responses: Mutex<Vec<String>>,
    error: Option<String>,
    fail_count: u32,
    calls: AtomicU32,
}

impl Default for MockLlmClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLlmClient {
    #[must_use]
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(Vec::new()),
            error: None,
            fail_count: 0,
            calls: AtomicU32::new(0),
        }
    }

    /// Queue a response to return.
    #[must_use]
    pub fn with_response(self, response: impl Into<String>) -> Self {
        self.responses
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(response.into());
        self
    }

    /// Make every call fail with the given message.
    #[must_use]
    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error = Some(message.into());
        self
    }

    /// Make the first `count` calls fail before responses succeed.
    #[must_use]
    pub fn with_fail_count(mut self, count: u32) -> Self {
        self.fail_count = count;
        self
    }

    /// How many times `complete` has been called.
    #[must_use]
    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, _prompt: &str) -> anyhow::Result<String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.error {
            anyhow::bail!("{message}");
        }
        if call < self.fail_count {
            anyhow::bail!("transient mock failure");
        }
        let responses = self
            .responses
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let idx = (call.saturating_sub(self.fail_count) as usize).min(responses.len().saturating_sub(1));
        responses
            .get(idx)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("mock has no responses queued"))
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}

/// A parsed plan: the model's analysis plus the commands to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandPlan {
    pub analysis: String,
    pub commands: Vec<String>,
}

/// Parse a model reply against the ANALYSIS/COMMANDS contract.
///
/// Only `- ` bullet lines between the `COMMANDS:` marker and the next
/// section header are accepted as commands.
///
/// # Errors
///
/// Returns [`OttoError::PlanParse`] if the `COMMANDS:` marker is
/// missing or yields no commands.
pub fn parse_plan(reply: &str) -> Result<CommandPlan> {
    // A line like "NOTES:" or "NEXT_STEPS:" ends the commands section.
    let section_header = Regex::new(r"^[A-Z][A-Z_]*:").expect("static regex");

    let mut analysis = String::new();
    let mut commands = Vec::new();
    let mut in_commands = false;

    for line in reply.lines() {
        let trimmed = line.trim();
        if trimmed.eq_ignore_ascii_case("commands:") {
            in_commands = true;
            continue;
        }
        if in_commands {
            if let Some(command) = trimmed.strip_prefix("- ") {
                let command = command.trim();
                if !command.is_empty() {
                    commands.push(command.to_string());
                }
                continue;
            }
            if section_header.is_match(trimmed) {
                // The terminating header may itself be the analysis,
                // so fall through and let it be captured below.
                in_commands = false;
            } else {
                continue;
            }
        }
        if let Some(rest) = trimmed.strip_prefix("ANALYSIS:") {
            analysis = rest.trim().to_string();
        } else if let Some(rest) = trimmed.strip_prefix("Analysis:") {
            analysis = rest.trim().to_string();
        }
    }

    if commands.is_empty() {
        return Err(OttoError::plan_parse(if reply.to_lowercase().contains("commands:") {
            "COMMANDS section contained no commands"
        } else {
            "reply had no COMMANDS section"
        }));
    }

    Ok(CommandPlan { analysis, commands })
}

/// Builds prompts and turns model replies into command plans.
pub struct Planner {
    client: Arc<dyn LlmClient>,
}

impl Planner {
    #[must_use]
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }

    /// Plan shell commands for a task.
    ///
    /// A reply that fails to parse triggers exactly one retry of the
    /// completion call before the error is surfaced.
    ///
    /// # Errors
    ///
    /// Returns [`OttoError::Llm`] if the completion call fails, or
    /// [`OttoError::PlanParse`] if both replies break the contract.
    pub async fn plan(
        &self,
        task: &Task,
        kind: TaskKind,
        snapshot: &ProjectSnapshot,
    ) -> Result<CommandPlan> {
        let prompt = build_prompt(task, kind, snapshot);
        debug!("Planning with model {}", self.client.model_name());

        let reply = self
            .client
            .complete(&prompt)
            .await
            .map_err(|e| OttoError::llm(e.to_string()))?;

        match parse_plan(&reply) {
            Ok(plan) => Ok(plan),
            Err(first_err) => {
                warn!("Plan parse failed ({}), retrying completion", first_err);
                let reply = self
                    .client
                    .complete(&prompt)
                    .await
                    .map_err(|e| OttoError::llm(e.to_string()))?;
                parse_plan(&reply)
            }
        }
    }
}

fn build_prompt(task: &Task, kind: TaskKind, snapshot: &ProjectSnapshot) -> String {
    let mut prompt = format!(
        "You are an automation agent working on the task below ({kind} work).\n\n\
         Task: {}\nDescription: {}\n",
        task.title, task.description
    );
    if !task.requirements.is_empty() {
        prompt.push_str("Requirements:\n");
        for req in &task.requirements {
            prompt.push_str(&format!("- {req}\n"));
        }
    }
    if !task.acceptance_criteria.is_empty() {
        prompt.push_str("Acceptance criteria:\n");
        for criterion in &task.acceptance_criteria {
            prompt.push_str(&format!("- {criterion}\n"));
        }
    }
    prompt.push_str("\nProject context:\n");
    prompt.push_str(&snapshot.render());
    prompt.push_str(
        "\nReply in exactly this format:\n\
         ANALYSIS: one paragraph describing your approach\n\
         COMMANDS:\n\
         - first shell command\n\
         - next shell command\n\n\
         List only safe, non-interactive commands.\n",
    );
    prompt
}
