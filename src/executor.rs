//! Subprocess execution for planned commands.
//!
//! Commands are vetted against an allow-list, run with a per-command
//! timeout, and their output captured and truncated. One failing
//! command never aborts the rest of the batch.

use crate::config::Config;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Output cap for listing-style commands (`ls`, `find`, `grep`).
const LISTING_OUTPUT_LIMIT: usize = 1000;

/// Output cap for everything else.
const DEFAULT_OUTPUT_LIMIT: usize = 500;

/// Programs the executor is willing to spawn.
const ALLOWED_PROGRAMS: &[&str] = &[
    "ls", "cat", "head", "tail", "grep", "find", "wc", "echo", "pwd", "mkdir", "touch", "cp",
    "mv", "git", "cargo", "npm", "npx", "node", "python3", "pip", "pytest", "make", "sleep",
];

/// Allow-list policy deciding which commands may run.
#[derive(Debug, Clone)]
pub struct CommandPolicy {
    programs: Vec<String>,
}

impl Default for CommandPolicy {
    fn default() -> Self {
        Self {
            programs: ALLOWED_PROGRAMS.iter().map(ToString::to_string).collect(),
        }
    }
}

impl CommandPolicy {
    /// A policy allowing exactly the given programs.
    #[must_use]
    pub fn allowing(programs: &[&str]) -> Self {
        Self {
            programs: programs.iter().map(ToString::to_string).collect(),
        }
    }

    /// Whether the command line's program is on the allow-list.
    #[must_use]
    pub fn allows(&self, command: &str) -> bool {
        command
            .split_whitespace()
            .next()
            .is_some_and(|program| self.programs.iter().any(|p| p == program))
    }
}

/// Result of running (or refusing to run) one command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandOutcome {
    pub command: String,
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CommandOutcome {
    fn refused(command: &str, reason: impl Into<String>) -> Self {
        Self {
            command: command.to_string(),
            success: false,
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            error: Some(reason.into()),
        }
    }
}

/// Results of a whole command batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub outcomes: Vec<CommandOutcome>,
}

impl ExecutionReport {
    /// Count of commands that ran and exited zero.
    #[must_use]
    pub fn executed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.success).count()
    }

    /// Whether every command in the batch succeeded.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(|o| o.success)
    }

    /// Short human-readable digest of the first few outcomes.
    #[must_use]
    pub fn summary(&self) -> String {
        self.outcomes
            .iter()
            .take(5)
            .map(|o| {
                if o.success {
                    format!("$ {}\n{}", o.command, o.stdout.trim_end())
                } else {
                    let reason = o
                        .error
                        .clone()
                        .unwrap_or_else(|| o.stderr.trim_end().to_string());
                    format!("$ {} (failed)\n{reason}", o.command)
                }
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Runs planned shell commands inside the project directory.
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    project_dir: PathBuf,
    timeout: Duration,
    policy: CommandPolicy,
}

impl CommandExecutor {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            project_dir: config.project_dir.clone(),
            timeout: config.command_timeout,
            policy: CommandPolicy::default(),
        }
    }

    /// Override the per-command timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the allow-list policy.
    #[must_use]
    pub fn with_policy(mut self, policy: CommandPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Run a batch of commands in order, collecting per-command results.
    ///
    /// Blocked commands, non-zero exits, and timeouts are recorded as
    /// failed outcomes; the batch always runs to the end.
    ///
    /// # Errors
    ///
    /// Currently infallible at the batch level; the `Result` keeps the
    /// call-site shape uniform with the other loop operations.
    pub async fn run(&self, commands: &[String]) -> Result<ExecutionReport> {
        let mut report = ExecutionReport::default();
        for command in commands {
            let command = command.trim();
            if command.is_empty() {
                continue;
            }
            report.outcomes.push(self.run_one(command).await);
        }
        Ok(report)
    }

    async fn run_one(&self, command: &str) -> CommandOutcome {
        if !self.policy.allows(command) {
            warn!("Blocked command: {}", command);
            return CommandOutcome::refused(command, "blocked by command policy");
        }

        debug!("Running: {}", command);
        let mut parts = command.split_whitespace();
        let Some(program) = parts.next() else {
            return CommandOutcome::refused(command, "empty command");
        };

        let mut child = Command::new(program);
        child
            .args(parts)
            .current_dir(&self.project_dir)
            .kill_on_drop(true);

        match tokio::time::timeout(self.timeout, child.output()).await {
            Ok(Ok(output)) => {
                let limit = output_limit(command);
                CommandOutcome {
                    command: command.to_string(),
                    success: output.status.success(),
                    exit_code: output.status.code(),
                    stdout: truncate(&String::from_utf8_lossy(&output.stdout), limit),
                    stderr: truncate(&String::from_utf8_lossy(&output.stderr), limit),
                    error: None,
                }
            }
            Ok(Err(e)) => CommandOutcome::refused(command, format!("failed to spawn: {e}")),
            Err(_) => CommandOutcome::refused(
                command,
                format!("timed out after {}s", self.timeout.as_secs()),
            ),
        }
    }
}

/// Listing commands get a larger cap since their output is the point.
fn output_limit(command: &str) -> usize {
    if ["ls", "find", "grep"]
        .iter()
        .any(|listing| command.contains(listing))
    {
        LISTING_OUTPUT_LIMIT
    } else {
        DEFAULT_OUTPUT_LIMIT
    }
}

fn truncate(text: &str, limit: usize) -> String {
    if text.len() <= limit {
        return text.to_string();
    }
    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... [truncated]", &text[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn executor() -> CommandExecutor {
        CommandExecutor::new(&Config::default())
    }

    #[test]
    fn test_policy_allows_listed_program() {
        let policy = CommandPolicy::default();
        assert!(policy.allows("ls -la"));
        assert!(policy.allows("git status"));
        assert!(!policy.allows("rm -rf /"));
        assert!(!policy.allows("curl http://example.com"));
        assert!(!policy.allows(""));
    }

    #[test]
    fn test_output_limit_split() {
        assert_eq!(output_limit("ls -la"), LISTING_OUTPUT_LIMIT);
        assert_eq!(output_limit("grep -rn main src"), LISTING_OUTPUT_LIMIT);
        assert_eq!(output_limit("cat README.md"), DEFAULT_OUTPUT_LIMIT);
    }

    #[test]
    fn test_truncate_appends_marker() {
        let long = "x".repeat(600);
        let truncated = truncate(&long, 500);
        assert!(truncated.ends_with("... [truncated]"));
        assert!(truncated.len() < long.len());
        assert_eq!(truncate("short", 500), "short");
    }

    #[tokio::test]
    async fn test_run_captures_stdout() {
        let report = executor().run(&["echo hello".to_string()]).await.unwrap();
        assert_eq!(report.outcomes.len(), 1);
        assert!(report.outcomes[0].success);
        assert_eq!(report.outcomes[0].exit_code, Some(0));
        assert!(report.outcomes[0].stdout.contains("hello"));
    }

    #[tokio::test]
    async fn test_blocked_command_is_recorded_not_run() {
        let report = executor()
            .run(&["rm -rf /tmp/nope".to_string(), "echo ok".to_string()])
            .await
            .unwrap();
        assert_eq!(report.outcomes.len(), 2);
        assert!(!report.outcomes[0].success);
        assert!(report.outcomes[0]
            .error
            .as_deref()
            .unwrap()
            .contains("blocked"));
        // The batch continued past the blocked command.
        assert!(report.outcomes[1].success);
        assert_eq!(report.executed(), 1);
    }

    #[tokio::test]
    async fn test_timeout_fails_only_that_command() {
        let executor = executor().with_timeout(Duration::from_millis(100));
        let report = executor
            .run(&["sleep 5".to_string(), "echo after".to_string()])
            .await
            .unwrap();
        assert!(!report.outcomes[0].success);
        assert!(report.outcomes[0]
            .error
            .as_deref()
            .unwrap()
            .contains("timed out"));
        assert!(report.outcomes[1].success);
    }

    #[tokio::test]
    async fn test_empty_commands_skipped() {
        let report = executor()
            .run(&[String::new(), "   ".to_string()])
            .await
            .unwrap();
        assert!(report.outcomes.is_empty());
        assert!(report.all_succeeded());
    }

    #[tokio::test]
    async fn test_nonzero_exit_marked_failed() {
        let policy = CommandPolicy::allowing(&["false"]);
        let executor = executor().with_policy(policy);
        let report = executor.run(&["false".to_string()]).await.unwrap();
        assert!(!report.outcomes[0].success);
        assert_eq!(report.outcomes[0].exit_code, Some(1));
        assert!(report.outcomes[0].error.is_none());
    }
}
