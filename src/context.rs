//! Project context gathering for planner prompts.
//!
//! Before asking the model for commands we take a cheap, read-only
//! snapshot of the project: a directory listing, the heads of a few
//! well-known files, and a grep for the task title. Every probe is
//! best-effort; a missing file just leaves a gap in the snapshot.

use crate::config::Config;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

/// Files worth showing the model the head of, when present.
const KEY_FILES: &[&str] = &[
    "README.md",
    "Cargo.toml",
    "package.json",
    "pyproject.toml",
    "Makefile",
];

/// How many lines of each key file to include.
const HEAD_LINES: &str = "40";

/// A read-only snapshot of the project used to ground the planner.
#[derive(Debug, Clone, Default)]
pub struct ProjectSnapshot {
    pub listing: String,
    pub file_heads: Vec<(String, String)>,
    pub mentions: String,
}

impl ProjectSnapshot {
    /// Gather a snapshot of `project_dir`, searching for `topic`
    /// mentions in the tree.
    pub async fn gather(config: &Config, topic: &str) -> Self {
        let dir = &config.project_dir;
        let mut snapshot = Self {
            listing: probe(dir, "ls", &["-la"]).await.unwrap_or_default(),
            ..Self::default()
        };

        for name in KEY_FILES {
            if dir.join(name).exists() {
                if let Some(head) = probe(dir, "head", &["-n", HEAD_LINES, name]).await {
                    snapshot.file_heads.push(((*name).to_string(), head));
                }
            }
        }

        if !topic.trim().is_empty() {
            snapshot.mentions = probe(
                dir,
                "grep",
                &["-rn", "--include=*.rs", "--include=*.py", "--include=*.js", "-m", "20", topic, "."],
            )
            .await
            .unwrap_or_default();
        }

        snapshot
    }

    /// Render the snapshot as prompt text.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        if !self.listing.is_empty() {
            out.push_str("Project files:\n");
            out.push_str(&self.listing);
            out.push('\n');
        }
        for (name, head) in &self.file_heads {
            out.push_str(&format!("--- {name} (head) ---\n{head}\n"));
        }
        if !self.mentions.is_empty() {
            out.push_str("Related mentions:\n");
            out.push_str(&self.mentions);
            out.push('\n');
        }
        if out.is_empty() {
            out.push_str("(no project context available)\n");
        }
        out
    }
}

/// Run a read-only probe, returning stdout on success.
async fn probe(dir: &Path, program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program)
        .args(args)
        .current_dir(dir)
        .output()
        .await;
    match output {
        Ok(output) if output.status.success() => {
            Some(String::from_utf8_lossy(&output.stdout).to_string())
        }
        Ok(_) => {
            debug!("Context probe {} exited non-zero", program);
            None
        }
        Err(e) => {
            debug!("Context probe {} failed: {}", program, e);
            None
        }
    }
}

/// Resolve and canonicalize a project directory, falling back to the
/// given path when canonicalization fails.
#[must_use]
pub fn resolve_project_dir(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn config_for(dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.project_dir = dir.path().to_path_buf();
        config
    }

    #[tokio::test]
    async fn test_gather_includes_listing_and_heads() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("README.md"), "# Demo project\n").unwrap();
        let snapshot = ProjectSnapshot::gather(&config_for(&dir), "demo").await;
        assert!(snapshot.listing.contains("README.md"));
        assert_eq!(snapshot.file_heads.len(), 1);
        assert_eq!(snapshot.file_heads[0].0, "README.md");
        assert!(snapshot.file_heads[0].1.contains("Demo project"));
    }

    #[tokio::test]
    async fn test_gather_tolerates_empty_dir() {
        let dir = TempDir::new().unwrap();
        let snapshot = ProjectSnapshot::gather(&config_for(&dir), "").await;
        assert!(snapshot.file_heads.is_empty());
        assert!(snapshot.mentions.is_empty());
    }

    #[test]
    fn test_render_empty_snapshot() {
        let snapshot = ProjectSnapshot::default();
        assert!(snapshot.render().contains("no project context"));
    }

    #[test]
    fn test_render_includes_sections() {
        let snapshot = ProjectSnapshot {
            listing: "total 0\n".to_string(),
            file_heads: vec![("README.md".to_string(), "# Hi\n".to_string())],
            mentions: "src/lib.rs:1:hi\n".to_string(),
        };
        let text = snapshot.render();
        assert!(text.contains("Project files:"));
        assert!(text.contains("--- README.md (head) ---"));
        assert!(text.contains("Related mentions:"));
    }
}
