//! Keyword-based task classification.
//!
//! A small ordered rule table maps free-text descriptions to a coarse
//! task kind. Earlier rules win, so "write unit tests for the login
//! form" is testing work even though it also mentions a component.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse category of work a task describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Testing,
    Documentation,
    BugFix,
    CodeCreation,
    Generic,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Testing => write!(f, "testing"),
            Self::Documentation => write!(f, "documentation"),
            Self::BugFix => write!(f, "bug_fix"),
            Self::CodeCreation => write!(f, "code_creation"),
            Self::Generic => write!(f, "generic"),
        }
    }
}

/// Classification rules, checked top to bottom.
const RULES: &[(TaskKind, &[&str])] = &[
    (
        TaskKind::Testing,
        &[
            "unit test",
            "integration test",
            "write test",
            "test for",
            "test coverage",
            "testing",
        ],
    ),
    (
        TaskKind::Documentation,
        &["documentation", "document", "readme", "guide", "docs"],
    ),
    (
        TaskKind::BugFix,
        &["fix", "bug", "error", "issue", "broken", "repair"],
    ),
    (
        TaskKind::CodeCreation,
        &[
            "api",
            "endpoint",
            "function",
            "component",
            "create",
            "implement",
            "build",
            "add",
        ],
    ),
];

/// Classify a task description.
///
/// Matching is case-insensitive substring search against the ordered
/// rule table; descriptions matching no rule are [`TaskKind::Generic`].
#[must_use]
pub fn classify(description: &str) -> TaskKind {
    let lower = description.to_lowercase();
    for (kind, phrases) in RULES {
        if phrases.iter().any(|p| lower.contains(p)) {
            return *kind;
        }
    }
    TaskKind::Generic
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_testing() {
        assert_eq!(
            classify("Write unit tests for the login form"),
            TaskKind::Testing
        );
        assert_eq!(classify("improve test coverage"), TaskKind::Testing);
    }

    #[test]
    fn test_classify_documentation() {
        assert_eq!(classify("Update the README"), TaskKind::Documentation);
        assert_eq!(classify("write a user guide"), TaskKind::Documentation);
    }

    #[test]
    fn test_classify_bug_fix() {
        assert_eq!(classify("fix the broken button"), TaskKind::BugFix);
        assert_eq!(classify("users report an issue on login"), TaskKind::BugFix);
    }

    #[test]
    fn test_classify_code_creation() {
        assert_eq!(classify("add a new button component"), TaskKind::CodeCreation);
        assert_eq!(classify("implement the search endpoint"), TaskKind::CodeCreation);
    }

    #[test]
    fn test_classify_generic() {
        assert_eq!(classify("what can you do"), TaskKind::Generic);
        assert_eq!(classify(""), TaskKind::Generic);
    }

    #[test]
    fn test_earlier_rules_win() {
        // Mentions both tests and a component; the testing rule comes first.
        assert_eq!(
            classify("write integration tests for the payment component"),
            TaskKind::Testing
        );
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(classify("FIX THE BUILD"), TaskKind::BugFix);
    }
}
