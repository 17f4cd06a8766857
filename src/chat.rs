//! Turning chat messages into task drafts.
//!
//! The chat endpoint drafts a task straight from the user's message
//! with simple keyword heuristics; no model call is involved.

use crate::task::{TaskDraft, TaskPriority};

/// Longest prefix of the message used for the task title.
const TITLE_LIMIT: usize = 50;

/// Requirement bundles attached when the message mentions a topic.
const REQUIREMENT_BUNDLES: &[(&str, &[&str])] = &[
    (
        "api",
        &[
            "Design the endpoint request and response shapes",
            "Add input validation and error responses",
            "Cover the endpoint with integration tests",
        ],
    ),
    (
        "test",
        &[
            "Identify untested paths in the affected code",
            "Add unit tests for the core logic",
            "Make sure the full suite passes",
        ],
    ),
    (
        "database",
        &[
            "Review the schema changes needed",
            "Write a migration for the change",
            "Verify queries against the new schema",
        ],
    ),
];

/// Draft a task from a free-text chat message.
#[must_use]
pub fn draft_task_from_message(message: &str) -> TaskDraft {
    let message = message.trim();
    let lower = message.to_lowercase();

    let mut requirements = Vec::new();
    for (topic, bundle) in REQUIREMENT_BUNDLES {
        if lower.contains(topic) {
            requirements.extend(bundle.iter().map(ToString::to_string));
        }
    }
    if requirements.is_empty() {
        requirements.push("Analyze the request and break it into concrete steps".to_string());
    }

    TaskDraft {
        title: title_from(message),
        description: message.to_string(),
        requirements,
        acceptance_criteria: vec![
            "The requested change is implemented".to_string(),
            "Existing tests still pass".to_string(),
        ],
        priority: priority_from(&lower),
    }
}

fn title_from(message: &str) -> String {
    let prefix: String = message.chars().take(TITLE_LIMIT).collect();
    if message.chars().count() > TITLE_LIMIT {
        format!("Automated Task: {prefix}...")
    } else {
        format!("Automated Task: {prefix}")
    }
}

fn priority_from(lower: &str) -> TaskPriority {
    let has = |words: &[&str]| words.iter().any(|w| lower.contains(w));
    if has(&["urgent", "critical", "asap", "immediately"]) {
        TaskPriority::Critical
    } else if has(&["important", "high", "priority"]) {
        TaskPriority::High
    } else if has(&["low", "minor", "later"]) {
        TaskPriority::Low
    } else {
        TaskPriority::Medium
    }
}

/// Confirmation text shown to the user after a task is drafted.
#[must_use]
pub fn confirmation_reply(draft: &TaskDraft) -> String {
    format!(
        "I've created a task for that: \"{}\" ({} priority, {} requirement(s)). \
         It's queued for the automation loop.",
        draft.title,
        draft.priority,
        draft.requirements.len()
    )
}
