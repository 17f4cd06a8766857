//! In-memory task and chat storage.
//!
//! State lives for the lifetime of the process. Iteration order is
//! insertion order, which the loop relies on to pick the oldest
//! pending task first.

use crate::error::{OttoError, Result};
use crate::task::{ChatMessage, Task, TaskDraft, TaskPatch, TaskStatus};
use uuid::Uuid;

/// Insertion-ordered collection of tasks.
#[derive(Debug, Default)]
pub struct TaskStore {
    tasks: Vec<Task>,
}

impl TaskStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and store a task from a draft, returning the stored copy.
    pub fn create(&mut self, draft: TaskDraft) -> Task {
        let task = Task::from_draft(draft);
        self.tasks.push(task.clone());
        task
    }

    /// Fetch a task by id.
    ///
    /// # Errors
    ///
    /// Returns [`OttoError::TaskNotFound`] if no task has the given id.
    pub fn get(&self, id: Uuid) -> Result<Task> {
        self.tasks
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or(OttoError::TaskNotFound { id })
    }

    /// All tasks in insertion order.
    #[must_use]
    pub fn list(&self) -> Vec<Task> {
        self.tasks.clone()
    }

    /// Apply a partial update to a task.
    ///
    /// # Errors
    ///
    /// Returns [`OttoError::TaskNotFound`] if no task has the given id.
    pub fn update(&mut self, id: Uuid, patch: TaskPatch) -> Result<Task> {
        let task = self
            .tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(OttoError::TaskNotFound { id })?;
        task.apply(patch);
        Ok(task.clone())
    }

    /// Shorthand for a status-only update.
    ///
    /// # Errors
    ///
    /// Returns [`OttoError::TaskNotFound`] if no task has the given id.
    pub fn set_status(&mut self, id: Uuid, status: TaskStatus) -> Result<Task> {
        self.update(id, TaskPatch::status(status))
    }

    /// Remove a task, returning the removed value.
    ///
    /// # Errors
    ///
    /// Returns [`OttoError::TaskNotFound`] if no task has the given id.
    pub fn delete(&mut self, id: Uuid) -> Result<Task> {
        let idx = self
            .tasks
            .iter()
            .position(|t| t.id == id)
            .ok_or(OttoError::TaskNotFound { id })?;
        Ok(self.tasks.remove(idx))
    }

    /// The oldest task still waiting to be worked on.
    #[must_use]
    pub fn first_pending(&self) -> Option<Task> {
        self.tasks
            .iter()
            .find(|t| t.status == TaskStatus::Pending)
            .cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Append-only chat transcript.
#[derive(Debug, Default)]
pub struct ChatLog {
    messages: Vec<ChatMessage>,
}

impl ChatLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    #[must_use]
    pub fn list(&self) -> Vec<ChatMessage> {
        self.messages.clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::MessageRole;

    fn draft(title: &str) -> TaskDraft {
        TaskDraft {
            title: title.to_string(),
            description: format!("{title} description"),
            ..TaskDraft::default()
        }
    }

    #[test]
    fn test_create_and_get() {
        let mut store = TaskStore::new();
        let task = store.create(draft("First"));
        let fetched = store.get(task.id).unwrap();
        assert_eq!(fetched.title, "First");
    }

    #[test]
    fn test_get_unknown_id_fails() {
        let store = TaskStore::new();
        let err = store.get(Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, OttoError::TaskNotFound { .. }));
    }

    #[test]
    fn test_list_preserves_insertion_order() {
        let mut store = TaskStore::new();
        store.create(draft("a"));
        store.create(draft("b"));
        store.create(draft("c"));
        let titles: Vec<_> = store.list().into_iter().map(|t| t.title).collect();
        assert_eq!(titles, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_first_pending_skips_other_statuses() {
        let mut store = TaskStore::new();
        let a = store.create(draft("a"));
        let b = store.create(draft("b"));
        store.set_status(a.id, TaskStatus::Completed).unwrap();
        let next = store.first_pending().unwrap();
        assert_eq!(next.id, b.id);
    }

    #[test]
    fn test_first_pending_empty() {
        let store = TaskStore::new();
        assert!(store.first_pending().is_none());
    }

    #[test]
    fn test_update_missing_task_fails() {
        let mut store = TaskStore::new();
        let err = store
            .update(Uuid::new_v4(), TaskPatch::status(TaskStatus::Failed))
            .unwrap_err();
        assert!(matches!(err, OttoError::TaskNotFound { .. }));
    }

    #[test]
    fn test_delete_removes_task() {
        let mut store = TaskStore::new();
        let task = store.create(draft("doomed"));
        let removed = store.delete(task.id).unwrap();
        assert_eq!(removed.id, task.id);
        assert!(store.is_empty());
        assert!(store.delete(task.id).is_err());
    }

    #[test]
    fn test_chat_log_push_and_list() {
        let mut log = ChatLog::new();
        log.push(ChatMessage::new(MessageRole::User, "hi"));
        log.push(ChatMessage::new(MessageRole::Assistant, "hello"));
        let messages = log.list();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "hi");
    }
}
