//! The task list controller.
//!
//! Owns the in-memory list, the filter and the persistence adapter. Every
//! mutation writes the full list back to the store; write failures are logged
//! and remembered but never undo the in-memory change.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::Result;
use crate::storage::{self, KeyValueStore};
use crate::task::{Filter, Priority, Task, TaskCounts, TaskId};

/// Which bulk removal a confirmation applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearAction {
    Completed,
    All,
}

/// A pending yes/no question. Confirming consumes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmRequest {
    action: ClearAction,
    count: usize,
    message: String,
}

impl ConfirmRequest {
    fn new(action: ClearAction, count: usize) -> Self {
        let message = match action {
            ClearAction::Completed => format!("Clear {count} completed task(s)?"),
            ClearAction::All => format!("Delete all {count} task(s)?"),
        };
        Self {
            action,
            count,
            message,
        }
    }

    pub fn action(&self) -> ClearAction {
        self.action
    }

    /// Number of tasks affected when the request was made
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Blocking yes/no prompt.
pub trait Prompt {
    fn confirm(&mut self, message: &str) -> bool;
}

pub struct TaskListController<S, C = SystemClock> {
    tasks: Vec<Task>,
    filter: Filter,
    store: S,
    key: String,
    clock: C,
    last_persist_error: Option<String>,
}

impl<S: KeyValueStore> TaskListController<S, SystemClock> {
    pub fn open(store: S, key: impl Into<String>) -> Self {
        Self::with_clock(store, key, SystemClock)
    }
}

impl<S: KeyValueStore, C: Clock> TaskListController<S, C> {
    /// Load the list stored under `key`; unreadable data starts empty.
    pub fn with_clock(store: S, key: impl Into<String>, clock: C) -> Self {
        let key = key.into();
        let tasks = storage::load_tasks(&store, &key);
        Self {
            tasks,
            filter: Filter::All,
            store,
            key,
            clock,
            last_persist_error: None,
        }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    pub fn filter(&self) -> Filter {
        self.filter
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Message of the most recent failed write, cleared by the next success.
    pub fn persist_error(&self) -> Option<&str> {
        self.last_persist_error.as_deref()
    }

    /// Add a task at the front. Returns `None` when `text` is blank.
    pub fn create(&mut self, text: &str, priority: Priority) -> Option<TaskId> {
        let text = text.trim();
        if text.is_empty() {
            debug!("rejected blank task");
            return None;
        }
        let now = self.clock.now();
        let id = self.next_id(now);
        self.tasks.insert(0, Task::new(id, text, priority, now));
        debug!(id, %priority, "created task");
        self.persist();
        Some(id)
    }

    /// Flip completion. Returns false when `id` is unknown.
    pub fn toggle_complete(&mut self, id: TaskId) -> bool {
        let Some(task) = self.tasks.iter_mut().find(|task| task.id == id) else {
            return false;
        };
        task.completed = !task.completed;
        debug!(id, completed = task.completed, "toggled task");
        self.persist();
        true
    }

    pub fn delete(&mut self, id: TaskId) -> bool {
        let Some(index) = self.tasks.iter().position(|task| task.id == id) else {
            return false;
        };
        self.tasks.remove(index);
        debug!(id, "deleted task");
        self.persist();
        true
    }

    /// Replace the text when the trimmed input is non-empty and different.
    pub fn edit(&mut self, id: TaskId, new_text: &str) -> bool {
        let new_text = new_text.trim();
        let Some(task) = self.tasks.iter_mut().find(|task| task.id == id) else {
            return false;
        };
        if new_text.is_empty() || new_text == task.text {
            return false;
        }
        task.text = new_text.to_string();
        debug!(id, "edited task");
        self.persist();
        true
    }

    /// Ask before removing completed tasks; `None` when there are none.
    pub fn request_clear_completed(&self) -> Option<ConfirmRequest> {
        let completed = self.counts().completed;
        (completed > 0).then(|| ConfirmRequest::new(ClearAction::Completed, completed))
    }

    /// Ask before removing every task; `None` when the list is empty.
    pub fn request_clear_all(&self) -> Option<ConfirmRequest> {
        let total = self.tasks.len();
        (total > 0).then(|| ConfirmRequest::new(ClearAction::All, total))
    }

    /// Apply a confirmed request. Returns how many tasks were removed.
    pub fn confirm(&mut self, request: ConfirmRequest) -> usize {
        let before = self.tasks.len();
        match request.action {
            ClearAction::Completed => self.tasks.retain(|task| !task.completed),
            ClearAction::All => self.tasks.clear(),
        }
        let removed = before - self.tasks.len();
        debug!(action = ?request.action, removed, "cleared tasks");
        self.persist();
        removed
    }

    pub fn clear_completed(&mut self, prompt: &mut dyn Prompt) -> usize {
        self.prompt_and_apply(self.request_clear_completed(), prompt)
    }

    pub fn clear_all(&mut self, prompt: &mut dyn Prompt) -> usize {
        self.prompt_and_apply(self.request_clear_all(), prompt)
    }

    fn prompt_and_apply(&mut self, request: Option<ConfirmRequest>, prompt: &mut dyn Prompt) -> usize {
        let Some(request) = request else {
            return 0;
        };
        if prompt.confirm(request.message()) {
            self.confirm(request)
        } else {
            0
        }
    }

    pub fn set_filter(&mut self, filter: Filter) {
        self.filter = filter;
    }

    /// Replace the in-memory list with whatever the store holds now.
    ///
    /// A failed read keeps the current list and returns the error.
    pub fn reload(&mut self) -> Result<()> {
        match storage::read_tasks(&self.store, &self.key) {
            Ok(tasks) => {
                debug!(count = tasks.len(), "reloaded tasks");
                self.tasks = tasks;
                Ok(())
            }
            Err(err) => {
                warn!(key = %self.key, error = %err, "keeping current list after failed reload");
                Err(err)
            }
        }
    }

    pub fn filtered_tasks(&self) -> Vec<&Task> {
        self.tasks
            .iter()
            .filter(|task| self.filter.matches(task))
            .collect()
    }

    pub fn counts(&self) -> TaskCounts {
        TaskCounts::of(&self.tasks)
    }

    pub fn footer_summary(&self) -> String {
        let counts = self.counts();
        match self.filter {
            Filter::Active => format!("{} active", counts.active),
            Filter::Completed => format!("{} completed", counts.completed),
            Filter::All => format!("{} active / {} total", counts.active, counts.total),
        }
    }

    /// Placeholder text, only when the filtered view is empty.
    pub fn empty_state_message(&self) -> Option<&'static str> {
        if self.tasks.iter().any(|task| self.filter.matches(task)) {
            None
        } else {
            Some(self.filter.empty_message())
        }
    }

    fn next_id(&self, now: DateTime<Utc>) -> TaskId {
        let candidate = u64::try_from(now.timestamp_millis()).unwrap_or(0);
        match self.tasks.iter().map(|task| task.id).max() {
            Some(max) if candidate <= max => max + 1,
            _ => candidate,
        }
    }

    fn persist(&mut self) {
        match storage::save_tasks(&mut self.store, &self.key, &self.tasks) {
            Ok(()) => self.last_persist_error = None,
            Err(err) => self.last_persist_error = Some(err.to_string()),
        }
    }
}

/// Prompt that answers the same way every time.
#[derive(Debug, Clone, Copy)]
pub struct FixedAnswer(pub bool);

impl Prompt for FixedAnswer {
    fn confirm(&mut self, _message: &str) -> bool {
        self.0
    }
}
