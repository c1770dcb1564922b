//! Task records and the filter used to project them.
//!
//! The stored form is a JSON array of
//! `{id, text, completed, priority, createdAt}` records, newest first.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Task identity: creation time in milliseconds, bumped past collisions.
pub type TaskId = u64;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    Normal,
    Important,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Normal => "normal",
            Priority::Important => "important",
        }
    }

    /// Cycle used by the priority selector in the terminal UI.
    pub fn next(self) -> Self {
        match self {
            Priority::Normal => Priority::Important,
            Priority::Important => Priority::Normal,
        }
    }

    pub fn is_important(&self) -> bool {
        matches!(self, Priority::Important)
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "normal" => Ok(Priority::Normal),
            "important" => Ok(Priority::Important),
            other => Err(Error::InvalidArgument(format!(
                "unknown priority '{other}' (expected normal or important)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub text: String,
    pub completed: bool,
    #[serde(default)]
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn new(id: TaskId, text: impl Into<String>, priority: Priority, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            text: text.into(),
            completed: false,
            priority,
            created_at,
        }
    }
}

/// Display-only subset selector. Never persisted.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Filter {
    #[default]
    All,
    Active,
    Completed,
}

impl Filter {
    pub const ALL: [Filter; 3] = [Filter::All, Filter::Active, Filter::Completed];

    pub fn as_str(&self) -> &'static str {
        match self {
            Filter::All => "all",
            Filter::Active => "active",
            Filter::Completed => "completed",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Filter::All => "All",
            Filter::Active => "Active",
            Filter::Completed => "Completed",
        }
    }

    pub fn matches(&self, task: &Task) -> bool {
        match self {
            Filter::All => true,
            Filter::Active => !task.completed,
            Filter::Completed => task.completed,
        }
    }

    pub fn next(self) -> Self {
        match self {
            Filter::All => Filter::Active,
            Filter::Active => Filter::Completed,
            Filter::Completed => Filter::All,
        }
    }

    /// Message shown in place of the list when nothing matches.
    pub fn empty_message(&self) -> &'static str {
        match self {
            Filter::All => "No tasks yet, add one!",
            Filter::Active => "No active tasks",
            Filter::Completed => "No completed tasks",
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Filter {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Filter::All),
            "active" => Ok(Filter::Active),
            "completed" | "done" => Ok(Filter::Completed),
            other => Err(Error::InvalidArgument(format!(
                "unknown filter '{other}' (expected all, active or completed)"
            ))),
        }
    }
}

/// Task totals derived from the full list, independent of the filter.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct TaskCounts {
    pub total: usize,
    pub active: usize,
    pub completed: usize,
}

impl TaskCounts {
    pub fn of(tasks: &[Task]) -> Self {
        let total = tasks.len();
        let active = tasks.iter().filter(|task| !task.completed).count();
        Self {
            total,
            active,
            completed: total - active,
        }
    }
}

/// `[YYYY-MM-DD HH:MM]` in local time.
pub fn format_created(value: DateTime<Utc>) -> String {
    value.with_timezone(&Local).format("[%Y-%m-%d %H:%M]").to_string()
}

pub fn encode_tasks(tasks: &[Task]) -> Result<String> {
    Ok(serde_json::to_string(tasks)?)
}

pub fn decode_tasks(value: &str) -> Result<Vec<Task>> {
    Ok(serde_json::from_str(value)?)
}
