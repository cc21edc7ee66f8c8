//! Core types for the project board.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type UserId = i64;
pub type ProjectId = i64;
pub type TaskId = i64;
pub type CommentId = i64;

/// Task priority score. Higher is more important.
pub type Priority = i32;

pub const PRIORITY_MIN: Priority = 1;
pub const PRIORITY_MAX: Priority = 100;
pub const PRIORITY_DEFAULT: Priority = 50;

/// Role assigned to users who register without one.
pub const DEFAULT_ROLE: &str = "Developer";

/// Calendar date format accepted for due dates and deadlines.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Whether a value is a storable priority score.
pub fn priority_in_range(value: i64) -> bool {
    (PRIORITY_MIN as i64..=PRIORITY_MAX as i64).contains(&value)
}

/// Parse a `YYYY-MM-DD` date.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).ok()
}

/// Task status on the board.
///
/// Any status may move to any other; `Done` is not terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TaskStatus {
    #[default]
    #[serde(rename = "To Do")]
    ToDo,
    #[serde(rename = "In Progress")]
    InProgress,
    #[serde(rename = "Done")]
    Done,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 3] = [TaskStatus::ToDo, TaskStatus::InProgress, TaskStatus::Done];

    /// Label as stored and displayed.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::ToDo => "To Do",
            TaskStatus::InProgress => "In Progress",
            TaskStatus::Done => "Done",
        }
    }

    /// Whether the task still takes part in priority scoring.
    pub fn is_active(&self) -> bool {
        !matches!(self, TaskStatus::Done)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    /// Accepts the display label or its snake/compact form ("in_progress", "todo").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-'))
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "todo" => Ok(TaskStatus::ToDo),
            "inprogress" => Ok(TaskStatus::InProgress),
            "done" => Ok(TaskStatus::Done),
            _ => Err(format!("unknown task status: {}", s)),
        }
    }
}

/// A registered user. The credential hash never leaves the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    /// Free-text role, used only as a hint for skill-mismatch analysis.
    pub role: String,
    pub created_at: i64,
}

/// A project and its descriptive fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub description: Option<String>,
    pub tags: Option<String>,
    pub deadline: Option<NaiveDate>,
    pub priority_label: Option<String>,
    pub created_at: i64,
}

/// A task on a project board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub content: String,
    pub status: TaskStatus,
    pub priority: Priority,
    pub due_date: Option<NaiveDate>,
    pub project_id: ProjectId,
    pub assignee_id: Option<UserId>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A task joined with its assignee's identity, for boards and gateway context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskView {
    #[serde(flatten)]
    pub task: Task,
    pub assignee_username: Option<String>,
    pub assignee_role: Option<String>,
}

/// A comment on a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub content: String,
    pub created_at: i64,
    pub user_id: UserId,
    pub author: String,
    pub task_id: TaskId,
}

/// Input for creating a project.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewProject {
    pub name: Option<String>,
    pub description: Option<String>,
    pub tags: Option<String>,
    pub priority: Option<String>,
    /// `YYYY-MM-DD`
    pub deadline: Option<String>,
}

/// Input for creating a task. Every field is required.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewTask {
    pub content: Option<String>,
    pub assignee_id: Option<UserId>,
    /// `YYYY-MM-DD`
    pub due_date: Option<String>,
}

/// A single priority write derived from a gateway batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityUpdate {
    pub task_id: TaskId,
    pub priority: Priority,
}
