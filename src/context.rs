//! Project snapshots handed to the reasoning gateway.
//!
//! Two shapes are built from the same task list:
//! - synergy: one markdown bullet per task (content, status, assignee, role)
//! - scoring: a JSON-serializable entry per task that is not `Done`
//!
//! Both are bounded in task count and per-task content length.

use crate::types::{Project, ProjectId, TaskId, TaskStatus, TaskView};
use serde::Serialize;
use std::collections::HashSet;

/// Returned instead of a synergy analysis when a project has no tasks.
pub const NO_TASKS_MESSAGE: &str = "There are no tasks to analyze.";

/// Returned instead of scoring when every task is `Done`.
pub const NO_ACTIVE_TASKS_MESSAGE: &str = "No active tasks to prioritize.";

/// Maximum tasks included in one snapshot.
pub const MAX_CONTEXT_TASKS: usize = 200;

/// Maximum characters of task content included per task.
pub const MAX_CONTENT_CHARS: usize = 500;

const UNASSIGNED: &str = "Unassigned";
const NO_ROLE: &str = "N/A";

/// Truncate on a char boundary, marking the cut with "...".
fn truncate_chars(s: &str, max_chars: usize) -> String {
    let mut chars = s.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

fn assignee_name(task: &TaskView) -> &str {
    task.assignee_username.as_deref().unwrap_or(UNASSIGNED)
}

fn assignee_role(task: &TaskView) -> &str {
    match task.assignee_username {
        Some(_) => task.assignee_role.as_deref().unwrap_or(NO_ROLE),
        None => NO_ROLE,
    }
}

/// Markdown task list for synergy analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynergyContext {
    pub project_name: String,
    pub lines: Vec<String>,
    /// Tasks left out because of [`MAX_CONTEXT_TASKS`].
    pub omitted: usize,
}

impl SynergyContext {
    /// Build the snapshot. Returns `None` when there is nothing to analyze.
    pub fn build(project: &Project, tasks: &[TaskView]) -> Option<Self> {
        if tasks.is_empty() {
            return None;
        }

        let lines = tasks
            .iter()
            .take(MAX_CONTEXT_TASKS)
            .map(|t| {
                format!(
                    "- Task: '{}', Status: '{}', Assignee: '{}' (Role: {})",
                    truncate_chars(&t.task.content, MAX_CONTENT_CHARS),
                    t.task.status,
                    assignee_name(t),
                    assignee_role(t)
                )
            })
            .collect();

        Some(Self {
            project_name: project.name.clone(),
            lines,
            omitted: tasks.len().saturating_sub(MAX_CONTEXT_TASKS),
        })
    }

    /// The task list as newline-terminated markdown.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            out.push_str(line);
            out.push('\n');
        }
        if self.omitted > 0 {
            out.push_str(&format!("- ... and {} more tasks not shown\n", self.omitted));
        }
        out
    }
}

/// One task as presented for priority scoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoringEntry {
    pub task_id: TaskId,
    pub content: String,
    pub assignee_username: String,
    pub assignee_role: String,
}

/// Active tasks of a project for priority scoring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoringContext {
    pub project_id: ProjectId,
    pub project_name: String,
    pub entries: Vec<ScoringEntry>,
    /// Project tasks already `Done`; never rescored.
    pub done: HashSet<TaskId>,
    /// Active tasks left out because of [`MAX_CONTEXT_TASKS`].
    pub unscored: HashSet<TaskId>,
}

impl ScoringContext {
    /// Build the snapshot from every non-`Done` task. Returns `None` when no
    /// task is active.
    pub fn build(project: &Project, tasks: &[TaskView]) -> Option<Self> {
        let active: Vec<&TaskView> = tasks.iter().filter(|t| t.task.status.is_active()).collect();
        let unscored = active
            .iter()
            .skip(MAX_CONTEXT_TASKS)
            .map(|t| t.task.id)
            .collect();

        let entries: Vec<ScoringEntry> = active
            .iter()
            .take(MAX_CONTEXT_TASKS)
            .map(|t| ScoringEntry {
                task_id: t.task.id,
                content: truncate_chars(&t.task.content, MAX_CONTENT_CHARS),
                assignee_username: assignee_name(t).to_string(),
                assignee_role: assignee_role(t).to_string(),
            })
            .collect();

        if entries.is_empty() {
            return None;
        }

        let done = tasks
            .iter()
            .filter(|t| t.task.status == TaskStatus::Done)
            .map(|t| t.task.id)
            .collect();

        Some(Self {
            project_id: project.id,
            project_name: project.name.clone(),
            entries,
            done,
            unscored,
        })
    }

    /// IDs of the tasks sent for scoring.
    pub fn task_ids(&self) -> HashSet<TaskId> {
        self.entries.iter().map(|e| e.task_id).collect()
    }

    /// Entries as pretty-printed JSON.
    pub fn render(&self) -> String {
        serde_json::to_string_pretty(&self.entries).unwrap_or_else(|_| "[]".to_string())
    }
}
