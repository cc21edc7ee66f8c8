//! Task CRUD, status moves and priority write-back.

use super::projects::is_member_internal;
use super::{Database, date_from_sql, date_to_sql, now_ms};
use crate::error::BoardError;
use crate::types::{
    PRIORITY_DEFAULT, PriorityUpdate, ProjectId, Task, TaskId, TaskStatus, TaskView, UserId,
    priority_in_range,
};
use anyhow::{Result, bail};
use chrono::NaiveDate;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};

const TASK_VIEW_SELECT: &str = "SELECT t.*, u.username AS assignee_username, u.role AS assignee_role
     FROM tasks t LEFT JOIN users u ON u.id = t.assignee_id";

/// Why a priority update was not written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorityMiss {
    /// The task no longer exists or belongs to another project.
    NotInProject,
    /// The task was moved to `Done`.
    Done,
}

/// Outcome of a priority batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PriorityWrite {
    pub applied: Vec<PriorityUpdate>,
    pub skipped: Vec<(PriorityUpdate, PriorityMiss)>,
}

pub fn parse_task_row(row: &Row) -> rusqlite::Result<Task> {
    let status: String = row.get("status")?;
    let status = status
        .parse::<TaskStatus>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, e.into()))?;

    Ok(Task {
        id: row.get("id")?,
        content: row.get("content")?,
        status,
        priority: row.get("priority")?,
        due_date: date_from_sql(row.get("due_date")?),
        project_id: row.get("project_id")?,
        assignee_id: row.get("assignee_id")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_task_view_row(row: &Row) -> rusqlite::Result<TaskView> {
    Ok(TaskView {
        task: parse_task_row(row)?,
        assignee_username: row.get("assignee_username")?,
        assignee_role: row.get("assignee_role")?,
    })
}

/// Internal helper to get a task using an existing connection (avoids deadlock).
pub(crate) fn get_task_internal(conn: &Connection, task_id: TaskId) -> Result<Option<Task>> {
    let task = conn
        .query_row(
            "SELECT * FROM tasks WHERE id = ?1",
            params![task_id],
            parse_task_row,
        )
        .optional()?;
    Ok(task)
}

/// Reject an assignee who is not a member of the task's project.
fn ensure_assignable(conn: &Connection, project_id: ProjectId, assignee_id: UserId) -> Result<()> {
    if !is_member_internal(conn, assignee_id, project_id)? {
        return Err(BoardError::invalid_value(
            "assignee_id",
            format!(
                "User {} is not a member of project {}",
                assignee_id, project_id
            ),
        )
        .into());
    }
    Ok(())
}

impl Database {
    /// Create a task in `To Do` with the default priority.
    ///
    /// The assignee must already be a member of the project; otherwise nothing
    /// is written.
    pub fn create_task(
        &self,
        project_id: ProjectId,
        content: &str,
        assignee_id: UserId,
        due_date: NaiveDate,
    ) -> Result<Task> {
        let now = now_ms();
        let status = TaskStatus::default();

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            ensure_assignable(&tx, project_id, assignee_id)?;

            tx.execute(
                "INSERT INTO tasks (
                    content, status, priority, due_date, project_id, assignee_id, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    content,
                    status.as_str(),
                    PRIORITY_DEFAULT,
                    date_to_sql(Some(due_date)),
                    project_id,
                    assignee_id,
                    now,
                    now,
                ],
            )?;
            let task_id = tx.last_insert_rowid();

            tx.commit()?;

            Ok(Task {
                id: task_id,
                content: content.to_string(),
                status,
                priority: PRIORITY_DEFAULT,
                due_date: Some(due_date),
                project_id,
                assignee_id: Some(assignee_id),
                created_at: now,
                updated_at: now,
            })
        })
    }

    /// Get a task by ID.
    pub fn get_task(&self, task_id: TaskId) -> Result<Option<Task>> {
        self.with_conn(|conn| get_task_internal(conn, task_id))
    }

    /// Get a task joined with its assignee.
    pub fn get_task_view(&self, task_id: TaskId) -> Result<Option<TaskView>> {
        self.with_conn(|conn| {
            let sql = format!("{} WHERE t.id = ?1", TASK_VIEW_SELECT);
            let view = conn
                .query_row(&sql, params![task_id], parse_task_view_row)
                .optional()?;
            Ok(view)
        })
    }

    /// All tasks of a project in creation order, with assignee details.
    pub fn list_project_tasks(&self, project_id: ProjectId) -> Result<Vec<TaskView>> {
        self.with_conn(|conn| {
            let sql = format!("{} WHERE t.project_id = ?1 ORDER BY t.id", TASK_VIEW_SELECT);
            let mut stmt = conn.prepare(&sql)?;
            let tasks = stmt
                .query_map(params![project_id], parse_task_view_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(tasks)
        })
    }

    /// Tasks assigned to a user in projects they still belong to,
    /// soonest due first. Tasks without a due date sort last.
    pub fn list_tasks_for_assignee(&self, user_id: UserId) -> Result<Vec<TaskView>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{} JOIN project_members m
                    ON m.project_id = t.project_id AND m.user_id = t.assignee_id
                 WHERE t.assignee_id = ?1
                 ORDER BY t.due_date IS NULL, t.due_date ASC, t.id",
                TASK_VIEW_SELECT
            );
            let mut stmt = conn.prepare(&sql)?;
            let tasks = stmt
                .query_map(params![user_id], parse_task_view_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(tasks)
        })
    }

    /// Move a task to a new status.
    pub fn set_task_status(&self, task_id: TaskId, status: TaskStatus) -> Result<Task> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE tasks SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![status.as_str(), now_ms(), task_id],
            )?;
            if updated == 0 {
                return Err(BoardError::task_not_found(task_id).into());
            }
            get_task_internal(conn, task_id)?
                .ok_or_else(|| BoardError::task_not_found(task_id).into())
        })
    }

    /// Change a task's assignee. The new assignee must be a project member.
    pub fn reassign_task(&self, task_id: TaskId, assignee_id: UserId) -> Result<Task> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let task = get_task_internal(&tx, task_id)?
                .ok_or_else(|| BoardError::task_not_found(task_id))?;
            ensure_assignable(&tx, task.project_id, assignee_id)?;

            let now = now_ms();
            tx.execute(
                "UPDATE tasks SET assignee_id = ?1, updated_at = ?2 WHERE id = ?3",
                params![assignee_id, now, task_id],
            )?;
            tx.commit()?;

            Ok(Task {
                assignee_id: Some(assignee_id),
                updated_at: now,
                ..task
            })
        })
    }

    /// Delete a task. Its comments cascade.
    pub fn delete_task(&self, task_id: TaskId) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM tasks WHERE id = ?1", params![task_id])?;
            Ok(deleted > 0)
        })
    }

    /// Overwrite priorities for a batch of tasks in one transaction.
    ///
    /// Each update is checked against the task as it is at write time. Tasks
    /// that are gone, belong to another project or are `Done` are skipped and
    /// reported; the rest are written together. An out-of-range priority or a
    /// SQL failure aborts the whole batch. Reapplying the same batch leaves the
    /// same values.
    pub fn apply_priorities(
        &self,
        project_id: ProjectId,
        updates: &[PriorityUpdate],
    ) -> Result<PriorityWrite> {
        let now = now_ms();

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let mut write = PriorityWrite::default();

            for update in updates {
                if !priority_in_range(update.priority as i64) {
                    bail!(
                        "priority {} for task {} is out of range",
                        update.priority,
                        update.task_id
                    );
                }

                let status: Option<String> = tx
                    .query_row(
                        "SELECT status FROM tasks WHERE id = ?1 AND project_id = ?2",
                        params![update.task_id, project_id],
                        |row| row.get(0),
                    )
                    .optional()?;
                let skip = match status.as_deref() {
                    None => Some(PriorityMiss::NotInProject),
                    Some(s) if s == TaskStatus::Done.as_str() => Some(PriorityMiss::Done),
                    Some(_) => None,
                };
                if let Some(miss) = skip {
                    write.skipped.push((*update, miss));
                    continue;
                }

                tx.execute(
                    "UPDATE tasks SET priority = ?1, updated_at = ?2 WHERE id = ?3",
                    params![update.priority, now, update.task_id],
                )?;
                write.applied.push(*update);
            }

            tx.commit()?;
            Ok(write)
        })
    }
}
