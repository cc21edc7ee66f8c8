//! Task comments.

use super::{Database, now_ms};
use crate::types::{Comment, TaskId, UserId};
use anyhow::Result;
use rusqlite::{Row, params};

const COMMENT_SELECT: &str = "SELECT c.id, c.content, c.created_at, c.user_id, u.username AS author, c.task_id
     FROM comments c JOIN users u ON u.id = c.user_id";

fn parse_comment_row(row: &Row) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get("id")?,
        content: row.get("content")?,
        created_at: row.get("created_at")?,
        user_id: row.get("user_id")?,
        author: row.get("author")?,
        task_id: row.get("task_id")?,
    })
}

impl Database {
    /// Append a comment to a task.
    ///
    /// The timestamp never precedes the task's latest comment, so a task's
    /// comment sequence stays non-decreasing even if the clock steps back.
    pub fn add_comment(&self, task_id: TaskId, user_id: UserId, content: &str) -> Result<Comment> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let latest: Option<i64> = tx.query_row(
                "SELECT MAX(created_at) FROM comments WHERE task_id = ?1",
                params![task_id],
                |row| row.get(0),
            )?;
            let created_at = latest.map_or(now_ms(), |last| last.max(now_ms()));

            tx.execute(
                "INSERT INTO comments (content, created_at, user_id, task_id)
                 VALUES (?1, ?2, ?3, ?4)",
                params![content, created_at, user_id, task_id],
            )?;
            let comment_id = tx.last_insert_rowid();

            let sql = format!("{} WHERE c.id = ?1", COMMENT_SELECT);
            let comment = tx.query_row(&sql, params![comment_id], parse_comment_row)?;

            tx.commit()?;
            Ok(comment)
        })
    }

    /// Comments on a task, oldest first.
    pub fn list_comments(&self, task_id: TaskId) -> Result<Vec<Comment>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{} WHERE c.task_id = ?1 ORDER BY c.created_at, c.id",
                COMMENT_SELECT
            );
            let mut stmt = conn.prepare(&sql)?;
            let comments = stmt
                .query_map(params![task_id], parse_comment_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(comments)
        })
    }
}
