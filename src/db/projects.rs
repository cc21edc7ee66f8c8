//! Projects and project membership.

use super::users::get_user_internal;
use super::{Database, date_from_sql, date_to_sql, now_ms};
use crate::types::{Project, ProjectId, User, UserId};
use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, Row, params};

/// Result of adding a member to a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipChange {
    Added,
    AlreadyMember,
}

fn parse_project_row(row: &Row) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get("id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        tags: row.get("tags")?,
        deadline: date_from_sql(row.get("deadline")?),
        priority_label: row.get("priority_label")?,
        created_at: row.get("created_at")?,
    })
}

/// Membership predicate on an existing connection.
pub(crate) fn is_member_internal(
    conn: &Connection,
    user_id: UserId,
    project_id: ProjectId,
) -> Result<bool> {
    let member: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM project_members WHERE user_id = ?1 AND project_id = ?2)",
        params![user_id, project_id],
        |row| row.get(0),
    )?;
    Ok(member)
}

pub(crate) fn get_project_internal(
    conn: &Connection,
    project_id: ProjectId,
) -> Result<Option<Project>> {
    let project = conn
        .query_row(
            "SELECT * FROM projects WHERE id = ?1",
            params![project_id],
            parse_project_row,
        )
        .optional()?;
    Ok(project)
}

/// Insert a membership row unless it already exists.
fn add_member_internal(
    conn: &Connection,
    project_id: ProjectId,
    user_id: UserId,
) -> Result<MembershipChange> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO project_members (user_id, project_id, joined_at)
         VALUES (?1, ?2, ?3)",
        params![user_id, project_id, now_ms()],
    )?;
    Ok(if inserted == 0 {
        MembershipChange::AlreadyMember
    } else {
        MembershipChange::Added
    })
}

impl Database {
    /// Create a project with `creator` as its first member.
    pub fn create_project(
        &self,
        creator: UserId,
        name: &str,
        description: Option<&str>,
        tags: Option<&str>,
        priority_label: Option<&str>,
        deadline: Option<NaiveDate>,
    ) -> Result<Project> {
        let now = now_ms();

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            tx.execute(
                "INSERT INTO projects (name, description, tags, deadline, priority_label, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    name,
                    description,
                    tags,
                    date_to_sql(deadline),
                    priority_label,
                    now
                ],
            )?;
            let project_id = tx.last_insert_rowid();
            add_member_internal(&tx, project_id, creator)?;

            tx.commit()?;

            Ok(Project {
                id: project_id,
                name: name.to_string(),
                description: description.map(String::from),
                tags: tags.map(String::from),
                deadline,
                priority_label: priority_label.map(String::from),
                created_at: now,
            })
        })
    }

    /// Get a project by ID.
    pub fn get_project(&self, project_id: ProjectId) -> Result<Option<Project>> {
        self.with_conn(|conn| get_project_internal(conn, project_id))
    }

    /// Projects the user belongs to, newest first.
    pub fn list_projects_for_user(&self, user_id: UserId) -> Result<Vec<Project>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT p.* FROM projects p
                 JOIN project_members m ON m.project_id = p.id
                 WHERE m.user_id = ?1
                 ORDER BY p.id DESC",
            )?;
            let projects = stmt
                .query_map(params![user_id], parse_project_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(projects)
        })
    }

    /// Delete a project. Tasks, comments and memberships cascade.
    pub fn delete_project(&self, project_id: ProjectId) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM projects WHERE id = ?1", params![project_id])?;
            Ok(deleted > 0)
        })
    }

    /// Whether the user is a member of the project.
    pub fn is_member(&self, user_id: UserId, project_id: ProjectId) -> Result<bool> {
        self.with_conn(|conn| is_member_internal(conn, user_id, project_id))
    }

    /// Add a member. Adding an existing member changes nothing.
    pub fn add_member(&self, project_id: ProjectId, user_id: UserId) -> Result<MembershipChange> {
        self.with_conn(|conn| add_member_internal(conn, project_id, user_id))
    }

    /// Members of a project ordered by join time.
    pub fn list_members(&self, project_id: ProjectId) -> Result<Vec<User>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT u.id FROM users u
                 JOIN project_members m ON m.user_id = u.id
                 WHERE m.project_id = ?1
                 ORDER BY m.joined_at, u.id",
            )?;
            let ids = stmt
                .query_map(params![project_id], |row| row.get::<_, UserId>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            let mut members = Vec::with_capacity(ids.len());
            for id in ids {
                if let Some(user) = get_user_internal(conn, id)? {
                    members.push(user);
                }
            }
            Ok(members)
        })
    }

    /// Number of members in a project.
    pub fn member_count(&self, project_id: ProjectId) -> Result<i64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM project_members WHERE project_id = ?1",
                params![project_id],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }
}
