//! User registration and lookup.

use super::{Database, now_ms};
use crate::error::BoardError;
use crate::types::{DEFAULT_ROLE, User, UserId};
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};

fn parse_user_row(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get("id")?,
        username: row.get("username")?,
        role: row.get("role")?,
        created_at: row.get("created_at")?,
    })
}

/// Look up a user on an existing connection (avoids re-locking).
pub(crate) fn get_user_internal(conn: &Connection, user_id: UserId) -> Result<Option<User>> {
    let user = conn
        .query_row(
            "SELECT id, username, role, created_at FROM users WHERE id = ?1",
            params![user_id],
            parse_user_row,
        )
        .optional()?;
    Ok(user)
}

impl Database {
    /// Register a user. The credential hash is stored as given.
    pub fn register_user(&self, username: &str, credential_hash: &str, role: &str) -> Result<User> {
        let username = username.trim();
        if username.is_empty() {
            return Err(BoardError::missing_field("username").into());
        }
        let role = match role.trim() {
            "" => DEFAULT_ROLE,
            r => r,
        };
        let now = now_ms();

        self.with_conn(|conn| {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1)",
                params![username],
                |row| row.get(0),
            )?;
            if exists {
                return Err(BoardError::already_exists(format!("Username '{}'", username)).into());
            }

            conn.execute(
                "INSERT INTO users (username, credential_hash, role, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![username, credential_hash, role, now],
            )?;

            Ok(User {
                id: conn.last_insert_rowid(),
                username: username.to_string(),
                role: role.to_string(),
                created_at: now,
            })
        })
    }

    /// Get a user by ID.
    pub fn get_user(&self, user_id: UserId) -> Result<Option<User>> {
        self.with_conn(|conn| get_user_internal(conn, user_id))
    }

    /// Find a user by exact username.
    pub fn find_user_by_name(&self, username: &str) -> Result<Option<User>> {
        self.with_conn(|conn| {
            let user = conn
                .query_row(
                    "SELECT id, username, role, created_at FROM users WHERE username = ?1",
                    params![username.trim()],
                    parse_user_row,
                )
                .optional()?;
            Ok(user)
        })
    }

    /// Stored credential hash, for the identity collaborator to verify against.
    pub fn credential_hash(&self, username: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            let hash = conn
                .query_row(
                    "SELECT credential_hash FROM users WHERE username = ?1",
                    params![username.trim()],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(hash)
        })
    }
}
