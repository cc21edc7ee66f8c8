//! Board operations with membership enforcement.
//!
//! Every project- or task-scoped entry point resolves the acting user and
//! checks membership before reading or mutating anything. Missing projects
//! and tasks are reported as not found; existing ones the actor cannot see
//! are reported as an authorization failure.

use crate::db::Database;
use crate::db::projects::MembershipChange;
use crate::error::{BoardError, BoardResult, ErrorCode};
use crate::types::{
    Comment, NewProject, NewTask, Project, ProjectId, Task, TaskId, TaskStatus, TaskView, User,
    UserId, parse_date,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// Outcome of an invite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InviteOutcome {
    Added,
    AlreadyMember,
}

impl InviteOutcome {
    pub fn message(&self, username: &str) -> String {
        match self {
            InviteOutcome::Added => format!("Successfully invited '{}' to the project!", username),
            InviteOutcome::AlreadyMember => {
                format!("User '{}' is already in the project.", username)
            }
        }
    }
}

/// A project with its tasks and members.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectBoard {
    pub project: Project,
    pub tasks: Vec<TaskView>,
    pub members: Vec<User>,
}

/// A task with its comment thread.
#[derive(Debug, Clone, Serialize)]
pub struct TaskDetail {
    #[serde(flatten)]
    pub task: TaskView,
    pub comments: Vec<Comment>,
}

/// Non-empty trimmed text or `None`.
fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

/// User-driven board operations.
#[derive(Clone)]
pub struct Board {
    db: Arc<Database>,
}

impl Board {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &Arc<Database> {
        &self.db
    }

    // -------------------------------------------------------------------------
    // Identity & membership
    // -------------------------------------------------------------------------

    /// Register a user with an already-hashed credential.
    pub fn register(&self, username: &str, credential_hash: &str, role: &str) -> BoardResult<User> {
        if credential_hash.is_empty() {
            return Err(BoardError::missing_field("credential_hash"));
        }
        let user = self.db.register_user(username, credential_hash, role)?;
        info!(user_id = user.id, username = %user.username, "User registered");
        Ok(user)
    }

    /// Resolve the caller. Unknown ids are treated as unauthenticated.
    pub fn authenticate(&self, user_id: UserId) -> BoardResult<User> {
        self.db
            .get_user(user_id)?
            .ok_or_else(BoardError::unauthenticated)
    }

    /// Membership predicate.
    pub fn is_member(&self, user_id: UserId, project_id: ProjectId) -> BoardResult<bool> {
        Ok(self.db.is_member(user_id, project_id)?)
    }

    /// Load a project the actor belongs to.
    pub fn require_member(&self, actor: UserId, project_id: ProjectId) -> BoardResult<Project> {
        let project = self
            .db
            .get_project(project_id)?
            .ok_or_else(|| BoardError::project_not_found(project_id))?;
        if !self.db.is_member(actor, project_id)? {
            debug!(user_id = actor, project_id, "Membership check denied");
            return Err(BoardError::not_a_member(project_id));
        }
        Ok(project)
    }

    /// Load a task whose project the actor belongs to.
    pub fn require_task_access(&self, actor: UserId, task_id: TaskId) -> BoardResult<Task> {
        let task = self
            .db
            .get_task(task_id)?
            .ok_or_else(|| BoardError::task_not_found(task_id))?;
        if !self.db.is_member(actor, task.project_id)? {
            debug!(user_id = actor, task_id, "Task access denied");
            return Err(BoardError::new(
                ErrorCode::AuthorizationError,
                "You do not have access to this task.",
            ));
        }
        Ok(task)
    }

    /// Invite a user to a project by username.
    ///
    /// Checks, in order: the user exists, the project exists, the inviter is
    /// a member. Inviting an existing member is a no-op.
    pub fn invite(
        &self,
        inviter: UserId,
        project_id: ProjectId,
        username: &str,
    ) -> BoardResult<InviteOutcome> {
        let username = username.trim();
        if username.is_empty() {
            return Err(BoardError::missing_field("username"));
        }
        let target = self
            .db
            .find_user_by_name(username)?
            .ok_or_else(|| BoardError::user_not_found(username))?;
        self.require_member(inviter, project_id)?;

        let outcome = match self.db.add_member(project_id, target.id)? {
            MembershipChange::Added => InviteOutcome::Added,
            MembershipChange::AlreadyMember => InviteOutcome::AlreadyMember,
        };
        info!(
            project_id,
            user_id = target.id,
            outcome = ?outcome,
            "{}",
            outcome.message(username)
        );
        Ok(outcome)
    }

    pub fn list_members(&self, actor: UserId, project_id: ProjectId) -> BoardResult<Vec<User>> {
        self.require_member(actor, project_id)?;
        Ok(self.db.list_members(project_id)?)
    }

    // -------------------------------------------------------------------------
    // Projects
    // -------------------------------------------------------------------------

    pub fn create_project(&self, actor: UserId, input: &NewProject) -> BoardResult<Project> {
        let name =
            non_blank(input.name.as_deref()).ok_or_else(|| BoardError::missing_field("name"))?;
        let deadline = match non_blank(input.deadline.as_deref()) {
            Some(raw) => Some(parse_date(raw).ok_or_else(|| {
                BoardError::invalid_value("deadline", format!("Invalid date '{}', expected YYYY-MM-DD", raw))
            })?),
            None => None,
        };

        let project = self.db.create_project(
            actor,
            name,
            non_blank(input.description.as_deref()),
            non_blank(input.tags.as_deref()),
            non_blank(input.priority.as_deref()),
            deadline,
        )?;
        info!(project_id = project.id, user_id = actor, name = %project.name, "Project created");
        Ok(project)
    }

    /// The actor's projects, newest first.
    pub fn dashboard(&self, actor: UserId) -> BoardResult<Vec<Project>> {
        Ok(self.db.list_projects_for_user(actor)?)
    }

    pub fn project_board(&self, actor: UserId, project_id: ProjectId) -> BoardResult<ProjectBoard> {
        let project = self.require_member(actor, project_id)?;
        Ok(ProjectBoard {
            tasks: self.db.list_project_tasks(project_id)?,
            members: self.db.list_members(project_id)?,
            project,
        })
    }

    pub fn delete_project(&self, actor: UserId, project_id: ProjectId) -> BoardResult<()> {
        self.require_member(actor, project_id)?;
        self.db.delete_project(project_id)?;
        info!(project_id, user_id = actor, "Project deleted");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Tasks
    // -------------------------------------------------------------------------

    /// Create a task. Content, assignee and a calendar due date are required;
    /// on any validation failure nothing is written.
    pub fn add_task(&self, actor: UserId, project_id: ProjectId, input: &NewTask) -> BoardResult<Task> {
        self.require_member(actor, project_id)?;

        let content = non_blank(input.content.as_deref())
            .ok_or_else(|| BoardError::missing_field("content"))?;
        let assignee_id = input
            .assignee_id
            .ok_or_else(|| BoardError::missing_field("assignee_id"))?;
        let raw_due = non_blank(input.due_date.as_deref())
            .ok_or_else(|| BoardError::missing_field("due_date"))?;
        let due_date = parse_date(raw_due).ok_or_else(|| {
            BoardError::invalid_value("due_date", format!("Invalid date '{}', expected YYYY-MM-DD", raw_due))
        })?;

        let task = self.db.create_task(project_id, content, assignee_id, due_date)?;
        info!(task_id = task.id, project_id, assignee_id, "Task created");
        Ok(task)
    }

    /// Move a task to any status.
    pub fn move_task(&self, actor: UserId, task_id: TaskId, status: &str) -> BoardResult<Task> {
        self.require_task_access(actor, task_id)?;
        let status: TaskStatus = status
            .parse()
            .map_err(|e: String| BoardError::invalid_value("status", e))?;
        let task = self.db.set_task_status(task_id, status)?;
        info!(task_id, status = %status, "Task moved");
        Ok(task)
    }

    pub fn reassign_task(&self, actor: UserId, task_id: TaskId, assignee_id: UserId) -> BoardResult<Task> {
        self.require_task_access(actor, task_id)?;
        let task = self.db.reassign_task(task_id, assignee_id)?;
        info!(task_id, assignee_id, "Task reassigned");
        Ok(task)
    }

    pub fn task_detail(&self, actor: UserId, task_id: TaskId) -> BoardResult<TaskDetail> {
        self.require_task_access(actor, task_id)?;
        let task = self
            .db
            .get_task_view(task_id)?
            .ok_or_else(|| BoardError::task_not_found(task_id))?;
        Ok(TaskDetail {
            task,
            comments: self.db.list_comments(task_id)?,
        })
    }

    pub fn delete_task(&self, actor: UserId, task_id: TaskId) -> BoardResult<()> {
        self.require_task_access(actor, task_id)?;
        self.db.delete_task(task_id)?;
        info!(task_id, user_id = actor, "Task deleted");
        Ok(())
    }

    /// Tasks assigned to the actor, soonest due first.
    pub fn my_tasks(&self, actor: UserId) -> BoardResult<Vec<TaskView>> {
        Ok(self.db.list_tasks_for_assignee(actor)?)
    }

    // -------------------------------------------------------------------------
    // Comments
    // -------------------------------------------------------------------------

    pub fn add_comment(&self, actor: UserId, task_id: TaskId, content: &str) -> BoardResult<Comment> {
        self.require_task_access(actor, task_id)?;
        let content = non_blank(Some(content)).ok_or_else(|| BoardError::missing_field("content"))?;
        let comment = self.db.add_comment(task_id, actor, content)?;
        debug!(task_id, comment_id = comment.id, "Comment added");
        Ok(comment)
    }
}
