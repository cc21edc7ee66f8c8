//! Request handlers.

use axum::{
    Json,
    extract::{FromRequest, FromRequestParts, Path, Request, State},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::error;

use super::server::AppState;
use crate::board::{InviteOutcome, ProjectBoard, TaskDetail};
use crate::error::{BoardError, BoardResult};
use crate::pipeline::{PriorityReport, SynergyReport};
use crate::types::{
    Comment, NewProject, NewTask, Project, ProjectId, Task, TaskId, TaskView, User, UserId,
};

/// Header carrying the authenticated user id.
pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    #[serde(flatten)]
    inner: &'a BoardError,
}

impl IntoResponse for BoardError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(code = ?self.code, details = ?self.details, "{}", self.message);
        }
        let body = ErrorBody {
            error: &self.message,
            inner: &self,
        };
        (status, Json(body)).into_response()
    }
}

/// The user making the request.
#[derive(Debug, Clone)]
pub struct Actor(pub User);

impl Actor {
    pub fn id(&self) -> UserId {
        self.0.id
    }
}

impl FromRequestParts<AppState> for Actor {
    type Rejection = BoardError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user_id: UserId = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
            .ok_or_else(BoardError::unauthenticated)?;
        Ok(Actor(state.board().authenticate(user_id)?))
    }
}

/// JSON request body whose rejections use the board's error body.
#[derive(Debug, Clone)]
pub struct JsonBody<T>(pub T);

impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = BoardError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonBody(value)),
            Err(rejection) => Err(BoardError::invalid_value("body", rejection.body_text())),
        }
    }
}

// -----------------------------------------------------------------------------
// Request / response bodies
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub credential_hash: String,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct InviteRequest {
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct InviteResponse {
    pub message: String,
    pub outcome: InviteOutcome,
}

#[derive(Debug, Deserialize)]
pub struct MoveRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct ReassignRequest {
    pub assignee_id: UserId,
}

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    pub content: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    gateway: bool,
}

// -----------------------------------------------------------------------------
// Handlers
// -----------------------------------------------------------------------------

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        gateway: state.pipeline().gateway_enabled(),
    })
}

pub async fn register(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<RegisterRequest>,
) -> BoardResult<(StatusCode, Json<User>)> {
    let user = state.board().register(
        &req.username,
        &req.credential_hash,
        req.role.as_deref().unwrap_or_default(),
    )?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn dashboard(State(state): State<AppState>, actor: Actor) -> BoardResult<Json<Vec<Project>>> {
    Ok(Json(state.board().dashboard(actor.id())?))
}

pub async fn create_project(
    State(state): State<AppState>,
    actor: Actor,
    JsonBody(req): JsonBody<NewProject>,
) -> BoardResult<(StatusCode, Json<Project>)> {
    let project = state.board().create_project(actor.id(), &req)?;
    Ok((StatusCode::CREATED, Json(project)))
}

pub async fn project_board(
    State(state): State<AppState>,
    actor: Actor,
    Path(project_id): Path<ProjectId>,
) -> BoardResult<Json<ProjectBoard>> {
    Ok(Json(state.board().project_board(actor.id(), project_id)?))
}

pub async fn delete_project(
    State(state): State<AppState>,
    actor: Actor,
    Path(project_id): Path<ProjectId>,
) -> BoardResult<StatusCode> {
    state.board().delete_project(actor.id(), project_id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_members(
    State(state): State<AppState>,
    actor: Actor,
    Path(project_id): Path<ProjectId>,
) -> BoardResult<Json<Vec<User>>> {
    Ok(Json(state.board().list_members(actor.id(), project_id)?))
}

pub async fn invite(
    State(state): State<AppState>,
    actor: Actor,
    Path(project_id): Path<ProjectId>,
    JsonBody(req): JsonBody<InviteRequest>,
) -> BoardResult<Json<InviteResponse>> {
    let outcome = state.board().invite(actor.id(), project_id, &req.username)?;
    Ok(Json(InviteResponse {
        message: outcome.message(req.username.trim()),
        outcome,
    }))
}

pub async fn add_task(
    State(state): State<AppState>,
    actor: Actor,
    Path(project_id): Path<ProjectId>,
    JsonBody(req): JsonBody<NewTask>,
) -> BoardResult<(StatusCode, Json<Task>)> {
    let task = state.board().add_task(actor.id(), project_id, &req)?;
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn synergy(
    State(state): State<AppState>,
    actor: Actor,
    Path(project_id): Path<ProjectId>,
) -> BoardResult<Json<SynergyReport>> {
    Ok(Json(state.pipeline().synergy(actor.id(), project_id).await?))
}

pub async fn prioritize(
    State(state): State<AppState>,
    actor: Actor,
    Path(project_id): Path<ProjectId>,
) -> BoardResult<Json<PriorityReport>> {
    Ok(Json(state.pipeline().prioritize(actor.id(), project_id).await?))
}

pub async fn task_detail(
    State(state): State<AppState>,
    actor: Actor,
    Path(task_id): Path<TaskId>,
) -> BoardResult<Json<TaskDetail>> {
    Ok(Json(state.board().task_detail(actor.id(), task_id)?))
}

pub async fn delete_task(
    State(state): State<AppState>,
    actor: Actor,
    Path(task_id): Path<TaskId>,
) -> BoardResult<StatusCode> {
    state.board().delete_task(actor.id(), task_id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn move_task(
    State(state): State<AppState>,
    actor: Actor,
    Path(task_id): Path<TaskId>,
    JsonBody(req): JsonBody<MoveRequest>,
) -> BoardResult<Json<Task>> {
    Ok(Json(state.board().move_task(actor.id(), task_id, &req.status)?))
}

pub async fn reassign_task(
    State(state): State<AppState>,
    actor: Actor,
    Path(task_id): Path<TaskId>,
    JsonBody(req): JsonBody<ReassignRequest>,
) -> BoardResult<Json<Task>> {
    Ok(Json(
        state
            .board()
            .reassign_task(actor.id(), task_id, req.assignee_id)?,
    ))
}

pub async fn add_comment(
    State(state): State<AppState>,
    actor: Actor,
    Path(task_id): Path<TaskId>,
    JsonBody(req): JsonBody<CommentRequest>,
) -> BoardResult<(StatusCode, Json<Comment>)> {
    let comment = state.board().add_comment(actor.id(), task_id, &req.content)?;
    Ok((StatusCode::CREATED, Json(comment)))
}

pub async fn my_tasks(State(state): State<AppState>, actor: Actor) -> BoardResult<Json<Vec<TaskView>>> {
    Ok(Json(state.board().my_tasks(actor.id())?))
}
