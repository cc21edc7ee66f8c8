//! Router assembly and server lifecycle.

use axum::{
    Router,
    routing::{get, post},
};
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use super::api;
use crate::board::Board;
use crate::pipeline::Pipeline;

/// State shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pipeline: Pipeline,
}

impl AppState {
    pub fn new(pipeline: Pipeline) -> Self {
        Self { pipeline }
    }

    pub fn board(&self) -> &Board {
        self.pipeline.board()
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }
}

/// Build the router with all routes.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(api::health))
        .route("/api/users", post(api::register))
        .route("/api/projects", get(api::dashboard).post(api::create_project))
        .route(
            "/api/projects/{project_id}",
            get(api::project_board).delete(api::delete_project),
        )
        .route(
            "/api/projects/{project_id}/members",
            get(api::list_members).post(api::invite),
        )
        .route("/api/projects/{project_id}/tasks", post(api::add_task))
        .route("/api/projects/{project_id}/synergy", get(api::synergy))
        .route("/api/projects/{project_id}/priorities", post(api::prioritize))
        .route(
            "/api/tasks/{task_id}",
            get(api::task_detail).delete(api::delete_task),
        )
        .route("/api/tasks/{task_id}/status", post(api::move_task))
        .route("/api/tasks/{task_id}/assignee", post(api::reassign_task))
        .route("/api/tasks/{task_id}/comments", post(api::add_comment))
        .route("/api/my-tasks", get(api::my_tasks))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until Ctrl-C.
pub async fn serve(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let gateway_enabled = state.pipeline().gateway_enabled();
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    info!(gateway_enabled, "Board server listening on http://{}", bound_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Board server shutting down");
        })
        .await?;

    Ok(())
}
