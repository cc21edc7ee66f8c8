//! HTTP surface.
//!
//! JSON endpoints under `/api` over the board and the reasoning pipeline.
//! The acting user is resolved from the `X-User-Id` header on every request.

mod api;
mod server;

pub use api::{Actor, USER_ID_HEADER};
pub use server::{AppState, router, serve};
