//! Synergy Board Library
//!
//! Multi-user project board with membership-gated access, a task status
//! board, and gateway-backed workload analysis and priority scoring.

pub mod board;
pub mod cli;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod gateway;
pub mod pipeline;
pub mod prompts;
pub mod types;
pub mod validate;
pub mod web;
