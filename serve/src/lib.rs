//! HTTP API for the archive orchestrator (axum + JSON).
//!
//! Exposes chat, verification, the agent family, research, code assist, the
//! memories surface, health, metrics, and the admin archival trigger.
//!
//! **Public API**: [`run`], [`run_on_listener`], [`boot`], [`spawn_workers`],
//! [`AppState`], [`router`].

mod app;
mod error;
mod routes;
mod run;

pub use app::{router, AppState};
pub use error::ApiError;
pub use run::{boot, run, run_on_listener, spawn_workers, Boot, BootError};
