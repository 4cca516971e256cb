//! Read-only status dashboard.
//!
//! Serves the ledger and the recent log lines as HTML and JSON.

pub mod error;
pub mod models;
pub mod routes;
pub mod server;

pub use server::{ApiServer, ApiServerConfig, AppState};
