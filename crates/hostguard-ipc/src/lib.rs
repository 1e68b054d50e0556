//! IPC layer for hostguardd
//!
//! Provides:
//! - Unix domain socket server with per-client reader and writer tasks
//! - NDJSON (newline-delimited JSON) framing
//! - Event fan-out to subscribed clients
//! - A client used by `hostguardctl` and tests

mod client;
mod registry;
mod server;

pub use client::*;
pub use server::*;

use hostguard_api::ErrorCode;
use thiserror::Error;

/// IPC errors
#[derive(Debug, Error)]
pub enum IpcError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Server is not listening")]
    NotListening,

    /// The service answered with an error response
    #[error("{code:?}: {message}")]
    Rejected { code: ErrorCode, message: String },
}

pub type IpcResult<T> = Result<T, IpcError>;
