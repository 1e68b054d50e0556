//! Shared utilities for hostguard
//!
//! This crate provides:
//! - ID types (SessionId, ClientId)
//! - Normalized domain names and channel identifiers
//! - Clock and duration helpers
//! - Default paths for socket, data, and config files

mod domain;
mod ids;
mod paths;
mod time;

pub use domain::*;
pub use ids::*;
pub use paths::*;
pub use time::*;
