//! hostguardd service internals
//!
//! The binary in `main.rs` wires configuration, store, host table and IPC
//! together; the pieces that decide what a command or tick does live here.

mod handler;
pub mod notify;

pub use handler::*;
