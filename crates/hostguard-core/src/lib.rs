//! Block-session engine for hostguardd
//!
//! This crate is the heart of hostguardd, containing:
//! - Policy store (default and custom blocks, allow lists)
//! - Session state machine (Idle -> Active -> Expiring -> Idle)
//! - The one-shot emergency override
//! - Scheduling of host table reconciliation

mod engine;
mod events;
mod policy;
mod scheduler;
mod session;

pub use engine::*;
pub use events::*;
pub use policy::*;
pub use scheduler::*;
pub use session::*;
