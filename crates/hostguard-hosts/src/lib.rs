//! Host table enforcement for hostguardd
//!
//! This crate owns one delimited region of the system hosts file:
//! - [`EffectiveBlockSet`]: the domains (and sub-paths) to redirect
//! - Pure rendering and stripping of the managed section
//! - [`HostTable`] trait with a file-backed and an in-memory implementation

mod block_set;
mod file;
mod mock;
mod render;
mod traits;

pub use block_set::*;
pub use file::*;
pub use mock::*;
pub use render::*;
pub use traits::*;
