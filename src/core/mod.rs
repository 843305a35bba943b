//! Kernel state and the supervisor loop.

mod debug;
mod kernel;
mod supervisor;

pub use debug::{DebugKind, DebugRecord, DebugRing};
pub use kernel::Kernel;
