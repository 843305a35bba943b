//! Platform boundary: child processes and their pipes.

mod process;

pub use process::{ChildProc, ReadOutcome, ReapOutcome, WriteOutcome};
