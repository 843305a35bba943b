//! Tool records, the registry, per-tool inboxes, and line reassembly.

mod inbox;
mod linebuf;
mod registry;
mod spec;
mod tool;

pub use inbox::{Inbox, OverflowPolicy, PushOutcome};
pub use linebuf::LineAssembler;
pub use registry::Registry;
pub use spec::ToolSpec;
pub use tool::{FlushOutcome, Tool, ToolInfo, ToolState};
