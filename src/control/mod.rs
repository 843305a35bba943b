//! Control surface: one command enum, several bindings.
//!
//! Every transport (in-process calls, the interactive console, the
//! loopback socket) parses operator input into the same
//! [`ControlRequest`] enum and renders the same [`ControlResponse`] text.
//! Adding a transport means adding a binding module, not touching the
//! kernel.

mod api;
mod command;
mod console;
mod socket;

pub use api::{ControlEnvelope, ControlHandle, ControlTransport};
pub use command::{ControlRequest, ControlResponse};
pub use console::ConsoleBinding;
pub use socket::SocketBinding;
