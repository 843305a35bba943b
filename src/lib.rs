//! # toolvisor
//!
//! **Toolvisor** is a single-host, event-driven tool supervisor: it spawns
//! a fixed set of configured child processes ("tools"), brokers text-line
//! events between them on a publish/subscribe bus, monitors their health,
//! and restarts them under policy.
//!
//! | Area           | Description                                                   | Key types                                 |
//! |----------------|---------------------------------------------------------------|-------------------------------------------|
//! | **Kernel**     | Single-threaded cooperative supervisor loop over all state.   | [`Kernel`]                                |
//! | **Tools**      | Registered child processes with inboxes and subscriptions.    | [`ToolSpec`], [`Tool`], [`Registry`]      |
//! | **Events**     | `TYPE\|SENDER\|DATA` lines on a bounded bus.                  | [`Event`], [`Bus`]                        |
//! | **Policies**   | Restart behavior and crash backoff.                           | [`RestartPolicy`], [`BackoffPolicy`]      |
//! | **Control**    | One command enum, several transport bindings.                 | [`ControlRequest`], [`ControlHandle`]     |
//! | **Platform**   | Child processes with non-blocking pipe I/O.                   | [`ChildProc`]                             |
//!
//! A tool talks to the kernel over its standard streams: events out on
//! stdout, events in on stdin, free-form log lines on stderr. The kernel
//! never blocks on a child; one slow tool cannot stall the others.
//!
//! ```no_run
//! use toolvisor::{Config, ControlRequest, Kernel, ToolSpec};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut kernel = Kernel::new(Config::default());
//!     kernel.register(ToolSpec::new("clock", "while true; do date; sleep 1; done"))?;
//!     kernel.start_tool("clock")?;
//!
//!     // Ask the loop to exit after two seconds, from the outside.
//!     let handle = kernel.handle();
//!     tokio::spawn(async move {
//!         tokio::time::sleep(std::time::Duration::from_secs(2)).await;
//!         let _ = handle.submit(ControlRequest::Shutdown).await;
//!     });
//!
//!     kernel.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod control;
pub mod core;
pub mod error;
pub mod events;
pub mod logger;
pub mod platform;
pub mod policies;
pub mod tools;

pub use crate::config::Config;
pub use crate::control::{
    ConsoleBinding, ControlHandle, ControlRequest, ControlResponse, ControlTransport,
    SocketBinding,
};
pub use crate::core::Kernel;
pub use crate::error::KernelError;
pub use crate::events::{Bus, Event};
pub use crate::platform::ChildProc;
pub use crate::policies::{BackoffPolicy, RestartPolicy};
pub use crate::tools::{
    Inbox, LineAssembler, OverflowPolicy, PushOutcome, Registry, Tool, ToolInfo, ToolSpec,
    ToolState,
};
