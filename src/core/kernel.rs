//! # Kernel state and the in-process control surface.
//!
//! [`Kernel`] is the single record holding everything the supervisor
//! mutates: the configuration, the tool registry, the event bus, the
//! optional debug ring, the running flag, and the control-channel
//! endpoints. It is created by the entry point (or a test) and passed
//! around explicitly; there is no process-global state, so any number of
//! kernels can coexist in one process.
//!
//! The public methods on this type are the in-process control binding.
//! The other bindings (console, socket) funnel into the same methods
//! through [`Kernel::execute`](crate::control) via the control channel.

use std::time::Instant;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::control::{ControlEnvelope, ControlHandle};
use crate::core::{DebugKind, DebugRing};
use crate::error::KernelError;
use crate::events::Bus;
use crate::tools::{Registry, ToolInfo, ToolSpec};

/// Depth of the command-submission queue shared by all control bindings.
const CONTROL_QUEUE_DEPTH: usize = 64;

/// Process-wide kernel state: registry, bus, control plumbing.
pub struct Kernel {
    pub(crate) cfg: Config,
    pub(crate) registry: Registry,
    pub(crate) bus: Bus,
    pub(crate) debug: Option<DebugRing>,
    pub(crate) running: bool,
    started_at: Instant,
    pub(crate) control_rx: mpsc::Receiver<ControlEnvelope>,
    control_tx: mpsc::Sender<ControlEnvelope>,
    shutdown_token: CancellationToken,
}

impl Kernel {
    /// Creates a kernel from its configuration. Tools declared in the
    /// configuration are not registered yet; call [`Kernel::init`].
    pub fn new(cfg: Config) -> Self {
        let (control_tx, control_rx) = mpsc::channel(CONTROL_QUEUE_DEPTH);
        Self {
            registry: Registry::new(cfg.max_tools),
            bus: Bus::new(cfg.bus_capacity),
            debug: cfg.enable_debug.then(DebugRing::default),
            running: true,
            started_at: Instant::now(),
            control_rx,
            control_tx,
            shutdown_token: CancellationToken::new(),
            cfg,
        }
    }

    /// Registers the configured tools, applies their subscriptions, and
    /// starts the autostart set. Spawn failures are reported per tool and
    /// leave the tool in `Error`; they do not fail initialization.
    pub fn init(&mut self) -> Result<(), KernelError> {
        let specs = std::mem::take(&mut self.cfg.tools);
        let mut autostart = Vec::new();
        for spec in specs {
            if spec.autostart {
                autostart.push(spec.name.clone());
            }
            self.registry.register(spec)?;
        }
        for name in autostart {
            if let Err(e) = self.start_tool(&name) {
                log::warn!("autostart of '{name}' failed: {e}");
            }
        }
        Ok(())
    }

    /// The handle control bindings use to submit commands.
    pub fn handle(&self) -> ControlHandle {
        ControlHandle::new(self.control_tx.clone())
    }

    /// Token cancelled when the kernel shuts down; bindings watch it.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    pub(crate) fn cancel_bindings(&self) {
        self.shutdown_token.cancel();
    }

    /// Kernel configuration.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// The tool registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The event bus.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// True until `shutdown` is requested.
    pub fn is_running(&self) -> bool {
        self.running
    }

    // ---- in-process control surface ----

    /// Registers a tool at runtime.
    pub fn register(&mut self, spec: ToolSpec) -> Result<(), KernelError> {
        self.registry.register(spec)
    }

    /// Stops and removes a tool.
    pub async fn unregister(&mut self, name: &str) -> Result<(), KernelError> {
        let grace = self.cfg.grace;
        self.registry.unregister(name, grace).await
    }

    /// Adds a subscription pattern to a registered tool.
    pub fn subscribe(&mut self, name: &str, pattern: &str) -> Result<(), KernelError> {
        self.registry.subscribe(name, pattern)
    }

    /// Starts a tool on operator request, forgetting prior crash history.
    /// Idempotent for a running tool.
    pub fn start_tool(&mut self, name: &str) -> Result<u32, KernelError> {
        let tool = self
            .registry
            .find_mut(name)
            .ok_or_else(|| KernelError::NotFound {
                name: name.to_string(),
            })?;
        tool.reset_restart_state();
        let pid = tool.start()?;
        self.note_debug(DebugKind::ToolStart, name, format!("pid {pid}"));
        Ok(pid)
    }

    /// Starts a tool without touching crash bookkeeping: the path used by
    /// crash restarts and on-demand starts.
    pub(crate) fn spawn_tool(&mut self, name: &str) -> Result<u32, KernelError> {
        let tool = self
            .registry
            .find_mut(name)
            .ok_or_else(|| KernelError::NotFound {
                name: name.to_string(),
            })?;
        let pid = tool.start()?;
        self.note_debug(DebugKind::ToolStart, name, format!("pid {pid}"));
        Ok(pid)
    }

    /// Gracefully stops a tool. Idempotent for a stopped tool.
    pub async fn stop_tool(&mut self, name: &str) -> Result<(), KernelError> {
        let grace = self.cfg.grace;
        let tool = self
            .registry
            .find_mut(name)
            .ok_or_else(|| KernelError::NotFound {
                name: name.to_string(),
            })?;
        tool.stop(grace).await;
        self.note_debug(DebugKind::ToolStop, name, "stopped");
        Ok(())
    }

    /// Stops then starts a tool.
    pub async fn restart_tool(&mut self, name: &str) -> Result<u32, KernelError> {
        self.stop_tool(name).await?;
        self.start_tool(name)
    }

    /// Observable snapshot of one tool.
    pub fn status(&self, name: &str) -> Result<ToolInfo, KernelError> {
        self.registry
            .find(name)
            .map(|t| t.info())
            .ok_or_else(|| KernelError::NotFound {
                name: name.to_string(),
            })
    }

    /// Snapshots of every tool, in registration order.
    pub fn list(&self) -> Vec<ToolInfo> {
        self.registry.iter().map(|t| t.info()).collect()
    }

    /// True when the named tool is registered.
    pub fn exists(&self, name: &str) -> bool {
        self.registry.find(name).is_some()
    }

    /// Number of registered tools.
    pub fn count(&self) -> usize {
        self.registry.len()
    }

    /// Seconds since the kernel was created.
    pub fn uptime(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Kernel version string.
    pub fn version() -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    /// Asks the supervisor loop to exit after the current iteration.
    pub fn request_shutdown(&mut self) {
        if self.running {
            log::info!("shutdown requested");
            self.running = false;
        }
    }

    pub(crate) fn note_debug(&mut self, kind: DebugKind, tool: &str, detail: impl Into<String>) {
        if let Some(ring) = self.debug.as_mut() {
            ring.record(kind, tool, detail);
        }
    }

    /// Debug ring contents, when enabled.
    pub fn debug_ring(&self) -> Option<&DebugRing> {
        self.debug.as_ref()
    }
}

impl std::fmt::Debug for Kernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Kernel")
            .field("tools", &self.registry.len())
            .field("running", &self.running)
            .field("uptime", &self.uptime())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolState;

    fn kernel() -> Kernel {
        Kernel::new(Config::default())
    }

    #[test]
    fn status_of_unknown_tool_is_not_found() {
        let kernel = kernel();
        let err = kernel.status("ghost").unwrap_err();
        assert_eq!(err.as_label(), "not_found");
        assert!(!kernel.exists("ghost"));
    }

    #[test]
    fn list_reports_registration_order_and_count() {
        let mut kernel = kernel();
        for name in ["a", "b", "c"] {
            kernel.register(ToolSpec::new(name, "true")).unwrap();
        }
        let infos = kernel.list();
        let names: Vec<&str> = infos.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(kernel.count(), 3);
        assert!(infos.iter().all(|i| i.state == ToolState::Stopped));
    }

    #[test]
    fn init_registers_configured_tools() {
        let mut cfg = Config::default();
        cfg.tools.push(ToolSpec::new("probe", "true").subscribe("STATUS"));
        let mut kernel = Kernel::new(cfg);
        kernel.init().unwrap();
        assert!(kernel.exists("probe"));
        assert!(kernel.registry().find("probe").unwrap().matches("STATUS"));
    }

    #[test]
    fn shutdown_request_flips_the_running_flag() {
        let mut kernel = kernel();
        assert!(kernel.is_running());
        kernel.request_shutdown();
        assert!(!kernel.is_running());
    }
}
