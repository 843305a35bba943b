//! # Command submission and dispatch.
//!
//! Bindings outside the supervisor loop submit commands through a
//! [`ControlHandle`]: the command travels over the kernel's mpsc queue
//! with a oneshot reply channel, and the loop executes it synchronously in
//! step 1 of its iteration. The queue is one of only two structures touched
//! from outside the loop's thread of control.

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::control::command::{
    render_help, render_list, render_status, render_uptime, ControlRequest, ControlResponse,
};
use crate::core::Kernel;
use crate::error::KernelError;

/// A submitted command plus the channel its response travels back on.
#[derive(Debug)]
pub struct ControlEnvelope {
    pub request: ControlRequest,
    pub reply: oneshot::Sender<ControlResponse>,
}

/// Clonable submit side of the kernel's control queue.
#[derive(Clone)]
pub struct ControlHandle {
    tx: mpsc::Sender<ControlEnvelope>,
}

impl ControlHandle {
    pub(crate) fn new(tx: mpsc::Sender<ControlEnvelope>) -> Self {
        Self { tx }
    }

    /// Submits a command and waits for the loop to execute it.
    pub async fn submit(&self, request: ControlRequest) -> Result<ControlResponse, KernelError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(ControlEnvelope { request, reply })
            .await
            .map_err(|_| channel_closed())?;
        rx.await.map_err(|_| channel_closed())
    }

    /// Parses and submits one command line, returning the rendered
    /// response even for parse failures.
    pub async fn submit_line(&self, line: &str) -> Result<ControlResponse, KernelError> {
        match ControlRequest::parse(line) {
            Ok(request) => self.submit(request).await,
            Err(e) => Ok(ControlResponse::failure(&e)),
        }
    }
}

fn channel_closed() -> KernelError {
    KernelError::Io {
        source: std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "kernel control channel closed",
        ),
    }
}

/// A transport binding that feeds operator commands into the kernel.
#[async_trait]
pub trait ControlTransport {
    /// Serves the transport until the kernel's shutdown token fires.
    async fn serve(self, handle: ControlHandle, shutdown: CancellationToken);
}

impl Kernel {
    /// Executes one control command against the kernel and renders its
    /// response. All verbs are idempotent with respect to terminal state.
    pub async fn execute(&mut self, request: ControlRequest) -> ControlResponse {
        match request {
            ControlRequest::Start(name) => match self.start_tool(&name) {
                Ok(pid) => ControlResponse::success(format!(
                    "Success: Tool '{name}' started\n  PID: {pid}\n  Status: RUNNING\n"
                )),
                Err(e) => ControlResponse::failure(&e),
            },
            ControlRequest::Stop(name) => match self.stop_tool(&name).await {
                Ok(()) => ControlResponse::success(format!("Success: Tool '{name}' stopped\n")),
                Err(e) => ControlResponse::failure(&e),
            },
            ControlRequest::Restart(name) => match self.restart_tool(&name).await {
                Ok(pid) => ControlResponse::success(format!(
                    "Success: Tool '{name}' restarted\n  PID: {pid}\n"
                )),
                Err(e) => ControlResponse::failure(&e),
            },
            ControlRequest::Status(name) => match self.status(&name) {
                Ok(info) => ControlResponse::success(render_status(&info)),
                Err(e) => ControlResponse::failure(&e),
            },
            ControlRequest::List => ControlResponse::success(render_list(&self.list())),
            ControlRequest::Shutdown => {
                self.request_shutdown();
                ControlResponse::success("Success: shutting down\n")
            }
            ControlRequest::Uptime => ControlResponse::success(render_uptime(self.uptime())),
            ControlRequest::Version => {
                ControlResponse::success(format!("toolvisor version {}\n", Kernel::version()))
            }
            ControlRequest::Exists(name) => {
                if self.exists(&name) {
                    ControlResponse::success(format!("Success: Tool '{name}' exists\n"))
                } else {
                    ControlResponse::failure(&KernelError::NotFound { name })
                }
            }
            ControlRequest::Count => {
                ControlResponse::success(format!("Success: {} tools registered\n", self.count()))
            }
            ControlRequest::Help => ControlResponse::success(render_help()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::tools::ToolSpec;

    #[tokio::test]
    async fn execute_renders_success_and_error_prefixes() {
        let mut kernel = Kernel::new(Config::default());
        kernel.register(ToolSpec::new("idle", "sleep 30")).unwrap();

        let response = kernel
            .execute(ControlRequest::Status("idle".to_string()))
            .await;
        assert!(response.success);
        assert!(response.text.starts_with("Tool Status:"));

        let response = kernel
            .execute(ControlRequest::Start("ghost".to_string()))
            .await;
        assert!(!response.success);
        assert!(response.text.starts_with("Error:"));
    }

    #[tokio::test]
    async fn stop_on_a_stopped_tool_succeeds() {
        let mut kernel = Kernel::new(Config::default());
        kernel.register(ToolSpec::new("idle", "true")).unwrap();
        let response = kernel
            .execute(ControlRequest::Stop("idle".to_string()))
            .await;
        assert!(response.success);
    }

    #[tokio::test]
    async fn shutdown_flips_the_running_flag() {
        let mut kernel = Kernel::new(Config::default());
        let response = kernel.execute(ControlRequest::Shutdown).await;
        assert!(response.success);
        assert!(!kernel.is_running());
    }

    #[tokio::test]
    async fn version_and_count_render() {
        let mut kernel = Kernel::new(Config::default());
        let response = kernel.execute(ControlRequest::Version).await;
        assert!(response.text.contains(Kernel::version()));
        let response = kernel.execute(ControlRequest::Count).await;
        assert_eq!(response.text, "Success: 0 tools registered\n");
    }
}
