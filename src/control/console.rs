//! # Interactive console binding.
//!
//! Reads operator commands from the terminal, submits them through the
//! control queue, and prints the responses. Line reads run on the
//! runtime's blocking pool, so the supervisor loop is never stalled by a
//! quiet terminal. `quit` leaves the console while the kernel keeps
//! running; `shutdown` takes the kernel down with it.

use std::io::Write;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

use crate::control::{ControlHandle, ControlRequest, ControlTransport};

/// The interactive stdin/stdout binding.
#[derive(Default)]
pub struct ConsoleBinding;

impl ConsoleBinding {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ControlTransport for ConsoleBinding {
    async fn serve(self, handle: ControlHandle, shutdown: CancellationToken) {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        println!("toolvisor console: 'help' for commands, 'quit' to leave");
        prompt();

        loop {
            let line = tokio::select! {
                _ = shutdown.cancelled() => break,
                line = lines.next_line() => line,
            };
            let line = match line {
                Ok(Some(line)) => line,
                // EOF or a broken terminal ends the console, not the kernel.
                Ok(None) | Err(_) => break,
            };
            let line = line.trim();
            if line.is_empty() {
                prompt();
                continue;
            }
            if line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit") {
                println!("leaving console (kernel keeps running)");
                break;
            }

            let request = match ControlRequest::parse(line) {
                Ok(request) => request,
                Err(e) => {
                    println!("Error: {e}");
                    prompt();
                    continue;
                }
            };
            let ends_kernel = matches!(request, ControlRequest::Shutdown);
            match handle.submit(request).await {
                Ok(response) => print!("{}", response.text),
                Err(_) => break,
            }
            if ends_kernel {
                break;
            }
            prompt();
        }
    }
}

fn prompt() {
    print!("toolvisor> ");
    let _ = std::io::stdout().flush();
}
