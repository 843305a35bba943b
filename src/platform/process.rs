//! # Child process ownership and non-blocking pipe I/O.
//!
//! [`ChildProc`] is the single owning value for one supervised child: the
//! process handle plus its three pipe endpoints. The tool record holds
//! exactly one of these and never raw descriptors; dropping it kills the
//! child (the runtime reaps the orphan).
//!
//! The kernel is single-threaded and cooperative, so nothing here may stall
//! the loop: reads and writes poll the pipe future exactly once
//! ([`FutureExt::now_or_never`]) and report would-block instead of waiting.
//! The read side distinguishes "no data now" from "pipe closed"; closed is
//! sticky.

use std::process::Stdio;
use std::time::Duration;

use futures::FutureExt;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};

use crate::error::KernelError;

/// Result of a non-blocking read from a child stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// `n` bytes were read into the buffer.
    Data(usize),
    /// Nothing available right now.
    WouldBlock,
    /// The pipe is closed. Sticky: later reads keep reporting this.
    Closed,
}

/// Result of a non-blocking write to the child's stdin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// `n` bytes were accepted (possibly fewer than offered).
    Wrote(usize),
    /// The pipe buffer is full right now.
    WouldBlock,
}

/// Result of waiting for a terminated child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReapOutcome {
    /// The child exited with this code (`None` when killed by a signal).
    Exited(Option<i32>),
    /// The child did not exit within the window.
    Timeout,
}

/// One supervised child process with its three pipes.
#[derive(Debug)]
pub struct ChildProc {
    child: Child,
    pid: u32,
    stdin: Option<ChildStdin>,
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
    stdout_closed: bool,
    stderr_closed: bool,
}

impl ChildProc {
    /// Spawns `command` through the host shell with all three standard
    /// streams piped.
    pub fn spawn(command: &str) -> Result<Self, KernelError> {
        let mut cmd = shell_command(command);
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| KernelError::SpawnFailed {
            reason: e.to_string(),
        })?;
        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let (Some(stdin), Some(stdout), Some(stderr)) = (stdin, stdout, stderr) else {
            // Dropping `child` kills the half-built process and closes
            // whatever pipes were opened.
            return Err(KernelError::PipeFailed {
                reason: "child spawned without piped streams".to_string(),
            });
        };
        let Some(pid) = child.id() else {
            return Err(KernelError::SpawnFailed {
                reason: "child exited before its pid could be read".to_string(),
            });
        };

        Ok(Self {
            child,
            pid,
            stdin: Some(stdin),
            stdout: Some(stdout),
            stderr: Some(stderr),
            stdout_closed: false,
            stderr_closed: false,
        })
    }

    /// Operating-system process id.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Requests the child exit: graceful by default, immediate when
    /// `force`. Succeeds if the request was delivered or the process is
    /// already gone. Does not wait.
    #[cfg(unix)]
    pub fn terminate(&mut self, force: bool) -> Result<(), KernelError> {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let signal = if force {
            Signal::SIGKILL
        } else {
            Signal::SIGTERM
        };
        match kill(Pid::from_raw(self.pid as i32), signal) {
            Ok(()) => Ok(()),
            Err(nix::errno::Errno::ESRCH) => Ok(()),
            Err(errno) => Err(KernelError::Io {
                source: std::io::Error::from_raw_os_error(errno as i32),
            }),
        }
    }

    /// On platforms without POSIX signals the only exit request is a kill.
    #[cfg(not(unix))]
    pub fn terminate(&mut self, _force: bool) -> Result<(), KernelError> {
        match self.child.start_kill() {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::InvalidInput => Ok(()),
            Err(e) => Err(KernelError::Io { source: e }),
        }
    }

    /// Non-blocking liveness probe. A child that has exited but not been
    /// reaped counts as not alive.
    pub fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Waits up to `timeout` for the child to exit and reaps it.
    pub async fn reap(&mut self, timeout: Duration) -> ReapOutcome {
        match tokio::time::timeout(timeout, self.child.wait()).await {
            Ok(Ok(status)) => ReapOutcome::Exited(status.code()),
            Ok(Err(_)) => ReapOutcome::Exited(None),
            Err(_) => ReapOutcome::Timeout,
        }
    }

    /// Reads whatever the child's stdout has available, without waiting.
    pub fn read_stdout(&mut self, buf: &mut [u8]) -> Result<ReadOutcome, KernelError> {
        read_avail(self.stdout.as_mut(), &mut self.stdout_closed, buf)
    }

    /// Reads whatever the child's stderr has available, without waiting.
    pub fn read_stderr(&mut self, buf: &mut [u8]) -> Result<ReadOutcome, KernelError> {
        read_avail(self.stderr.as_mut(), &mut self.stderr_closed, buf)
    }

    /// Writes as much of `buf` to the child's stdin as fits, without
    /// waiting. A closed stdin surfaces as [`KernelError::Io`].
    pub fn write_stdin(&mut self, buf: &[u8]) -> Result<WriteOutcome, KernelError> {
        let Some(stdin) = self.stdin.as_mut() else {
            return Err(KernelError::Io {
                source: std::io::Error::new(std::io::ErrorKind::BrokenPipe, "stdin closed"),
            });
        };
        match stdin.write(buf).now_or_never() {
            None => Ok(WriteOutcome::WouldBlock),
            Some(Ok(n)) => Ok(WriteOutcome::Wrote(n)),
            Some(Err(e)) if e.kind() == std::io::ErrorKind::WouldBlock => {
                Ok(WriteOutcome::WouldBlock)
            }
            Some(Err(e)) => Err(KernelError::Io { source: e }),
        }
    }

    /// Closes the write end of the child's stdin.
    pub fn close_stdin(&mut self) {
        self.stdin = None;
    }
}

fn read_avail<R: AsyncRead + Unpin>(
    pipe: Option<&mut R>,
    closed: &mut bool,
    buf: &mut [u8],
) -> Result<ReadOutcome, KernelError> {
    if *closed {
        return Ok(ReadOutcome::Closed);
    }
    let Some(pipe) = pipe else {
        return Ok(ReadOutcome::Closed);
    };
    match pipe.read(buf).now_or_never() {
        None => Ok(ReadOutcome::WouldBlock),
        Some(Ok(0)) => {
            *closed = true;
            Ok(ReadOutcome::Closed)
        }
        Some(Ok(n)) => Ok(ReadOutcome::Data(n)),
        Some(Err(e)) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(ReadOutcome::WouldBlock),
        Some(Err(e)) => Err(KernelError::Io { source: e }),
    }
}

#[cfg(unix)]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

#[cfg(not(unix))]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}
