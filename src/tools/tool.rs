//! # The tool record: one supervised child and everything the kernel
//! knows about it.
//!
//! A [`Tool`] couples the configured [`ToolSpec`] with runtime state: the
//! lifecycle [`ToolState`], the owned child process, the two stream
//! reassemblers, the inbox, counters, and restart bookkeeping. All of it is
//! mutated only by the supervisor loop.
//!
//! State machine:
//!
//! ```text
//! Stopped ── start ──▶ Starting ── spawn ok ──▶ Running
//!    ▲                     │                      │
//!    │                     └─ spawn fail ────────▶ Error
//!    │                                            │
//!    └────── reap ◀── Stopping ◀── stop ──────────┘
//!                                                 │
//!    Crashed ◀─────── liveness probe fails ───────┘
//!       │
//!       └─ restart allowed → Starting ; exhausted → Error
//! ```

use std::time::{Duration, Instant};

use crate::config::MAX_SUBSCRIPTIONS;
use crate::error::KernelError;
use crate::platform::{ChildProc, ReadOutcome, ReapOutcome, WriteOutcome};
use crate::policies::RestartPolicy;
use crate::tools::{Inbox, LineAssembler, OverflowPolicy, PushOutcome, ToolSpec};

/// Lifecycle state of a tool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToolState {
    /// No child process; the tool is idle.
    Stopped,
    /// A start was requested; transient within one loop iteration.
    Starting,
    /// The child process is alive.
    Running,
    /// A stop was requested; waiting for the child to exit.
    Stopping,
    /// The child exited without being asked to.
    Crashed,
    /// The tool cannot run: spawn failed or restarts are exhausted.
    Error,
}

impl ToolState {
    /// Upper-case name used in control responses and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolState::Stopped => "STOPPED",
            ToolState::Starting => "STARTING",
            ToolState::Running => "RUNNING",
            ToolState::Stopping => "STOPPING",
            ToolState::Crashed => "CRASHED",
            ToolState::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for ToolState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observable snapshot of a tool record, served by the control surface.
#[derive(Clone, Debug)]
pub struct ToolInfo {
    pub name: String,
    pub command: String,
    pub description: String,
    pub state: ToolState,
    pub pid: Option<u32>,
    pub autostart: bool,
    pub restart_on_crash: bool,
    pub max_restarts: u32,
    pub restart_count: u32,
    pub events_sent: u64,
    pub events_received: u64,
    pub subscription_count: usize,
}

/// One registered tool.
#[derive(Debug)]
pub struct Tool {
    spec: ToolSpec,
    state: ToolState,
    child: Option<ChildProc>,
    stdout_lines: LineAssembler,
    stderr_lines: LineAssembler,
    inbox: Inbox,
    // Bytes of the inbox front line already written to the child.
    stdin_offset: usize,
    events_sent: u64,
    events_received: u64,
    restart_count: u32,
    started_at: Option<Instant>,
    last_heartbeat: Option<Instant>,
    next_restart_at: Option<Instant>,
    restart_delay: Option<Duration>,
}

/// Result of one inbox-flush pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Everything queued was written, or the inbox is empty.
    Drained,
    /// The child is not accepting more bytes right now.
    Stalled,
    /// The child's stdin is gone; the tool was marked crashed.
    Crashed,
}

impl Tool {
    /// Creates a stopped tool from its spec. Patterns already on the spec
    /// are normalized the same way [`Tool::subscribe`] normalizes them.
    pub fn new(spec: ToolSpec) -> Self {
        let inbox = Inbox::new(spec.queue_capacity, spec.queue_policy);
        let mut tool = Self {
            spec,
            state: ToolState::Stopped,
            child: None,
            stdout_lines: LineAssembler::default(),
            stderr_lines: LineAssembler::default(),
            inbox,
            stdin_offset: 0,
            events_sent: 0,
            events_received: 0,
            restart_count: 0,
            started_at: None,
            last_heartbeat: None,
            next_restart_at: None,
            restart_delay: None,
        };
        let patterns = std::mem::take(&mut tool.spec.subscriptions);
        for pattern in &patterns {
            if let Some(normalized) = normalize_pattern(pattern) {
                if tool.spec.subscriptions.len() < MAX_SUBSCRIPTIONS {
                    tool.spec.subscriptions.push(normalized);
                }
            }
        }
        tool
    }

    /// Tool name.
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    /// Configured shape.
    pub fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ToolState {
        self.state
    }

    /// Pid of the running child, if any.
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().map(ChildProc::pid)
    }

    /// The tool's inbox.
    pub fn inbox(&self) -> &Inbox {
        &self.inbox
    }

    /// Events this tool has published.
    pub fn events_sent(&self) -> u64 {
        self.events_sent
    }

    /// Events delivered to this tool's stdin.
    pub fn events_received(&self) -> u64 {
        self.events_received
    }

    /// Crash-restart attempts since the last operator-initiated start.
    pub fn restart_count(&self) -> u32 {
        self.restart_count
    }

    /// When the current child was started.
    pub fn started_at(&self) -> Option<Instant> {
        self.started_at
    }

    /// When output was last read from the child.
    pub fn last_heartbeat(&self) -> Option<Instant> {
        self.last_heartbeat
    }

    /// True for tools the kernel starts when a subscribed event arrives.
    pub fn is_on_demand(&self) -> bool {
        self.spec.restart_policy == RestartPolicy::OnDemand
    }

    /// Observable snapshot for the control surface.
    pub fn info(&self) -> ToolInfo {
        ToolInfo {
            name: self.spec.name.clone(),
            command: self.spec.command.clone(),
            description: self.spec.description.clone(),
            state: self.state,
            pid: self.pid(),
            autostart: self.spec.autostart,
            restart_on_crash: self.spec.restart_on_crash,
            max_restarts: self.spec.max_restarts,
            restart_count: self.restart_count,
            events_sent: self.events_sent,
            events_received: self.events_received,
            subscription_count: self.spec.subscriptions.len(),
        }
    }

    /// Adds a subscription pattern (an exact event type or `*`), trimmed of
    /// surrounding whitespace and matched quotes.
    pub fn subscribe(&mut self, pattern: &str) -> Result<(), KernelError> {
        let Some(pattern) = normalize_pattern(pattern) else {
            return Err(KernelError::InvalidArg {
                reason: "subscription pattern is empty".to_string(),
            });
        };
        if self.spec.subscriptions.len() >= MAX_SUBSCRIPTIONS {
            return Err(KernelError::InvalidArg {
                reason: format!(
                    "tool '{}' already has {MAX_SUBSCRIPTIONS} subscriptions",
                    self.spec.name
                ),
            });
        }
        self.spec.subscriptions.push(pattern);
        Ok(())
    }

    /// True when an event of type `kind` fans out to this tool.
    pub fn matches(&self, kind: &str) -> bool {
        self.spec
            .subscriptions
            .iter()
            .any(|p| p == "*" || p == kind)
    }

    /// Pushes a serialized event line into the inbox under its policy.
    pub fn enqueue(&mut self, line: &str) -> PushOutcome {
        let evicts_front = self.inbox.is_full() && self.spec.queue_policy == OverflowPolicy::DropOldest;
        let outcome = self.inbox.push(line);
        // DropOldest may evict a front line that was partially written to
        // the child; the next flush must start at the head of the new
        // front, not at the stale offset.
        if evicts_front && outcome == PushOutcome::Pushed && self.stdin_offset > 0 {
            self.stdin_offset = 0;
        }
        outcome
    }

    /// Spawns the child. Idempotent for a running tool. On spawn failure
    /// the tool transitions to [`ToolState::Error`] and the error is
    /// returned.
    pub fn start(&mut self) -> Result<u32, KernelError> {
        if let Some(child) = &self.child {
            if self.state == ToolState::Running {
                return Ok(child.pid());
            }
        }
        self.state = ToolState::Starting;
        match ChildProc::spawn(&self.spec.command) {
            Ok(child) => {
                let pid = child.pid();
                self.child = Some(child);
                self.state = ToolState::Running;
                self.started_at = Some(Instant::now());
                self.last_heartbeat = self.started_at;
                self.stdin_offset = 0;
                self.stdout_lines = LineAssembler::default();
                self.stderr_lines = LineAssembler::default();
                log::info!("tool '{}' started with pid {pid}", self.spec.name);
                Ok(pid)
            }
            Err(e) => {
                self.child = None;
                self.state = ToolState::Error;
                log::error!("tool '{}' failed to start: {e}", self.spec.name);
                Err(e)
            }
        }
    }

    /// Sends the terminate request and marks the tool `Stopping`. The
    /// bounded wait happens in [`Tool::finish_stop`]. No-op for a tool
    /// without a child.
    pub fn begin_stop(&mut self) {
        if let Some(child) = self.child.as_mut() {
            self.state = ToolState::Stopping;
            if let Err(e) = child.terminate(false) {
                log::warn!("tool '{}': terminate failed: {e}", self.spec.name);
            }
        }
    }

    /// Reaps the child within `deadline`, force-killing on timeout, then
    /// closes the pipes and settles the tool in [`ToolState::Stopped`].
    pub async fn finish_stop(&mut self, deadline: Instant) {
        if let Some(mut child) = self.child.take() {
            let window = deadline.saturating_duration_since(Instant::now());
            if child.reap(window).await == ReapOutcome::Timeout {
                log::warn!(
                    "tool '{}' ignored the terminate request; forcing",
                    self.spec.name
                );
                let _ = child.terminate(true);
                child.reap(Duration::from_secs(1)).await;
            }
        }
        self.settle_stopped();
    }

    /// Graceful stop: terminate, bounded reap, close. Idempotent.
    pub async fn stop(&mut self, grace: Duration) {
        if self.child.is_none() {
            self.settle_stopped();
            return;
        }
        self.begin_stop();
        self.finish_stop(Instant::now() + grace).await;
        log::info!("tool '{}' stopped", self.spec.name);
    }

    /// Records that the child died on its own: drops the child (closing all
    /// pipes), discards the inbox, and transitions to
    /// [`ToolState::Crashed`].
    pub fn mark_crashed(&mut self) {
        self.child = None;
        self.state = ToolState::Crashed;
        self.started_at = None;
        self.stdin_offset = 0;
        self.inbox.clear();
    }

    /// Marks the tool permanently failed until the operator intervenes.
    pub fn mark_error(&mut self) {
        self.child = None;
        self.state = ToolState::Error;
        self.next_restart_at = None;
    }

    /// Non-blocking liveness probe of the child.
    pub fn probe_alive(&mut self) -> bool {
        match self.child.as_mut() {
            Some(child) => child.is_alive(),
            None => false,
        }
    }

    /// Reads up to `budget` bytes from the child's stdout and returns the
    /// completed lines. An I/O failure marks the tool crashed.
    pub fn drain_stdout(&mut self, budget: usize) -> Vec<String> {
        Self::drain_stream(
            &mut self.child,
            &mut self.stdout_lines,
            &mut self.last_heartbeat,
            budget,
            true,
        )
        .unwrap_or_else(|e| {
            log::warn!("tool '{}': stdout read failed: {e}", self.spec.name);
            self.mark_crashed();
            Vec::new()
        })
    }

    /// Reads up to `budget` bytes from the child's stderr and returns the
    /// completed lines.
    pub fn drain_stderr(&mut self, budget: usize) -> Vec<String> {
        Self::drain_stream(
            &mut self.child,
            &mut self.stderr_lines,
            &mut self.last_heartbeat,
            budget,
            false,
        )
        .unwrap_or_else(|e| {
            log::warn!("tool '{}': stderr read failed: {e}", self.spec.name);
            self.mark_crashed();
            Vec::new()
        })
    }

    fn drain_stream(
        child: &mut Option<ChildProc>,
        lines: &mut LineAssembler,
        heartbeat: &mut Option<Instant>,
        budget: usize,
        stdout: bool,
    ) -> Result<Vec<String>, KernelError> {
        let Some(child) = child.as_mut() else {
            return Ok(Vec::new());
        };
        let mut out = Vec::new();
        let mut buf = [0u8; 4096];
        let mut used = 0;
        while used < budget {
            let span = buf.len().min(budget - used);
            let outcome = if stdout {
                child.read_stdout(&mut buf[..span])?
            } else {
                child.read_stderr(&mut buf[..span])?
            };
            match outcome {
                ReadOutcome::Data(n) => {
                    used += n;
                    *heartbeat = Some(Instant::now());
                    out.extend(lines.feed(&buf[..n]));
                }
                ReadOutcome::WouldBlock => break,
                ReadOutcome::Closed => {
                    if let Some(rest) = lines.take_remainder() {
                        out.push(rest);
                    }
                    break;
                }
            }
        }
        Ok(out)
    }

    /// Flushes the inbox toward the child's stdin: peek the front line,
    /// write what fits, pop only once the whole line drained. Stops on a
    /// partial or would-block write; a closed stdin marks the tool crashed.
    pub fn flush_inbox(&mut self) -> FlushOutcome {
        loop {
            let outcome = {
                let Some(line) = self.inbox.peek() else {
                    return FlushOutcome::Drained;
                };
                let Some(child) = self.child.as_mut() else {
                    return FlushOutcome::Stalled;
                };
                let pending = &line.as_bytes()[self.stdin_offset..];
                (pending.len(), child.write_stdin(pending))
            };
            match outcome {
                (len, Ok(WriteOutcome::Wrote(n))) => {
                    self.stdin_offset += n;
                    if n < len {
                        return FlushOutcome::Stalled;
                    }
                    self.stdin_offset = 0;
                    self.inbox.pop();
                    self.events_received += 1;
                }
                (_, Ok(WriteOutcome::WouldBlock)) => return FlushOutcome::Stalled,
                (_, Err(e)) => {
                    log::warn!("tool '{}': stdin write failed: {e}", self.spec.name);
                    self.mark_crashed();
                    return FlushOutcome::Crashed;
                }
            }
        }
    }

    /// Counts one event published from this tool's stdout.
    pub fn note_event_sent(&mut self) {
        self.events_sent += 1;
    }

    /// Restart bookkeeping: the deadline after which a crash restart may
    /// run.
    pub fn next_restart_at(&self) -> Option<Instant> {
        self.next_restart_at
    }

    /// The delay used for the last scheduled restart.
    pub fn restart_delay(&self) -> Option<Duration> {
        self.restart_delay
    }

    /// Schedules a crash restart.
    pub fn schedule_restart(&mut self, at: Instant, delay: Duration) {
        self.next_restart_at = Some(at);
        self.restart_delay = Some(delay);
    }

    /// Consumes the schedule and counts the attempt.
    pub fn take_restart_attempt(&mut self) {
        self.next_restart_at = None;
        self.restart_count += 1;
    }

    /// Forgets crash history; called on an operator-initiated start.
    pub fn reset_restart_state(&mut self) {
        self.restart_count = 0;
        self.restart_delay = None;
        self.next_restart_at = None;
    }

    fn settle_stopped(&mut self) {
        self.child = None;
        self.state = ToolState::Stopped;
        self.started_at = None;
        self.stdin_offset = 0;
        self.next_restart_at = None;
        // On-demand restartable tools keep their pending lines for the
        // next start; everything else starts over with an empty inbox.
        if !(self.is_on_demand() && self.spec.restart_on_crash) {
            self.inbox.clear();
        }
    }
}

fn normalize_pattern(pattern: &str) -> Option<String> {
    let mut p = pattern.trim();
    loop {
        let stripped = p
            .strip_prefix('"')
            .and_then(|rest| rest.strip_suffix('"'))
            .or_else(|| {
                p.strip_prefix('\'')
                    .and_then(|rest| rest.strip_suffix('\''))
            });
        match stripped {
            Some(inner) => p = inner.trim(),
            None => break,
        }
    }
    if p.is_empty() {
        None
    } else {
        Some(p.to_string())
    }
}
