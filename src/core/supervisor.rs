//! # The supervisor loop.
//!
//! One single-threaded cooperative loop owns all kernel-state mutation.
//! Each iteration, in order: drain the control queue, fan the bus out,
//! pump per-tool I/O under byte budgets, probe liveness, apply crash
//! restarts, then sleep for the cadence.
//!
//! Events produced while pumping a child in step 3 are fanned out no
//! earlier than the next iteration; that bounds per-iteration work. No step
//! may stall the loop: pipe I/O polls once and reports would-block, and
//! backoff delays are deadlines checked each pass, never sleeps.

use std::time::Instant;

use tokio::time::MissedTickBehavior;

use crate::core::{DebugKind, Kernel};
use crate::error::KernelError;
use crate::events::{Bus, Event};
use crate::policies::RestartPolicy;
use crate::tools::{PushOutcome, Tool, ToolState};

impl Kernel {
    /// Runs the supervisor loop until `shutdown` is requested, then stops
    /// every tool and cancels the control bindings.
    pub async fn run(&mut self) -> Result<(), KernelError> {
        log::info!(
            "supervisor loop entered (tick {:?}, {} tools)",
            self.cfg.tick,
            self.registry.len()
        );
        let mut tick = tokio::time::interval(self.cfg.tick);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first interval tick completes immediately; consume it so the
        // cadence applies from the first iteration on.
        tick.tick().await;

        while self.running {
            self.iterate().await;
            if !self.running {
                break;
            }
            tick.tick().await;
        }

        self.shutdown_all().await;
        self.cancel_bindings();
        if let Some(ring) = &self.debug {
            ring.dump();
        }
        log::info!("supervisor loop exited");
        Ok(())
    }

    /// One loop iteration. Public so tests can step a kernel by hand.
    pub async fn iterate(&mut self) {
        self.drain_control().await;
        self.dispatch_events();
        self.pump_tools();
        self.sweep_health();
        self.sweep_restarts();
    }

    /// Step 1: execute queued control commands synchronously.
    async fn drain_control(&mut self) {
        while let Ok(envelope) = self.control_rx.try_recv() {
            let response = self.execute(envelope.request).await;
            // A client that went away mid-command is not an error.
            let _ = envelope.reply.send(response);
        }
    }

    /// Step 2: drain the bus completely and fan each event out to every
    /// subscribed tool's inbox.
    fn dispatch_events(&mut self) {
        let events = self.bus.drain();
        for event in events {
            let line = event.serialize();
            let mut on_demand = Vec::new();

            for tool in self.registry.iter_mut() {
                if !tool.matches(&event.kind) {
                    continue;
                }
                match tool.enqueue(&line) {
                    PushOutcome::Pushed => {
                        if let Some(ring) = self.debug.as_mut() {
                            ring.record(DebugKind::EventDeliver, tool.name(), event.kind.clone());
                        }
                    }
                    PushOutcome::Dropped | PushOutcome::Full => {
                        log::debug!(
                            "inbox of '{}' rejected event '{}' (policy {:?})",
                            tool.name(),
                            event.kind,
                            tool.spec().queue_policy
                        );
                    }
                }
                if tool.is_on_demand() && tool.state() == ToolState::Stopped {
                    on_demand.push(tool.name().to_string());
                }
            }

            if let Some(ring) = self.debug.as_mut() {
                ring.record(DebugKind::EventPublish, &event.sender, event.kind.clone());
            }
            for name in on_demand {
                log::info!("starting on-demand tool '{name}' for event '{}'", event.kind);
                if let Err(e) = self.spawn_tool(&name) {
                    log::warn!("on-demand start of '{name}' failed: {e}");
                }
            }
        }
    }

    /// Step 3: per running tool, read both streams under the byte budget
    /// and flush the inbox toward stdin.
    fn pump_tools(&mut self) {
        let budget = self.cfg.drain_budget;
        for tool in self.registry.iter_mut() {
            if tool.state() != ToolState::Running {
                continue;
            }
            pump_stdout(tool, &self.bus, budget);
            pump_stderr(tool, budget);
            if tool.state() == ToolState::Running {
                tool.flush_inbox();
            }
        }
    }

    /// Step 4: a running tool whose process is gone has crashed.
    fn sweep_health(&mut self) {
        for tool in self.registry.iter_mut() {
            if tool.state() != ToolState::Running {
                continue;
            }
            if !tool.probe_alive() {
                log::warn!("tool '{}' crashed", tool.name());
                tool.mark_crashed();
                if let Some(ring) = self.debug.as_mut() {
                    ring.record(DebugKind::ToolCrash, tool.name(), "process exited");
                }
            }
        }
    }

    /// Step 5: schedule and run crash restarts under exponential backoff.
    fn sweep_restarts(&mut self) {
        let now = Instant::now();
        let backoff = self.cfg.backoff;
        let mut due = Vec::new();

        for tool in self.registry.iter_mut() {
            if tool.state() != ToolState::Crashed {
                continue;
            }
            let wants_restart =
                tool.spec().restart_on_crash || tool.spec().restart_policy == RestartPolicy::Always;
            if !wants_restart {
                continue;
            }
            if tool.restart_count() >= tool.spec().max_restarts {
                log::warn!(
                    "tool '{}' exhausted {} restart attempts; giving up",
                    tool.name(),
                    tool.spec().max_restarts
                );
                tool.mark_error();
                continue;
            }
            match tool.next_restart_at() {
                None => {
                    let delay = backoff.next(tool.restart_delay());
                    log::info!(
                        "tool '{}' will restart in {:.1}s (attempt {}/{})",
                        tool.name(),
                        delay.as_secs_f64(),
                        tool.restart_count() + 1,
                        tool.spec().max_restarts
                    );
                    tool.schedule_restart(now + delay, delay);
                }
                Some(at) if at <= now => {
                    tool.take_restart_attempt();
                    due.push(tool.name().to_string());
                }
                Some(_) => {}
            }
        }

        for name in due {
            if let Err(e) = self.spawn_tool(&name) {
                log::warn!("crash restart of '{name}' failed: {e}");
            }
        }
    }

    /// Stops every tool: all terminate requests first, then one bounded
    /// reap sweep shared by the whole set.
    pub(crate) async fn shutdown_all(&mut self) {
        if !self.registry.is_empty() {
            log::info!("stopping all tools");
        }
        for tool in self.registry.iter_mut() {
            tool.begin_stop();
        }
        let deadline = Instant::now() + self.cfg.grace;
        for tool in self.registry.iter_mut() {
            tool.finish_stop(deadline).await;
        }
    }
}

/// Reads a child's stdout, parses each completed line as an event, and
/// publishes it. The sender field is taken from the line, not imposed.
fn pump_stdout(tool: &mut Tool, bus: &Bus, budget: usize) {
    for line in tool.drain_stdout(budget) {
        match Event::parse(&line) {
            Ok(event) => match bus.publish_event(event) {
                Ok(()) => tool.note_event_sent(),
                Err(KernelError::QueueFull) => {
                    log::warn!("bus full; dropping event from '{}'", tool.name());
                }
                Err(e) => {
                    log::warn!("publish from '{}' failed: {e}", tool.name());
                }
            },
            Err(e) => {
                log::warn!("ignoring malformed line from '{}': {e} ({line})", tool.name());
            }
        }
    }
}

/// Forwards a child's stderr lines to the log, tagged with the tool name.
fn pump_stderr(tool: &mut Tool, budget: usize) {
    let name = tool.name().to_string();
    for line in tool.drain_stderr(budget) {
        log::info!(target: name.as_str(), "{line}");
    }
}
