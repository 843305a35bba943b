//! # Tool specification: the configured shape of one tool.
//!
//! A [`ToolSpec`] carries everything the configuration file (or an embedded
//! caller) says about a tool. The runtime state lives on
//! [`Tool`](crate::tools::Tool); the spec is what survives restarts.

use crate::config::INBOX_CAPACITY;
use crate::policies::RestartPolicy;
use crate::tools::OverflowPolicy;

/// Configured shape of one tool.
#[derive(Clone, Debug)]
pub struct ToolSpec {
    /// Unique short name.
    pub name: String,
    /// Command line to run through the host shell.
    pub command: String,
    /// Operator-visible description.
    pub description: String,
    /// Start the tool at kernel initialization.
    pub autostart: bool,
    /// Restart the tool after a crash, up to `max_restarts` attempts.
    pub restart_on_crash: bool,
    /// Bound on crash-restart attempts.
    pub max_restarts: u32,
    /// When the kernel starts the tool on its own.
    pub restart_policy: RestartPolicy,
    /// Subscription patterns: exact event types or `*`.
    pub subscriptions: Vec<String>,
    /// Inbox capacity in lines.
    pub queue_capacity: usize,
    /// Inbox overflow policy.
    pub queue_policy: OverflowPolicy,
}

impl ToolSpec {
    /// Creates a spec with the given name and command and default knobs.
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            description: String::new(),
            autostart: false,
            restart_on_crash: false,
            max_restarts: 3,
            restart_policy: RestartPolicy::default(),
            subscriptions: Vec::new(),
            queue_capacity: INBOX_CAPACITY,
            queue_policy: OverflowPolicy::default(),
        }
    }

    /// Sets the description.
    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = text.into();
        self
    }

    /// Enables crash restarts with the given attempt bound.
    pub fn restart_on_crash(mut self, max_restarts: u32) -> Self {
        self.restart_on_crash = true;
        self.max_restarts = max_restarts;
        self
    }

    /// Sets the restart policy.
    pub fn restart_policy(mut self, policy: RestartPolicy) -> Self {
        self.restart_policy = policy;
        self
    }

    /// Adds a subscription pattern.
    pub fn subscribe(mut self, pattern: impl Into<String>) -> Self {
        self.subscriptions.push(pattern.into());
        self
    }

    /// Sizes the inbox.
    pub fn queue(mut self, capacity: usize, policy: OverflowPolicy) -> Self {
        self.queue_capacity = capacity;
        self.queue_policy = policy;
        self
    }
}
