//! # Restart policies for supervised tools.
//!
//! [`RestartPolicy`] determines how a tool's lifecycle is driven by the
//! kernel outside of explicit operator commands.
//!
//! - [`RestartPolicy::Never`] the tool only runs when started explicitly.
//! - [`RestartPolicy::Always`] the tool is kept running by the kernel.
//! - [`RestartPolicy::OnDemand`] the tool is started automatically the first
//!   time an event matches one of its subscriptions.
//!
//! Crash recovery is governed separately by the tool's `restart_on_crash`
//! flag and `max_restarts` bound.

/// Policy controlling when the kernel starts a tool on its own.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RestartPolicy {
    /// Only explicit `start` commands run this tool (default).
    Never,
    /// The kernel keeps the tool running.
    Always,
    /// The kernel starts the tool when a subscribed event arrives.
    OnDemand,
}

impl Default for RestartPolicy {
    /// Returns [`RestartPolicy::Never`].
    fn default() -> Self {
        RestartPolicy::Never
    }
}

impl RestartPolicy {
    /// Parses the configuration-file spelling (`never`, `always`,
    /// `on_demand`), case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "never" => Some(RestartPolicy::Never),
            "always" => Some(RestartPolicy::Always),
            "on_demand" | "ondemand" => Some(RestartPolicy::OnDemand),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_config_spellings() {
        assert_eq!(RestartPolicy::parse("never"), Some(RestartPolicy::Never));
        assert_eq!(RestartPolicy::parse("ALWAYS"), Some(RestartPolicy::Always));
        assert_eq!(
            RestartPolicy::parse(" on_demand "),
            Some(RestartPolicy::OnDemand)
        );
        assert_eq!(RestartPolicy::parse("sometimes"), None);
    }
}
