//! # Control-line grammar and response rendering.
//!
//! A command is one line: a case-insensitive verb, optionally followed by
//! a tool name. Responses are human-readable text whose first word is
//! `Success:`, `Error:`, or a table header for multi-line output.

use crate::error::KernelError;
use crate::tools::ToolInfo;

/// One operator command, independent of the transport it arrived on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ControlRequest {
    Start(String),
    Stop(String),
    Restart(String),
    Status(String),
    List,
    Shutdown,
    Uptime,
    Version,
    Exists(String),
    Count,
    Help,
}

impl ControlRequest {
    /// Parses one command line. The verb is case-insensitive; verbs that
    /// act on a tool require its name as the second token.
    pub fn parse(line: &str) -> Result<Self, KernelError> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Err(KernelError::InvalidArg {
                reason: "empty command".to_string(),
            });
        };
        let verb = verb.to_ascii_lowercase();
        let arg = words.next();

        let named = |arg: Option<&str>| -> Result<String, KernelError> {
            arg.map(str::to_string).ok_or_else(|| KernelError::InvalidArg {
                reason: format!("'{verb}' requires a tool name"),
            })
        };

        match verb.as_str() {
            "start" => Ok(ControlRequest::Start(named(arg)?)),
            "stop" => Ok(ControlRequest::Stop(named(arg)?)),
            "restart" => Ok(ControlRequest::Restart(named(arg)?)),
            "status" => Ok(ControlRequest::Status(named(arg)?)),
            "exists" => Ok(ControlRequest::Exists(named(arg)?)),
            "list" => Ok(ControlRequest::List),
            "shutdown" => Ok(ControlRequest::Shutdown),
            "uptime" => Ok(ControlRequest::Uptime),
            "version" => Ok(ControlRequest::Version),
            "count" => Ok(ControlRequest::Count),
            "help" => Ok(ControlRequest::Help),
            other => Err(KernelError::InvalidArg {
                reason: format!("unknown command '{other}'"),
            }),
        }
    }
}

/// Rendered outcome of one command.
#[derive(Clone, Debug)]
pub struct ControlResponse {
    /// Whether the command succeeded.
    pub success: bool,
    /// Human-readable response text, newline-terminated.
    pub text: String,
}

impl ControlResponse {
    /// A successful response.
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            success: true,
            text: text.into(),
        }
    }

    /// A failed response rendered from the error kind.
    pub fn failure(err: &KernelError) -> Self {
        Self {
            success: false,
            text: format!("Error: {err}\n"),
        }
    }
}

/// Renders the `status NAME` field list.
pub fn render_status(info: &ToolInfo) -> String {
    let mut out = String::from("Tool Status:\n");
    out.push_str(&format!("  Name: {}\n", info.name));
    out.push_str(&format!("  Command: {}\n", info.command));
    if !info.description.is_empty() {
        out.push_str(&format!("  Description: {}\n", info.description));
    }
    out.push_str(&format!("  Status: {}\n", info.state));
    match info.pid {
        Some(pid) => out.push_str(&format!("  PID: {pid}\n")),
        None => out.push_str("  PID: -\n"),
    }
    out.push_str(&format!("  Autostart: {}\n", yes_no(info.autostart)));
    out.push_str(&format!(
        "  Restart on crash: {}\n",
        yes_no(info.restart_on_crash)
    ));
    out.push_str(&format!(
        "  Restarts: {}/{}\n",
        info.restart_count, info.max_restarts
    ));
    out.push_str(&format!("  Events sent: {}\n", info.events_sent));
    out.push_str(&format!("  Events received: {}\n", info.events_received));
    out.push_str(&format!("  Subscriptions: {}\n", info.subscription_count));
    out
}

/// Renders the `list` table.
pub fn render_list(infos: &[ToolInfo]) -> String {
    let mut out = String::from("Tools Status:\n");
    out.push_str(&format!("{:<20} {:<10} {:<10}\n", "Name", "Status", "PID"));
    out.push_str(&"-".repeat(42));
    out.push('\n');
    for info in infos {
        let pid = info
            .pid
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_string());
        out.push_str(&format!(
            "{:<20} {:<10} {:<10}\n",
            info.name,
            info.state.as_str(),
            pid
        ));
    }
    out
}

/// Renders `uptime` as hours, minutes, seconds.
pub fn render_uptime(seconds: u64) -> String {
    format!(
        "Uptime: {}h {}m {}s\n",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    )
}

/// Renders the `help` verb list.
pub fn render_help() -> String {
    concat!(
        "Available commands:\n",
        "  list             List all tools and their status\n",
        "  start <tool>     Start a tool\n",
        "  stop <tool>      Stop a tool\n",
        "  restart <tool>   Restart a tool\n",
        "  status <tool>    Show detailed tool status\n",
        "  exists <tool>    Check whether a tool is registered\n",
        "  count            Number of registered tools\n",
        "  uptime           Kernel uptime\n",
        "  version          Kernel version\n",
        "  shutdown         Shut the kernel down\n",
        "  help             This message\n",
    )
    .to_string()
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbs_are_case_insensitive() {
        assert_eq!(
            ControlRequest::parse("START probe").unwrap(),
            ControlRequest::Start("probe".to_string())
        );
        assert_eq!(
            ControlRequest::parse("LiSt").unwrap(),
            ControlRequest::List
        );
        assert_eq!(
            ControlRequest::parse("  uptime  ").unwrap(),
            ControlRequest::Uptime
        );
    }

    #[test]
    fn named_verbs_require_an_argument() {
        for verb in ["start", "stop", "restart", "status", "exists"] {
            let err = ControlRequest::parse(verb).unwrap_err();
            assert_eq!(err.as_label(), "invalid_arg");
        }
        assert_eq!(
            ControlRequest::parse("stop probe").unwrap(),
            ControlRequest::Stop("probe".to_string())
        );
    }

    #[test]
    fn unknown_and_empty_commands_are_rejected() {
        assert!(ControlRequest::parse("frobnicate").is_err());
        assert!(ControlRequest::parse("").is_err());
        assert!(ControlRequest::parse("   ").is_err());
    }

    #[test]
    fn failure_responses_start_with_error() {
        let err = KernelError::NotFound {
            name: "probe".to_string(),
        };
        let response = ControlResponse::failure(&err);
        assert!(!response.success);
        assert!(response.text.starts_with("Error:"));
    }

    #[test]
    fn list_rendering_has_a_header_and_one_row_per_tool() {
        use crate::tools::{ToolSpec, Tool};

        let tool = Tool::new(ToolSpec::new("probe", "true"));
        let text = render_list(&[tool.info()]);
        assert!(text.starts_with("Tools Status:\n"));
        assert!(text.contains("probe"));
        assert!(text.contains("STOPPED"));
    }

    #[test]
    fn uptime_rendering_splits_units() {
        assert_eq!(render_uptime(3725), "Uptime: 1h 2m 5s\n");
    }
}
