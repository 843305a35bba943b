//! # Kernel configuration.
//!
//! Configuration is a keyed text file with one `[core]` block and one
//! `[tool:NAME]` block per tool:
//!
//! ```text
//! [core]
//! log_file = logs/toolvisor.log
//! log_level = INFO
//! control_port = 9300
//!
//! [tool:probe]
//! command = ./probe --interval 5
//! autostart = yes
//! restart_on_crash = yes
//! subscribe_to = STATUS, *
//! queue_policy = drop_oldest
//! ```
//!
//! `#` and `;` start comment lines; booleans accept `yes`/`no`,
//! `true`/`false`, `1`/`0`. [`Config`] also carries the loop knobs (tick,
//! grace, drain budget, backoff) that have compiled-in defaults and are
//! mostly of interest to tests.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::LevelFilter;

use crate::error::KernelError;
use crate::policies::{BackoffPolicy, RestartPolicy};
use crate::tools::{OverflowPolicy, ToolSpec};

/// Maximum tool-name length in bytes.
pub const MAX_TOOL_NAME: usize = 64;
/// Maximum event-type length in bytes.
pub const MAX_EVENT_TYPE: usize = 64;
/// Maximum event-payload length in bytes.
pub const MAX_EVENT_DATA: usize = 4096;
/// Default bound on registered tools.
pub const MAX_TOOLS: usize = 100;
/// Bound on subscription patterns per tool.
pub const MAX_SUBSCRIPTIONS: usize = 50;
/// Default capacity of the publish queue.
pub const BUS_CAPACITY: usize = 1024;
/// Default capacity of a tool's inbox.
pub const INBOX_CAPACITY: usize = 100;
/// Cap on one reassembled line from a child stream.
pub const MAX_LINE_BYTES: usize = 8 * 1024;
/// Per-stream byte budget for one loop iteration.
pub const DRAIN_BUDGET: usize = 64 * 1024;

/// Process-wide kernel configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// Log sink path.
    pub log_file: PathBuf,
    /// Log threshold.
    pub log_level: LevelFilter,
    /// Pid-file path, if one should be written.
    pub pid_file: Option<PathBuf>,
    /// Bound on registered tools.
    pub max_tools: usize,
    /// Capacity of the publish queue.
    pub bus_capacity: usize,
    /// Keep a ring of diagnostic records.
    pub enable_debug: bool,
    /// Loopback control-socket port; `None` disables the local transport.
    pub control_port: Option<u16>,
    /// Supervisor loop cadence.
    pub tick: Duration,
    /// Grace window for terminating a child.
    pub grace: Duration,
    /// Per-stream byte budget per iteration.
    pub drain_budget: usize,
    /// Crash-restart backoff.
    pub backoff: BackoffPolicy,
    /// Tools declared in the configuration file.
    pub tools: Vec<ToolSpec>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_file: PathBuf::from("logs/toolvisor.log"),
            log_level: LevelFilter::Info,
            pid_file: None,
            max_tools: MAX_TOOLS,
            bus_capacity: BUS_CAPACITY,
            enable_debug: false,
            control_port: None,
            tick: Duration::from_millis(100),
            grace: Duration::from_secs(1),
            drain_budget: DRAIN_BUDGET,
            backoff: BackoffPolicy::default(),
            tools: Vec::new(),
        }
    }
}

impl Config {
    /// Loads and parses a configuration file.
    pub fn load(path: &Path) -> Result<Self, KernelError> {
        let text = fs::read_to_string(path).map_err(|e| KernelError::Config {
            reason: format!("cannot read {}: {e}", path.display()),
        })?;
        Self::parse(&text)
    }

    /// Parses configuration text.
    pub fn parse(text: &str) -> Result<Self, KernelError> {
        let mut cfg = Config::default();
        let mut section = Section::None;

        for (lineno, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if let Some(header) = line.strip_prefix('[') {
                let header = header.strip_suffix(']').ok_or_else(|| KernelError::Config {
                    reason: format!("line {}: unterminated section header", lineno + 1),
                })?;
                section = Section::open(header, &mut cfg, lineno + 1)?;
                continue;
            }

            let (key, value) = line.split_once('=').ok_or_else(|| KernelError::Config {
                reason: format!("line {}: expected key = value", lineno + 1),
            })?;
            let key = key.trim();
            let value = value.trim();

            match section {
                Section::None => {
                    return Err(KernelError::Config {
                        reason: format!("line {}: key '{key}' outside any section", lineno + 1),
                    });
                }
                Section::Core => apply_core_key(&mut cfg, key, value, lineno + 1)?,
                Section::Tool(index) => {
                    apply_tool_key(&mut cfg.tools[index], key, value, lineno + 1)?
                }
                Section::Unknown => {
                    log::debug!("config line {}: ignoring key '{key}'", lineno + 1);
                }
            }
        }

        for tool in &cfg.tools {
            if tool.command.is_empty() {
                return Err(KernelError::Config {
                    reason: format!("tool '{}' has no command", tool.name),
                });
            }
        }
        Ok(cfg)
    }
}

#[derive(Clone, Copy)]
enum Section {
    None,
    Core,
    Tool(usize),
    Unknown,
}

impl Section {
    fn open(header: &str, cfg: &mut Config, lineno: usize) -> Result<Self, KernelError> {
        let header = header.trim();
        if header.eq_ignore_ascii_case("core") {
            return Ok(Section::Core);
        }
        if let Some(name) = header
            .strip_prefix("tool:")
            .or_else(|| header.strip_prefix("TOOL:"))
        {
            let name = name.trim();
            if name.is_empty() {
                return Err(KernelError::Config {
                    reason: format!("line {lineno}: tool section with empty name"),
                });
            }
            if cfg.tools.iter().any(|t| t.name == name) {
                return Err(KernelError::Config {
                    reason: format!("line {lineno}: duplicate tool section '{name}'"),
                });
            }
            cfg.tools.push(ToolSpec::new(name, ""));
            return Ok(Section::Tool(cfg.tools.len() - 1));
        }
        log::debug!("config line {lineno}: ignoring section [{header}]");
        Ok(Section::Unknown)
    }
}

fn apply_core_key(
    cfg: &mut Config,
    key: &str,
    value: &str,
    lineno: usize,
) -> Result<(), KernelError> {
    match key {
        "log_file" => cfg.log_file = PathBuf::from(value),
        "log_level" => {
            cfg.log_level = parse_log_level(value).ok_or_else(|| KernelError::Config {
                reason: format!("line {lineno}: unknown log level '{value}'"),
            })?
        }
        "pid_file" => cfg.pid_file = Some(PathBuf::from(value)),
        "max_tools" => cfg.max_tools = parse_number(key, value, lineno)?,
        "message_queue_size" => cfg.bus_capacity = parse_number(key, value, lineno)?,
        "enable_debug" => cfg.enable_debug = parse_bool(key, value, lineno)?,
        "control_port" => {
            cfg.control_port = Some(parse_number::<u16>(key, value, lineno)?);
        }
        other => log::debug!("config line {lineno}: ignoring core key '{other}'"),
    }
    Ok(())
}

fn apply_tool_key(
    tool: &mut ToolSpec,
    key: &str,
    value: &str,
    lineno: usize,
) -> Result<(), KernelError> {
    match key {
        "command" => tool.command = value.to_string(),
        "description" => tool.description = value.to_string(),
        "autostart" => tool.autostart = parse_bool(key, value, lineno)?,
        "restart_on_crash" => tool.restart_on_crash = parse_bool(key, value, lineno)?,
        "max_restarts" => tool.max_restarts = parse_number(key, value, lineno)?,
        "restart_policy" => {
            tool.restart_policy = RestartPolicy::parse(value).ok_or_else(|| KernelError::Config {
                reason: format!("line {lineno}: unknown restart policy '{value}'"),
            })?
        }
        "subscribe_to" => {
            tool.subscriptions = value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        "max_queue_size" => tool.queue_capacity = parse_number(key, value, lineno)?,
        "queue_policy" => {
            tool.queue_policy = OverflowPolicy::parse(value).ok_or_else(|| KernelError::Config {
                reason: format!("line {lineno}: unknown queue policy '{value}'"),
            })?
        }
        other => log::debug!("config line {lineno}: ignoring tool key '{other}'"),
    }
    Ok(())
}

/// Maps a configured threshold name onto the `log` facade. `FATAL` has no
/// facade counterpart and folds into `ERROR`.
pub fn parse_log_level(value: &str) -> Option<LevelFilter> {
    match value.trim().to_ascii_uppercase().as_str() {
        "TRACE" => Some(LevelFilter::Trace),
        "DEBUG" => Some(LevelFilter::Debug),
        "INFO" => Some(LevelFilter::Info),
        "WARN" => Some(LevelFilter::Warn),
        "ERROR" | "FATAL" => Some(LevelFilter::Error),
        _ => None,
    }
}

fn parse_bool(key: &str, value: &str, lineno: usize) -> Result<bool, KernelError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "yes" | "true" | "1" => Ok(true),
        "no" | "false" | "0" => Ok(false),
        _ => Err(KernelError::Config {
            reason: format!("line {lineno}: key '{key}' expects a boolean, got '{value}'"),
        }),
    }
}

fn parse_number<T: std::str::FromStr>(
    key: &str,
    value: &str,
    lineno: usize,
) -> Result<T, KernelError> {
    value.trim().parse().map_err(|_| KernelError::Config {
        reason: format!("line {lineno}: key '{key}' expects a number, got '{value}'"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
# toolvisor sample configuration
[core]
log_file = logs/run.log
log_level = DEBUG
pid_file = run.pid
max_tools = 10
message_queue_size = 256
enable_debug = yes
control_port = 9300

[tool:probe]
command = ./probe --interval 5
description = system probe
autostart = yes
restart_on_crash = yes
max_restarts = 5
restart_policy = always
subscribe_to = STATUS, ALERT , *
max_queue_size = 16
queue_policy = drop_newest

[tool:sink]
command = cat
"#;

    #[test]
    fn parses_the_documented_surface() {
        let cfg = Config::parse(SAMPLE).unwrap();
        assert_eq!(cfg.log_file, PathBuf::from("logs/run.log"));
        assert_eq!(cfg.log_level, LevelFilter::Debug);
        assert_eq!(cfg.pid_file, Some(PathBuf::from("run.pid")));
        assert_eq!(cfg.max_tools, 10);
        assert_eq!(cfg.bus_capacity, 256);
        assert!(cfg.enable_debug);
        assert_eq!(cfg.control_port, Some(9300));

        assert_eq!(cfg.tools.len(), 2);
        let probe = &cfg.tools[0];
        assert_eq!(probe.name, "probe");
        assert_eq!(probe.command, "./probe --interval 5");
        assert!(probe.autostart);
        assert!(probe.restart_on_crash);
        assert_eq!(probe.max_restarts, 5);
        assert_eq!(probe.restart_policy, RestartPolicy::Always);
        assert_eq!(probe.subscriptions, vec!["STATUS", "ALERT", "*"]);
        assert_eq!(probe.queue_capacity, 16);
        assert_eq!(probe.queue_policy, OverflowPolicy::DropNewest);

        let sink = &cfg.tools[1];
        assert_eq!(sink.command, "cat");
        assert!(!sink.autostart);
        assert_eq!(sink.queue_capacity, INBOX_CAPACITY);
    }

    #[test]
    fn tool_without_command_is_an_error() {
        let err = Config::parse("[tool:empty]\ndescription = nothing\n").unwrap_err();
        assert_eq!(err.as_label(), "config");
    }

    #[test]
    fn duplicate_tool_sections_are_rejected() {
        let text = "[tool:a]\ncommand = true\n[tool:a]\ncommand = false\n";
        assert!(Config::parse(text).is_err());
    }

    #[test]
    fn fatal_folds_into_error_threshold() {
        assert_eq!(parse_log_level("FATAL"), Some(LevelFilter::Error));
        assert_eq!(parse_log_level("warn"), Some(LevelFilter::Warn));
        assert_eq!(parse_log_level("loud"), None);
    }

    #[test]
    fn keys_outside_sections_are_rejected() {
        assert!(Config::parse("command = true\n").is_err());
    }

    #[test]
    fn comments_and_unknown_keys_are_tolerated() {
        let text = "[core]\n; semicolon comment\nnot_a_real_key = 1\n";
        let cfg = Config::parse(text).unwrap();
        assert_eq!(cfg.max_tools, MAX_TOOLS);
    }
}
