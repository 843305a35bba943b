//! # Tool registry: the in-memory table of registered tools.
//!
//! The registry exclusively owns each [`Tool`] record and preserves
//! registration order, which is also fan-out order. It is mutated only from
//! the supervisor loop's thread of control, so a plain `Vec` is the right
//! shape; iteration hands out ordinary slice iterators.

use std::time::Duration;

use crate::config::MAX_TOOL_NAME;
use crate::error::KernelError;
use crate::tools::{Tool, ToolSpec};

/// Registration-ordered table of tools, bounded by `max_tools`.
#[derive(Debug)]
pub struct Registry {
    tools: Vec<Tool>,
    max_tools: usize,
}

impl Registry {
    /// Creates a registry holding at most `max_tools` tools.
    pub fn new(max_tools: usize) -> Self {
        Self {
            tools: Vec::new(),
            max_tools: max_tools.max(1),
        }
    }

    /// Registers a tool. Rejects empty or over-long names, duplicates, and
    /// registration past the bound.
    pub fn register(&mut self, spec: ToolSpec) -> Result<(), KernelError> {
        if spec.name.is_empty() {
            return Err(KernelError::InvalidArg {
                reason: "tool name is empty".to_string(),
            });
        }
        if spec.name.len() > MAX_TOOL_NAME {
            return Err(KernelError::InvalidArg {
                reason: format!("tool name longer than {MAX_TOOL_NAME} bytes"),
            });
        }
        if self.find(&spec.name).is_some() {
            return Err(KernelError::AlreadyExists { name: spec.name });
        }
        if self.tools.len() >= self.max_tools {
            return Err(KernelError::RegistryFull {
                max: self.max_tools,
            });
        }
        log::info!("registered tool '{}'", spec.name);
        self.tools.push(Tool::new(spec));
        Ok(())
    }

    /// Stops and removes a tool. The child is terminated if still running
    /// and the inbox is drained.
    pub async fn unregister(&mut self, name: &str, grace: Duration) -> Result<(), KernelError> {
        let index = self
            .tools
            .iter()
            .position(|t| t.name() == name)
            .ok_or_else(|| KernelError::NotFound {
                name: name.to_string(),
            })?;
        self.tools[index].stop(grace).await;
        self.tools.remove(index);
        log::info!("unregistered tool '{name}'");
        Ok(())
    }

    /// Looks a tool up by name.
    pub fn find(&self, name: &str) -> Option<&Tool> {
        self.tools.iter().find(|t| t.name() == name)
    }

    /// Looks a tool up by name, mutably.
    pub fn find_mut(&mut self, name: &str) -> Option<&mut Tool> {
        self.tools.iter_mut().find(|t| t.name() == name)
    }

    /// Adds a subscription pattern to a registered tool.
    pub fn subscribe(&mut self, name: &str, pattern: &str) -> Result<(), KernelError> {
        let tool = self.find_mut(name).ok_or_else(|| KernelError::NotFound {
            name: name.to_string(),
        })?;
        tool.subscribe(pattern)
    }

    /// Iterates tools in registration order.
    pub fn iter(&self) -> std::slice::Iter<'_, Tool> {
        self.tools.iter()
    }

    /// Iterates tools in registration order, mutably.
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Tool> {
        self.tools.iter_mut()
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Configured bound on registered tools.
    pub fn capacity(&self) -> usize {
        self.max_tools
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_names_are_rejected() {
        let mut registry = Registry::new(8);
        registry.register(ToolSpec::new("a", "true")).unwrap();
        let err = registry.register(ToolSpec::new("a", "false")).unwrap_err();
        assert_eq!(err.as_label(), "already_exists");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn registration_is_bounded() {
        let mut registry = Registry::new(2);
        registry.register(ToolSpec::new("a", "true")).unwrap();
        registry.register(ToolSpec::new("b", "true")).unwrap();
        let err = registry.register(ToolSpec::new("c", "true")).unwrap_err();
        assert_eq!(err.as_label(), "registry_full");
    }

    #[test]
    fn bad_names_are_rejected() {
        let mut registry = Registry::new(8);
        assert!(registry.register(ToolSpec::new("", "true")).is_err());
        let long = "n".repeat(MAX_TOOL_NAME + 1);
        assert!(registry.register(ToolSpec::new(long, "true")).is_err());
    }

    #[tokio::test]
    async fn register_then_unregister_leaves_no_trace() {
        let mut registry = Registry::new(8);
        let before = registry.len();
        registry.register(ToolSpec::new("ephemeral", "true")).unwrap();
        registry
            .unregister("ephemeral", Duration::from_millis(100))
            .await
            .unwrap();
        assert!(registry.find("ephemeral").is_none());
        assert_eq!(registry.len(), before);
    }

    #[tokio::test]
    async fn unregister_unknown_is_not_found() {
        let mut registry = Registry::new(8);
        let err = registry
            .unregister("ghost", Duration::from_millis(10))
            .await
            .unwrap_err();
        assert_eq!(err.as_label(), "not_found");
    }

    #[test]
    fn iteration_preserves_registration_order() {
        let mut registry = Registry::new(8);
        for name in ["third", "first", "second"] {
            registry.register(ToolSpec::new(name, "true")).unwrap();
        }
        let names: Vec<&str> = registry.iter().map(Tool::name).collect();
        assert_eq!(names, vec!["third", "first", "second"]);
    }

    #[test]
    fn subscribe_targets_the_named_tool() {
        let mut registry = Registry::new(8);
        registry.register(ToolSpec::new("listener", "cat")).unwrap();
        registry.subscribe("listener", "STATUS").unwrap();
        assert!(registry.find("listener").unwrap().matches("STATUS"));
        assert_eq!(
            registry.subscribe("ghost", "STATUS").unwrap_err().as_label(),
            "not_found"
        );
    }
}
