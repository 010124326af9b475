//! Typed configuration schema.

use std::collections::HashSet;
use std::sync::Arc;

use hub_registry::{
    MethodDeclaration, MethodRegistry, ToolDefinition, ToolRegistry, ToolRegistryConfig,
    ValidationMode, ValidationOptions,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ConfigError, ConfigResult};

/// Root of a hub configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HubConfig {
    /// Default validation settings; CLI flags override them.
    #[serde(default)]
    pub validation: ValidationSettings,
    /// Tool definitions.
    #[serde(default)]
    pub tools: Vec<ToolDefinition>,
    /// Method declarations compared against code registrations.
    #[serde(default)]
    pub methods: Vec<MethodDeclaration>,
}

/// `validation:` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValidationSettings {
    /// Fail on errors and treat orphaned methods as errors.
    #[serde(default)]
    pub strict: bool,
    /// Run parameter and classification drift checks.
    #[serde(default = "enabled")]
    pub drift_detection: bool,
}

fn enabled() -> bool {
    true
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            strict: false,
            drift_detection: true,
        }
    }
}

impl ValidationSettings {
    /// Converts the settings into validator options.
    #[must_use]
    pub fn options(self) -> ValidationOptions {
        ValidationOptions {
            mode: if self.strict {
                ValidationMode::Strict
            } else {
                ValidationMode::Warning
            },
            drift_detection: self.drift_detection,
        }
    }
}

impl HubConfig {
    /// Checks cross-entry consistency the schema cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a tool name or method declaration
    /// appears twice.
    pub fn validate(&self) -> ConfigResult<()> {
        let mut tools = HashSet::new();
        for tool in &self.tools {
            if !tools.insert(tool.name().as_str()) {
                return Err(ConfigError::Invalid {
                    reason: format!("tool `{}` is defined more than once", tool.name()),
                });
            }
        }

        let mut methods = HashSet::new();
        for declaration in &self.methods {
            if !methods.insert(declaration.name.as_str()) {
                return Err(ConfigError::Invalid {
                    reason: format!("method `{}` is declared more than once", declaration.name),
                });
            }
        }
        Ok(())
    }

    /// Builds a tool registry over `methods` holding the configured tools.
    ///
    /// Method resolution is deferred so the validator can report every
    /// dangling reference instead of failing on the first one.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Registry`] when a tool definition is malformed.
    pub fn tool_registry(&self, methods: Arc<MethodRegistry>) -> ConfigResult<ToolRegistry> {
        let registry = ToolRegistry::with_config(
            methods,
            ToolRegistryConfig {
                strict: self.validation.strict,
                defer_method_resolution: true,
            },
        );
        self.apply(&registry)?;
        Ok(registry)
    }

    /// Replaces every tool in `registry` with the configured tools.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Registry`] when the registry rejects the batch;
    /// the registry is left unchanged in that case.
    pub fn apply(&self, registry: &ToolRegistry) -> ConfigResult<usize> {
        let count = registry.reload(self.tools.clone())?;
        info!(tools = count, declarations = self.methods.len(), "configuration applied");
        Ok(count)
    }
}
