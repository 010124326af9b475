//! Tool definitions and the tool registry.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, RwLock};

use hub_primitives::{
    ClassificationOverride, Constraints, MethodName, ParamType, ParameterDescriptor, ToolName,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{EntryKind, RegistryError, RegistryResult};
use crate::inheritance::{EffectiveParameter, ToolIssue, ToolResolution};
use crate::method::{MethodRegistry, RegistrationOutcome};

/// Parameter declared by a tool, either overriding an inherited parameter or
/// adding a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeclaredParameter {
    /// Parameter name.
    pub name: String,
    /// Declared type.
    #[serde(rename = "type")]
    pub ty: ParamType,
    /// Declared requiredness. Unset keeps the inherited value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    /// Description shown to agents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Default value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl DeclaredParameter {
    /// Declares a parameter with unspecified requiredness.
    #[must_use]
    pub fn new(name: impl Into<String>, ty: ParamType) -> Self {
        Self {
            name: name.into(),
            ty,
            required: None,
            description: None,
            default: None,
        }
    }

    /// Sets requiredness.
    #[must_use]
    pub fn required(mut self, required: bool) -> Self {
        self.required = Some(required);
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    /// Descriptor used when the parameter is an addition.
    #[must_use]
    pub fn to_descriptor(&self) -> ParameterDescriptor {
        ParameterDescriptor {
            name: self.name.clone(),
            ty: self.ty,
            required: self.required.unwrap_or(false),
            default: self.default.clone(),
            constraints: Constraints::default(),
            description: self.description.clone(),
        }
    }
}

/// Agent-invocable tool bound to exactly one method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolDefinition {
    name: ToolName,
    #[serde(rename = "method")]
    method_name: MethodName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    parameters: Vec<DeclaredParameter>,
    #[serde(default, skip_serializing_if = "ClassificationOverride::is_empty")]
    classification: ClassificationOverride,
}

impl ToolDefinition {
    /// Creates a tool that calls `method` with the method's parameters.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Primitive`] when either name is malformed.
    pub fn new(name: impl Into<String>, method: impl Into<String>) -> RegistryResult<Self> {
        Ok(Self {
            name: ToolName::new(name)?,
            method_name: MethodName::new(method)?,
            description: None,
            parameters: Vec::new(),
            classification: ClassificationOverride::default(),
        })
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Declares an override or additional parameter.
    #[must_use]
    pub fn with_parameter(mut self, parameter: DeclaredParameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Sets the classification override.
    #[must_use]
    pub fn with_classification(mut self, classification: ClassificationOverride) -> Self {
        self.classification = classification;
        self
    }

    /// Returns the tool name.
    #[must_use]
    pub fn name(&self) -> &ToolName {
        &self.name
    }

    /// Returns the referenced method name.
    #[must_use]
    pub fn method_name(&self) -> &MethodName {
        &self.method_name
    }

    /// Returns the description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the declared parameters.
    #[must_use]
    pub fn parameters(&self) -> &[DeclaredParameter] {
        &self.parameters
    }

    /// Returns the classification override.
    #[must_use]
    pub fn classification(&self) -> &ClassificationOverride {
        &self.classification
    }

    /// Checks that declared parameters are well formed.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidDefinition`] for blank or duplicated
    /// parameter names.
    pub fn validate(&self) -> RegistryResult<()> {
        let mut seen = HashSet::new();
        for parameter in &self.parameters {
            if parameter.name.trim().is_empty() {
                return Err(RegistryError::invalid(format!(
                    "tool `{}` declares a parameter with an empty name",
                    self.name
                )));
            }
            if !seen.insert(parameter.name.as_str()) {
                return Err(RegistryError::invalid(format!(
                    "tool `{}` declares parameter `{}` more than once",
                    self.name, parameter.name
                )));
            }
        }
        Ok(())
    }
}

/// Behaviour switches for [`ToolRegistry`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ToolRegistryConfig {
    /// Reject replacing a registered tool with a different definition.
    pub strict: bool,
    /// Accept tools whose method is not registered; the validator reports them.
    pub defer_method_resolution: bool,
}

#[derive(Default)]
struct ToolTable {
    order: Vec<Arc<ToolDefinition>>,
    index: HashMap<String, usize>,
}

impl ToolTable {
    fn upsert(&mut self, tool: Arc<ToolDefinition>) -> RegistrationOutcome {
        let name = tool.name().to_string();
        if let Some(&slot) = self.index.get(&name) {
            self.order[slot] = tool;
            RegistrationOutcome::Replaced
        } else {
            self.index.insert(name, self.order.len());
            self.order.push(tool);
            RegistrationOutcome::Inserted
        }
    }

    fn get(&self, name: &str) -> Option<&Arc<ToolDefinition>> {
        self.index.get(name).and_then(|&slot| self.order.get(slot))
    }
}

type CachedResolution = (u64, Arc<ToolResolution>);

/// Registry of tools, resolved against a shared [`MethodRegistry`].
///
/// Resolutions are computed lazily and cached per tool until either registry
/// changes.
pub struct ToolRegistry {
    methods: Arc<MethodRegistry>,
    config: ToolRegistryConfig,
    inner: RwLock<ToolTable>,
    cache: RwLock<HashMap<String, CachedResolution>>,
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("config", &self.config)
            .field("tools", &self.len())
            .field("methods", &self.methods.len())
            .finish()
    }
}

impl ToolRegistry {
    /// Creates an empty registry with default settings.
    #[must_use]
    pub fn new(methods: Arc<MethodRegistry>) -> Self {
        Self::with_config(methods, ToolRegistryConfig::default())
    }

    /// Creates an empty registry with the supplied settings.
    #[must_use]
    pub fn with_config(methods: Arc<MethodRegistry>, config: ToolRegistryConfig) -> Self {
        Self {
            methods,
            config,
            inner: RwLock::new(ToolTable::default()),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the method registry tools resolve against.
    #[must_use]
    pub fn methods(&self) -> &Arc<MethodRegistry> {
        &self.methods
    }

    /// Returns the registry settings.
    #[must_use]
    pub fn config(&self) -> ToolRegistryConfig {
        self.config
    }

    /// Registers a tool.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownMethod`] when the referenced method is
    /// not registered and resolution is not deferred,
    /// [`RegistryError::DuplicateName`] in strict mode when a different tool
    /// already uses the name, and [`RegistryError::InvalidDefinition`] when the
    /// declared parameters are malformed.
    ///
    /// # Panics
    ///
    /// Panics if the internal registry lock is poisoned.
    pub fn register(&self, tool: ToolDefinition) -> RegistryResult<RegistrationOutcome> {
        tool.validate()?;
        self.check_method(&tool)?;

        let mut table = self.inner.write().expect("tool registry poisoned");
        if self.config.strict
            && let Some(existing) = table.get(tool.name().as_str())
            && **existing != tool
        {
            return Err(RegistryError::DuplicateName {
                kind: EntryKind::Tool,
                name: tool.name().to_string(),
            });
        }

        let name = tool.name().to_string();
        let method = tool.method_name().to_string();
        let outcome = table.upsert(Arc::new(tool));
        drop(table);
        self.invalidate();

        match outcome {
            RegistrationOutcome::Inserted => {
                info!(tool = %name, method = %method, "tool registered");
            }
            RegistrationOutcome::Replaced => {
                debug!(tool = %name, method = %method, "replacing tool definition");
            }
        }
        Ok(outcome)
    }

    /// Atomically replaces every tool with `tools`.
    ///
    /// Nothing changes when any definition is rejected.
    ///
    /// # Errors
    ///
    /// Same conditions as [`ToolRegistry::register`], applied to the whole
    /// batch; in strict mode a name repeated inside the batch is a
    /// [`RegistryError::DuplicateName`].
    ///
    /// # Panics
    ///
    /// Panics if the internal registry lock is poisoned.
    pub fn reload(&self, tools: Vec<ToolDefinition>) -> RegistryResult<usize> {
        let mut next = ToolTable::default();
        for tool in tools {
            tool.validate()?;
            self.check_method(&tool)?;
            if self.config.strict
                && let Some(existing) = next.get(tool.name().as_str())
                && **existing != tool
            {
                return Err(RegistryError::DuplicateName {
                    kind: EntryKind::Tool,
                    name: tool.name().to_string(),
                });
            }
            next.upsert(Arc::new(tool));
        }

        let count = next.order.len();
        *self.inner.write().expect("tool registry poisoned") = next;
        self.invalidate();
        info!(tools = count, "tool registry reloaded");
        Ok(count)
    }

    /// Returns the tool registered under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<ToolDefinition>> {
        self.inner.read().ok()?.get(name).cloned()
    }

    /// Looks up a tool by name.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] when the name is not registered.
    pub fn lookup(&self, name: &str) -> RegistryResult<Arc<ToolDefinition>> {
        self.get(name).ok_or_else(|| RegistryError::NotFound {
            kind: EntryKind::Tool,
            name: name.to_owned(),
        })
    }

    /// Lists every tool in registration order.
    #[must_use]
    pub fn list(&self) -> Vec<Arc<ToolDefinition>> {
        self.inner
            .read()
            .map(|table| table.order.clone())
            .unwrap_or_default()
    }

    /// Lists the tools that reference `method`.
    #[must_use]
    pub fn referencing(&self, method: &str) -> Vec<Arc<ToolDefinition>> {
        self.list()
            .into_iter()
            .filter(|tool| tool.method_name().as_str() == method)
            .collect()
    }

    /// Returns the number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().map(|table| table.order.len()).unwrap_or(0)
    }

    /// Returns `true` when no tool is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolves a tool against its method, reusing a cached resolution when
    /// neither registry changed since it was computed.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] when the tool is not registered.
    pub fn resolve(&self, name: &str) -> RegistryResult<Arc<ToolResolution>> {
        let tool = self.lookup(name)?;
        Ok(self.resolve_definition(tool))
    }

    /// Resolves every tool in registration order.
    #[must_use]
    pub fn resolutions(&self) -> Vec<Arc<ToolResolution>> {
        self.list()
            .into_iter()
            .map(|tool| self.resolve_definition(tool))
            .collect()
    }

    /// Returns the merged parameters of a tool.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] for unknown tools and
    /// [`RegistryError::UnknownMethod`] when the referenced method is missing.
    pub fn effective_parameters(&self, name: &str) -> RegistryResult<Vec<EffectiveParameter>> {
        let resolution = self.resolve(name)?;
        if let Some(ToolIssue::MissingMethod { method }) = resolution
            .issues()
            .iter()
            .find(|issue| matches!(issue, ToolIssue::MissingMethod { .. }))
        {
            return Err(RegistryError::UnknownMethod {
                tool: name.to_owned(),
                method: method.to_string(),
            });
        }
        Ok(resolution.parameters().to_vec())
    }

    fn resolve_definition(&self, tool: Arc<ToolDefinition>) -> Arc<ToolResolution> {
        let generation = self.methods.generation();
        let key = tool.name().to_string();

        if let Ok(cache) = self.cache.read()
            && let Some((cached_generation, resolution)) = cache.get(&key)
            && *cached_generation == generation
            && Arc::ptr_eq(resolution.tool(), &tool)
        {
            return Arc::clone(resolution);
        }

        let method = self.methods.get(tool.method_name().as_str());
        let resolution = Arc::new(ToolResolution::resolve(tool, method));
        for issue in resolution.issues() {
            debug!(
                tool = %key,
                kind = %issue.kind(),
                issue = %issue.message(),
                "tool resolution issue"
            );
        }
        if let Ok(mut cache) = self.cache.write() {
            cache.insert(key, (generation, Arc::clone(&resolution)));
        }
        resolution
    }

    fn check_method(&self, tool: &ToolDefinition) -> RegistryResult<()> {
        if self.methods.contains(tool.method_name().as_str()) {
            return Ok(());
        }
        if self.config.defer_method_resolution {
            warn!(
                tool = %tool.name(),
                method = %tool.method_name(),
                "deferring unresolved method reference"
            );
            return Ok(());
        }
        Err(RegistryError::UnknownMethod {
            tool: tool.name().to_string(),
            method: tool.method_name().to_string(),
        })
    }

    fn invalidate(&self) {
        if let Ok(mut cache) = self.cache.write() {
            cache.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use hub_primitives::{Capability, Classification, Contract, Domain, FieldSchema, Subdomain};
    use serde_json::json;

    use crate::method::{MethodDefinition, MethodInvocation};

    fn methods() -> Arc<MethodRegistry> {
        let registry = MethodRegistry::new();
        registry
            .register(create_casefile(ParamType::String))
            .unwrap();
        Arc::new(registry)
    }

    fn create_casefile(title: ParamType) -> MethodDefinition {
        MethodDefinition::builder("workspace.casefile.create_casefile")
            .unwrap()
            .classification(Classification::new(
                Domain::Workspace,
                Subdomain::Casefile,
                Capability::Create,
            ))
            .request(
                Contract::new("CreateCasefileRequest", vec![FieldSchema::new("title", title)])
                    .unwrap(),
            )
            .handler("casefile.create", |_: MethodInvocation| async move {
                Ok(json!({}))
            })
            .unwrap()
            .build()
            .unwrap()
    }

    fn tool(name: &str) -> ToolDefinition {
        ToolDefinition::new(name, "workspace.casefile.create_casefile").unwrap()
    }

    #[test]
    fn unknown_method_is_rejected_unless_deferred() {
        let registry = ToolRegistry::new(methods());
        let err = registry
            .register(ToolDefinition::new("ghost", "workspace.casefile.ghost").unwrap())
            .expect_err("unknown method");
        assert!(matches!(err, RegistryError::UnknownMethod { .. }));

        let deferred = ToolRegistry::with_config(
            methods(),
            ToolRegistryConfig {
                defer_method_resolution: true,
                ..ToolRegistryConfig::default()
            },
        );
        deferred
            .register(ToolDefinition::new("ghost", "workspace.casefile.ghost").unwrap())
            .unwrap();
        assert!(!deferred.resolve("ghost").unwrap().is_valid());
        assert!(matches!(
            deferred.effective_parameters("ghost"),
            Err(RegistryError::UnknownMethod { .. })
        ));
    }

    #[test]
    fn effective_parameters_contain_inherited() {
        let registry = ToolRegistry::new(methods());
        registry.register(tool("create_casefile")).unwrap();
        let params = registry.effective_parameters("create_casefile").unwrap();
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].parameter.name, "title");
        assert!(params[0].parameter.required);
    }

    #[test]
    fn resolution_cache_tracks_method_changes() {
        let methods = methods();
        let registry = ToolRegistry::new(Arc::clone(&methods));
        registry.register(tool("create_casefile")).unwrap();

        let first = registry.resolve("create_casefile").unwrap();
        let again = registry.resolve("create_casefile").unwrap();
        assert!(Arc::ptr_eq(&first, &again));

        methods.register(create_casefile(ParamType::Integer)).unwrap();
        let refreshed = registry.resolve("create_casefile").unwrap();
        assert!(!Arc::ptr_eq(&first, &refreshed));
        assert_eq!(refreshed.parameters()[0].parameter.ty, ParamType::Integer);
    }

    #[test]
    fn strict_mode_rejects_different_replacement() {
        let registry = ToolRegistry::with_config(
            methods(),
            ToolRegistryConfig {
                strict: true,
                ..ToolRegistryConfig::default()
            },
        );
        registry.register(tool("create_casefile")).unwrap();
        registry.register(tool("create_casefile")).unwrap();

        let err = registry
            .register(tool("create_casefile").with_description("changed"))
            .expect_err("strict replacement");
        assert!(matches!(err, RegistryError::DuplicateName { kind: EntryKind::Tool, .. }));
    }

    #[test]
    fn lenient_replacement_keeps_slot() {
        let registry = ToolRegistry::new(methods());
        registry.register(tool("a_tool")).unwrap();
        registry.register(tool("b_tool")).unwrap();
        let outcome = registry
            .register(tool("a_tool").with_description("v2"))
            .unwrap();
        assert_eq!(outcome, RegistrationOutcome::Replaced);

        let names: Vec<_> = registry.list().iter().map(|t| t.name().to_string()).collect();
        assert_eq!(names, ["a_tool", "b_tool"]);
        assert_eq!(registry.lookup("a_tool").unwrap().description(), Some("v2"));
    }

    #[test]
    fn reload_is_all_or_nothing() {
        let registry = ToolRegistry::new(methods());
        registry.register(tool("original")).unwrap();

        let err = registry
            .reload(vec![
                tool("fresh"),
                ToolDefinition::new("ghost", "workspace.casefile.ghost").unwrap(),
            ])
            .expect_err("unknown method in batch");
        assert!(matches!(err, RegistryError::UnknownMethod { .. }));
        assert!(registry.get("original").is_some());

        assert_eq!(registry.reload(vec![tool("fresh")]).unwrap(), 1);
        assert!(registry.get("original").is_none());
        assert_eq!(registry.referencing("workspace.casefile.create_casefile").len(), 1);
    }

    #[test]
    fn duplicate_declared_parameters_are_invalid() {
        let registry = ToolRegistry::new(methods());
        let err = registry
            .register(
                tool("create_casefile")
                    .with_parameter(DeclaredParameter::new("note", ParamType::String))
                    .with_parameter(DeclaredParameter::new("note", ParamType::String)),
            )
            .expect_err("duplicate parameter");
        assert!(matches!(err, RegistryError::InvalidDefinition { .. }));
    }

    #[test]
    fn tool_definitions_deserialize_from_config_shape() {
        let tool: ToolDefinition = serde_json::from_value(json!({
            "name": "create_casefile",
            "method": "workspace.casefile.create_casefile",
            "parameters": [{ "name": "title", "type": "string", "required": true }],
            "classification": { "maturity": "beta" }
        }))
        .unwrap();
        assert_eq!(tool.method_name().as_str(), "workspace.casefile.create_casefile");
        assert_eq!(tool.parameters()[0].required, Some(true));
        assert!(!tool.classification().is_empty());
    }
}
