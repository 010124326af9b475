//! Method definitions, bound implementations, and the method registry.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use hub_policy::{CallerContext, MethodPolicy};
use hub_primitives::{
    Capability, Classification, Complexity, Contract, Domain, IntegrationTier, Maturity,
    MethodName, RequestId, Subdomain,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::{EntryKind, MethodResult, RegistryError, RegistryResult};

/// Input handed to a method implementation after the payload has been bound.
#[derive(Debug, Clone)]
pub struct MethodInvocation {
    method: MethodName,
    request_id: RequestId,
    payload: Map<String, Value>,
    caller: CallerContext,
}

impl MethodInvocation {
    /// Creates an invocation for `method`.
    #[must_use]
    pub fn new(
        method: MethodName,
        request_id: RequestId,
        payload: Map<String, Value>,
        caller: CallerContext,
    ) -> Self {
        Self {
            method,
            request_id,
            payload,
            caller,
        }
    }

    /// Returns the invoked method name.
    #[must_use]
    pub fn method(&self) -> &MethodName {
        &self.method
    }

    /// Returns the identifier of the request being served.
    #[must_use]
    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    /// Returns the bound payload.
    #[must_use]
    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    /// Returns a single bound parameter.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.payload.get(name)
    }

    /// Returns a string parameter, if present and a string.
    #[must_use]
    pub fn str_param(&self, name: &str) -> Option<&str> {
        self.payload.get(name).and_then(Value::as_str)
    }

    /// Returns the caller context.
    #[must_use]
    pub fn caller(&self) -> &CallerContext {
        &self.caller
    }
}

/// Trait implemented by method implementations.
#[async_trait]
pub trait MethodHandler: Send + Sync {
    /// Performs the work for one invocation, returning the response payload.
    async fn call(&self, invocation: MethodInvocation) -> MethodResult<Value>;
}

#[async_trait]
impl<F, Fut> MethodHandler for F
where
    F: Send + Sync + Fn(MethodInvocation) -> Fut,
    Fut: Future<Output = MethodResult<Value>> + Send,
{
    async fn call(&self, invocation: MethodInvocation) -> MethodResult<Value> {
        (self)(invocation).await
    }
}

/// Named pointer to the callable that implements a method.
///
/// Two references are the same implementation when their keys match.
#[derive(Clone)]
pub struct ImplementationRef {
    key: String,
    handler: Arc<dyn MethodHandler>,
}

impl ImplementationRef {
    /// Binds `handler` under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidDefinition`] when the key is empty.
    pub fn new<H>(key: impl Into<String>, handler: H) -> RegistryResult<Self>
    where
        H: MethodHandler + 'static,
    {
        Self::from_arc(key, Arc::new(handler))
    }

    /// Binds an already shared handler under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidDefinition`] when the key is empty.
    pub fn from_arc(
        key: impl Into<String>,
        handler: Arc<dyn MethodHandler>,
    ) -> RegistryResult<Self> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(RegistryError::invalid("implementation key cannot be empty"));
        }
        Ok(Self { key, handler })
    }

    /// Returns the implementation key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns a shared handle to the handler.
    #[must_use]
    pub fn handler(&self) -> Arc<dyn MethodHandler> {
        Arc::clone(&self.handler)
    }
}

impl fmt::Debug for ImplementationRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImplementationRef")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

/// Handlers available for binding by key during startup.
#[derive(Default)]
pub struct ImplementationCatalog {
    entries: HashMap<String, Arc<dyn MethodHandler>>,
}

impl fmt::Debug for ImplementationCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.entries.keys().collect();
        keys.sort();
        f.debug_struct("ImplementationCatalog")
            .field("keys", &keys)
            .finish()
    }
}

impl ImplementationCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a handler under `key`, replacing any previous handler.
    pub fn insert<H>(&mut self, key: impl Into<String>, handler: H)
    where
        H: MethodHandler + 'static,
    {
        self.entries.insert(key.into(), Arc::new(handler));
    }

    /// Resolves `key` to an implementation reference.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] when no handler is bound to `key`.
    pub fn resolve(&self, key: &str) -> RegistryResult<ImplementationRef> {
        let handler = self.entries.get(key).ok_or_else(|| RegistryError::NotFound {
            kind: EntryKind::Method,
            name: format!("implementation:{key}"),
        })?;
        ImplementationRef::from_arc(key, Arc::clone(handler))
    }

    /// Returns the number of bound handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when no handler is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Whether a method must be reachable through a tool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Exposed to agents; coverage requires at least one tool.
    #[default]
    Public,
    /// Called only by other services; exempt from coverage.
    Internal,
}

/// Registered service method.
pub struct MethodDefinition {
    name: MethodName,
    description: Option<String>,
    version: String,
    classification: Classification,
    request: Contract,
    response: Contract,
    policy: MethodPolicy,
    implementation: ImplementationRef,
    enabled: bool,
    visibility: Visibility,
}

impl fmt::Debug for MethodDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDefinition")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("classification", &self.classification)
            .field("request", &self.request.name())
            .field("implementation", &self.implementation.key())
            .field("enabled", &self.enabled)
            .field("visibility", &self.visibility)
            .finish_non_exhaustive()
    }
}

impl MethodDefinition {
    /// Starts building a method definition.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Primitive`] when the name is malformed.
    pub fn builder(name: impl Into<String>) -> RegistryResult<MethodBuilder> {
        Ok(MethodBuilder {
            name: MethodName::new(name)?,
            description: None,
            version: "1.0.0".into(),
            classification: None,
            request: None,
            response: None,
            policy: MethodPolicy::default(),
            implementation: None,
            enabled: true,
            visibility: Visibility::Public,
        })
    }

    /// Returns the method name.
    #[must_use]
    pub fn name(&self) -> &MethodName {
        &self.name
    }

    /// Returns the optional description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the version string.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Returns the classification.
    #[must_use]
    pub fn classification(&self) -> &Classification {
        &self.classification
    }

    /// Returns the request payload contract.
    #[must_use]
    pub fn request_contract(&self) -> &Contract {
        &self.request
    }

    /// Returns the response payload contract.
    #[must_use]
    pub fn response_contract(&self) -> &Contract {
        &self.response
    }

    /// Returns the execution policy.
    #[must_use]
    pub fn policy(&self) -> &MethodPolicy {
        &self.policy
    }

    /// Returns the bound implementation.
    #[must_use]
    pub fn implementation(&self) -> &ImplementationRef {
        &self.implementation
    }

    /// Returns `true` when the method accepts calls.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns the visibility.
    #[must_use]
    pub fn visibility(&self) -> Visibility {
        self.visibility
    }
}

/// Builder for [`MethodDefinition`].
pub struct MethodBuilder {
    name: MethodName,
    description: Option<String>,
    version: String,
    classification: Option<Classification>,
    request: Option<Contract>,
    response: Option<Contract>,
    policy: MethodPolicy,
    implementation: Option<ImplementationRef>,
    enabled: bool,
    visibility: Visibility,
}

impl MethodBuilder {
    /// Sets the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the version string.
    #[must_use]
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Sets the classification.
    #[must_use]
    pub fn classification(mut self, classification: Classification) -> Self {
        self.classification = Some(classification);
        self
    }

    /// Sets the request payload contract.
    #[must_use]
    pub fn request(mut self, contract: Contract) -> Self {
        self.request = Some(contract);
        self
    }

    /// Sets the response payload contract.
    #[must_use]
    pub fn response(mut self, contract: Contract) -> Self {
        self.response = Some(contract);
        self
    }

    /// Sets the execution policy.
    #[must_use]
    pub fn policy(mut self, policy: MethodPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Binds the implementation.
    #[must_use]
    pub fn implementation(mut self, implementation: ImplementationRef) -> Self {
        self.implementation = Some(implementation);
        self
    }

    /// Binds a handler under `key` in one step.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidDefinition`] when the key is empty.
    pub fn handler<H>(self, key: impl Into<String>, handler: H) -> RegistryResult<Self>
    where
        H: MethodHandler + 'static,
    {
        Ok(self.implementation(ImplementationRef::new(key, handler)?))
    }

    /// Binds the handler registered under `key` in `catalog`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnresolvedImplementation`] when the catalog has
    /// no handler for `key`.
    pub fn bind_from(self, catalog: &ImplementationCatalog, key: &str) -> RegistryResult<Self> {
        let implementation =
            catalog
                .resolve(key)
                .map_err(|_| RegistryError::UnresolvedImplementation {
                    method: self.name.to_string(),
                    reason: format!("no handler bound to `{key}`"),
                })?;
        Ok(self.implementation(implementation))
    }

    /// Marks the method disabled; it stays registered but rejects calls and is
    /// exempt from coverage.
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Marks the method internal-only.
    #[must_use]
    pub fn internal(mut self) -> Self {
        self.visibility = Visibility::Internal;
        self
    }

    /// Finalises the definition.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnresolvedImplementation`] when no
    /// implementation is bound, [`RegistryError::InvalidDefinition`] when the
    /// classification or version is missing, and [`RegistryError::Policy`] when
    /// the policy is unusable.
    pub fn build(self) -> RegistryResult<MethodDefinition> {
        let implementation =
            self.implementation
                .ok_or_else(|| RegistryError::UnresolvedImplementation {
                    method: self.name.to_string(),
                    reason: "no implementation bound".into(),
                })?;

        let classification = self.classification.ok_or_else(|| {
            RegistryError::invalid(format!("method `{}` has no classification", self.name))
        })?;

        if self.version.trim().is_empty() {
            return Err(RegistryError::invalid(format!(
                "method `{}` version cannot be empty",
                self.name
            )));
        }

        self.policy.validate()?;

        let request = self
            .request
            .unwrap_or_else(|| Contract::empty(format!("{}.request", self.name)));
        let response = self
            .response
            .unwrap_or_else(|| Contract::empty(format!("{}.response", self.name)));

        Ok(MethodDefinition {
            name: self.name,
            description: self.description,
            version: self.version,
            classification,
            request,
            response,
            policy: self.policy,
            implementation,
            enabled: self.enabled,
            visibility: self.visibility,
        })
    }
}

/// Whether a registration added a new entry or replaced one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationOutcome {
    /// The name was new.
    Inserted,
    /// An existing entry with the same name was replaced.
    Replaced,
}

/// Criteria for [`MethodRegistry::list_by`]. Unset criteria match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MethodFilter {
    domain: Option<Domain>,
    subdomain: Option<Subdomain>,
    capability: Option<Capability>,
    complexity: Option<Complexity>,
    maturity: Option<Maturity>,
    integration_tier: Option<IntegrationTier>,
    enabled: Option<bool>,
    visibility: Option<Visibility>,
}

impl MethodFilter {
    /// Filter that matches every method.
    #[must_use]
    pub fn any() -> Self {
        Self::default()
    }

    /// Restricts to a domain.
    #[must_use]
    pub fn domain(mut self, domain: Domain) -> Self {
        self.domain = Some(domain);
        self
    }

    /// Restricts to a subdomain.
    #[must_use]
    pub fn subdomain(mut self, subdomain: Subdomain) -> Self {
        self.subdomain = Some(subdomain);
        self
    }

    /// Restricts to a capability.
    #[must_use]
    pub fn capability(mut self, capability: Capability) -> Self {
        self.capability = Some(capability);
        self
    }

    /// Restricts to a complexity.
    #[must_use]
    pub fn complexity(mut self, complexity: Complexity) -> Self {
        self.complexity = Some(complexity);
        self
    }

    /// Restricts to a maturity.
    #[must_use]
    pub fn maturity(mut self, maturity: Maturity) -> Self {
        self.maturity = Some(maturity);
        self
    }

    /// Restricts to an integration tier.
    #[must_use]
    pub fn integration_tier(mut self, tier: IntegrationTier) -> Self {
        self.integration_tier = Some(tier);
        self
    }

    /// Restricts to enabled (or disabled) methods.
    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    /// Restricts to a visibility.
    #[must_use]
    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = Some(visibility);
        self
    }

    /// Returns `true` when `method` satisfies every set criterion.
    #[must_use]
    pub fn matches(&self, method: &MethodDefinition) -> bool {
        let c = method.classification();
        self.domain.is_none_or(|v| v == c.domain)
            && self.subdomain.is_none_or(|v| v == c.subdomain)
            && self.capability.is_none_or(|v| v == c.capability)
            && self.complexity.is_none_or(|v| v == c.complexity)
            && self.maturity.is_none_or(|v| v == c.maturity)
            && self.integration_tier.is_none_or(|v| v == c.integration_tier)
            && self.enabled.is_none_or(|v| v == method.is_enabled())
            && self.visibility.is_none_or(|v| v == method.visibility())
    }
}

/// Snapshot of the registry filtered lazily on iteration.
///
/// Iterating twice yields the same sequence, in registration order.
#[derive(Debug, Clone)]
pub struct MethodListing {
    snapshot: Arc<[Arc<MethodDefinition>]>,
    filter: MethodFilter,
}

impl MethodListing {
    /// Iterates the matching definitions in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<MethodDefinition>> + '_ {
        self.snapshot
            .iter()
            .filter(move |method| self.filter.matches(method))
    }

    /// Collects the matching method names.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.iter().map(|method| method.name().as_str()).collect()
    }
}

impl<'a> IntoIterator for &'a MethodListing {
    type Item = &'a Arc<MethodDefinition>;
    type IntoIter = Box<dyn Iterator<Item = &'a Arc<MethodDefinition>> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

#[derive(Default)]
struct MethodTable {
    order: Vec<Arc<MethodDefinition>>,
    index: HashMap<String, usize>,
}

/// Registry that stores method definitions keyed by name, in registration
/// order.
#[derive(Default)]
pub struct MethodRegistry {
    inner: RwLock<MethodTable>,
    strict: bool,
    generation: AtomicU64,
}

impl fmt::Debug for MethodRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self
            .inner
            .read()
            .map(|table| table.order.iter().map(|m| m.name().to_string()).collect())
            .unwrap_or_default();
        f.debug_struct("MethodRegistry")
            .field("strict", &self.strict)
            .field("registered", &names)
            .finish()
    }
}

impl MethodRegistry {
    /// Creates an empty registry where re-registration replaces silently.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty registry that rejects re-registering a name with a
    /// different implementation.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Self::default()
        }
    }

    /// Returns `true` when strict mode is active.
    #[must_use]
    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Counter bumped on every mutation. Used to invalidate derived caches.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Registers a method definition.
    ///
    /// Re-registering an existing name replaces the definition in place, so
    /// it keeps its original position in listings.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateName`] in strict mode when the name is
    /// already bound to a different implementation.
    ///
    /// # Panics
    ///
    /// Panics if the internal registry lock is poisoned.
    pub fn register(&self, definition: MethodDefinition) -> RegistryResult<RegistrationOutcome> {
        let mut table = self.inner.write().expect("method registry poisoned");
        let name = definition.name().to_string();

        let outcome = if let Some(&slot) = table.index.get(&name) {
            let existing_key = table.order[slot].implementation().key();
            let incoming_key = definition.implementation().key();
            if self.strict && existing_key != incoming_key {
                return Err(RegistryError::DuplicateName {
                    kind: EntryKind::Method,
                    name,
                });
            }
            debug!(method = %name, implementation = incoming_key, "replacing method definition");
            table.order[slot] = Arc::new(definition);
            RegistrationOutcome::Replaced
        } else {
            let slot = table.order.len();
            table.index.insert(name.clone(), slot);
            table.order.push(Arc::new(definition));
            info!(method = %name, "method registered");
            RegistrationOutcome::Inserted
        };

        self.generation.fetch_add(1, Ordering::AcqRel);
        Ok(outcome)
    }

    /// Returns the definition registered under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<MethodDefinition>> {
        let table = self.inner.read().ok()?;
        let slot = *table.index.get(name)?;
        table.order.get(slot).cloned()
    }

    /// Looks up a definition by name.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] when the name is not registered.
    pub fn lookup(&self, name: &str) -> RegistryResult<Arc<MethodDefinition>> {
        self.get(name).ok_or_else(|| RegistryError::NotFound {
            kind: EntryKind::Method,
            name: name.to_owned(),
        })
    }

    /// Returns `true` when `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Lists matching definitions in registration order.
    ///
    /// # Panics
    ///
    /// Panics if the internal registry lock is poisoned.
    #[must_use]
    pub fn list_by(&self, filter: MethodFilter) -> MethodListing {
        let table = self.inner.read().expect("method registry poisoned");
        MethodListing {
            snapshot: table.order.iter().cloned().collect(),
            filter,
        }
    }

    /// Lists every definition in registration order.
    #[must_use]
    pub fn list(&self) -> MethodListing {
        self.list_by(MethodFilter::any())
    }

    /// Returns the number of registered methods.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().map(|table| table.order.len()).unwrap_or(0)
    }

    /// Returns `true` when no method is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
