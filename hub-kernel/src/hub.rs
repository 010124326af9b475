//! The request orchestrator.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use hub_policy::{DeclaredPolicyEngine, PolicyEngine, PolicyRequest};
use hub_primitives::{Contract, ErrorKind, ToolName};
use hub_registry::{
    DriftValidator, MethodDeclaration, MethodDefinition, MethodInvocation, MethodRegistry,
    ToolRegistry, ValidationMode, ValidationOptions, ValidationReport,
};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::envelope::{ErrorInfo, RequestEnvelope, ResponseEnvelope, ResponseMetadata};
use crate::error::{HubError, HubResult};
use crate::lifecycle::{RequestEvent, RequestLifecycle};
use crate::observer::DispatchObserver;
use crate::scheduler::{DispatchScheduler, closed_response};

/// Resolves requests against the registries, enforces method policy, binds
/// payloads, and runs implementations under their declared timeout.
///
/// The hub holds no per-request state; any number of dispatches may run
/// concurrently on one instance.
pub struct Hub {
    tools: Arc<ToolRegistry>,
    policy: Option<Arc<dyn PolicyEngine>>,
    observer: Option<Arc<dyn DispatchObserver>>,
    scheduler: DispatchScheduler,
    startup_report: Option<ValidationReport>,
}

impl fmt::Debug for Hub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hub")
            .field("tools", &self.tools)
            .field("policy_configured", &self.policy.is_some())
            .field("observer_configured", &self.observer.is_some())
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}

impl Hub {
    /// Creates a hub over `tools` and the method registry behind it.
    #[must_use]
    pub fn new(tools: Arc<ToolRegistry>) -> Self {
        Self {
            tools,
            policy: None,
            observer: None,
            scheduler: DispatchScheduler::default(),
            startup_report: None,
        }
    }

    /// Starts a builder that validates the registries before handing out a hub.
    #[must_use]
    pub fn builder(tools: Arc<ToolRegistry>) -> HubBuilder {
        HubBuilder {
            hub: Self::new(tools),
            options: ValidationOptions::default(),
            declarations: Vec::new(),
        }
    }

    /// Adds a policy engine consulted after the declared method policy.
    #[must_use]
    pub fn with_policy(mut self, policy: Arc<dyn PolicyEngine>) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Installs a dispatch observer.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn DispatchObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Replaces the scheduler used by [`Hub::submit`].
    #[must_use]
    pub fn with_scheduler(mut self, scheduler: DispatchScheduler) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Returns the tool registry.
    #[must_use]
    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    /// Returns the method registry.
    #[must_use]
    pub fn methods(&self) -> &Arc<MethodRegistry> {
        self.tools.methods()
    }

    /// Returns the scheduler used for detached dispatch.
    #[must_use]
    pub fn scheduler(&self) -> &DispatchScheduler {
        &self.scheduler
    }

    /// Returns the report produced by [`HubBuilder::build`], if any.
    #[must_use]
    pub fn startup_report(&self) -> Option<&ValidationReport> {
        self.startup_report.as_ref()
    }

    /// Runs one request to a terminal state.
    ///
    /// Never fails: every problem becomes a failed response with a
    /// machine-readable kind.
    pub async fn dispatch(&self, request: RequestEnvelope) -> ResponseEnvelope {
        let mut lifecycle = RequestLifecycle::new(request.request_id().clone());
        let mut route = Route::default();

        let outcome = self.run(&request, &mut lifecycle, &mut route).await;
        let event = if outcome.is_ok() {
            RequestEvent::Complete
        } else {
            RequestEvent::Fail
        };
        if let Err(err) = lifecycle.transition(event) {
            warn!(%err, "request finished from an unexpected state");
        }

        let metadata = ResponseMetadata {
            execution_time: lifecycle.execution_time(),
            method: route.method,
            tool: route.tool,
            completed_at: Some(Utc::now()),
        };
        let response = match outcome {
            Ok(payload) => {
                ResponseEnvelope::completed(request.request_id().clone(), payload, metadata)
            }
            Err(error) => ResponseEnvelope::failed(request.request_id().clone(), error, metadata),
        };

        if let Some(observer) = &self.observer {
            observer.on_response(&response);
        }
        response
    }

    /// Dispatches every request concurrently, returning responses in input
    /// order.
    pub async fn dispatch_all(&self, requests: Vec<RequestEnvelope>) -> Vec<ResponseEnvelope> {
        futures::future::join_all(requests.into_iter().map(|request| self.dispatch(request))).await
    }

    /// Hands a request to the scheduler and returns a receipt at once.
    ///
    /// The receipt is pending while the request waits or runs. When the
    /// scheduler is already closed the receipt is the final failed response
    /// and nothing is spawned.
    pub fn submit(self: &Arc<Self>, request: RequestEnvelope) -> Submission {
        let request_id = request.request_id().clone();
        let metadata = ResponseMetadata {
            tool: self
                .tools
                .get(request.operation())
                .map(|tool| tool.name().to_string()),
            ..ResponseMetadata::default()
        };

        if self.scheduler.is_closed() {
            let receipt = closed_response(request_id, metadata);
            if let Some(observer) = &self.observer {
                observer.on_response(&receipt);
            }
            return Submission {
                receipt,
                handle: None,
            };
        }

        let receipt = ResponseEnvelope::pending(request_id.clone(), metadata.clone());
        let hub = Arc::clone(self);
        let handle = self
            .scheduler
            .run(request_id, metadata, async move { hub.dispatch(request).await });
        if let Some(observer) = &self.observer {
            observer.on_response(&receipt);
        }
        Submission {
            receipt,
            handle: Some(handle),
        }
    }

    async fn run(
        &self,
        request: &RequestEnvelope,
        lifecycle: &mut RequestLifecycle,
        route: &mut Route,
    ) -> Result<Value, ErrorInfo> {
        let Target {
            method,
            tool,
            contract,
        } = self.resolve(request.operation())?;
        route.method = Some(method.name().to_string());
        route.tool = tool.as_ref().map(ToString::to_string);

        if !method.is_enabled() {
            return Err(ErrorInfo::new(
                ErrorKind::PolicyViolation,
                format!("method `{}` is disabled", method.name()),
            ));
        }

        self.enforce_policy(request, &method, tool).await?;
        advance(lifecycle, RequestEvent::Validate);

        let contract = contract.as_ref().unwrap_or_else(|| method.request_contract());
        let bound = contract.bind(request.payload()).map_err(|violations| {
            let detail: Vec<String> = violations.iter().map(ToString::to_string).collect();
            ErrorInfo::new(ErrorKind::Validation, detail.join("; "))
        })?;
        if !bound.ignored().is_empty() {
            debug!(
                request_id = %request.request_id(),
                contract = contract.name(),
                ignored = ?bound.ignored(),
                "dropping fields not in the request contract"
            );
        }
        advance(lifecycle, RequestEvent::Execute);

        let invocation = MethodInvocation::new(
            method.name().clone(),
            request.request_id().clone(),
            bound.into_values(),
            request.caller().clone(),
        );
        execute(&method, invocation).await
    }

    fn resolve(&self, operation: &str) -> Result<Target, ErrorInfo> {
        if self.tools.get(operation).is_some() {
            let resolution = self
                .tools
                .resolve(operation)
                .map_err(|err| ErrorInfo::new(err.kind(), err.to_string()))?;
            if let Some(issue) = resolution.fatal_issue() {
                return Err(ErrorInfo::new(
                    issue.kind(),
                    format!("tool `{operation}` is invalid: {}", issue.message()),
                ));
            }
            let method = resolution.method().cloned().ok_or_else(|| {
                ErrorInfo::new(
                    ErrorKind::MissingMethod,
                    format!("tool `{operation}` has no resolved method"),
                )
            })?;
            return Ok(Target {
                method,
                tool: Some(resolution.tool().name().clone()),
                contract: resolution.request_contract().cloned(),
            });
        }

        let method = self.methods().get(operation).ok_or_else(|| {
            ErrorInfo::new(
                ErrorKind::NotFound,
                format!("no tool or method named `{operation}`"),
            )
        })?;
        Ok(Target {
            method,
            tool: None,
            contract: None,
        })
    }

    async fn enforce_policy(
        &self,
        request: &RequestEnvelope,
        method: &MethodDefinition,
        tool: Option<ToolName>,
    ) -> Result<(), ErrorInfo> {
        let mut policy_request = PolicyRequest::new(
            method.name().clone(),
            method.policy().clone(),
            request.caller().clone(),
        );
        if let Some(tool) = tool {
            policy_request = policy_request.via_tool(tool);
        }

        let mut decision = DeclaredPolicyEngine::check(&policy_request);
        if decision.is_allow()
            && let Some(engine) = &self.policy
        {
            decision = engine.evaluate(&policy_request).await.map_err(|err| {
                ErrorInfo::new(
                    ErrorKind::PolicyViolation,
                    format!("policy engine error: {err}"),
                )
            })?;
        }

        if let Some(observer) = &self.observer {
            observer.on_decision(&policy_request, &decision);
        }

        if decision.is_allow() {
            Ok(())
        } else {
            Err(ErrorInfo::new(
                ErrorKind::PolicyViolation,
                decision.describe(&policy_request.label()),
            ))
        }
    }
}

async fn execute(
    method: &MethodDefinition,
    invocation: MethodInvocation,
) -> Result<Value, ErrorInfo> {
    let handler = method.implementation().handler();
    let timeout = method.policy().timeout();
    let mut task = tokio::spawn(async move { handler.call(invocation).await });

    match tokio::time::timeout(timeout, &mut task).await {
        Err(_) => {
            task.abort();
            Err(ErrorInfo::new(
                ErrorKind::Timeout,
                format!(
                    "method `{}` exceeded its {} ms timeout",
                    method.name(),
                    timeout.as_millis()
                ),
            ))
        }
        Ok(Err(join)) if join.is_panic() => Err(ErrorInfo::new(
            ErrorKind::Execution,
            format!("method `{}` panicked", method.name()),
        )),
        Ok(Err(join)) => Err(ErrorInfo::new(
            ErrorKind::Execution,
            format!("method `{}` task failed: {join}", method.name()),
        )),
        Ok(Ok(Err(err))) => Err(ErrorInfo::new(ErrorKind::Execution, err.to_string())),
        Ok(Ok(Ok(payload))) => Ok(payload),
    }
}

fn advance(lifecycle: &mut RequestLifecycle, event: RequestEvent) {
    if let Err(err) = lifecycle.transition(event) {
        warn!(%err, "unexpected request transition");
    }
}

/// Method a request resolved to. Tool routes bind against the tool's merged
/// contract; direct method calls use the method's own.
struct Target {
    method: Arc<MethodDefinition>,
    tool: Option<ToolName>,
    contract: Option<Contract>,
}

#[derive(Debug, Default)]
struct Route {
    method: Option<String>,
    tool: Option<String>,
}

/// Pending receipt plus the handle resolving to the final response.
#[derive(Debug)]
pub struct Submission {
    receipt: ResponseEnvelope,
    handle: Option<JoinHandle<ResponseEnvelope>>,
}

impl Submission {
    /// Returns the pending receipt.
    #[must_use]
    pub fn receipt(&self) -> &ResponseEnvelope {
        &self.receipt
    }

    /// Waits for the final response.
    ///
    /// A request the scheduler never ran resolves to a failed response with
    /// its own request id.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::TaskFailed`] when the task was cancelled or
    /// panicked.
    pub async fn wait(self) -> HubResult<ResponseEnvelope> {
        let Some(handle) = self.handle else {
            return Ok(self.receipt);
        };
        handle.await.map_err(|err| HubError::TaskFailed {
            reason: err.to_string(),
        })
    }
}

/// Builds a [`Hub`] after validating the registries.
pub struct HubBuilder {
    hub: Hub,
    options: ValidationOptions,
    declarations: Vec<MethodDeclaration>,
}

impl fmt::Debug for HubBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HubBuilder")
            .field("options", &self.options)
            .field("declarations", &self.declarations.len())
            .finish_non_exhaustive()
    }
}

impl HubBuilder {
    /// Sets the startup validation options.
    #[must_use]
    pub fn validation(mut self, options: ValidationOptions) -> Self {
        self.options = options;
        self
    }

    /// Supplies method declarations to compare with the code.
    #[must_use]
    pub fn declarations(mut self, declarations: Vec<MethodDeclaration>) -> Self {
        self.declarations = declarations;
        self
    }

    /// Adds a policy engine.
    #[must_use]
    pub fn policy(mut self, policy: Arc<dyn PolicyEngine>) -> Self {
        self.hub = self.hub.with_policy(policy);
        self
    }

    /// Installs a dispatch observer.
    #[must_use]
    pub fn observer(mut self, observer: Arc<dyn DispatchObserver>) -> Self {
        self.hub = self.hub.with_observer(observer);
        self
    }

    /// Replaces the scheduler.
    #[must_use]
    pub fn scheduler(mut self, scheduler: DispatchScheduler) -> Self {
        self.hub = self.hub.with_scheduler(scheduler);
        self
    }

    /// Validates the registries and returns the hub.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::StartupRejected`] in strict mode when the report
    /// contains errors.
    pub fn build(mut self) -> HubResult<Hub> {
        let report = DriftValidator::new(&self.hub.tools, self.options)
            .validate_with(&self.declarations);

        if self.options.mode == ValidationMode::Strict && report.has_errors() {
            return Err(HubError::StartupRejected {
                report: Box::new(report),
            });
        }

        info!(
            methods = report.methods_checked(),
            tools = report.tools_checked(),
            warnings = report.warnings().count(),
            errors = report.errors().count(),
            "hub ready"
        );
        self.hub.startup_report = Some(report);
        Ok(self.hub)
    }
}
