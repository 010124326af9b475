use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use hub_kernel::{
    CollectingObserver, DispatchObserver, DispatchScheduler, Hub, HubError, RequestEnvelope,
    ResponseStatus,
};
use hub_policy::{
    CallerContext, MethodPolicy, PolicyDecision, PolicyEngine, PolicyRequest, PolicyResult,
};
use hub_primitives::{
    Capability, Classification, Contract, Domain, ErrorKind, FieldSchema, ParamType, Subdomain,
};
use hub_registry::{
    DeclaredParameter, MethodDefinition, MethodError, MethodInvocation, MethodRegistry,
    ToolDefinition, ToolRegistry, ToolRegistryConfig, ValidationOptions,
};
use serde_json::{Value, json};

const CREATE: &str = "workspace.casefile.create_casefile";

fn casefile(capability: Capability) -> Classification {
    Classification::new(Domain::Workspace, Subdomain::Casefile, capability)
}

fn title_contract() -> Contract {
    Contract::new(
        "CreateCasefileRequest",
        vec![FieldSchema::new("title", ParamType::String)],
    )
    .unwrap()
}

/// Method M: `title: string` required, requires auth, 30 s timeout. Counts calls.
fn method_m(calls: Arc<AtomicUsize>) -> MethodDefinition {
    MethodDefinition::builder(CREATE)
        .unwrap()
        .classification(casefile(Capability::Create))
        .request(title_contract())
        .policy(
            MethodPolicy::default()
                .require_auth()
                .with_timeout(Duration::from_secs(30)),
        )
        .handler("casefile.create", move |invocation: MethodInvocation| {
            let calls = Arc::clone(&calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                let title = invocation.str_param("title").unwrap_or_default().to_owned();
                Ok(json!({ "casefile_id": "cf_001", "title": title }))
            }
        })
        .unwrap()
        .build()
        .unwrap()
}

fn registries(methods: Vec<MethodDefinition>, tools: Vec<ToolDefinition>) -> Arc<ToolRegistry> {
    let registry = MethodRegistry::new();
    for method in methods {
        registry.register(method).unwrap();
    }
    let tool_registry = ToolRegistry::with_config(
        Arc::new(registry),
        ToolRegistryConfig {
            defer_method_resolution: true,
            ..ToolRegistryConfig::default()
        },
    );
    for tool in tools {
        tool_registry.register(tool).unwrap();
    }
    Arc::new(tool_registry)
}

fn tool_t() -> ToolDefinition {
    ToolDefinition::new("T", CREATE).unwrap()
}

fn user() -> CallerContext {
    CallerContext::authenticated("user-1")
}

#[tokio::test]
async fn tool_inherits_and_dispatch_completes() {
    let calls = Arc::new(AtomicUsize::new(0));
    let tools = registries(vec![method_m(Arc::clone(&calls))], vec![tool_t()]);

    let params = tools.effective_parameters("T").unwrap();
    assert_eq!(params.len(), 1);
    assert_eq!(params[0].parameter.name, "title");
    assert_eq!(params[0].parameter.ty, ParamType::String);
    assert!(params[0].parameter.required);

    let hub = Hub::new(tools);
    let request = RequestEnvelope::new("T", json!({ "title": "x" })).with_caller(user());
    let request_id = request.request_id().clone();
    let response = hub.dispatch(request).await;

    assert_eq!(response.status(), ResponseStatus::Completed);
    assert_eq!(response.request_id(), &request_id);
    assert_eq!(response.payload().unwrap()["title"], "x");
    assert!(response.error().is_none());
    assert_eq!(response.metadata().method.as_deref(), Some(CREATE));
    assert_eq!(response.metadata().tool.as_deref(), Some("T"));
    assert!(response.metadata().completed_at.is_some());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn missing_required_field_fails_without_invocation() {
    let calls = Arc::new(AtomicUsize::new(0));
    let hub = Hub::new(registries(vec![method_m(Arc::clone(&calls))], vec![tool_t()]));

    let response = hub
        .dispatch(RequestEnvelope::new("T", json!({})).with_caller(user()))
        .await;

    assert_eq!(response.status(), ResponseStatus::Failed);
    assert_eq!(response.error_kind(), Some(ErrorKind::Validation));
    assert!(response.payload().is_none());
    assert!(response.error().unwrap().message.contains("title"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

/// Method with `title` required and `summary` optional that echoes its bound
/// payload.
fn echo_method(calls: Arc<AtomicUsize>) -> MethodDefinition {
    MethodDefinition::builder(CREATE)
        .unwrap()
        .classification(casefile(Capability::Create))
        .request(
            Contract::new(
                "CreateCasefileRequest",
                vec![
                    FieldSchema::new("title", ParamType::String),
                    FieldSchema::new("summary", ParamType::String).optional(),
                ],
            )
            .unwrap(),
        )
        .handler("casefile.create", move |invocation: MethodInvocation| {
            let calls = Arc::clone(&calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(Value::Object(invocation.payload().clone()))
            }
        })
        .unwrap()
        .build()
        .unwrap()
}

#[tokio::test]
async fn tool_overrides_shape_the_dispatch_contract() {
    let calls = Arc::new(AtomicUsize::new(0));
    let tool = ToolDefinition::new("T", CREATE)
        .unwrap()
        .with_parameter(DeclaredParameter::new("summary", ParamType::String).required(true))
        .with_parameter(
            DeclaredParameter::new("dry_run", ParamType::Boolean).with_default(json!(true)),
        );
    let hub = Hub::new(registries(vec![echo_method(Arc::clone(&calls))], vec![tool]));

    let tightened = hub.dispatch(RequestEnvelope::new("T", json!({ "title": "x" }))).await;
    assert_eq!(tightened.error_kind(), Some(ErrorKind::Validation));
    assert!(tightened.error().unwrap().message.contains("summary"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let complete = hub
        .dispatch(RequestEnvelope::new("T", json!({ "title": "x", "summary": "y" })))
        .await;
    assert!(complete.is_completed());
    assert_eq!(
        complete.payload(),
        Some(&json!({ "title": "x", "summary": "y", "dry_run": true }))
    );

    let direct = hub
        .dispatch(RequestEnvelope::new(CREATE, json!({ "title": "x", "dry_run": false })))
        .await;
    assert!(direct.is_completed());
    assert_eq!(direct.payload(), Some(&json!({ "title": "x" })));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn caller_supplied_request_ids_are_echoed() {
    let calls = Arc::new(AtomicUsize::new(0));
    let hub = Hub::new(registries(vec![method_m(Arc::clone(&calls))], vec![tool_t()]));

    let request: RequestEnvelope = serde_json::from_value(json!({
        "request_id": "req-123",
        "operation": "T",
        "payload": { "title": "x" },
        "caller": { "principal": "user-1" },
    }))
    .unwrap();
    let response = hub.dispatch(request).await;

    assert!(response.is_completed());
    assert_eq!(response.request_id().as_str(), "req-123");
    let encoded = serde_json::to_value(&response).unwrap();
    assert_eq!(encoded["request_id"], "req-123");
}

#[tokio::test]
async fn anonymous_caller_is_rejected_before_execution() {
    let calls = Arc::new(AtomicUsize::new(0));
    let observer = CollectingObserver::new();
    let hub = Hub::new(registries(vec![method_m(Arc::clone(&calls))], vec![tool_t()]))
        .with_observer(observer.clone());

    let response = hub
        .dispatch(RequestEnvelope::new(CREATE, json!({ "title": "x" })))
        .await;

    assert_eq!(response.error_kind(), Some(ErrorKind::PolicyViolation));
    assert!(response.error().unwrap().message.contains("authentication required"));
    assert_eq!(response.metadata().execution_time, Duration::ZERO);
    assert_eq!(response.metadata().tool, None);
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    assert_eq!(observer.drain().len(), 1);
    let denials = observer.drain_denials();
    assert_eq!(denials.len(), 1);
    assert_eq!(denials[0].requirement(), Some("auth"));
}

#[tokio::test]
async fn resource_context_and_permissions_are_enforced() {
    let method = MethodDefinition::builder("workspace.casefile.update_casefile")
        .unwrap()
        .classification(casefile(Capability::Update))
        .policy(
            MethodPolicy::default()
                .require_auth()
                .require_resource_context()
                .with_permission("casefile:write"),
        )
        .handler("casefile.update", |_: MethodInvocation| async move {
            Ok(json!({ "updated": true }))
        })
        .unwrap()
        .build()
        .unwrap();
    let hub = Hub::new(registries(vec![method], vec![]));
    let op = "workspace.casefile.update_casefile";

    let response = hub
        .dispatch(RequestEnvelope::new(op, json!({})).with_caller(user()))
        .await;
    assert!(response.error().unwrap().message.contains("resource context required"));

    let response = hub
        .dispatch(RequestEnvelope::new(op, json!({})).with_caller(user().with_resource("cf_001")))
        .await;
    assert!(response.error().unwrap().message.contains("casefile:write"));

    let allowed = user()
        .with_resource("cf_001")
        .with_permissions(["casefile:write"]);
    let response = hub
        .dispatch(RequestEnvelope::new(op, json!({})).with_caller(allowed))
        .await;
    assert!(response.is_completed());
}

#[tokio::test]
async fn timeout_fails_within_bounded_margin() {
    let finished = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&finished);
    let method = MethodDefinition::builder("automation.pipeline.run_pipeline")
        .unwrap()
        .classification(Classification::new(
            Domain::Automation,
            Subdomain::Pipeline,
            Capability::Execute,
        ))
        .policy(MethodPolicy::default().with_timeout(Duration::from_millis(50)))
        .handler("pipeline.run", move |_: MethodInvocation| {
            let counter = Arc::clone(&counter);
            async move {
                tokio::time::sleep(Duration::from_secs(5)).await;
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Value::Null)
            }
        })
        .unwrap()
        .build()
        .unwrap();
    let hub = Hub::new(registries(vec![method], vec![]));

    let started = Instant::now();
    let response = hub
        .dispatch(RequestEnvelope::new("automation.pipeline.run_pipeline", json!({})))
        .await;
    let elapsed = started.elapsed();

    assert_eq!(response.error_kind(), Some(ErrorKind::Timeout));
    assert!(elapsed >= Duration::from_millis(50));
    assert!(elapsed < Duration::from_secs(2), "took {elapsed:?}");
    assert!(response.metadata().execution_time >= Duration::from_millis(50));
    assert_eq!(finished.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn implementation_errors_and_panics_become_execution_failures() {
    let failing = MethodDefinition::builder("communication.gmail.send_message")
        .unwrap()
        .classification(Classification::new(
            Domain::Communication,
            Subdomain::Gmail,
            Capability::Create,
        ))
        .handler("gmail.send", |_: MethodInvocation| async move {
            Err::<Value, _>(MethodError::execution("mail provider unavailable"))
        })
        .unwrap()
        .build()
        .unwrap();
    let panicking = MethodDefinition::builder("communication.gmail.list_messages")
        .unwrap()
        .classification(Classification::new(
            Domain::Communication,
            Subdomain::Gmail,
            Capability::Search,
        ))
        .handler("gmail.list", |_: MethodInvocation| async move {
            if true {
                panic!("boom");
            }
            Ok(Value::Null)
        })
        .unwrap()
        .build()
        .unwrap();
    let hub = Hub::new(registries(vec![failing, panicking], vec![]));

    let response = hub
        .dispatch(RequestEnvelope::new("communication.gmail.send_message", json!({})))
        .await;
    assert_eq!(response.error_kind(), Some(ErrorKind::Execution));
    assert_eq!(response.error().unwrap().message, "mail provider unavailable");

    let response = hub
        .dispatch(RequestEnvelope::new("communication.gmail.list_messages", json!({})))
        .await;
    assert_eq!(response.error_kind(), Some(ErrorKind::Execution));
    assert!(response.error().unwrap().message.contains("panicked"));
}

#[tokio::test]
async fn drifted_tool_is_excluded_from_dispatch() {
    let calls = Arc::new(AtomicUsize::new(0));
    let t2 = ToolDefinition::new("T2", CREATE)
        .unwrap()
        .with_parameter(DeclaredParameter::new("title", ParamType::Integer));
    let hub = Hub::new(registries(vec![method_m(Arc::clone(&calls))], vec![t2]));

    let response = hub
        .dispatch(RequestEnvelope::new("T2", json!({ "title": 1 })).with_caller(user()))
        .await;
    assert_eq!(response.error_kind(), Some(ErrorKind::ParameterDrift));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unknown_operation_and_dangling_tool() {
    let hub = Hub::new(registries(
        vec![],
        vec![ToolDefinition::new("ghost", "workspace.casefile.ghost").unwrap()],
    ));

    let response = hub.dispatch(RequestEnvelope::new("nothing_here", json!({}))).await;
    assert_eq!(response.error_kind(), Some(ErrorKind::NotFound));

    let response = hub.dispatch(RequestEnvelope::new("ghost", json!({}))).await;
    assert_eq!(response.error_kind(), Some(ErrorKind::MissingMethod));
}

#[tokio::test]
async fn tool_names_resolve_before_method_names() {
    let calls = Arc::new(AtomicUsize::new(0));
    let other = MethodDefinition::builder("workspace.casefile.get_casefile")
        .unwrap()
        .classification(casefile(Capability::Read))
        .handler("casefile.get", |_: MethodInvocation| async move {
            Ok(json!({ "source": "get" }))
        })
        .unwrap()
        .build()
        .unwrap();
    // A tool whose name collides with a method name but points elsewhere.
    let shadow = ToolDefinition::new(CREATE, "workspace.casefile.get_casefile").unwrap();
    let hub = Hub::new(registries(vec![method_m(Arc::clone(&calls)), other], vec![shadow]));

    let response = hub
        .dispatch(RequestEnvelope::new(CREATE, json!({})).with_caller(user()))
        .await;
    assert_eq!(response.payload().unwrap()["source"], "get");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unknown_fields_are_dropped_and_defaults_applied() {
    let method = MethodDefinition::builder("workspace.casefile.list_casefiles")
        .unwrap()
        .classification(casefile(Capability::Search))
        .request(
            Contract::new(
                "ListCasefilesRequest",
                vec![FieldSchema::new("limit", ParamType::Integer).with_default(20)],
            )
            .unwrap(),
        )
        .handler("casefile.list", |invocation: MethodInvocation| async move {
            Ok(Value::Object(invocation.payload().clone()))
        })
        .unwrap()
        .build()
        .unwrap();
    let hub = Hub::new(registries(vec![method], vec![]));

    let response = hub
        .dispatch(RequestEnvelope::new(
            "workspace.casefile.list_casefiles",
            json!({ "unexpected": true }),
        ))
        .await;
    assert_eq!(response.payload(), Some(&json!({ "limit": 20 })));
}

#[tokio::test]
async fn disabled_methods_reject_calls() {
    let method = MethodDefinition::builder("workspace.casefile.archive_casefile")
        .unwrap()
        .classification(casefile(Capability::Delete))
        .handler("casefile.archive", |_: MethodInvocation| async move { Ok(Value::Null) })
        .unwrap()
        .disabled()
        .build()
        .unwrap();
    let hub = Hub::new(registries(vec![method], vec![]));
    let response = hub
        .dispatch(RequestEnvelope::new("workspace.casefile.archive_casefile", json!({})))
        .await;
    assert_eq!(response.error_kind(), Some(ErrorKind::PolicyViolation));
}

/// Denies every request routed through a tool.
struct DenyToolRoutes;

#[async_trait]
impl PolicyEngine for DenyToolRoutes {
    async fn evaluate(&self, request: &PolicyRequest) -> PolicyResult<PolicyDecision> {
        Ok(match request.tool() {
            Some(_) => PolicyDecision::deny("tool disabled for tenant"),
            None => PolicyDecision::allow(),
        })
    }
}

struct EscalateAll;

#[async_trait]
impl PolicyEngine for EscalateAll {
    async fn evaluate(&self, _request: &PolicyRequest) -> PolicyResult<PolicyDecision> {
        Ok(PolicyDecision::escalate("needs review", vec!["ops".into()]))
    }
}

#[tokio::test]
async fn external_policy_runs_after_declared_flags() {
    let calls = Arc::new(AtomicUsize::new(0));
    let tools = registries(vec![method_m(Arc::clone(&calls))], vec![tool_t()]);

    let hub = Hub::new(Arc::clone(&tools)).with_policy(Arc::new(DenyToolRoutes));

    let via_tool = hub
        .dispatch(RequestEnvelope::new("T", json!({ "title": "x" })).with_caller(user()))
        .await;
    assert_eq!(via_tool.error_kind(), Some(ErrorKind::PolicyViolation));
    assert!(via_tool.error().unwrap().message.contains("tool disabled for tenant"));

    let direct = hub
        .dispatch(RequestEnvelope::new(CREATE, json!({ "title": "x" })).with_caller(user()))
        .await;
    assert!(direct.is_completed());

    let escalating = Hub::new(tools).with_policy(Arc::new(EscalateAll));
    let response = escalating
        .dispatch(RequestEnvelope::new(CREATE, json!({ "title": "x" })).with_caller(user()))
        .await;
    assert_eq!(response.error_kind(), Some(ErrorKind::PolicyViolation));
    assert!(response.error().unwrap().message.contains("approvers: ops"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn submit_returns_pending_then_completes() {
    let calls = Arc::new(AtomicUsize::new(0));
    let hub = Arc::new(Hub::new(registries(vec![method_m(Arc::clone(&calls))], vec![tool_t()])));

    let request = RequestEnvelope::new("T", json!({ "title": "later" })).with_caller(user());
    let request_id = request.request_id().clone();
    let submission = hub.submit(request);
    assert_eq!(submission.receipt().status(), ResponseStatus::Pending);
    assert_eq!(submission.receipt().request_id(), &request_id);

    let response = submission.wait().await.unwrap();
    assert!(response.is_completed());
    assert_eq!(response.request_id(), &request_id);
}

#[tokio::test]
async fn closed_scheduler_fails_submissions_with_their_request_id() {
    let calls = Arc::new(AtomicUsize::new(0));
    let observer = CollectingObserver::new();
    let scheduler = DispatchScheduler::default();
    scheduler.close();
    let hub = Arc::new(
        Hub::new(registries(vec![method_m(Arc::clone(&calls))], vec![tool_t()]))
            .with_scheduler(scheduler)
            .with_observer(observer.clone()),
    );

    let request = RequestEnvelope::new("T", json!({ "title": "x" }))
        .with_caller(user())
        .with_request_id("req-closed".parse().unwrap());
    let submission = hub.submit(request);
    let receipt = submission.receipt();
    assert_eq!(receipt.status(), ResponseStatus::Failed);
    assert_eq!(receipt.request_id().as_str(), "req-closed");
    assert_eq!(receipt.error_kind(), Some(ErrorKind::Execution));
    assert_eq!(receipt.metadata().tool.as_deref(), Some("T"));

    let response = submission.wait().await.unwrap();
    assert!(response.is_failed());
    assert_eq!(response.request_id().as_str(), "req-closed");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(observer.drain().len(), 1);
}

#[tokio::test]
async fn concurrent_dispatches_keep_input_order() {
    let calls = Arc::new(AtomicUsize::new(0));
    let hub = Hub::new(registries(vec![method_m(Arc::clone(&calls))], vec![tool_t()]));

    let requests: Vec<_> = (0..8)
        .map(|n| {
            RequestEnvelope::new("T", json!({ "title": format!("cf-{n}") })).with_caller(user())
        })
        .collect();
    let ids: Vec<_> = requests.iter().map(|r| r.request_id().clone()).collect();

    let responses = hub.dispatch_all(requests).await;
    let echoed: Vec<_> = responses.iter().map(|r| r.request_id().clone()).collect();
    assert_eq!(echoed, ids);
    assert!(responses.iter().all(|r| r.is_completed()));
    assert_eq!(calls.load(Ordering::SeqCst), 8);
}

#[test]
fn strict_builder_rejects_drifted_registries() {
    let t2 = ToolDefinition::new("T2", CREATE)
        .unwrap()
        .with_parameter(DeclaredParameter::new("title", ParamType::Integer));
    let tools = registries(vec![method_m(Arc::new(AtomicUsize::new(0)))], vec![t2]);

    let err = Hub::builder(Arc::clone(&tools))
        .validation(ValidationOptions::strict())
        .build()
        .expect_err("strict startup");
    let HubError::StartupRejected { report } = err else {
        panic!("expected startup rejection");
    };
    assert_eq!(report.count(ErrorKind::ParameterDrift), 1);

    let hub = Hub::builder(tools)
        .observer(CollectingObserver::new() as Arc<dyn DispatchObserver>)
        .build()
        .unwrap();
    assert!(hub.startup_report().unwrap().has_errors());
}
