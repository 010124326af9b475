//! Casefile and mail methods registered at startup.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::Result;
use serde_json::{Value, json};
use tokio::sync::RwLock;
use toolhub::policy::MethodPolicy;
use toolhub::primitives::{
    Capability, Classification, Constraints, Contract, Domain, FieldSchema, IntegrationTier,
    Maturity, ParamType, Subdomain,
};
use toolhub::registry::{
    ImplementationCatalog, MethodDefinition, MethodError, MethodInvocation, MethodRegistry,
};

/// In-memory casefile storage backing the sample methods.
#[derive(Debug, Default)]
pub struct CasefileStore {
    next_id: AtomicU64,
    casefiles: RwLock<BTreeMap<String, Value>>,
}

impl CasefileStore {
    async fn create(&self, title: &str, description: Option<&str>, owner: Option<&str>) -> Value {
        let id = format!("cf_{:03}", self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let casefile = json!({
            "casefile_id": id,
            "title": title,
            "description": description,
            "owner": owner,
            "archived": false,
        });
        self.casefiles.write().await.insert(id, casefile.clone());
        casefile
    }
}

fn casefile(capability: Capability) -> Classification {
    Classification::new(Domain::Workspace, Subdomain::Casefile, capability)
}

fn gmail(capability: Capability) -> Classification {
    Classification::new(Domain::Communication, Subdomain::Gmail, capability)
        .with_maturity(Maturity::Beta)
        .with_integration_tier(IntegrationTier::External)
}

fn casefile_id_contract(name: &str) -> Result<Contract> {
    Ok(Contract::new(
        name,
        vec![
            FieldSchema::new("casefile_id", ParamType::String)
                .with_description("Casefile identifier"),
        ],
    )?)
}

fn required_id(invocation: &MethodInvocation) -> Result<String, MethodError> {
    invocation
        .str_param("casefile_id")
        .map(str::to_owned)
        .ok_or_else(|| MethodError::invalid_input("casefile_id must be a string"))
}

/// Registers every casefile method against `registry`.
///
/// # Errors
///
/// Returns an error when a definition is rejected.
pub fn register_casefile_methods(
    registry: &MethodRegistry,
    store: &Arc<CasefileStore>,
) -> Result<()> {
    let mut catalog = ImplementationCatalog::new();

    let create_store = Arc::clone(store);
    catalog.insert("casefile.create", move |invocation: MethodInvocation| {
        let store = Arc::clone(&create_store);
        async move {
            let title = invocation
                .str_param("title")
                .ok_or_else(|| MethodError::invalid_input("title must be a string"))?;
            Ok::<_, MethodError>(store
                .create(
                    title,
                    invocation.str_param("description"),
                    invocation.caller().principal(),
                )
                .await)
        }
    });

    let get_store = Arc::clone(store);
    catalog.insert("casefile.get", move |invocation: MethodInvocation| {
        let store = Arc::clone(&get_store);
        async move {
            let id = required_id(&invocation)?;
            store
                .casefiles
                .read()
                .await
                .get(&id)
                .cloned()
                .ok_or_else(|| MethodError::execution(format!("casefile `{id}` does not exist")))
        }
    });

    let list_store = Arc::clone(store);
    catalog.insert("casefile.list", move |invocation: MethodInvocation| {
        let store = Arc::clone(&list_store);
        async move {
            let limit = invocation
                .param("limit")
                .and_then(Value::as_u64)
                .and_then(|limit| usize::try_from(limit).ok())
                .unwrap_or(20);
            let casefiles: Vec<Value> = store
                .casefiles
                .read()
                .await
                .values()
                .take(limit)
                .cloned()
                .collect();
            Ok(json!({ "casefiles": casefiles }))
        }
    });

    let archive_store = Arc::clone(store);
    catalog.insert("casefile.archive", move |invocation: MethodInvocation| {
        let store = Arc::clone(&archive_store);
        async move {
            let id = required_id(&invocation)?;
            let mut casefiles = store.casefiles.write().await;
            let casefile = casefiles
                .get_mut(&id)
                .ok_or_else(|| MethodError::execution(format!("casefile `{id}` does not exist")))?;
            casefile["archived"] = Value::Bool(true);
            Ok::<_, MethodError>(casefile.clone())
        }
    });

    registry.register(
        MethodDefinition::builder("workspace.casefile.create_casefile")?
            .description("Create a casefile owned by the caller")
            .classification(casefile(Capability::Create))
            .request(Contract::new(
                "CreateCasefileRequest",
                vec![
                    FieldSchema::new("title", ParamType::String)
                        .with_description("Casefile title")
                        .with_constraints(Constraints::default().length(Some(1), Some(200))),
                    FieldSchema::new("description", ParamType::String)
                        .with_description("Longer summary")
                        .optional(),
                    FieldSchema::new("priority", ParamType::String)
                        .with_default("normal")
                        .with_constraints(Constraints::default().one_of(["low", "normal", "high"])),
                    FieldSchema::new("request_id", ParamType::String).optional().envelope(),
                ],
            )?)
            .policy(MethodPolicy::default().require_auth())
            .bind_from(&catalog, "casefile.create")?
            .build()?,
    )?;

    registry.register(
        MethodDefinition::builder("workspace.casefile.get_casefile")?
            .description("Fetch one casefile")
            .classification(casefile(Capability::Read))
            .request(casefile_id_contract("GetCasefileRequest")?)
            .policy(MethodPolicy::default().require_auth())
            .bind_from(&catalog, "casefile.get")?
            .build()?,
    )?;

    registry.register(
        MethodDefinition::builder("workspace.casefile.list_casefiles")?
            .description("List casefiles in creation order")
            .classification(casefile(Capability::Search))
            .request(Contract::new(
                "ListCasefilesRequest",
                vec![
                    FieldSchema::new("limit", ParamType::Integer)
                        .with_default(20)
                        .with_constraints(Constraints::default().range(Some(1.0), Some(100.0))),
                ],
            )?)
            .bind_from(&catalog, "casefile.list")?
            .build()?,
    )?;

    registry.register(
        MethodDefinition::builder("workspace.casefile.archive_casefile")?
            .description("Archive a casefile")
            .classification(casefile(Capability::Update))
            .request(casefile_id_contract("ArchiveCasefileRequest")?)
            .policy(
                MethodPolicy::default()
                    .require_auth()
                    .with_permission("casefile:write"),
            )
            .bind_from(&catalog, "casefile.archive")?
            .build()?,
    )?;

    Ok(())
}

/// Registers the mail methods. Delivery is stubbed.
///
/// # Errors
///
/// Returns an error when a definition is rejected.
pub fn register_gmail_methods(registry: &MethodRegistry) -> Result<()> {
    let sent = Arc::new(AtomicU64::new(0));

    registry.register(
        MethodDefinition::builder("communication.gmail.send_message")?
            .description("Send a message from the connected mailbox")
            .classification(gmail(Capability::Execute))
            .request(Contract::new(
                "SendMessageRequest",
                vec![
                    FieldSchema::new("to", ParamType::String).with_description("Recipient address"),
                    FieldSchema::new("subject", ParamType::String),
                    FieldSchema::new("body", ParamType::String),
                ],
            )?)
            .policy(
                MethodPolicy::default()
                    .require_auth()
                    .require_resource_context()
                    .with_timeout(Duration::from_secs(10)),
            )
            .handler("gmail.send", move |invocation: MethodInvocation| {
                let sent = Arc::clone(&sent);
                async move {
                    let sequence = sent.fetch_add(1, Ordering::Relaxed) + 1;
                    Ok(json!({
                        "message_id": format!("msg_{sequence:04}"),
                        "to": invocation.str_param("to"),
                        "status": "queued",
                    }))
                }
            })?
            .build()?,
    )?;

    registry.register(
        MethodDefinition::builder("communication.gmail.list_messages")?
            .description("List messages matching a search query")
            .classification(gmail(Capability::Search))
            .request(Contract::new(
                "ListMessagesRequest",
                vec![FieldSchema::new("query", ParamType::String).with_default("")],
            )?)
            .policy(MethodPolicy::default().require_auth())
            .handler("gmail.list", |_: MethodInvocation| async move {
                Ok(json!({ "messages": [] }))
            })?
            .internal()
            .build()?,
    )?;

    Ok(())
}

/// Builds the method registry for this service.
///
/// # Errors
///
/// Returns an error when any registration fails.
pub fn method_registry(store: &Arc<CasefileStore>) -> Result<Arc<MethodRegistry>> {
    let registry = MethodRegistry::strict();
    register_casefile_methods(&registry, store)?;
    register_gmail_methods(&registry)?;
    Ok(Arc::new(registry))
}
