//! Sample casefile service.
//!
//! Startup registers methods in code, loads tools from YAML, validates the two,
//! and then either reports, lists the tool catalog, or dispatches one request.

mod methods;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use serde_json::{Value, json};
use toolhub::cli::{EXIT_UNUSABLE, ValidateArgs, run_validation};
use toolhub::config::{HubConfig, load_file, resolve_path};
use toolhub::kernel::{Hub, RequestEnvelope, TracingDispatchObserver};
use toolhub::policy::CallerContext;
use toolhub::registry::{MethodRegistry, ToolRegistry};
use toolhub::telemetry::{Verbosity, init_tracing};
use tracing::info;

use crate::methods::{CasefileStore, method_registry};

#[derive(Debug, Parser)]
#[command(name = "casefile-hub", version, about = "Casefile method and tool hub")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Check tool configuration against the registered methods.
    Validate(ValidateArgs),
    /// Print every tool with its effective parameters.
    Catalog(CatalogArgs),
    /// Dispatch one request and print the response envelope.
    Dispatch(DispatchArgs),
}

#[derive(Debug, Args)]
struct CatalogArgs {
    /// Configuration file.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct DispatchArgs {
    /// Tool or method name.
    operation: String,

    /// JSON payload.
    #[arg(long, default_value = "{}")]
    payload: String,

    /// Configuration file.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Authenticated principal.
    #[arg(long)]
    principal: Option<String>,

    /// Resource the call is bound to.
    #[arg(long)]
    resource: Option<String>,

    /// Granted permission (repeatable).
    #[arg(long = "permission")]
    permissions: Vec<String>,

    /// Increase log verbosity (repeatable).
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl DispatchArgs {
    fn caller(&self) -> CallerContext {
        let caller = match &self.principal {
            Some(principal) => CallerContext::authenticated(principal),
            None => CallerContext::anonymous(),
        };
        let caller = match &self.resource {
            Some(resource) => caller.with_resource(resource),
            None => caller,
        };
        caller.with_permissions(self.permissions.iter().cloned())
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let store = Arc::new(CasefileStore::default());
    let methods = method_registry(&store)?;

    match cli.command {
        Command::Validate(args) => {
            init_tracing(args.verbosity())?;
            Ok(validate(&args, methods))
        }
        Command::Catalog(args) => {
            init_tracing(Verbosity::Quiet)?;
            catalog(args.config, methods)
        }
        Command::Dispatch(args) => {
            init_tracing(Verbosity::from_occurrences(args.verbose))?;
            dispatch(args, methods).await
        }
    }
}

fn validate(args: &ValidateArgs, methods: Arc<MethodRegistry>) -> ExitCode {
    let run = run_validation(args, methods);
    if run.exit_code == EXIT_UNUSABLE {
        eprintln!("{}", run.output);
    } else {
        print!("{}", run.output);
    }
    ExitCode::from(run.exit_code)
}

fn load(
    config: Option<PathBuf>,
    methods: Arc<MethodRegistry>,
) -> Result<(HubConfig, ToolRegistry)> {
    let path = resolve_path(config.as_deref());
    let config = load_file(&path).with_context(|| format!("loading {}", path.display()))?;
    let tools = config.tool_registry(methods)?;
    Ok((config, tools))
}

fn catalog(config: Option<PathBuf>, methods: Arc<MethodRegistry>) -> Result<ExitCode> {
    let (_, tools) = load(config, methods)?;
    let entries: Vec<Value> = tools
        .resolutions()
        .iter()
        .map(|resolution| {
            json!({
                "tool": resolution.tool().name().as_str(),
                "method": resolution.tool().method_name().as_str(),
                "description": resolution.tool().description(),
                "valid": resolution.is_valid(),
                "classification": resolution.classification(),
                "parameters": resolution.parameters(),
            })
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&entries)?);
    Ok(ExitCode::SUCCESS)
}

async fn dispatch(args: DispatchArgs, methods: Arc<MethodRegistry>) -> Result<ExitCode> {
    let (config, tools) = load(args.config.clone(), methods)?;
    let hub = Hub::builder(Arc::new(tools))
        .validation(config.validation.options())
        .declarations(config.methods.clone())
        .observer(Arc::new(TracingDispatchObserver))
        .build()?;

    let payload: Value =
        serde_json::from_str(&args.payload).context("--payload is not valid JSON")?;
    let request = RequestEnvelope::new(args.operation.as_str(), payload).with_caller(args.caller());
    info!(
        request_id = %request.request_id(),
        operation = request.operation(),
        "dispatching"
    );

    let response = hub.dispatch(request).await;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(if response.is_completed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
