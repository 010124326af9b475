//! Coverage and drift validation across the method and tool registries.
//!
//! The validator never stops at the first problem. Every tool is resolved,
//! every enabled public method is checked for coverage, and optional method
//! declarations are compared with the code registrations. The outcome is a
//! [`ValidationReport`]; callers decide what to do with it.

use std::collections::HashSet;

use hub_primitives::{Classification, ClassificationOverride, ErrorKind, MethodName};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::extract::extract;
use crate::inheritance::{ParamShape, ParameterDrift, ToolIssue};
use crate::method::{MethodDefinition, MethodFilter, Visibility};
use crate::report::{Category, Finding, Severity, Subject, ValidationReport};
use crate::tool::{DeclaredParameter, ToolRegistry};

/// Whether errors fail the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationMode {
    /// Report everything, exit successfully.
    #[default]
    Warning,
    /// Any error fails the run; orphaned methods become errors.
    Strict,
}

/// Validator settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationOptions {
    /// Active mode.
    pub mode: ValidationMode,
    /// Run parameter and classification drift checks.
    pub drift_detection: bool,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            mode: ValidationMode::Warning,
            drift_detection: true,
        }
    }
}

impl ValidationOptions {
    /// Strict mode with drift detection.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            mode: ValidationMode::Strict,
            ..Self::default()
        }
    }

    /// Disables drift detection; coverage checks still run.
    #[must_use]
    pub fn without_drift(mut self) -> Self {
        self.drift_detection = false;
        self
    }
}

/// Method as described in configuration, compared against the registered code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MethodDeclaration {
    /// Declared method name.
    pub name: MethodName,
    /// Declared classification, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<Classification>,
    /// Declared parameters, if any. When present the list must match the code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Vec<DeclaredParameter>>,
}

/// Reconciles tools and declarations with the registered methods.
#[derive(Debug)]
pub struct DriftValidator<'a> {
    tools: &'a ToolRegistry,
    options: ValidationOptions,
}

impl<'a> DriftValidator<'a> {
    /// Creates a validator over `tools` and the method registry behind it.
    #[must_use]
    pub fn new(tools: &'a ToolRegistry, options: ValidationOptions) -> Self {
        Self { tools, options }
    }

    /// Validates tools and method coverage.
    #[must_use]
    pub fn validate(&self) -> ValidationReport {
        self.validate_with(&[])
    }

    /// Validates tools, method coverage, and the supplied declarations.
    #[must_use]
    pub fn validate_with(&self, declarations: &[MethodDeclaration]) -> ValidationReport {
        let options = self.options;
        let methods = self.tools.methods();
        let mut report = ValidationReport::new(options.mode, options.drift_detection);
        let mut covered: HashSet<String> = HashSet::new();

        let resolutions = self.tools.resolutions();
        for resolution in &resolutions {
            let tool = resolution.tool().name().as_str();
            for issue in resolution.issues() {
                if let Some(finding) = tool_finding(tool, issue, options) {
                    report.push(finding);
                }
            }

            let counts = resolution.method().is_some()
                && (!options.drift_detection || resolution.is_valid());
            if counts {
                covered.insert(resolution.tool().method_name().to_string());
            }
        }

        let orphan_severity = match options.mode {
            ValidationMode::Strict => Severity::Error,
            ValidationMode::Warning => Severity::Warning,
        };
        let public = methods.list_by(
            MethodFilter::any()
                .enabled(true)
                .visibility(Visibility::Public),
        );
        for method in &public {
            if !covered.contains(method.name().as_str()) {
                report.push(Finding::new(
                    Category::Coverage,
                    orphan_severity,
                    ErrorKind::OrphanedMethod,
                    Subject::method(method.name().as_str()),
                    "no valid tool references this method",
                ));
            }
        }

        for declaration in declarations {
            match methods.get(declaration.name.as_str()) {
                None => report.push(Finding::new(
                    Category::Coverage,
                    Severity::Error,
                    ErrorKind::MissingMethod,
                    Subject::method(declaration.name.as_str()),
                    "declared method is not registered",
                )),
                Some(method) if options.drift_detection => {
                    for finding in declaration_findings(declaration, &method) {
                        report.push(finding);
                    }
                }
                Some(_) => {}
            }
        }

        report.set_counts(methods.len(), resolutions.len());
        for finding in report.findings() {
            debug!(
                severity = %finding.severity,
                kind = %finding.kind,
                subject = %finding.subject,
                message = %finding.message,
                "validation finding"
            );
        }
        info!(
            mode = ?options.mode,
            methods = report.methods_checked(),
            tools = report.tools_checked(),
            errors = report.errors().count(),
            warnings = report.warnings().count(),
            "validation finished"
        );
        report
    }
}

fn tool_finding(tool: &str, issue: &ToolIssue, options: ValidationOptions) -> Option<Finding> {
    let message = issue.message();
    match issue {
        ToolIssue::MissingMethod { .. } => Some(Finding::new(
            Category::Coverage,
            Severity::Error,
            ErrorKind::MissingMethod,
            Subject::tool(tool),
            message,
        )),
        ToolIssue::ParameterDrift(drift) if options.drift_detection => Some(
            Finding::new(
                Category::Drift,
                Severity::Error,
                ErrorKind::ParameterDrift,
                Subject::tool(tool),
                message,
            )
            .on_parameter(&drift.parameter),
        ),
        ToolIssue::ClassificationDrift(_) if options.drift_detection => Some(Finding::new(
            Category::Classification,
            Severity::Warning,
            ErrorKind::ClassificationDrift,
            Subject::tool(tool),
            message,
        )),
        ToolIssue::ParameterDrift(_) | ToolIssue::ClassificationDrift(_) => None,
    }
}

fn declaration_findings(
    declaration: &MethodDeclaration,
    method: &MethodDefinition,
) -> Vec<Finding> {
    let subject = || Subject::method(declaration.name.as_str());
    let mut findings = Vec::new();

    if let Some(declared) = &declaration.parameters {
        let code = extract(method);
        for parameter in declared {
            let inherited = code.iter().find(|candidate| candidate.name == parameter.name);
            let mismatch = inherited.is_none_or(|inherited| {
                parameter.ty != inherited.ty
                    || parameter.required.is_some_and(|required| required != inherited.required)
            });
            if mismatch {
                let drift = ParameterDrift {
                    parameter: parameter.name.clone(),
                    declared: Some(ParamShape::declared(parameter)),
                    inherited: inherited.map(ParamShape::inherited),
                };
                findings.push(
                    Finding::new(
                        Category::Drift,
                        Severity::Error,
                        ErrorKind::ParameterDrift,
                        subject(),
                        drift.message(),
                    )
                    .on_parameter(&drift.parameter),
                );
            }
        }

        for inherited in &code {
            if declared.iter().all(|parameter| parameter.name != inherited.name) {
                let drift = ParameterDrift {
                    parameter: inherited.name.clone(),
                    declared: None,
                    inherited: Some(ParamShape::inherited(inherited)),
                };
                findings.push(
                    Finding::new(
                        Category::Drift,
                        Severity::Error,
                        ErrorKind::ParameterDrift,
                        subject(),
                        drift.message(),
                    )
                    .on_parameter(&drift.parameter),
                );
            }
        }
    }

    if let Some(classification) = declaration.classification {
        let declared = ClassificationOverride::from(classification);
        for conflict in declared.conflicts(method.classification()) {
            findings.push(Finding::new(
                Category::Classification,
                Severity::Warning,
                ErrorKind::ClassificationDrift,
                subject(),
                format!(
                    "classification {} declared as `{}` but the code registers `{}`",
                    conflict.field, conflict.declared, conflict.inherited
                ),
            ));
        }
    }

    findings
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use hub_primitives::{Capability, Contract, Domain, FieldSchema, Maturity, ParamType, Subdomain};
    use serde_json::Value;

    use crate::method::{MethodInvocation, MethodRegistry};
    use crate::tool::{ToolDefinition, ToolRegistryConfig};

    fn method(name: &str, capability: Capability) -> MethodDefinition {
        MethodDefinition::builder(name)
            .unwrap()
            .classification(Classification::new(
                Domain::Workspace,
                Subdomain::Casefile,
                capability,
            ))
            .request(
                Contract::new("Request", vec![FieldSchema::new("title", ParamType::String)])
                    .unwrap(),
            )
            .handler(name, |_: MethodInvocation| async move { Ok(Value::Null) })
            .unwrap()
            .build()
            .unwrap()
    }

    fn registries() -> ToolRegistry {
        let methods = MethodRegistry::new();
        methods
            .register(method("workspace.casefile.create_casefile", Capability::Create))
            .unwrap();
        ToolRegistry::with_config(
            Arc::new(methods),
            ToolRegistryConfig {
                defer_method_resolution: true,
                ..ToolRegistryConfig::default()
            },
        )
    }

    fn title_as(ty: ParamType) -> ToolDefinition {
        ToolDefinition::new("T2", "workspace.casefile.create_casefile")
            .unwrap()
            .with_parameter(DeclaredParameter::new("title", ty))
    }

    #[test]
    fn clean_registries_produce_no_findings() {
        let tools = registries();
        tools
            .register(ToolDefinition::new("T", "workspace.casefile.create_casefile").unwrap())
            .unwrap();
        let report = DriftValidator::new(&tools, ValidationOptions::strict()).validate();
        assert!(report.findings().is_empty());
        assert_eq!(report.exit_code(), 0);
        assert_eq!(report.tools_checked(), 1);
        assert_eq!(report.methods_checked(), 1);
    }

    #[test]
    fn type_drift_fails_strict_mode_with_one_finding() {
        let tools = registries();
        tools.register(title_as(ParamType::Integer)).unwrap();

        let report = DriftValidator::new(&tools, ValidationOptions::strict()).validate();
        assert_eq!(report.exit_code(), 1);
        assert_eq!(report.count(ErrorKind::ParameterDrift), 1);
        let drift = report
            .findings()
            .iter()
            .find(|finding| finding.kind == ErrorKind::ParameterDrift)
            .unwrap();
        assert_eq!(drift.subject, Subject::tool("T2"));
        assert_eq!(drift.parameter.as_deref(), Some("title"));
        // The drifted tool does not cover its method.
        assert_eq!(report.count(ErrorKind::OrphanedMethod), 1);
    }

    #[test]
    fn warning_mode_reports_but_passes() {
        let tools = registries();
        tools.register(title_as(ParamType::Integer)).unwrap();
        let report = DriftValidator::new(&tools, ValidationOptions::default()).validate();
        assert!(report.has_errors());
        assert_eq!(report.exit_code(), 0);
        let orphan = report
            .findings()
            .iter()
            .find(|finding| finding.kind == ErrorKind::OrphanedMethod)
            .unwrap();
        assert_eq!(orphan.severity, Severity::Warning);
    }

    #[test]
    fn disabling_drift_keeps_coverage_checks() {
        let tools = registries();
        tools.register(title_as(ParamType::Integer)).unwrap();
        tools
            .register(ToolDefinition::new("ghost", "workspace.casefile.ghost").unwrap())
            .unwrap();

        let report =
            DriftValidator::new(&tools, ValidationOptions::strict().without_drift()).validate();
        assert_eq!(report.count(ErrorKind::ParameterDrift), 0);
        assert_eq!(report.count(ErrorKind::MissingMethod), 1);
        assert_eq!(report.count(ErrorKind::OrphanedMethod), 0);
        assert_eq!(report.exit_code(), 1);
    }

    #[test]
    fn internal_and_disabled_methods_are_exempt_from_coverage() {
        let methods = MethodRegistry::new();
        let internal = MethodDefinition::builder("workspace.casefile.reindex")
            .unwrap()
            .classification(Classification::new(
                Domain::Workspace,
                Subdomain::Casefile,
                Capability::Process,
            ))
            .handler("reindex", |_: MethodInvocation| async move { Ok(Value::Null) })
            .unwrap()
            .internal()
            .build()
            .unwrap();
        let disabled = MethodDefinition::builder("workspace.casefile.purge")
            .unwrap()
            .classification(Classification::new(
                Domain::Workspace,
                Subdomain::Casefile,
                Capability::Delete,
            ))
            .handler("purge", |_: MethodInvocation| async move { Ok(Value::Null) })
            .unwrap()
            .disabled()
            .build()
            .unwrap();
        methods.register(internal).unwrap();
        methods.register(disabled).unwrap();

        let tools = ToolRegistry::new(Arc::new(methods));
        let report = DriftValidator::new(&tools, ValidationOptions::strict()).validate();
        assert!(report.findings().is_empty());
    }

    #[test]
    fn declarations_are_compared_with_code() {
        let tools = registries();
        tools
            .register(ToolDefinition::new("T", "workspace.casefile.create_casefile").unwrap())
            .unwrap();

        let declarations = vec![
            MethodDeclaration {
                name: MethodName::new("workspace.casefile.create_casefile").unwrap(),
                classification: Some(
                    Classification::new(Domain::Workspace, Subdomain::Casefile, Capability::Create)
                        .with_maturity(Maturity::Beta),
                ),
                parameters: Some(vec![
                    DeclaredParameter::new("name", ParamType::String).required(true),
                ]),
            },
            MethodDeclaration {
                name: MethodName::new("workspace.casefile.removed_method").unwrap(),
                classification: None,
                parameters: None,
            },
        ];

        let report =
            DriftValidator::new(&tools, ValidationOptions::strict()).validate_with(&declarations);

        // `name` is not defined by the code and `title` is missing from the declaration.
        assert_eq!(report.count(ErrorKind::ParameterDrift), 2);
        assert_eq!(report.count(ErrorKind::ClassificationDrift), 1);
        let missing: Vec<_> = report
            .findings()
            .iter()
            .filter(|finding| finding.kind == ErrorKind::MissingMethod)
            .collect();
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].subject, Subject::method("workspace.casefile.removed_method"));
    }

    #[test]
    fn declarations_deserialize_with_closed_vocabulary() {
        let declaration: MethodDeclaration = serde_json::from_value(serde_json::json!({
            "name": "workspace.casefile.create_casefile",
            "parameters": [{ "name": "title", "type": "string", "required": true }]
        }))
        .unwrap();
        assert_eq!(declaration.parameters.unwrap().len(), 1);

        let bad = serde_json::from_value::<MethodDeclaration>(serde_json::json!({
            "name": "workspace.casefile.create_casefile",
            "classification": {
                "domain": "finance", "subdomain": "casefile", "capability": "create",
                "complexity": "atomic", "maturity": "stable", "integration_tier": "internal"
            }
        }));
        assert!(bad.is_err());
    }
}
