//! Parameter inheritance from a method into the tools that reference it.
//!
//! A tool starts from the method's extracted parameters and may override
//! descriptions and defaults, tighten `required`, or add parameters the method
//! does not define. Changing a type or relaxing `required` is drift: the
//! inherited parameter is kept and the tool is marked invalid.

use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

use hub_primitives::{
    Classification, ClassificationConflict, Contract, ErrorKind, FieldSchema, MethodName,
    ParamType, ParameterDescriptor,
};
use serde::Serialize;
use tracing::debug;

use crate::extract::extract;
use crate::method::MethodDefinition;
use crate::tool::{DeclaredParameter, ToolDefinition};

/// Where an effective parameter came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterOrigin {
    /// Taken unchanged from the method contract.
    Inherited,
    /// Inherited, with description, default, or `required` refined by the tool.
    Overridden,
    /// Declared only by the tool.
    Added,
}

/// Parameter as seen by callers of a tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EffectiveParameter {
    /// Merged descriptor.
    #[serde(flatten)]
    pub parameter: ParameterDescriptor,
    /// Provenance of the descriptor.
    pub origin: ParameterOrigin,
}

/// Type and requiredness of one side of a parameter comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ParamShape {
    /// Declared or inherited type.
    #[serde(rename = "type")]
    pub ty: ParamType,
    /// Requiredness; `None` when the declaration leaves it unspecified.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
}

impl ParamShape {
    /// Shape of a declared parameter.
    #[must_use]
    pub fn declared(parameter: &DeclaredParameter) -> Self {
        Self {
            ty: parameter.ty,
            required: parameter.required,
        }
    }

    /// Shape of an extracted parameter.
    #[must_use]
    pub fn inherited(parameter: &ParameterDescriptor) -> Self {
        Self {
            ty: parameter.ty,
            required: Some(parameter.required),
        }
    }
}

impl Display for ParamShape {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.required {
            Some(true) => write!(f, "{} (required)", self.ty),
            Some(false) => write!(f, "{} (optional)", self.ty),
            None => write!(f, "{}", self.ty),
        }
    }
}

/// Disagreement between a declared parameter and the code that defines it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParameterDrift {
    /// Parameter name.
    pub parameter: String,
    /// Declared side; `None` when the declaration omits a code parameter.
    pub declared: Option<ParamShape>,
    /// Code side; `None` when the code does not define the declared parameter.
    pub inherited: Option<ParamShape>,
}

impl ParameterDrift {
    /// Compares a tool override with the inherited parameter.
    ///
    /// Returns `None` when the override is compatible: the types agree (or the
    /// inherited type is `any`) and `required` is not relaxed.
    #[must_use]
    pub fn for_override(
        declared: &DeclaredParameter,
        inherited: &ParameterDescriptor,
    ) -> Option<Self> {
        let type_conflict = !declared.ty.is_compatible_with(inherited.ty);
        let relaxed = inherited.required && declared.required == Some(false);
        (type_conflict || relaxed).then(|| Self {
            parameter: inherited.name.clone(),
            declared: Some(ParamShape::declared(declared)),
            inherited: Some(ParamShape::inherited(inherited)),
        })
    }

    /// Human-readable description naming both sides.
    #[must_use]
    pub fn message(&self) -> String {
        match (&self.declared, &self.inherited) {
            (Some(declared), Some(inherited)) => format!(
                "parameter `{}` is declared as {declared} but the method defines {inherited}",
                self.parameter
            ),
            (Some(declared), None) => format!(
                "parameter `{}` is declared as {declared} but the method does not define it",
                self.parameter
            ),
            (None, Some(inherited)) => format!(
                "parameter `{}` ({inherited}) is defined by the method \
                 but missing from the declaration",
                self.parameter
            ),
            (None, None) => format!("parameter `{}` drifted", self.parameter),
        }
    }
}

/// Problem found while resolving one tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolIssue {
    /// Referenced method is not registered.
    MissingMethod {
        /// Dangling method name.
        method: MethodName,
    },
    /// A declared parameter conflicts with the inherited one.
    ParameterDrift(ParameterDrift),
    /// A classification override disagrees with the method.
    ClassificationDrift(ClassificationConflict),
}

impl ToolIssue {
    /// Maps the issue onto the shared failure taxonomy.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingMethod { .. } => ErrorKind::MissingMethod,
            Self::ParameterDrift(_) => ErrorKind::ParameterDrift,
            Self::ClassificationDrift(_) => ErrorKind::ClassificationDrift,
        }
    }

    /// Returns `true` when the issue makes the tool unusable for dispatch.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::ClassificationDrift(_))
    }

    /// Human-readable description.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::MissingMethod { method } => format!("references unknown method `{method}`"),
            Self::ParameterDrift(drift) => drift.message(),
            Self::ClassificationDrift(conflict) => format!(
                "classification {} overridden as `{}` but the method is `{}`",
                conflict.field, conflict.declared, conflict.inherited
            ),
        }
    }
}

/// Outcome of resolving a tool against its method.
#[derive(Debug, Clone)]
pub struct ToolResolution {
    tool: Arc<ToolDefinition>,
    method: Option<Arc<MethodDefinition>>,
    parameters: Vec<EffectiveParameter>,
    request_contract: Option<Contract>,
    classification: Option<Classification>,
    issues: Vec<ToolIssue>,
}

impl ToolResolution {
    /// Resolves `tool` against `method`, which is `None` when the referenced
    /// name is not registered.
    #[must_use]
    pub fn resolve(tool: Arc<ToolDefinition>, method: Option<Arc<MethodDefinition>>) -> Self {
        let Some(method) = method else {
            debug!(
                tool = %tool.name(),
                method = %tool.method_name(),
                "tool references unknown method"
            );
            let issues = vec![ToolIssue::MissingMethod {
                method: tool.method_name().clone(),
            }];
            return Self {
                tool,
                method: None,
                parameters: Vec::new(),
                request_contract: None,
                classification: None,
                issues,
            };
        };

        let mut issues = Vec::new();
        let mut parameters: Vec<EffectiveParameter> = extract(&method)
            .into_iter()
            .map(|parameter| EffectiveParameter {
                parameter,
                origin: ParameterOrigin::Inherited,
            })
            .collect();

        for declared in tool.parameters() {
            let slot = parameters
                .iter()
                .position(|effective| effective.parameter.name == declared.name);

            match slot {
                None => parameters.push(EffectiveParameter {
                    parameter: declared.to_descriptor(),
                    origin: ParameterOrigin::Added,
                }),
                Some(index) => {
                    let effective = &mut parameters[index];
                    let drift = ParameterDrift::for_override(declared, &effective.parameter);
                    if let Some(drift) = drift {
                        issues.push(ToolIssue::ParameterDrift(drift));
                        continue;
                    }
                    apply_override(&mut effective.parameter, declared);
                    effective.origin = ParameterOrigin::Overridden;
                }
            }
        }

        let conflicts = tool.classification().conflicts(method.classification());
        issues.extend(conflicts.into_iter().map(ToolIssue::ClassificationDrift));
        let classification = tool.classification().resolve(method.classification());
        let request_contract = tool_contract(&tool, &method, &parameters);

        Self {
            tool,
            method: Some(method),
            parameters,
            request_contract: Some(request_contract),
            classification: Some(classification),
            issues,
        }
    }

    /// Returns the resolved tool.
    #[must_use]
    pub fn tool(&self) -> &Arc<ToolDefinition> {
        &self.tool
    }

    /// Returns the referenced method, if it resolved.
    #[must_use]
    pub fn method(&self) -> Option<&Arc<MethodDefinition>> {
        self.method.as_ref()
    }

    /// Returns the merged parameters, inherited first then additions.
    #[must_use]
    pub fn parameters(&self) -> &[EffectiveParameter] {
        &self.parameters
    }

    /// Returns the contract tool callers bind against, if the method resolved.
    ///
    /// It carries the merged parameters, so tightened `required` flags,
    /// overridden defaults, and added parameters all apply at dispatch. The
    /// method's envelope fields are kept as they are.
    #[must_use]
    pub fn request_contract(&self) -> Option<&Contract> {
        self.request_contract.as_ref()
    }

    /// Returns the effective classification, if the method resolved.
    #[must_use]
    pub fn classification(&self) -> Option<&Classification> {
        self.classification.as_ref()
    }

    /// Returns every issue found, fatal or not.
    #[must_use]
    pub fn issues(&self) -> &[ToolIssue] {
        &self.issues
    }

    /// Returns the first issue that blocks dispatch.
    #[must_use]
    pub fn fatal_issue(&self) -> Option<&ToolIssue> {
        self.issues.iter().find(|issue| issue.is_fatal())
    }

    /// Returns `true` when the tool can be dispatched.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.fatal_issue().is_none()
    }
}

fn tool_contract(
    tool: &ToolDefinition,
    method: &MethodDefinition,
    parameters: &[EffectiveParameter],
) -> Contract {
    let envelope = method
        .request_contract()
        .fields()
        .iter()
        .filter(|field| field.is_envelope())
        .cloned();
    parameters
        .iter()
        .map(|effective| FieldSchema::from(&effective.parameter))
        .chain(envelope)
        .fold(Contract::empty(format!("tool:{}", tool.name())), Contract::with_field)
}

fn apply_override(parameter: &mut ParameterDescriptor, declared: &DeclaredParameter) {
    parameter.ty = declared.ty;
    if declared.required == Some(true) {
        parameter.required = true;
    }
    if let Some(description) = &declared.description {
        parameter.description = Some(description.clone());
    }
    if let Some(default) = &declared.default {
        parameter.default = Some(default.clone());
    }
}
