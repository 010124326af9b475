//! Canonical parameter descriptors.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::contract::{Constraints, FieldSchema, ParamType};

/// Parameter exposed to tool callers, derived from a request contract field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDescriptor {
    /// Parameter name.
    pub name: String,
    /// JSON type.
    #[serde(rename = "type")]
    pub ty: ParamType,
    /// Whether callers must supply the parameter.
    pub required: bool,
    /// Default applied when the parameter is omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Value constraints.
    #[serde(default, skip_serializing_if = "Constraints::is_empty")]
    pub constraints: Constraints,
    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl From<&FieldSchema> for ParameterDescriptor {
    fn from(field: &FieldSchema) -> Self {
        Self {
            name: field.name().to_owned(),
            ty: field.ty(),
            required: field.is_required(),
            default: field.default_value().cloned(),
            constraints: field.constraints().clone(),
            description: field.description().map(ToOwned::to_owned),
        }
    }
}

impl From<&ParameterDescriptor> for FieldSchema {
    /// A required descriptor yields a field with no default, so callers must
    /// supply the value even when a default was inherited.
    fn from(parameter: &ParameterDescriptor) -> Self {
        let mut field = FieldSchema::new(parameter.name.clone(), parameter.ty)
            .with_constraints(parameter.constraints.clone());
        if let Some(description) = &parameter.description {
            field = field.with_description(description.clone());
        }
        if parameter.required {
            return field;
        }
        match &parameter.default {
            Some(default) => field.with_default(default.clone()),
            None => field.optional(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn descriptor(required: bool, default: Option<Value>) -> ParameterDescriptor {
        ParameterDescriptor {
            name: "priority".into(),
            ty: ParamType::String,
            required,
            default,
            constraints: Constraints::default().one_of(["low", "normal", "high"]),
            description: Some("Urgency".into()),
        }
    }

    #[test]
    fn optional_descriptor_keeps_its_default() {
        let field = FieldSchema::from(&descriptor(false, Some(json!("normal"))));
        assert!(!field.is_required());
        assert_eq!(field.default_value(), Some(&json!("normal")));
        assert_eq!(field.description(), Some("Urgency"));
        assert_eq!(field.constraints().allowed.len(), 3);
    }

    #[test]
    fn required_descriptor_drops_the_default() {
        let field = FieldSchema::from(&descriptor(true, Some(json!("normal"))));
        assert!(field.is_required());
        assert!(field.default_value().is_none());
    }

    #[test]
    fn optional_descriptor_without_default_stays_optional() {
        let field = FieldSchema::from(&descriptor(false, None));
        assert!(!field.is_required());
        assert!(field.default_value().is_none());
    }
}
