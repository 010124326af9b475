//! Explicit payload contracts for method requests and responses.
//!
//! A [`Contract`] is an ordered field list. Parameter extraction walks it, and
//! [`Contract::bind`] checks an incoming JSON payload against it before any
//! implementation sees the data.

use std::collections::HashSet;
use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// JSON-level type of a payload field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    /// UTF-8 string.
    String,
    /// Whole number.
    Integer,
    /// Any JSON number.
    Number,
    /// `true` or `false`.
    Boolean,
    /// JSON array.
    Array,
    /// JSON object.
    Object,
    /// Unconstrained value.
    Any,
}

impl ParamType {
    /// Returns the configuration spelling of the type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
            Self::Any => "any",
        }
    }

    /// Returns `true` when `value` has this type.
    #[must_use]
    pub fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
            Self::Any => true,
        }
    }

    /// Returns `true` when a parameter declared as `self` may stand in for one
    /// inherited as `inherited`.
    #[must_use]
    pub fn is_compatible_with(self, inherited: Self) -> bool {
        self == inherited || inherited == Self::Any
    }
}

impl Display for ParamType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value constraints attached to a field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Constraints {
    /// Minimum length for strings and arrays.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    /// Maximum length for strings and arrays.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    /// Inclusive lower bound for numbers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    /// Inclusive upper bound for numbers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    /// Closed set of accepted values.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed: Vec<Value>,
}

impl Constraints {
    /// Returns `true` when no constraint is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Sets the length bounds.
    #[must_use]
    pub fn length(mut self, min: Option<usize>, max: Option<usize>) -> Self {
        self.min_length = min;
        self.max_length = max;
        self
    }

    /// Sets the numeric bounds.
    #[must_use]
    pub fn range(mut self, minimum: Option<f64>, maximum: Option<f64>) -> Self {
        self.minimum = minimum;
        self.maximum = maximum;
        self
    }

    /// Restricts the field to the supplied values.
    #[must_use]
    pub fn one_of<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.allowed = values.into_iter().map(Into::into).collect();
        self
    }

    fn check(&self, value: &Value) -> std::result::Result<(), String> {
        let length = match value {
            Value::String(s) => Some(s.chars().count()),
            Value::Array(items) => Some(items.len()),
            _ => None,
        };

        if let Some(length) = length {
            if let Some(min) = self.min_length
                && length < min
            {
                return Err(format!("length {length} is below the minimum of {min}"));
            }
            if let Some(max) = self.max_length
                && length > max
            {
                return Err(format!("length {length} exceeds the maximum of {max}"));
            }
        }

        if let Some(number) = value.as_f64() {
            if let Some(minimum) = self.minimum
                && number < minimum
            {
                return Err(format!("value {number} is below the minimum of {minimum}"));
            }
            if let Some(maximum) = self.maximum
                && number > maximum
            {
                return Err(format!("value {number} exceeds the maximum of {maximum}"));
            }
        }

        if !self.allowed.is_empty() && !self.allowed.contains(value) {
            return Err("value is not one of the allowed values".into());
        }

        Ok(())
    }
}

/// One field of a payload contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    name: String,
    #[serde(rename = "type")]
    ty: ParamType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default: Option<Value>,
    #[serde(default)]
    optional: bool,
    #[serde(default)]
    envelope: bool,
    #[serde(default, skip_serializing_if = "Constraints::is_empty")]
    constraints: Constraints,
}

impl FieldSchema {
    /// Creates a required field of the given type.
    #[must_use]
    pub fn new(name: impl Into<String>, ty: ParamType) -> Self {
        Self {
            name: name.into(),
            ty,
            description: None,
            default: None,
            optional: false,
            envelope: false,
            constraints: Constraints::default(),
        }
    }

    /// Sets the human-readable description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Supplies a default, which makes the field optional.
    #[must_use]
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Marks the field optional without a default.
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Marks the field as envelope metadata (ids, timestamps) rather than a
    /// business parameter.
    #[must_use]
    pub fn envelope(mut self) -> Self {
        self.envelope = true;
        self
    }

    /// Attaches value constraints.
    #[must_use]
    pub fn with_constraints(mut self, constraints: Constraints) -> Self {
        self.constraints = constraints;
        self
    }

    /// Returns the field name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the field type.
    #[must_use]
    pub fn ty(&self) -> ParamType {
        self.ty
    }

    /// Returns the optional description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the default value, if any.
    #[must_use]
    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    /// A field is required when it has no default and is not marked optional.
    #[must_use]
    pub fn is_required(&self) -> bool {
        self.default.is_none() && !self.optional
    }

    /// Returns `true` for envelope metadata fields.
    #[must_use]
    pub fn is_envelope(&self) -> bool {
        self.envelope
    }

    /// Returns the value constraints.
    #[must_use]
    pub fn constraints(&self) -> &Constraints {
        &self.constraints
    }
}

/// A single contract violation found while binding a payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldViolation {
    /// Offending field name, or `$` for the payload as a whole.
    pub field: String,
    /// Human-readable reason.
    pub reason: String,
}

impl Display for FieldViolation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

/// Payload accepted by a contract, with defaults applied.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundPayload {
    values: Map<String, Value>,
    ignored: Vec<String>,
}

impl BoundPayload {
    /// Returns the bound field values.
    #[must_use]
    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    /// Consumes the payload, returning the bound field values.
    #[must_use]
    pub fn into_values(self) -> Map<String, Value> {
        self.values
    }

    /// Names of incoming fields the contract does not know about. They are
    /// dropped from the bound payload.
    #[must_use]
    pub fn ignored(&self) -> &[String] {
        &self.ignored
    }
}

/// Named, ordered payload shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    name: String,
    #[serde(default)]
    fields: Vec<FieldSchema>,
}

impl Contract {
    /// Creates a contract from an ordered field list.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidContract`] when the contract name is empty or a
    /// field name is empty or repeated.
    pub fn new(name: impl Into<String>, fields: Vec<FieldSchema>) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::InvalidContract {
                contract: name,
                reason: "contract name cannot be empty".into(),
            });
        }

        let mut seen = HashSet::new();
        for field in &fields {
            if field.name.trim().is_empty() {
                return Err(Error::InvalidContract {
                    contract: name,
                    reason: "field name cannot be empty".into(),
                });
            }
            if !seen.insert(field.name.as_str()) {
                return Err(Error::InvalidContract {
                    reason: format!("field `{}` is declared twice", field.name),
                    contract: name,
                });
            }
        }

        Ok(Self { name, fields })
    }

    /// Contract with no fields.
    #[must_use]
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Adds `field`, replacing an existing field with the same name in place.
    #[must_use]
    pub fn with_field(mut self, field: FieldSchema) -> Self {
        match self.fields.iter_mut().find(|existing| existing.name == field.name) {
            Some(existing) => *existing = field,
            None => self.fields.push(field),
        }
        self
    }

    /// Returns the contract name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the fields in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[FieldSchema] {
        &self.fields
    }

    /// Returns the field with the given name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Binds a JSON payload to this contract.
    ///
    /// `null` is treated as an empty object. Missing fields with defaults are
    /// filled in, optional fields without defaults are left out, and unknown
    /// fields are dropped and reported through [`BoundPayload::ignored`].
    ///
    /// # Errors
    ///
    /// Returns every violation found, in field order, when the payload is not
    /// an object, a required field is missing, a value has the wrong type, or a
    /// constraint fails.
    pub fn bind(&self, payload: &Value) -> std::result::Result<BoundPayload, Vec<FieldViolation>> {
        let empty = Map::new();
        let incoming = match payload {
            Value::Null => &empty,
            Value::Object(map) => map,
            _ => {
                return Err(vec![FieldViolation {
                    field: "$".into(),
                    reason: "payload must be a JSON object".into(),
                }]);
            }
        };

        let mut values = Map::new();
        let mut violations = Vec::new();

        for field in &self.fields {
            match incoming.get(&field.name) {
                None | Some(Value::Null) => {
                    if let Some(default) = &field.default {
                        values.insert(field.name.clone(), default.clone());
                    } else if field.is_required() {
                        violations.push(FieldViolation {
                            field: field.name.clone(),
                            reason: "field is required".into(),
                        });
                    }
                }
                Some(value) => {
                    if !field.ty.matches(value) {
                        violations.push(FieldViolation {
                            field: field.name.clone(),
                            reason: format!("expected {}, found {}", field.ty, json_kind(value)),
                        });
                        continue;
                    }
                    if let Err(reason) = field.constraints.check(value) {
                        violations.push(FieldViolation {
                            field: field.name.clone(),
                            reason,
                        });
                        continue;
                    }
                    values.insert(field.name.clone(), value.clone());
                }
            }
        }

        if !violations.is_empty() {
            return Err(violations);
        }

        let ignored = incoming
            .keys()
            .filter(|key| self.field(key).is_none())
            .cloned()
            .collect();

        Ok(BoundPayload { values, ignored })
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
