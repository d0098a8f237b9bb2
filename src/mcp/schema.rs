//! Declared input shapes for tools and boundary validation of raw arguments.
//!
//! A shape is closed: every key in the incoming arguments must be declared,
//! and only fields explicitly marked optional may be absent. Absent optional
//! fields come back as [`ArgValue::NotProvided`] rather than a zero value.
//!
//! String fields are processed in a fixed order:
//!
//! 1. surrounding whitespace is trimmed (when enabled)
//! 2. length bounds and pattern are checked
//! 3. case normalisation is applied to the accepted value

use std::fmt;

use indexmap::IndexMap;
use regex::Regex;
use serde::{Serialize, Serializer};
use serde_json::{json, Map, Value};
use thiserror::Error;

/// The JSON type a field accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// A JSON string.
    String,
    /// A JSON number without a fractional part.
    Integer,
    /// A JSON boolean.
    Boolean,
}

impl FieldKind {
    const fn schema_type(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
        }
    }
}

/// Case normalisation applied to string fields after validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseTransform {
    /// Uppercase the whole value.
    Upper,
}

/// A single declared field.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    kind: FieldKind,
    description: Option<String>,
    required: bool,
    trim: bool,
    min_length: Option<usize>,
    max_length: Option<usize>,
    pattern: Option<Regex>,
    case: Option<CaseTransform>,
}

impl FieldSpec {
    fn new(kind: FieldKind) -> Self {
        Self {
            kind,
            description: None,
            required: false,
            trim: false,
            min_length: None,
            max_length: None,
            pattern: None,
            case: None,
        }
    }

    /// An optional string field.
    #[must_use]
    pub fn string() -> Self {
        Self::new(FieldKind::String)
    }

    /// An optional integer field.
    #[must_use]
    pub fn integer() -> Self {
        Self::new(FieldKind::Integer)
    }

    /// An optional boolean field.
    #[must_use]
    pub fn boolean() -> Self {
        Self::new(FieldKind::Boolean)
    }

    /// Marks the field as required.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Sets the human-readable description advertised in the JSON schema.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Trims surrounding whitespace before validation.
    #[must_use]
    pub fn trimmed(mut self) -> Self {
        self.trim = true;
        self
    }

    /// Bounds the length of the (trimmed) value, counted in characters.
    #[must_use]
    pub fn length(mut self, min: usize, max: usize) -> Self {
        self.min_length = Some(min);
        self.max_length = Some(max);
        self
    }

    /// Requires the (trimmed) value to match `pattern`.
    ///
    /// # Errors
    ///
    /// Returns an error if `pattern` is not a valid regular expression.
    pub fn pattern(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.pattern = Some(Regex::new(pattern)?);
        Ok(self)
    }

    /// Uppercases the value once it has been accepted.
    #[must_use]
    pub fn uppercase(mut self) -> Self {
        self.case = Some(CaseTransform::Upper);
        self
    }

    /// Returns whether the field must be present.
    #[must_use]
    pub const fn is_required(&self) -> bool {
        self.required
    }

    fn to_json_schema(&self) -> Value {
        let mut schema = Map::new();
        schema.insert("type".into(), json!(self.kind.schema_type()));
        if let Some(description) = &self.description {
            schema.insert("description".into(), json!(description));
        }
        if let Some(min) = self.min_length {
            schema.insert("minLength".into(), json!(min));
        }
        if let Some(max) = self.max_length {
            schema.insert("maxLength".into(), json!(max));
        }
        if let Some(pattern) = &self.pattern {
            schema.insert("pattern".into(), json!(pattern.as_str()));
        }
        Value::Object(schema)
    }

    fn check(&self, name: &str, value: &Value) -> Result<Value, ValidationError> {
        match self.kind {
            FieldKind::String => {
                let raw = value
                    .as_str()
                    .ok_or_else(|| ValidationError::new(name, Constraint::Type("string")))?;
                self.check_string(name, raw).map(Value::String)
            }
            FieldKind::Integer => {
                if value.is_i64() || value.is_u64() {
                    Ok(value.clone())
                } else {
                    Err(ValidationError::new(name, Constraint::Type("integer")))
                }
            }
            FieldKind::Boolean => {
                if value.is_boolean() {
                    Ok(value.clone())
                } else {
                    Err(ValidationError::new(name, Constraint::Type("boolean")))
                }
            }
        }
    }

    fn check_string(&self, name: &str, raw: &str) -> Result<String, ValidationError> {
        let value = if self.trim { raw.trim() } else { raw };
        let length = value.chars().count();

        if let Some(min) = self.min_length {
            if length < min {
                return Err(ValidationError::new(name, Constraint::MinLength(min)));
            }
        }
        if let Some(max) = self.max_length {
            if length > max {
                return Err(ValidationError::new(name, Constraint::MaxLength(max)));
            }
        }
        if let Some(pattern) = &self.pattern {
            if !pattern.is_match(value) {
                return Err(ValidationError::new(
                    name,
                    Constraint::Pattern(pattern.as_str().to_string()),
                ));
            }
        }

        Ok(match self.case {
            Some(CaseTransform::Upper) => value.to_uppercase(),
            None => value.to_string(),
        })
    }
}

/// The constraint a value failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    /// The arguments were not a JSON object.
    Object,
    /// A required field was absent.
    Required,
    /// A key that the shape does not declare.
    Unrecognized,
    /// The value had the wrong JSON type.
    Type(&'static str),
    /// The value was shorter than allowed.
    MinLength(usize),
    /// The value was longer than allowed.
    MaxLength(usize),
    /// The value did not match the pattern.
    Pattern(String),
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Object => write!(f, "expected an object"),
            Self::Required => write!(f, "field is required"),
            Self::Unrecognized => write!(f, "unrecognized field"),
            Self::Type(expected) => write!(f, "expected {expected}"),
            Self::MinLength(min) => write!(f, "must be at least {min} characters"),
            Self::MaxLength(max) => write!(f, "must be at most {max} characters"),
            Self::Pattern(pattern) => write!(f, "must match pattern {pattern}"),
        }
    }
}

/// A field-level validation failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{field}: {constraint}")]
pub struct ValidationError {
    /// The offending field (or `arguments` for the whole object).
    pub field: String,
    /// The constraint that failed.
    pub constraint: Constraint,
}

impl ValidationError {
    /// Creates a failure for `field`.
    pub fn new(field: impl Into<String>, constraint: Constraint) -> Self {
        Self {
            field: field.into(),
            constraint,
        }
    }
}

/// A validated argument value.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    /// The caller supplied the field; holds the normalised value.
    Provided(Value),
    /// The field is optional and the caller left it out.
    NotProvided,
}

/// Arguments that passed validation, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidatedArgs {
    values: IndexMap<String, ArgValue>,
}

impl ValidatedArgs {
    /// Returns the state of a declared field, or `None` for undeclared names.
    #[must_use]
    pub fn arg(&self, name: &str) -> Option<&ArgValue> {
        self.values.get(name)
    }

    /// Returns the value of a provided field.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        match self.values.get(name) {
            Some(ArgValue::Provided(value)) => Some(value),
            _ => None,
        }
    }

    /// Returns the value of a provided string field.
    #[must_use]
    pub fn str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// Returns whether the caller supplied `name`.
    #[must_use]
    pub fn is_provided(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Collects the provided fields into a JSON object.
    #[must_use]
    pub fn to_map(&self) -> Map<String, Value> {
        self.values
            .iter()
            .filter_map(|(name, value)| match value {
                ArgValue::Provided(v) => Some((name.clone(), v.clone())),
                ArgValue::NotProvided => None,
            })
            .collect()
    }
}

/// A closed object shape made of named fields.
#[derive(Debug, Clone, Default)]
pub struct InputShape {
    fields: IndexMap<String, FieldSpec>,
}

impl InputShape {
    /// Creates a shape with no fields.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a field. Redeclaring a name replaces the earlier spec.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, spec: FieldSpec) -> Self {
        self.fields.insert(name.into(), spec);
        self
    }

    /// Iterates over the declared fields in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldSpec)> {
        self.fields.iter().map(|(name, spec)| (name.as_str(), spec))
    }

    /// Validates raw arguments against this shape.
    ///
    /// `null` is treated as an empty object.
    ///
    /// # Errors
    ///
    /// Returns the first failing field and the constraint it failed.
    pub fn validate(&self, raw: &Value) -> Result<ValidatedArgs, ValidationError> {
        let empty = Map::new();
        let object = match raw {
            Value::Null => &empty,
            Value::Object(object) => object,
            _ => return Err(ValidationError::new("arguments", Constraint::Object)),
        };

        let mut values = IndexMap::with_capacity(self.fields.len());
        for (name, spec) in &self.fields {
            let value = match object.get(name) {
                Some(raw_value) => ArgValue::Provided(spec.check(name, raw_value)?),
                None if spec.required => {
                    return Err(ValidationError::new(name.as_str(), Constraint::Required));
                }
                None => ArgValue::NotProvided,
            };
            values.insert(name.clone(), value);
        }

        if let Some(unknown) = object.keys().find(|key| !self.fields.contains_key(*key)) {
            return Err(ValidationError::new(unknown.as_str(), Constraint::Unrecognized));
        }

        Ok(ValidatedArgs { values })
    }

    /// Renders the shape as a JSON Schema object for tool listings.
    #[must_use]
    pub fn to_json_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .fields
            .iter()
            .map(|(name, spec)| (name.clone(), spec.to_json_schema()))
            .collect();
        let required: Vec<&str> = self
            .fields
            .iter()
            .filter(|(_, spec)| spec.required)
            .map(|(name, _)| name.as_str())
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        })
    }
}

impl Serialize for InputShape {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json_schema().serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_shape(required: bool) -> InputShape {
        let mut spec = FieldSpec::string()
            .trimmed()
            .length(2, 2)
            .pattern("^[A-Za-z]{2}$")
            .unwrap()
            .uppercase();
        if required {
            spec = spec.required();
        }
        InputShape::new().field("state", spec)
    }

    #[test]
    fn trims_then_uppercases() {
        let args = state_shape(true)
            .validate(&json!({ "state": "  ca " }))
            .unwrap();
        assert_eq!(args.str("state"), Some("CA"));
    }

    #[test]
    fn rejects_too_long_value() {
        let err = state_shape(true)
            .validate(&json!({ "state": "California" }))
            .unwrap_err();
        assert_eq!(err.field, "state");
        assert_eq!(err.constraint, Constraint::MaxLength(2));
    }

    #[test]
    fn rejects_pattern_mismatch() {
        let err = state_shape(true)
            .validate(&json!({ "state": "C1" }))
            .unwrap_err();
        assert_eq!(err.field, "state");
        assert!(matches!(err.constraint, Constraint::Pattern(_)));
    }

    #[test]
    fn rejects_missing_required_field() {
        let err = state_shape(true).validate(&json!({})).unwrap_err();
        assert_eq!(err, ValidationError::new("state", Constraint::Required));
    }

    #[test]
    fn optional_field_resolves_to_not_provided() {
        let args = state_shape(false).validate(&Value::Null).unwrap();
        assert_eq!(args.arg("state"), Some(&ArgValue::NotProvided));
        assert!(!args.is_provided("state"));
        assert!(args.to_map().is_empty());
    }

    #[test]
    fn rejects_unknown_keys() {
        let err = state_shape(false)
            .validate(&json!({ "state": "ny", "zip": "10001" }))
            .unwrap_err();
        assert_eq!(err.field, "zip");
        assert_eq!(err.constraint, Constraint::Unrecognized);
    }

    #[test]
    fn rejects_non_object_arguments() {
        let err = state_shape(false).validate(&json!(["CA"])).unwrap_err();
        assert_eq!(err.field, "arguments");
        assert_eq!(err.constraint, Constraint::Object);
    }

    #[test]
    fn rejects_wrong_type() {
        let err = state_shape(true)
            .validate(&json!({ "state": 42 }))
            .unwrap_err();
        assert_eq!(err.constraint, Constraint::Type("string"));
    }

    #[test]
    fn integer_and_boolean_fields() {
        let shape = InputShape::new()
            .field("limit", FieldSpec::integer())
            .field("verbose", FieldSpec::boolean().required());

        let args = shape
            .validate(&json!({ "limit": 3, "verbose": true }))
            .unwrap();
        assert_eq!(args.get("limit"), Some(&json!(3)));

        let err = shape
            .validate(&json!({ "limit": 1.5, "verbose": true }))
            .unwrap_err();
        assert_eq!(err.field, "limit");
    }

    #[test]
    fn json_schema_is_closed() {
        let schema = state_shape(true).to_json_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["additionalProperties"], false);
        assert_eq!(schema["required"], json!(["state"]));
        assert_eq!(schema["properties"]["state"]["minLength"], 2);
        assert_eq!(schema["properties"]["state"]["pattern"], "^[A-Za-z]{2}$");
    }
}
