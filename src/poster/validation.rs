//! Validation of submitted poster data against a template's runtime field schema.
//!
//! The schema is decoded from the template row on every request and compiled into a
//! [`FieldValidator`]. Input keys the schema does not name pass through unchecked.

use std::collections::BTreeMap;
use std::fmt;

use regex::Regex;
use serde_json::{Map, Value};

use super::model::FieldSpec;
use crate::error::AppError;

/// A single failed field.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn required(spec: &FieldSpec) -> Self {
        Self::new(&spec.name, format!("{} is required.", spec.display_label()))
    }

    pub fn too_long(spec: &FieldSpec, max: usize) -> Self {
        Self::new(
            &spec.name,
            format!("{} cannot exceed {} characters.", spec.display_label(), max),
        )
    }

    pub fn pattern_mismatch(spec: &FieldSpec) -> Self {
        let title = spec
            .pattern_title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or("Invalid format.");
        Self::new(&spec.name, format!("{}: {}", spec.display_label(), title))
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.field, self.message)
    }
}

/// Field name to message. A later failure on the same field replaces the earlier one.
#[derive(Debug, Default, Clone)]
pub struct ValidationErrors {
    errors: BTreeMap<String, String>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, error: ValidationError) {
        self.errors.insert(error.field, error.message);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.errors.get(field).map(String::as_str)
    }

    /// Ok when nothing failed, otherwise one aggregated validation error.
    pub fn into_result(self) -> Result<(), AppError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AppError::validation(
                "invalid input data provided",
                self.errors,
            ))
        }
    }
}

struct CompiledField {
    spec: FieldSpec,
    pattern: Option<Regex>,
}

/// A template schema with its patterns compiled.
pub struct FieldValidator {
    fields: Vec<CompiledField>,
}

impl FieldValidator {
    /// Decode the stored `required_fields` JSON and compile every pattern.
    pub fn from_schema_value(value: &Value) -> Result<Self, AppError> {
        let specs = parse_field_specs(value)?;
        Self::compile(specs)
    }

    pub fn compile(specs: Vec<FieldSpec>) -> Result<Self, AppError> {
        let fields = specs
            .into_iter()
            .map(|spec| {
                let pattern = match spec.pattern.as_deref().filter(|p| !p.is_empty()) {
                    Some(raw) => Some(Regex::new(raw).map_err(|e| {
                        log::error!("Invalid pattern for field '{}': {}", spec.name, e);
                        AppError::Configuration(format!(
                            "template field '{}' has an invalid pattern",
                            spec.name
                        ))
                    })?),
                    None => None,
                };
                Ok(CompiledField { spec, pattern })
            })
            .collect::<Result<Vec<_>, AppError>>()?;

        Ok(Self { fields })
    }

    pub fn specs(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().map(|f| &f.spec)
    }

    /// Check `input` against every field in schema order.
    pub fn validate(&self, input: &Map<String, Value>) -> ValidationErrors {
        let mut errors = ValidationErrors::new();

        for field in &self.fields {
            let spec = &field.spec;
            let value = match input.get(&spec.name).and_then(coerce_to_string) {
                Some(value) if !value.is_empty() => value,
                _ => {
                    errors.add(ValidationError::required(spec));
                    continue;
                }
            };

            if let Some(max) = spec.max_length.filter(|max| *max > 0) {
                if value.chars().count() > max {
                    errors.add(ValidationError::too_long(spec, max));
                }
            }

            if let Some(pattern) = &field.pattern {
                if !pattern.is_match(&value) {
                    errors.add(ValidationError::pattern_mismatch(spec));
                }
            }
        }

        errors
    }
}

/// Decode a stored schema into field specs.
pub fn parse_field_specs(value: &Value) -> Result<Vec<FieldSpec>, AppError> {
    if value.is_null() {
        return Ok(Vec::new());
    }
    serde_json::from_value(value.clone()).map_err(|e| {
        log::error!("Failed to parse required_fields: {}", e);
        AppError::Configuration("template configuration error: invalid required fields".into())
    })
}

/// String form of a JSON-decoded value; `None` for null.
pub fn coerce_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

/// Record a "`label` is required." error for `field` when `value` is blank.
pub fn validate_required(value: &str, field: &str, label: &str, errors: &mut ValidationErrors) {
    if value.trim().is_empty() {
        errors.add(ValidationError::new(field, format!("{} is required.", label)));
    }
}

pub fn validate_max_chars(
    value: &str,
    max: usize,
    field: &str,
    label: &str,
    errors: &mut ValidationErrors,
) {
    if value.chars().count() > max {
        errors.add(ValidationError::new(
            field,
            format!("{} cannot exceed {} characters.", label, max),
        ));
    }
}
