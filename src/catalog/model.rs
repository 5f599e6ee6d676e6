use std::path::{Component, Path};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};

use crate::error::AppError;
use crate::poster::model::FieldSpec;
use crate::poster::validation::{
    parse_field_specs, validate_max_chars, validate_required, FieldValidator, ValidationError,
    ValidationErrors,
};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateTemplateRequest {
    #[schema(example = "Lipa Na M-Pesa Till")]
    pub name: String,
    #[serde(rename = "type")]
    #[schema(example = "till")]
    pub template_type: String,
    pub layout_id: i64,
    #[serde(default)]
    pub price: i32,
    pub thumbnail_url: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default = "empty_list")]
    #[schema(value_type = Vec<FieldSpec>)]
    pub required_fields: Value,
    #[serde(default = "empty_object")]
    #[schema(value_type = Object)]
    pub default_customization: Value,
}

/// Partial update; absent fields keep their stored value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateTemplateRequest {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub template_type: Option<String>,
    pub layout_id: Option<i64>,
    pub price: Option<i32>,
    pub thumbnail_url: Option<String>,
    pub is_active: Option<bool>,
    #[schema(value_type = Option<Vec<FieldSpec>>)]
    pub required_fields: Option<Value>,
    #[schema(value_type = Option<Object>)]
    pub default_customization: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateLayoutRequest {
    #[schema(example = "Standard A4")]
    pub name: String,
    /// Path relative to the templates directory.
    #[schema(example = "standard.html")]
    pub file_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateAssetRequest {
    pub name: String,
    #[serde(rename = "type")]
    #[schema(example = "logo")]
    pub asset_type: String,
    /// Raw SVG markup.
    pub data: String,
    #[schema(example = "#00A651")]
    pub default_color: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct AssetQuery {
    /// Restrict the listing to one asset type.
    #[serde(rename = "type")]
    pub asset_type: Option<String>,
}

fn default_active() -> bool {
    true
}

fn empty_list() -> Value {
    Value::Array(Vec::new())
}

fn empty_object() -> Value {
    Value::Object(Default::default())
}

impl CreateTemplateRequest {
    /// Check the request and normalize `default_customization` to a single-encoded object.
    pub fn validate(&mut self) -> Result<(), AppError> {
        let mut errors = ValidationErrors::new();
        validate_required(&self.name, "name", "Name", &mut errors);
        validate_max_chars(&self.name, 255, "name", "Name", &mut errors);
        validate_required(&self.template_type, "type", "Type", &mut errors);
        if self.price < 0 {
            errors.add(ValidationError::new(
                "price",
                "Price cannot be negative.",
            ));
        }
        errors.into_result()?;

        check_required_fields(&self.required_fields)?;
        self.default_customization = normalize_customization(&self.default_customization)?;
        Ok(())
    }
}

impl UpdateTemplateRequest {
    pub fn validate(&mut self) -> Result<(), AppError> {
        if let Some(name) = &self.name {
            let mut errors = ValidationErrors::new();
            validate_required(name, "name", "Name", &mut errors);
            validate_max_chars(name, 255, "name", "Name", &mut errors);
            errors.into_result()?;
        }
        if matches!(self.price, Some(price) if price < 0) {
            return Err(AppError::invalid_field("price", "Price cannot be negative."));
        }
        if let Some(fields) = &self.required_fields {
            check_required_fields(fields)?;
        }
        if let Some(customization) = &self.default_customization {
            self.default_customization = Some(normalize_customization(customization)?);
        }
        Ok(())
    }
}

impl CreateLayoutRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        let mut errors = ValidationErrors::new();
        validate_required(&self.name, "name", "Name", &mut errors);
        validate_required(&self.file_path, "file_path", "File path", &mut errors);
        errors.into_result()?;

        if !is_safe_relative_path(&self.file_path) {
            return Err(AppError::invalid_field(
                "file_path",
                "File path must be relative to the templates directory.",
            ));
        }
        Ok(())
    }
}

impl CreateAssetRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        let mut errors = ValidationErrors::new();
        validate_required(&self.name, "name", "Name", &mut errors);
        validate_required(&self.asset_type, "type", "Type", &mut errors);
        validate_required(&self.data, "data", "Data", &mut errors);
        if let Some(color) = &self.default_color {
            if !is_hex_color(color) {
                errors.add(ValidationError::new(
                    "default_color",
                    "Default color must look like #RRGGBB.",
                ));
            }
        }
        errors.into_result()
    }
}

fn check_required_fields(value: &Value) -> Result<Vec<FieldSpec>, AppError> {
    let specs = parse_field_specs(value).map_err(|_| {
        AppError::invalid_field(
            "required_fields",
            "required_fields must be a list of field definitions.",
        )
    })?;
    if let Some(spec) = specs.iter().find(|spec| spec.name.trim().is_empty()) {
        log::warn!("Rejected field definition without a name: {:?}", spec);
        return Err(AppError::invalid_field(
            "required_fields",
            "Every field definition needs a name.",
        ));
    }
    if let Some(spec) = specs
        .iter()
        .find(|spec| FieldValidator::compile(vec![(*spec).clone()]).is_err())
    {
        return Err(AppError::invalid_field(
            "required_fields",
            format!("Field '{}' has an invalid pattern.", spec.name),
        ));
    }
    Ok(specs)
}

/// Accept an object, or a string holding one, and return the object.
fn normalize_customization(value: &Value) -> Result<Value, AppError> {
    let invalid = || {
        AppError::invalid_field(
            "default_customization",
            "default_customization must be a JSON object.",
        )
    };
    match value {
        Value::Null => Ok(empty_object()),
        Value::Object(_) => Ok(value.clone()),
        Value::String(raw) => match serde_json::from_str::<Value>(raw) {
            Ok(inner @ Value::Object(_)) => Ok(inner),
            _ => Err(invalid()),
        },
        _ => Err(invalid()),
    }
}

/// Relative, non-empty, and free of `..` components.
pub fn is_safe_relative_path(raw: &str) -> bool {
    let path = Path::new(raw);
    !raw.trim().is_empty()
        && path
            .components()
            .all(|component| matches!(component, Component::Normal(_) | Component::CurDir))
}

fn is_hex_color(value: &str) -> bool {
    value.len() == 7
        && value.starts_with('#')
        && value[1..].chars().all(|c| c.is_ascii_hexdigit())
}
