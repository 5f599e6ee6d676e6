use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

use crate::storage::ArtifactKind;

/// Flat key/value map fed to the layout template.
pub type RenderingContext = Map<String, Value>;

/// Poster template as read by the generation pipeline, with its layout file resolved.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Template {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub template_type: String,
    pub layout_id: i64,
    /// Layout file path relative to the templates directory.
    pub layout_file_path: String,
    pub price: i32,
    pub thumbnail_url: Option<String>,
    pub is_active: bool,
    /// Ordered list of `FieldSpec` objects.
    #[schema(value_type = Vec<FieldSpec>)]
    pub required_fields: Value,
    #[schema(value_type = Object)]
    pub default_customization: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One entry of a template's required-field schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FieldSpec {
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(rename = "type", default)]
    pub field_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, alias = "maxLength", skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, alias = "patternTitle", skip_serializing_if = "Option::is_none")]
    pub pattern_title: Option<String>,
}

impl FieldSpec {
    /// Label used in user-facing messages, falling back to the field name.
    pub fn display_label(&self) -> &str {
        if self.label.trim().is_empty() {
            &self.name
        } else {
            &self.label
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Layout {
    pub id: i64,
    pub name: String,
    pub file_path: String,
    pub created_at: DateTime<Utc>,
}

pub const LOGO_ASSET_TYPE: &str = "logo";

/// Reusable design asset, e.g. a logo SVG.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Asset {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub asset_type: String,
    /// Raw SVG/text markup.
    pub data: String,
    pub default_color: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Pdf,
    Png,
}

impl From<OutputFormat> for ArtifactKind {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Pdf => ArtifactKind::Pdf,
            OutputFormat::Png => ArtifactKind::Png,
        }
    }
}

/// Caller-supplied generation request body.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct PosterInput {
    #[schema(example = "Acme Hardware")]
    pub business_name: String,
    /// Values keyed by the template's field names, plus free-form extras.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub data: Map<String, Value>,
    /// Overrides of the template's default customization (colors, logo selection).
    #[serde(default)]
    #[schema(value_type = Object)]
    pub customization_data: Map<String, Value>,
    #[serde(default)]
    pub output: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PosterStatus {
    Completed,
    Failed,
    Draft,
}

impl PosterStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Draft => "draft",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "draft" => Some(Self::Draft),
            _ => None,
        }
    }
}

/// Persisted generation record.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Poster {
    pub id: i64,
    pub template_id: i64,
    pub business_name: String,
    #[schema(value_type = Object)]
    pub user_input_data: Value,
    #[schema(value_type = Object)]
    pub final_customization: Value,
    pub artifact_url: String,
    pub status: PosterStatus,
    pub created_at: DateTime<Utc>,
}

/// Poster fields supplied on insert; id and timestamp come from the store.
#[derive(Debug, Clone)]
pub struct NewPoster {
    pub template_id: i64,
    pub business_name: String,
    pub user_input_data: Value,
    pub final_customization: Value,
    pub artifact_url: String,
    pub status: PosterStatus,
}

/// Poster as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PosterView {
    pub id: i64,
    pub template_id: i64,
    pub business_name: String,
    #[schema(example = "/posters/files/Acme_Hardware_1760000000_1a2b3c4d.pdf")]
    pub artifact_url: String,
    pub status: PosterStatus,
    pub created_at: DateTime<Utc>,
}

impl From<Poster> for PosterView {
    fn from(poster: Poster) -> Self {
        Self {
            id: poster.id,
            template_id: poster.template_id,
            business_name: poster.business_name,
            artifact_url: poster.artifact_url,
            status: poster.status,
            created_at: poster.created_at,
        }
    }
}
