//! The generation pipeline: template lookup, field validation, context building, HTML
//! rendering, rasterization and record persistence, strictly in that order.

use std::sync::Arc;
use std::time::Duration;

use super::context::build_context;
use super::model::{Poster, PosterInput, Template};
use super::rasterizer::{rasterize_to_file, Rasterizer};
use super::renderer::TemplateRenderer;
use super::repository::{AssetRepository, PosterRepository, TemplateRepository};
use super::validation::{validate_max_chars, validate_required, FieldValidator, ValidationErrors};
use super::writer::PosterRecordWriter;
use crate::error::AppError;
use crate::storage::{ArtifactKind, ArtifactStore};

pub const MAX_BUSINESS_NAME_CHARS: usize = 100;

#[derive(Clone)]
pub struct PosterService {
    templates: Arc<dyn TemplateRepository>,
    assets: Arc<dyn AssetRepository>,
    posters: Arc<dyn PosterRepository>,
    renderer: TemplateRenderer,
    rasterizer: Arc<dyn Rasterizer>,
    store: ArtifactStore,
    writer: PosterRecordWriter,
    render_timeout: Duration,
}

impl PosterService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        templates: Arc<dyn TemplateRepository>,
        assets: Arc<dyn AssetRepository>,
        posters: Arc<dyn PosterRepository>,
        renderer: TemplateRenderer,
        rasterizer: Arc<dyn Rasterizer>,
        store: ArtifactStore,
        render_timeout: Duration,
    ) -> Self {
        let writer = PosterRecordWriter::new(posters.clone());
        Self {
            templates,
            assets,
            posters,
            renderer,
            rasterizer,
            store,
            writer,
            render_timeout,
        }
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Run the whole pipeline for one request. Nothing is persisted unless every stage succeeds.
    pub async fn generate(&self, template_id: i64, input: PosterInput) -> Result<Poster, AppError> {
        validate_business_name(&input.business_name)?;
        let template = self.load_template(template_id).await?;

        let validator = FieldValidator::from_schema_value(&template.required_fields)?;
        let errors = validator.validate(&input.data);
        if !errors.is_empty() {
            log::warn!(
                "Template {}: {} invalid field(s) for '{}'",
                template.id,
                errors.len(),
                input.business_name
            );
            errors.into_result()?;
        }

        let context = build_context(&template, &input, self.assets.as_ref()).await?;

        let html = self
            .renderer
            .render(&context, &template.layout_file_path)
            .await
            .map_err(|e| {
                log::error!(
                    "Template {}: render stage failed for '{}'",
                    template.id,
                    input.business_name
                );
                AppError::from(e)
            })?;

        let kind = ArtifactKind::from(input.output);
        let path = rasterize_to_file(
            self.rasterizer.as_ref(),
            &self.store,
            &html,
            &input.business_name,
            kind,
            self.render_timeout,
        )
        .await
        .map_err(|e| {
            log::error!(
                "Template {}: rasterize stage failed for '{}': {}",
                template.id,
                input.business_name,
                e
            );
            AppError::from(e)
        })?;

        let artifact_url = self.store.url_for(&path).ok_or_else(|| {
            AppError::Internal("artifact path has no usable file name".to_string())
        })?;

        let saved = self
            .writer
            .save(
                template.id,
                &input.business_name,
                &input.data,
                &context,
                &artifact_url,
            )
            .await;

        match saved {
            Ok(poster) => {
                log::info!(
                    "Generated poster {} from template {} at {}",
                    poster.id,
                    template.id,
                    artifact_url
                );
                Ok(poster)
            }
            Err(e) => {
                log::error!(
                    "Template {}: record stage failed for '{}': {}",
                    template.id,
                    input.business_name,
                    e
                );
                if let Err(io) = self.store.remove(&path).await {
                    log::warn!("Failed to remove orphaned artifact {}: {}", path.display(), io);
                }
                Err(e)
            }
        }
    }

    pub async fn get(&self, id: i64) -> Result<Poster, AppError> {
        self.posters
            .get_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("poster {} not found", id)))
    }

    /// Remove the record, then its artifact. A missing file is only logged.
    pub async fn delete(&self, id: i64) -> Result<(), AppError> {
        let poster = self.get(id).await?;
        if !self.posters.delete(id).await? {
            return Err(AppError::NotFound(format!("poster {} not found", id)));
        }
        if let Err(e) = self.store.delete_by_url(&poster.artifact_url).await {
            log::warn!(
                "Poster {} deleted but its artifact {} could not be removed: {}",
                id,
                poster.artifact_url,
                e
            );
        }
        Ok(())
    }

    async fn load_template(&self, template_id: i64) -> Result<Template, AppError> {
        let template = self
            .templates
            .get_by_id(template_id)
            .await?
            .filter(|t| t.is_active)
            .ok_or_else(|| AppError::NotFound(format!("template {} not found", template_id)))?;

        if template.layout_file_path.trim().is_empty() {
            log::error!("Template {} has no layout file", template.id);
            return Err(AppError::Configuration(
                "template configuration error: layout file missing".to_string(),
            ));
        }
        Ok(template)
    }
}

pub fn validate_business_name(name: &str) -> Result<(), AppError> {
    let mut errors = ValidationErrors::new();
    validate_required(name, "business_name", "Business name", &mut errors);
    validate_max_chars(
        name,
        MAX_BUSINESS_NAME_CHARS,
        "business_name",
        "Business name",
        &mut errors,
    );
    errors.into_result()
}
