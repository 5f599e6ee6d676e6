use std::sync::Arc;

use serde_json::{Map, Value};

use super::model::{NewPoster, Poster, PosterStatus, RenderingContext};
use super::repository::PosterRepository;
use crate::error::AppError;

/// Archives one successful generation.
#[derive(Clone)]
pub struct PosterRecordWriter {
    posters: Arc<dyn PosterRepository>,
}

impl PosterRecordWriter {
    pub fn new(posters: Arc<dyn PosterRepository>) -> Self {
        Self { posters }
    }

    /// Insert a `completed` poster holding snapshots of the raw data and the final context.
    pub async fn save(
        &self,
        template_id: i64,
        business_name: &str,
        raw_input: &Map<String, Value>,
        final_context: &RenderingContext,
        artifact_url: &str,
    ) -> Result<Poster, AppError> {
        let record = NewPoster {
            template_id,
            business_name: business_name.to_string(),
            user_input_data: Value::Object(raw_input.clone()),
            final_customization: Value::Object(final_context.clone()),
            artifact_url: artifact_url.to_string(),
            status: PosterStatus::Completed,
        };

        let poster = self.posters.create(record).await?;
        log::info!(
            "Stored poster {} for template {} ({})",
            poster.id,
            template_id,
            business_name
        );
        Ok(poster)
    }
}
