//! HTML layout rendering with handlebars.
//!
//! Layouts are plain handlebars files under the templates directory. Output is HTML-escaped
//! by default; `{{safeHTML x}}` (or `{{safe_html x}}`, or `{{{x}}}`) writes trusted asset
//! markup as-is. The registry runs in strict mode so a layout that references a key the
//! context does not carry fails instead of producing a blank poster.

use std::path::{Component, Path, PathBuf};

use handlebars::{
    Context, Handlebars, Helper, HelperResult, JsonRender, Output, RenderContext,
};
use thiserror::Error;

use super::model::RenderingContext;
use crate::error::AppError;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("layout path '{0}' must be relative to the templates directory")]
    InvalidLayoutPath(String),
    #[error("failed to read layout {path}: {source}")]
    LayoutIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to compile layout '{layout}': {source}")]
    Compile {
        layout: String,
        #[source]
        source: Box<handlebars::TemplateError>,
    },
    #[error("failed to render layout '{layout}': {source}")]
    Execute {
        layout: String,
        #[source]
        source: Box<handlebars::RenderError>,
    },
}

impl From<RenderError> for AppError {
    fn from(err: RenderError) -> Self {
        log::error!("{}", err);
        match err {
            RenderError::InvalidLayoutPath(_)
            | RenderError::LayoutIo { .. }
            | RenderError::Compile { .. } => {
                AppError::Configuration("template layout is unavailable".to_string())
            }
            RenderError::Execute { .. } => AppError::Render(
                "template could not be rendered with the supplied data".to_string(),
            ),
        }
    }
}

/// Resolves layout references against a templates root and renders them.
#[derive(Debug, Clone)]
pub struct TemplateRenderer {
    templates_dir: PathBuf,
}

impl TemplateRenderer {
    pub fn new(templates_dir: impl Into<PathBuf>) -> Self {
        Self {
            templates_dir: templates_dir.into(),
        }
    }

    pub fn templates_dir(&self) -> &Path {
        &self.templates_dir
    }

    /// Absolute path of `layout_ref`, rejecting anything that escapes the root.
    pub fn resolve(&self, layout_ref: &str) -> Result<PathBuf, RenderError> {
        let relative = Path::new(layout_ref);
        let escapes = layout_ref.trim().is_empty()
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(RenderError::InvalidLayoutPath(layout_ref.to_string()));
        }
        Ok(self.templates_dir.join(relative))
    }

    /// Read `layout_ref` and render it against `context`.
    pub async fn render(
        &self,
        context: &RenderingContext,
        layout_ref: &str,
    ) -> Result<String, RenderError> {
        let path = self.resolve(layout_ref)?;
        let source = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| RenderError::LayoutIo { path, source })?;

        render_source(layout_ref, &source, context)
    }
}

/// Compile `source` and execute it against `context`.
pub fn render_source(
    layout_name: &str,
    source: &str,
    context: &RenderingContext,
) -> Result<String, RenderError> {
    let mut registry = Handlebars::new();
    registry.set_strict_mode(true);
    registry.register_helper("safeHTML", Box::new(safe_html));
    registry.register_helper("safe_html", Box::new(safe_html));

    registry
        .register_template_string(layout_name, source)
        .map_err(|source| RenderError::Compile {
            layout: layout_name.to_string(),
            source: Box::new(source),
        })?;

    registry
        .render(layout_name, context)
        .map_err(|source| RenderError::Execute {
            layout: layout_name.to_string(),
            source: Box::new(source),
        })
}

fn safe_html(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let markup = h.param(0).map(|p| p.value().render()).unwrap_or_default();
    out.write(&markup)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context(value: serde_json::Value) -> RenderingContext {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_user_strings_are_escaped() {
        let html = render_source(
            "t",
            "<h1>{{business_name}}</h1>",
            &context(json!({"business_name": "<b>Acme</b>"})),
        )
        .unwrap();
        assert_eq!(html, "<h1>&lt;b&gt;Acme&lt;/b&gt;</h1>");
    }

    #[test]
    fn test_safe_html_helper_is_unescaped() {
        let ctx = context(json!({"header_logo_svg": "<svg><circle/></svg>"}));
        assert_eq!(
            render_source("t", "{{safeHTML header_logo_svg}}", &ctx).unwrap(),
            "<svg><circle/></svg>"
        );
        assert_eq!(
            render_source("t", "{{safe_html header_logo_svg}}", &ctx).unwrap(),
            "<svg><circle/></svg>"
        );
    }

    #[test]
    fn test_digit_boxes_iterate() {
        let html = render_source(
            "t",
            "{{#each till_numberSplit}}[{{this}}]{{/each}}",
            &context(json!({"till_numberSplit": ["1", "2", "3"]})),
        )
        .unwrap();
        assert_eq!(html, "[1][2][3]");
    }

    #[test]
    fn test_missing_key_is_execution_error() {
        let result = render_source("t", "{{phone}}", &context(json!({})));
        assert!(matches!(result, Err(RenderError::Execute { .. })));
    }

    #[test]
    fn test_syntax_error_is_compile_error() {
        let result = render_source("t", "{{#each items}}", &context(json!({"items": []})));
        assert!(matches!(result, Err(RenderError::Compile { .. })));
    }

    #[test]
    fn test_resolve_rejects_escaping_paths() {
        let renderer = TemplateRenderer::new("/srv/templates");
        assert!(renderer.resolve("standard.html").is_ok());
        assert!(renderer.resolve("../secrets.html").is_err());
        assert!(renderer.resolve("/etc/passwd").is_err());
        assert!(renderer.resolve("").is_err());
    }

    #[tokio::test]
    async fn test_unreadable_layout_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = TemplateRenderer::new(dir.path());
        let err = renderer
            .render(&context(json!({})), "missing.html")
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::LayoutIo { .. }));
        assert!(matches!(AppError::from(err), AppError::Configuration(_)));
    }
}
