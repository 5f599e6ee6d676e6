//! Poster generation: schema validation, context merging, HTML rendering and headless
//! rasterization of a stored template into a PDF or PNG artifact.

pub mod context;
pub mod handlers;
pub mod model;
pub mod rasterizer;
pub mod renderer;
pub mod repository;
pub mod service;
pub mod validation;
pub mod writer;

pub use handlers::config;
pub use rasterizer::{ChromeRasterizer, RasterError, Rasterizer};
pub use renderer::TemplateRenderer;
pub use repository::{AssetRepository, LayoutRepository, PosterRepository, TemplateRepository};
pub use service::PosterService;
