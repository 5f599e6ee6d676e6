//! Template, layout and asset administration.

pub mod handlers;
pub mod model;

pub use handlers::config;
