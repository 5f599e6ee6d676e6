pub mod handlers;
pub mod model;
pub mod repository;

pub use handlers::config;
pub use repository::OrderRepository;
