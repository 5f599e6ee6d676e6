pub mod handlers;
pub mod jwt;
pub mod middleware;
pub mod model;
pub mod repository;


pub use handlers::config;
pub use jwt::JwtService;
pub use middleware::{require_admin, validate_request_token};
pub use model::*;
pub use repository::UserRepository;
