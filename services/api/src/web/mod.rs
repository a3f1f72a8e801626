pub mod auth;
pub mod comments;
pub mod documents;
pub mod extract;
pub mod middleware;
pub mod response;
pub mod rest;
pub mod routes;
pub mod state;
pub mod user;

pub use middleware::require_auth;
pub use routes::router;
