//! REST API.

pub mod error;
pub mod models;
pub mod openapi;
pub mod routes;
pub mod server;

pub use error::{ApiError, ApiErrorResponse, ApiResult};
pub use server::{ApiServer, ApiServerConfig, AppState, build_router};
