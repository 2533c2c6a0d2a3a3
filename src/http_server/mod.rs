//! # HTTP Server Module
//!
//! JSON API over the provisioning saga, the token service, and the scoped
//! file operations.
//!
//! # Endpoints (under `/api/v1`)
//!
//! - `/users/*` - Registration, login, refresh, current account
//! - `/files/*` - List, download, upload, delete
//! - `/folders/*` - List, create, delete
//! - `/ping` - Liveness

pub mod auth_routes;
pub mod config;
pub mod errors;
pub mod server;
pub mod state;
pub mod storage_routes;

pub use config::HttpServerConfig;
pub use errors::{ApiError, ErrorResponse};
pub use server::{build_router, HttpServer, API_PREFIX};
pub use state::AppState;
