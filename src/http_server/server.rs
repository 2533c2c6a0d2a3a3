//! # HTTP Server
//!
//! Combines the account and storage routers under `/api/v1`.

use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use super::auth_routes::auth_routes;
use super::config::HttpServerConfig;
use super::state::AppState;
use super::storage_routes::storage_routes;
use crate::observability::Event;

/// Prefix for every endpoint
pub const API_PREFIX: &str = "/api/v1";

pub struct HttpServer {
    config: HttpServerConfig,
    router: Router,
}

impl HttpServer {
    pub fn new(config: HttpServerConfig, state: AppState) -> Self {
        let router = build_router(&config, state);
        Self { config, router }
    }

    /// Get the socket address
    pub fn socket_addr(&self) -> String {
        self.config.socket_addr()
    }

    /// Get the router (for testing)
    pub fn router(self) -> Router {
        self.router
    }

    /// Bind and serve until the process stops
    pub async fn start(self) -> Result<(), std::io::Error> {
        let addr: SocketAddr = self.config.socket_addr().parse().map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, format!("{}", e))
        })?;

        let listener = TcpListener::bind(addr).await?;
        let addr = addr.to_string();
        Event::Serving.emit(&[("addr", &addr), ("prefix", API_PREFIX)]);

        axum::serve(listener, self.router).await
    }
}

/// Build the combined router with all endpoints
pub fn build_router(config: &HttpServerConfig, state: AppState) -> Router {
    let cors = if config.cors_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = config
            .cors_origins
            .iter()
            .filter_map(|s| s.parse().ok())
            .collect();

        // Cookies need credentials, which rule out wildcards
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([
                axum::http::Method::GET,
                axum::http::Method::POST,
                axum::http::Method::DELETE,
            ])
            .allow_headers([
                axum::http::header::AUTHORIZATION,
                axum::http::header::CONTENT_TYPE,
            ])
            .allow_credentials(true)
    };

    let api = Router::new()
        .merge(auth_routes(state.clone()))
        .merge(storage_routes(state));

    Router::new().nest(API_PREFIX, api).layer(cors)
}
