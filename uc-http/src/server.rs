//! # Server module — high-level wrapper around Axum
//!
//! Provides a small ergonomic abstraction for building the UC HTTP server,
//! hiding router plumbing, CORS, and graceful shutdown behind a handful of
//! `add_*` methods plus `start`/`wait`.

use crate::cors::{CorsConfig, CorsLayer};
use crate::logs::{LogState, LoggingOptions, init_logging, log_dump, log_sse};
use axum::handler::Handler;
use axum::response::Redirect;
use axum::routing::get;
use axum::{Json, Router};
use axum_embed::ServeEmbed;
use rust_embed::RustEmbed;
use serde::Serialize;
use std::{net::SocketAddr, sync::Arc};
use tokio::{signal, sync::RwLock, task::JoinHandle};
use tracing::info;
use uc_config::get_config;

/// Serializable server info, returned by [`Server::info`].
#[derive(Clone, Serialize)]
pub struct ServerInfo {
    pub name: String,
    pub base_url: String,
    pub http_port: u16,
}

/// The UC HTTP server: an Axum router plus lifecycle management.
pub struct Server {
    name: String,
    base_url: String,
    http_port: u16,
    cors: CorsConfig,
    router: Arc<RwLock<Router>>,
    join_handle: Option<JoinHandle<()>>,
    log_state: Option<LogState>,
}

impl Server {
    /// Creates a new server instance.
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, http_port: u16) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            http_port,
            cors: CorsConfig::new(
                vec!["*".to_string()],
                vec![
                    "GET".to_string(),
                    "PUT".to_string(),
                    "POST".to_string(),
                    "DELETE".to_string(),
                ],
                2700,
            ),
            router: Arc::new(RwLock::new(Router::new())),
            join_handle: None,
            log_state: None,
        }
    }

    /// Creates a server from the global configuration (address, port, name,
    /// CORS allow-list).
    pub fn new_configured() -> Self {
        let config = get_config();
        let address = config.get_address();
        let port = config.get_port();
        let mut server = Self::new(config.get_name(), address, port);
        server.cors = CorsConfig::new(
            config.get_cors_allow_origins(),
            config.get_cors_allow_methods(),
            config.get_cors_max_age().unwrap_or(2700) as u64,
        );
        server
    }

    /// Adds a dynamic JSON route. The closure is invoked on every GET.
    pub async fn add_route<F, Fut, T>(&mut self, path: &str, f: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = T> + Send + 'static,
        T: Serialize + Send + 'static,
    {
        let f = Arc::new(f);

        let handler = {
            let f = f.clone();
            move || {
                let f = f.clone();
                async move { Json(f().await) }
            }
        };

        let route = Router::new().route("/", get(handler));

        let mut r = self.router.write().await;
        *r = std::mem::take(&mut *r).nest(path, route);
    }

    /// Adds a router. Absolute paths (`/`-prefixed) are merged at root;
    /// otherwise the router is nested under the given subpath.
    pub async fn add_router(&mut self, path: &str, route: Router) {
        let mut r = self.router.write().await;
        let current = std::mem::take(&mut *r);

        let combined = if path.starts_with('/') {
            tracing::debug!("merging router at root path: {}", path);
            current.merge(route)
        } else {
            let normalized = format!("/{}", path.trim_start_matches('/'));
            tracing::debug!("nesting router under: {}", normalized);
            current.nest(&normalized, route)
        };

        *r = combined;
    }

    /// Mounts a catch-all fallback service at `path` (or root if `path` is
    /// `"/"`). Used for the resource-tree dispatcher, which owns its own
    /// method/path matching and must see every request, not just the ones
    /// Axum's router would route to it by exact path.
    pub async fn add_fallback<H, T>(&mut self, path: &str, handler: H)
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        let mut r = self.router.write().await;
        if path == "/" {
            *r = std::mem::take(&mut *r).fallback(handler);
        } else {
            let route = Router::new().fallback(handler);
            *r = std::mem::take(&mut *r).nest(path, route);
        }
    }

    /// Serves an embedded static directory.
    pub async fn add_dir<E>(&mut self, path: &str)
    where
        E: RustEmbed + Clone + Send + Sync + 'static,
    {
        let serve = ServeEmbed::<E>::new();

        let mut r = self.router.write().await;
        if path == "/" {
            *r = std::mem::take(&mut *r).fallback_service(serve);
        } else {
            let route = Router::new().fallback_service(serve);
            *r = std::mem::take(&mut *r).nest(path, route);
        }
    }

    /// Serves an embedded single-page app, with client-side routing support.
    pub async fn add_spa<E>(&mut self, path: &str)
    where
        E: RustEmbed + Clone + Send + Sync + 'static,
    {
        let serve = ServeEmbed::<E>::with_parameters(
            Some("index.html".to_string()),
            axum_embed::FallbackBehavior::Ok,
            Some("index.html".to_string()),
        );

        let mut r = self.router.write().await;
        if path == "/" {
            *r = std::mem::take(&mut *r).fallback_service(serve);
        } else {
            let route = Router::new().fallback_service(serve);
            *r = std::mem::take(&mut *r).nest(path, route);
        }
    }

    /// Adds a plain Axum handler.
    pub async fn add_handler<H, T>(&mut self, path: &str, handler: H)
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        let route = Router::new().route("/", get(handler));

        let mut r = self.router.write().await;
        *r = std::mem::take(&mut *r).nest(path, route);
    }

    /// Adds a GET handler with shared state (SSE, extractors, etc).
    pub async fn add_handler_with_state<H, T, S>(&mut self, path: &str, handler: H, state: S)
    where
        H: Handler<T, S>,
        T: 'static,
        S: Clone + Send + Sync + 'static,
    {
        let route = Router::new().route("/", get(handler)).with_state(state);

        let mut r = self.router.write().await;
        *r = std::mem::take(&mut *r).nest(path, route);
    }

    /// Adds a POST handler with shared state.
    pub async fn add_post_handler_with_state<H, T, S>(&mut self, path: &str, handler: H, state: S)
    where
        H: Handler<T, S>,
        T: 'static,
        S: Clone + Send + Sync + 'static,
    {
        let route = Router::new()
            .route("/", axum::routing::post(handler))
            .with_state(state);

        let mut r = self.router.write().await;
        *r = std::mem::take(&mut *r).nest(path, route);
    }

    /// Adds a permanent (308) HTTP redirect from `from` to `to`.
    pub async fn add_redirect(&mut self, from: &str, to: &str) {
        let to = to.to_string();
        let handler = move || {
            let to = to.clone();
            async move { Redirect::permanent(&to) }
        };

        let mut r = self.router.write().await;
        if from == "/" {
            let route = Router::new().route("/", get(handler));
            *r = std::mem::take(&mut *r).merge(route);
        } else {
            let route = Router::new().route("/", get(handler));
            *r = std::mem::take(&mut *r).nest(from, route);
        }
    }

    /// Starts the HTTP server: binds the configured port, wraps the router
    /// in the CORS middleware, and installs Ctrl+C graceful shutdown.
    pub async fn start(&mut self) {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.http_port));
        info!(
            "server {} listening on http://{}:{} (advertised as {})",
            self.name, addr, self.http_port, self.base_url
        );

        let router = self.router.clone();
        let cors = CorsLayer::new(self.cors.clone());

        let server_task = tokio::spawn(async move {
            let r = router.read().await.clone().layer(cors);
            let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
            axum::serve(listener, r.into_make_service()).await.unwrap();
        });

        let shutdown_task = tokio::spawn(async move {
            signal::ctrl_c().await.expect("failed to listen for ctrl_c");
            info!("ctrl+c received, shutting down");
        });

        self.join_handle = Some(tokio::spawn(async move {
            tokio::select! {
                _ = server_task => {},
                _ = shutdown_task => {},
            }
        }));
    }

    /// Waits for the server task to finish (normally only on shutdown).
    pub async fn wait(&mut self) {
        if let Some(h) = self.join_handle.take() {
            let _ = h.await;
        }
    }

    /// Returns server metadata.
    pub fn info(&self) -> ServerInfo {
        ServerInfo {
            name: self.name.clone(),
            base_url: self.base_url.clone(),
            http_port: self.http_port,
        }
    }

    /// Initializes tracing with an SSE log tap and registers `/log-sse` and
    /// `/log-dump`.
    pub async fn init_logging(&mut self, options: LoggingOptions) {
        let log_state = init_logging(options);

        self.add_handler_with_state("/log-sse", log_sse, log_state.clone())
            .await;
        self.add_handler_with_state("/log-dump", log_dump, log_state.clone())
            .await;

        self.log_state = Some(log_state);
    }
}

/// Builder for [`Server`].
pub struct ServerBuilder {
    name: String,
    base_url: String,
    http_port: u16,
    cors: Option<CorsConfig>,
}

impl ServerBuilder {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, http_port: u16) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            http_port,
            cors: None,
        }
    }

    /// Builds from the global configuration singleton: address, port, name,
    /// and CORS allow-list.
    pub fn new_configured() -> Self {
        let config = get_config();
        Self {
            name: config.get_name(),
            base_url: config.get_address(),
            http_port: config.get_port(),
            cors: Some(CorsConfig::new(
                config.get_cors_allow_origins(),
                config.get_cors_allow_methods(),
                config.get_cors_max_age().unwrap_or(2700) as u64,
            )),
        }
    }

    /// Consumes the builder, producing a [`Server`].
    pub fn build(self) -> Server {
        let mut server = Server::new(self.name, self.base_url, self.http_port);
        if let Some(cors) = self.cors {
            server.cors = cors;
        }
        server
    }
}
