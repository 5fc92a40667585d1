//! # uc-http - High-level Axum wrapper for the UC server
//!
//! Provides the HTTP shell for the UC resource tree: router plumbing, CORS
//! with Origin/Referer fallback, SSE log tap, static/SPA asset serving, and
//! graceful shutdown. The resource-tree dispatcher itself lives in
//! `uc-core`; this crate only wires it to a listening socket.
//!
//! ## Architecture
//!
//! - [`server`] — the server shell and its builder
//! - [`cors`] — CORS middleware
//! - [`logs`] — SSE log tap for operational visibility
//!
//! ## Example
//!
//! ```rust,ignore
//! use uc_http::{ServerBuilder, logs::LoggingOptions};
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut server = ServerBuilder::new_configured().build();
//!     server.init_logging(LoggingOptions::default()).await;
//!     server.add_fallback("/", uc_core::dispatch::handle).await;
//!     server.start().await;
//!     server.wait().await;
//! }
//! ```

pub mod cors;
pub mod logs;
pub mod server;

pub use cors::{CorsConfig, CorsLayer};
pub use logs::{LogEntry, LogState, LoggingOptions, SseLayer, init_logging, log_dump, log_sse};
pub use server::{Server, ServerBuilder, ServerInfo};

// ============================================================================
// Global server singleton
// ============================================================================

use once_cell::sync::OnceCell;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Single global server instance, initialized lazily via [`init_server()`]
/// and reachable from anywhere via [`get_server()`].
static GLOBAL_SERVER: OnceCell<Arc<RwLock<Server>>> = OnceCell::new();

/// Initializes the global server from configuration. Idempotent: subsequent
/// calls return the existing instance.
pub fn init_server() -> Arc<RwLock<Server>> {
    GLOBAL_SERVER
        .get_or_init(|| {
            let server = ServerBuilder::new_configured().build();
            Arc::new(RwLock::new(server))
        })
        .clone()
}

/// Returns the global server if [`init_server()`] has been called.
pub fn get_server() -> Option<Arc<RwLock<Server>>> {
    GLOBAL_SERVER.get().cloned()
}

/// Returns the global server's base URL, if initialized.
pub fn get_server_base_url() -> Option<String> {
    GLOBAL_SERVER.get().map(|server| {
        if let Ok(srv) = server.try_read() {
            srv.info().base_url
        } else {
            futures::executor::block_on(async { server.read().await.info().base_url })
        }
    })
}
