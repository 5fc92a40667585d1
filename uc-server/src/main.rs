//! The UC server binary: loads configuration, builds the resource tree and
//! in-memory backend, and starts the HTTP shell.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use tracing::info;
use uc_auth::{UcAuthConfig, UcAuthProvider};
use uc_config::get_config;
use uc_core::auth_iface::{AuthProvider, NoAuthProvider};
use uc_core::backend::{Backend, InMemoryBackend};
use uc_core::dispatch::{AppState, PowerMode};
use uc_core::notify::NotificationStore;
use uc_core::pairing::PairingCode;
use uc_http::logs::LoggingOptions;
use uc_http::ServerBuilder;

#[tokio::main]
async fn main() {
    let config = get_config();

    let mut server = ServerBuilder::new_configured().build();
    server
        .init_logging(LoggingOptions {
            buffer_capacity: config.get_log_cache_size().unwrap_or(1000),
            enable_console: config.get_log_enable_console().unwrap_or(true),
            min_level: config.get_log_min_level().unwrap_or_else(|_| "info".to_string()),
        })
        .await;

    let server_id = config.get_uuid().expect("failed to load server-id");
    let options = config.get_options();
    let (trie, enabled_resource_paths) = uc_core::tree::build_trie(&options);

    let backend = Arc::new(InMemoryBackend::default());
    let notification_dir = config
        .get_notification_dir()
        .expect("failed to resolve notification directory");
    let notifications = Arc::new(NotificationStore::load(
        std::path::Path::new(&notification_dir).join("events.dat"),
    ));

    let auth: Arc<dyn AuthProvider> = if config.get_auth_enabled().unwrap_or(true) {
        let server_hash = uc_auth::derive_server_hash(&server_id);
        let sss = config.get_sss().unwrap_or(0);
        let pin = config.get_pin().unwrap_or_else(|_| "0000".to_string());
        Arc::new(UcAuthProvider::new(UcAuthConfig {
            realm: config.get_realm(),
            server_hash,
            sss,
            pin,
        }))
    } else {
        Arc::new(NoAuthProvider)
    };

    let state = Arc::new(AppState {
        name: config.get_name(),
        server_id: server_id.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        logo_href: config.get_logo_href(),
        trie,
        enabled_resource_paths,
        backend: Arc::new(Backend::in_memory(backend)),
        notifications,
        auth,
        standby: Arc::new(AtomicBool::new(false)),
        power_mode: std::sync::Mutex::new(PowerMode::On),
        long_poll_timeout: std::time::Duration::from_secs(
            config.get_long_poll_timeout_secs().unwrap_or(25) as u64,
        ),
        sources: std::sync::Mutex::new(Default::default()),
        source_lists: std::sync::Mutex::new(Default::default()),
        outputs: std::sync::Mutex::new(Default::default()),
        acquisitions: std::sync::Mutex::new(Default::default()),
        storage: std::sync::Mutex::new(Default::default()),
    });

    server
        .add_router(
            "/",
            axum::Router::new()
                .fallback(uc_core::dispatch::handle)
                .with_state(state),
        )
        .await;

    if config.get_auth_enabled().unwrap_or(true) {
        if let Ok(addr) = config.get_address().parse::<std::net::Ipv4Addr>() {
            let code = PairingCode::new(addr.octets(), config.get_port(), None).encode();
            info!(pairing_code = %code, "pairing code for this server");
        }
    }

    info!(server_id = %server_id, "starting UC server");
    server.start().await;
    server.wait().await;
}
