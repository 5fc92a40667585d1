//! End-to-end coverage of the literal scenarios against the dispatcher,
//! exercising `uc_core::dispatch::handle` directly with its Axum extractor
//! arguments built by hand rather than through a `Router`/`tower::oneshot`
//! stack — the trie owns path matching, not Axum's router, so `handle` is
//! already a plain async fn callable without one.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, Uri};

use uc_auth::{UcAuthConfig, UcAuthProvider};
use uc_core::auth_iface::{AuthProvider, NoAuthProvider};
use uc_core::backend::{Backend, InMemoryBackend};
use uc_core::dispatch::{handle, AppState, PowerMode};
use uc_core::notify::NotificationStore;
use uc_core::tree::build_trie;

fn temp_notify_path(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!(
        "uc-server-integration-test-{}-{}.dat",
        std::process::id(),
        name
    ))
}

fn build_state(enabled: &[&str], auth: Arc<dyn AuthProvider>, notify_path: std::path::PathBuf) -> Arc<AppState> {
    let options: Vec<String> = enabled.iter().map(|s| s.to_string()).collect();
    let (trie, enabled_resource_paths) = build_trie(&options);
    let backend = Arc::new(InMemoryBackend::default());
    Arc::new(AppState {
        name: "Test Server".to_string(),
        server_id: "srv-1".to_string(),
        version: "1.0.0".to_string(),
        logo_href: None,
        trie,
        enabled_resource_paths,
        backend: Arc::new(Backend::in_memory(backend)),
        notifications: Arc::new(NotificationStore::load(notify_path)),
        auth,
        standby: Arc::new(AtomicBool::new(false)),
        power_mode: std::sync::Mutex::new(PowerMode::On),
        long_poll_timeout: std::time::Duration::from_secs(5),
        sources: std::sync::Mutex::new(Default::default()),
        source_lists: std::sync::Mutex::new(Default::default()),
        outputs: std::sync::Mutex::new(Default::default()),
        acquisitions: std::sync::Mutex::new(Default::default()),
        storage: std::sync::Mutex::new(Default::default()),
    })
}

async fn call(
    state: Arc<AppState>,
    method: Method,
    uri: &str,
    headers: HeaderMap,
    body: &[u8],
) -> axum::response::Response {
    handle(
        State(state),
        method,
        Uri::try_from(uri).unwrap(),
        headers,
        Bytes::copy_from_slice(body),
    )
    .await
}

async fn body_string(resp: axum::response::Response) -> (u16, String) {
    let status = resp.status().as_u16();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

/// Scenario 2: a parked long-poll is woken by a backend notification and
/// reports the bumped counter plus the changed resource.
#[tokio::test]
async fn events_long_poll_wakes_on_notify() {
    let path = temp_notify_path("events");
    std::fs::write(&path, "0000000000000001\n").unwrap();
    let state = build_state(&["events", "power"], Arc::new(NoAuthProvider), path.clone());

    let waiter_state = state.clone();
    let waiter = tokio::spawn(async move {
        body_string(
            call(
                waiter_state,
                Method::GET,
                "/uc/events?since=0000000000000001",
                HeaderMap::new(),
                b"",
            )
            .await,
        )
        .await
    });

    // Give the waiter a moment to park before the backend notifies.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    state.notifications.notify("uc/power");

    let (status, body) = waiter.await.unwrap();
    assert_eq!(status, 200);
    assert!(body.contains("notification-id=\"0000000000000002\""));
    assert!(body.contains("rref=\"uc/power\""));

    let _ = std::fs::remove_file(&path);
}

/// Scenario 3: an unauthenticated request against a security-enabled
/// server gets a fresh UC-Auth challenge, never a Digest one, since it
/// carries neither auth header.
#[tokio::test]
async fn uc_auth_fresh_challenge_on_unauthenticated_request() {
    let path = temp_notify_path("challenge");
    let auth = Arc::new(UcAuthProvider::new(UcAuthConfig {
        realm: "uc-server".to_string(),
        server_hash: "server-hash".to_string(),
        sss: 0,
        pin: "0000".to_string(),
    }));
    let state = build_state(&["outputs"], auth, path.clone());

    let resp = call(state, Method::GET, "/uc/outputs/0", HeaderMap::new(), b"").await;
    assert_eq!(resp.status().as_u16(), 402);
    let challenge = resp
        .headers()
        .get("x-ucclientauthenticate")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(challenge.contains(r#"iteration="0000000a""#));
    assert!(challenge.contains(r#"stale="false""#));
    let nonce = challenge
        .split("nonce=\"")
        .nth(1)
        .and_then(|s| s.split('"').next())
        .unwrap();
    assert_eq!(nonce.len(), 56);
    assert!(nonce.chars().all(|c| c.is_ascii_hexdigit()));

    let (_, body) = body_string(resp).await;
    assert!(body.contains("<error code=\"402\">"));

    let _ = std::fs::remove_file(&path);
}

/// Scenario 4: pairing returns a 128-hex-char key (LSGS XOR SSS, repeated
/// over all 64 bytes) and the request echoes its own resource URI per
/// invariant 1.
#[tokio::test]
async fn pairing_returns_xored_key() {
    let path = temp_notify_path("pairing");
    let auth = Arc::new(UcAuthProvider::new(UcAuthConfig {
        realm: "uc-server".to_string(),
        server_hash: "server-hash".to_string(),
        sss: 0xA5,
        pin: "0000".to_string(),
    }));
    let state = build_state(&[], auth, path.clone());

    let resp = call(
        state,
        Method::POST,
        "/uc/security?client-id=550e8400-e29b-41d4-a716-446655440000&client-name=Tablet",
        HeaderMap::new(),
        b"",
    )
    .await;
    let (status, body) = body_string(resp).await;
    assert_eq!(status, 200);
    assert!(body.contains(
        "resource=\"uc/security?client-id=550e8400-e29b-41d4-a716-446655440000&client-name=Tablet\""
    ));
    let key = body
        .split("key=\"")
        .nth(1)
        .and_then(|s| s.split('"').next())
        .unwrap();
    assert_eq!(key.len(), 128);
    assert!(key.chars().all(|c| c.is_ascii_hexdigit()));

    let _ = std::fs::remove_file(&path);
}

/// Scenario 5: acquiring by global-content-id alone creates a
/// content-acquisition with empty sid/cid, echoing the `global-content-id`
/// selector back onto the record and no fabricated `start`/`end`/`active`.
/// The envelope's `resource=` is the created item's own URI
/// (`uc/acquisitions/<aid>`), not the request URI it was POSTed to, and its
/// query is percent-decoded.
#[tokio::test]
async fn acquisition_by_global_content_id() {
    let path = temp_notify_path("acquire");
    let state = build_state(&["acquisitions"], Arc::new(NoAuthProvider), path.clone());

    let resp = call(
        state,
        Method::POST,
        "/uc/acquisitions?global-content-id=crid%3A//example.com/abc",
        HeaderMap::new(),
        b"",
    )
    .await;
    let (status, body) = body_string(resp).await;
    assert_eq!(status, 200);
    assert!(body.contains("sid=\"\""));
    assert!(body.contains("cid=\"\""));
    assert!(body.contains("interactive=\"false\""));
    assert!(body.contains("<content-acquisition"));
    assert!(body.contains("acquisition-id=\""));
    assert!(body.contains("global-content-id=\"crid://example.com/abc\""));
    assert!(!body.contains(" start="));
    assert!(!body.contains(" active="));
    assert!(body.contains("resource=\"uc/acquisitions/"));

    let _ = std::fs::remove_file(&path);
}

/// Scenario 6: once the server is in standby, a notification to a
/// non-exempt resource is filtered out of the next long-poll response,
/// but `uc/power` itself still wakes and reports.
#[tokio::test]
async fn standby_filters_non_exempt_notifications() {
    let path = temp_notify_path("standby");
    std::fs::write(&path, "0000000000000001\n").unwrap();
    let state = build_state(&["events", "power", "outputs"], Arc::new(NoAuthProvider), path.clone());

    state.standby.store(true, Ordering::SeqCst);

    let waiter_state = state.clone();
    let waiter = tokio::spawn(async move {
        body_string(
            call(
                waiter_state,
                Method::GET,
                "/uc/events?since=0000000000000001",
                HeaderMap::new(),
                b"",
            )
            .await,
        )
        .await
    });

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    state.notifications.notify("uc/outputs/0");
    state.notifications.notify("uc/power");

    let (status, body) = waiter.await.unwrap();
    assert_eq!(status, 200);
    assert!(!body.contains("uc/outputs/0"));
    assert!(body.contains("rref=\"uc/power\""));

    let _ = std::fs::remove_file(&path);
}
