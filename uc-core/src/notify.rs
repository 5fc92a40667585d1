//! Persistent 64-bit notification counter plus the `uc/events` long-poll
//! wait queue (C2).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::Notify;

use crate::error::{UcError, UcResult};

/// Wrap-aware ordering: `a > b` iff `(a - b) mod 2⁶⁴ ≤ 2⁶³` (§3).
pub fn seq_gt(a: u64, b: u64) -> bool {
    (a.wrapping_sub(b) as i64) > 0
}

fn seq_ge(a: u64, b: u64) -> bool {
    a == b || seq_gt(a, b)
}

struct Inner {
    counter: u64,
    last_change: HashMap<String, u64>,
}

/// The notification store backing `uc/events`: a monotonic counter, a
/// per-resource "counter at last change" map, and a parked-waiter queue.
pub struct NotificationStore {
    path: PathBuf,
    inner: Mutex<Inner>,
    notify: Notify,
    waiters: AtomicUsize,
}

fn reseed_value() -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    now << 32
}

impl NotificationStore {
    /// Loads the persisted counter from `path`, reseeding on corruption or
    /// absence per §4.2/§6.3.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let counter = Self::read_counter(&path).unwrap_or_else(reseed_value);
        let store = Self {
            path,
            inner: Mutex::new(Inner {
                counter,
                last_change: HashMap::new(),
            }),
            notify: Notify::new(),
            waiters: AtomicUsize::new(0),
        };
        store.persist(counter);
        store
    }

    fn read_counter(path: &Path) -> Option<u64> {
        let data = std::fs::read_to_string(path).ok()?;
        let trimmed = data.trim();
        if trimmed.len() != 16 {
            return None;
        }
        u64::from_str_radix(trimmed, 16).ok()
    }

    fn persist(&self, counter: u64) {
        let body = format!("{:016x}\n", counter);
        if let Err(err) = std::fs::write(&self.path, body) {
            tracing::warn!(path=%self.path.display(), %err, "failed to persist notification counter");
        }
    }

    /// Current counter value.
    pub fn current(&self) -> u64 {
        self.inner.lock().unwrap().counter
    }

    /// Atomically increments the counter (wrap-mod-2⁶⁴) and persists it.
    pub fn bump(&self) -> u64 {
        let mut inner = self.inner.lock().unwrap();
        inner.counter = inner.counter.wrapping_add(1);
        let counter = inner.counter;
        drop(inner);
        self.persist(counter);
        counter
    }

    /// Records a change to `resource`. If waiters are parked, bumps the
    /// counter and wakes them; otherwise leaves the counter alone so this
    /// change coalesces with the next one under the same counter value.
    pub fn notify(&self, resource: &str) {
        let counter = {
            let inner = self.inner.lock().unwrap();
            inner.counter
        };

        {
            let mut inner = self.inner.lock().unwrap();
            inner.last_change.insert(resource.to_string(), counter);
        }

        if self.waiters.load(Ordering::SeqCst) > 0 {
            let new_counter = self.bump();
            let mut inner = self.inner.lock().unwrap();
            inner.last_change.insert(resource.to_string(), new_counter);
            drop(inner);
            self.notify.notify_waiters();
        }
    }

    /// Resources changed since `since` (wrap-aware `>`), ordered with
    /// `uc/power` first, the bare `uc` resource next, and everything else
    /// after. When `standby` is true, only `uc` and `uc/power` are reported.
    pub fn changed_since(&self, since: u64, standby: bool) -> Vec<String> {
        let inner = self.inner.lock().unwrap();
        let mut changed: Vec<String> = inner
            .last_change
            .iter()
            .filter(|(_, &at)| seq_gt(at, since))
            .filter(|(res, _)| !standby || res.as_str() == "uc" || res.as_str() == "uc/power")
            .map(|(res, _)| res.clone())
            .collect();
        drop(inner);

        changed.sort_by_key(|r| match r.as_str() {
            "uc/power" => 0,
            "uc" => 1,
            _ => 2,
        });
        changed
    }

    /// Implements the `GET uc/events?since=` long-poll contract (§4.2).
    pub async fn wait_for_events(
        &self,
        since: u64,
        timeout: Duration,
        standby: bool,
    ) -> UcResult<(u64, Vec<String>)> {
        let current = self.current();
        if !seq_ge(current, since) {
            return Err(UcError::InvalidSyntax(
                "since is ahead of the current counter".to_string(),
            ));
        }

        let changed = self.changed_since(since, standby);
        if !changed.is_empty() {
            let new_counter = self.bump();
            return Ok((new_counter, changed));
        }

        self.waiters.fetch_add(1, Ordering::SeqCst);
        let notified = self.notify.notified();
        let _ = tokio::time::timeout(timeout, notified).await;
        self.waiters.fetch_sub(1, Ordering::SeqCst);

        // Timeout with nothing to report is a normal result: 200, empty set,
        // unchanged counter.
        let changed = self.changed_since(since, standby);
        Ok((self.current(), changed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("uc-core-notify-test-{}-{}", std::process::id(), name))
    }

    #[test]
    fn seq_gt_handles_wraparound() {
        assert!(seq_gt(5, 3));
        assert!(!seq_gt(3, 5));
        assert!(seq_gt(0, u64::MAX));
    }

    #[test]
    fn reseeds_on_missing_file() {
        let path = temp_path("missing");
        let _ = std::fs::remove_file(&path);
        let store = NotificationStore::load(&path);
        assert!(store.current() > 0);
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn notify_without_waiters_does_not_bump() {
        let path = temp_path("no-waiters");
        let store = NotificationStore::load(&path);
        let before = store.current();
        store.notify("uc/power");
        assert_eq!(store.current(), before);
        assert_eq!(store.changed_since(before.wrapping_sub(1), false), vec!["uc/power"]);
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn long_poll_times_out_empty_without_mutating_counter() {
        let path = temp_path("timeout");
        let store = NotificationStore::load(&path);
        let since = store.current();
        let (counter, changed) = store
            .wait_for_events(since, Duration::from_millis(20), false)
            .await
            .unwrap();
        assert_eq!(counter, since);
        assert!(changed.is_empty());
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn long_poll_rejects_since_ahead_of_current() {
        let path = temp_path("ahead");
        let store = NotificationStore::load(&path);
        let future = store.current().wrapping_add(100);
        let err = store
            .wait_for_events(future, Duration::from_millis(10), false)
            .await
            .unwrap_err();
        assert_eq!(err.status(), 400);
        let _ = std::fs::remove_file(&path);
    }
}
