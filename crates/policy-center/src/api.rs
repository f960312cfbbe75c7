use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::{ArcSwap, ArcSwapOption};
use parking_lot::Mutex;
use tokio::sync::watch;
use trafficguard_core_types::ServerName;

use crate::model::{InterceptConfig, SignConfig};

/// Health of the synchronizer as seen by the read side.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncStatus {
    pub polls: u64,
    pub last_success_ms: Option<i64>,
    pub last_error: Option<String>,
    pub consecutive_failures: u32,
    pub restarts: u32,
}

/// Owner of the published policy snapshots.
///
/// Readers call [`PolicyCenter::intercept`] / [`PolicyCenter::sign_config`] on every request;
/// both are lock-free loads of an `Arc`, so a reader sees either the whole previous snapshot or
/// the whole new one. Publishing swaps the pointer and never mutates a snapshot in place.
pub struct PolicyCenter {
    server_name: ServerName,
    intercept: ArcSwapOption<InterceptConfig>,
    sign: ArcSwap<SignConfig>,
    rev_counter: AtomicU64,
    watch_tx: watch::Sender<u64>,
    status: Mutex<SyncStatus>,
}

impl PolicyCenter {
    pub fn new(server_name: ServerName, sign: SignConfig) -> Self {
        let (watch_tx, _watch_rx) = watch::channel(0);
        Self {
            server_name,
            intercept: ArcSwapOption::empty(),
            sign: ArcSwap::from_pointee(sign.normalized()),
            rev_counter: AtomicU64::new(0),
            watch_tx,
            status: Mutex::new(SyncStatus::default()),
        }
    }

    pub fn server_name(&self) -> &ServerName {
        &self.server_name
    }

    /// Current interception policy; `None` until the first document decodes.
    pub fn intercept(&self) -> Option<Arc<InterceptConfig>> {
        self.intercept.load_full()
    }

    pub fn sign_config(&self) -> Arc<SignConfig> {
        self.sign.load_full()
    }

    pub fn publish_intercept(&self, config: InterceptConfig) -> u64 {
        self.intercept.store(Some(Arc::new(config)));
        self.bump_revision()
    }

    pub fn update_sign_config(&self, config: SignConfig) -> u64 {
        self.sign.store(Arc::new(config.normalized()));
        self.bump_revision()
    }

    pub fn revision(&self) -> u64 {
        self.rev_counter.load(Ordering::Acquire)
    }

    /// Notifies on every publish with the new revision.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.watch_tx.subscribe()
    }

    pub fn sync_status(&self) -> SyncStatus {
        self.status.lock().clone()
    }

    pub(crate) fn record_success(&self, now_ms: i64) {
        let mut status = self.status.lock();
        status.polls = status.polls.saturating_add(1);
        status.last_success_ms = Some(now_ms);
        status.last_error = None;
        status.consecutive_failures = 0;
    }

    pub(crate) fn record_failure(&self, reason: String) {
        let mut status = self.status.lock();
        status.polls = status.polls.saturating_add(1);
        status.last_error = Some(reason);
        status.consecutive_failures = status.consecutive_failures.saturating_add(1);
    }

    pub(crate) fn record_restart(&self, reason: String) {
        let mut status = self.status.lock();
        status.restarts = status.restarts.saturating_add(1);
        status.last_error = Some(reason);
    }

    fn bump_revision(&self) -> u64 {
        let rev = self.rev_counter.fetch_add(1, Ordering::AcqRel) + 1;
        self.watch_tx.send_replace(rev);
        rev
    }
}
