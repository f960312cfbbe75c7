use std::sync::Arc;

use trafficguard_policy_center::{ConfigSynchronizer, SyncStatus};

#[derive(Clone)]
pub struct ServeState {
    sync: Arc<ConfigSynchronizer>,
    store_kind: &'static str,
}

impl ServeState {
    pub fn new(sync: Arc<ConfigSynchronizer>, store_kind: &'static str) -> Self {
        Self { sync, store_kind }
    }

    pub fn health_snapshot(&self) -> HealthSnapshot {
        let center = self.sync.center();
        let status = center.sync_status();
        HealthSnapshot {
            server_name: center.server_name().as_str().to_string(),
            store: self.store_kind,
            revision: center.revision(),
            // Ready once the initial fetch has run, whatever its outcome.
            ready: status.polls > 0,
            running: self.sync.is_running(),
            policy_loaded: center.intercept().is_some(),
            signing: center.sign_config().is_active(),
            status,
        }
    }
}

#[derive(Clone, Debug)]
pub struct HealthSnapshot {
    pub server_name: String,
    pub store: &'static str,
    pub revision: u64,
    pub ready: bool,
    pub running: bool,
    pub policy_loaded: bool,
    pub signing: bool,
    pub status: SyncStatus,
}
