use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rand::Rng;
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, timeout, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use trafficguard_core_types::{now_millis, ServerName};

use crate::api::PolicyCenter;
use crate::defaults::{
    DEFAULT_POLL_INTERVAL, DEFAULT_RESTART_BACKOFF, DEFAULT_RESTART_BACKOFF_MAX,
    DEFAULT_START_JITTER,
};
use crate::errors::{PolicyError, StoreError};
use crate::metrics;
use crate::model::{decode_document, SignConfig};
use crate::store::PolicyStore;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SyncOptions {
    pub poll_interval: Duration,
    /// Upper bound of the random delay before the first fetch.
    pub start_jitter: Duration,
    pub restart_backoff: Duration,
    pub restart_backoff_max: Duration,
    /// Bound for the startup fetch; `None` waits for the store indefinitely.
    pub initial_fetch_timeout: Option<Duration>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            start_jitter: DEFAULT_START_JITTER,
            restart_backoff: DEFAULT_RESTART_BACKOFF,
            restart_backoff_max: DEFAULT_RESTART_BACKOFF_MAX,
            initial_fetch_timeout: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PollOutcome {
    Updated { revision: u64 },
    Unchanged,
    FetchFailed(StoreError),
    DecodeFailed(String),
    TimedOut,
}

impl PollOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PollOutcome::Updated { .. } | PollOutcome::Unchanged)
    }
}

/// Builder for [`ConfigSynchronizer`]; a missing store is a startup error.
pub struct SyncBootstrap {
    server_name: String,
    store: Option<Arc<dyn PolicyStore>>,
    sign: Option<SignConfig>,
    options: SyncOptions,
}

impl SyncBootstrap {
    pub fn new(server_name: impl Into<String>) -> Self {
        Self {
            server_name: server_name.into(),
            store: None,
            sign: None,
            options: SyncOptions::default(),
        }
    }

    pub fn with_store(mut self, store: Arc<dyn PolicyStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_sign_config(mut self, sign: SignConfig) -> Self {
        self.sign = Some(sign);
        self
    }

    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    pub fn build(self) -> Result<ConfigSynchronizer, PolicyError> {
        let store = self.store.ok_or(PolicyError::MissingStore)?;
        let server_name = ServerName::parse(&self.server_name)?;
        let key = server_name.interception_key();
        let center = Arc::new(PolicyCenter::new(
            server_name,
            self.sign.unwrap_or_default(),
        ));
        Ok(ConfigSynchronizer {
            shared: Arc::new(SyncShared {
                center,
                store,
                key,
                options: self.options,
            }),
            started: OnceCell::new(),
            cancel: CancellationToken::new(),
            task: Mutex::new(None),
        })
    }

    pub async fn start(self) -> Result<ConfigSynchronizer, PolicyError> {
        let synchronizer = self.build()?;
        synchronizer.start().await;
        Ok(synchronizer)
    }
}

/// Initialization entrypoint: validates the collaborators, publishes the signing policy,
/// performs the jittered initial fetch and launches the supervised polling loop.
pub async fn init_intercept_config(
    server_name: &str,
    store: Option<Arc<dyn PolicyStore>>,
    sign: Option<SignConfig>,
) -> Result<ConfigSynchronizer, PolicyError> {
    let mut bootstrap = SyncBootstrap::new(server_name);
    if let Some(store) = store {
        bootstrap = bootstrap.with_store(store);
    }
    if let Some(sign) = sign {
        bootstrap = bootstrap.with_sign_config(sign);
    }
    bootstrap.start().await
}

struct SyncShared {
    center: Arc<PolicyCenter>,
    store: Arc<dyn PolicyStore>,
    key: String,
    options: SyncOptions,
}

impl SyncShared {
    async fn poll(&self) -> PollOutcome {
        let raw = match self.store.get(&self.key).await {
            Ok(raw) => raw,
            Err(err) => {
                warn!(key = %self.key, %err, "reload interception config failed; keeping previous snapshot");
                metrics::record_sync("fetch_error");
                self.center.record_failure(err.to_string());
                return PollOutcome::FetchFailed(err);
            }
        };

        let config = match decode_document(raw.as_bytes()) {
            Ok(config) => config,
            Err(err) => {
                warn!(key = %self.key, %err, bytes = raw.len(), "decode interception config failed; keeping previous snapshot");
                metrics::record_sync("decode_error");
                self.center.record_failure(err.to_string());
                return PollOutcome::DecodeFailed(err.to_string());
            }
        };

        let now = now_millis();
        self.center.record_success(now);
        metrics::record_sync("ok");
        metrics::set_last_sync(now);

        if self.center.intercept().as_deref() == Some(&config) {
            return PollOutcome::Unchanged;
        }
        let revision = self.center.publish_intercept(config);
        debug!(key = %self.key, revision, "interception config published");
        PollOutcome::Updated { revision }
    }
}

/// Keeps a [`PolicyCenter`] in sync with the remote policy document.
///
/// Dropping the synchronizer cancels the background loop; the last published snapshot stays
/// readable through any [`PolicyCenter`] handle still held.
pub struct ConfigSynchronizer {
    shared: Arc<SyncShared>,
    started: OnceCell<()>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ConfigSynchronizer {
    pub fn center(&self) -> Arc<PolicyCenter> {
        Arc::clone(&self.shared.center)
    }

    pub fn key(&self) -> &str {
        &self.shared.key
    }

    pub fn options(&self) -> SyncOptions {
        self.shared.options
    }

    pub fn update_sign_config(&self, config: SignConfig) -> u64 {
        self.shared.center.update_sign_config(config)
    }

    /// Fetches and publishes once, outside the background loop.
    pub async fn poll_once(&self) -> PollOutcome {
        self.shared.poll().await
    }

    /// Runs the startup sequence exactly once; later calls return immediately.
    pub async fn start(&self) {
        self.started
            .get_or_init(|| async {
                let jitter = start_jitter(self.shared.options.start_jitter);
                info!(
                    server = %self.shared.center.server_name(),
                    key = %self.shared.key,
                    jitter_ms = jitter.as_millis() as u64,
                    "starting interception policy sync"
                );
                sleep(jitter).await;
                self.initial_fetch().await;
                let task = spawn_supervisor(Arc::clone(&self.shared), self.cancel.clone());
                *self.task.lock() = Some(task);
            })
            .await;
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .map(|task| !task.is_finished())
            .unwrap_or(false)
    }

    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let task = self.task.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }

    async fn initial_fetch(&self) -> PollOutcome {
        match self.shared.options.initial_fetch_timeout {
            Some(limit) => match timeout(limit, self.shared.poll()).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!(key = %self.shared.key, limit_ms = limit.as_millis() as u64, "initial interception config fetch timed out");
                    self.shared
                        .center
                        .record_failure("initial fetch timed out".into());
                    PollOutcome::TimedOut
                }
            },
            None => self.shared.poll().await,
        }
    }
}

impl Drop for ConfigSynchronizer {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
    }
}

fn start_jitter(max: Duration) -> Duration {
    let max_ms = max.as_millis() as u64;
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..max_ms))
}

fn spawn_supervisor(shared: Arc<SyncShared>, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let options = shared.options;
        let mut backoff = options.restart_backoff;
        loop {
            let success_before = shared.center.sync_status().last_success_ms;
            let worker = tokio::spawn(poll_loop(Arc::clone(&shared), cancel.clone()));
            match worker.await {
                Ok(()) => break,
                Err(err) if err.is_panic() => {
                    let reason = panic_message(err.into_panic());
                    if shared.center.sync_status().last_success_ms != success_before {
                        backoff = options.restart_backoff;
                    }
                    error!(
                        key = %shared.key,
                        panic = %reason,
                        backoff_ms = backoff.as_millis() as u64,
                        "interception policy loop panicked; restarting"
                    );
                    metrics::record_loop_restart();
                    shared
                        .center
                        .record_restart(format!("poll loop panicked: {reason}"));
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = sleep(backoff) => {}
                    }
                    backoff = backoff.saturating_mul(2).min(options.restart_backoff_max);
                }
                Err(_) => break,
            }
        }
        debug!(key = %shared.key, "interception policy loop stopped");
    })
}

async fn poll_loop(shared: Arc<SyncShared>, cancel: CancellationToken) {
    let period = shared.options.poll_interval.max(Duration::from_millis(1));
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = shared.poll() => {}
                }
            }
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
