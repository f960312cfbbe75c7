use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use trafficguard_core_types::ServerName;

use crate::api::PolicyCenter;
use crate::errors::{PolicyError, StoreError};
use crate::model::{decode_document, InterceptConfig, SignConfig, SubRuleConfig};
use crate::store::{FilePolicyStore, InMemoryPolicyStore, PolicyStore};
use crate::sync::{init_intercept_config, PollOutcome, SyncBootstrap, SyncOptions};

const KEY: &str = "traffic_interception_key_checkout";

fn doc(radio: i32, switch: bool) -> String {
    serde_json::json!({
        "sub_rules": [{"path": "/pay", "rule": "uid", "value": "u1,u2", "radio": 100}],
        "radio": radio,
        "switch": switch,
    })
    .to_string()
}

fn fast_options() -> SyncOptions {
    SyncOptions {
        poll_interval: Duration::from_millis(100),
        start_jitter: Duration::ZERO,
        restart_backoff: Duration::from_millis(50),
        restart_backoff_max: Duration::from_millis(400),
        initial_fetch_timeout: None,
    }
}

/// Wraps the in-memory store to count reads and optionally panic on one of them.
struct CountingStore {
    inner: InMemoryPolicyStore,
    calls: AtomicUsize,
    panic_on: Option<usize>,
}

impl CountingStore {
    fn new(panic_on: Option<usize>) -> Self {
        Self {
            inner: InMemoryPolicyStore::new(),
            calls: AtomicUsize::new(0),
            panic_on,
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PolicyStore for CountingStore {
    async fn get(&self, key: &str) -> Result<String, StoreError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if Some(call) == self.panic_on {
            panic!("store exploded on call {call}");
        }
        self.inner.get(key).await
    }
}

struct HangingStore;

#[async_trait]
impl PolicyStore for HangingStore {
    async fn get(&self, _key: &str) -> Result<String, StoreError> {
        std::future::pending::<()>().await;
        Err(StoreError::Unavailable("unreachable".into()))
    }
}

#[test]
fn sign_config_normalizes_non_positive_values() {
    let raw = SignConfig {
        secret: "k".into(),
        signature_length: 0,
        max_time_drift_secs: -5,
        enabled: true,
    };
    let raw_drift = raw.clone();
    let normalized = raw.normalized();
    assert_eq!(normalized.signature_length, 8);
    assert_eq!(normalized.max_time_drift_secs, 300);
    assert_eq!(normalized.max_drift_ms(), 300_000);
    assert_eq!(raw_drift.max_drift_ms(), 300_000);

    let center = PolicyCenter::new(
        ServerName::parse("checkout").unwrap(),
        SignConfig {
            signature_length: -1,
            ..SignConfig::enabled("k")
        },
    );
    assert_eq!(center.sign_config().signature_length, 8);
}

#[test]
fn sign_config_debug_hides_secret() {
    let rendered = format!("{:?}", SignConfig::enabled("top-secret"));
    assert!(!rendered.contains("top-secret"));
    assert!(rendered.contains("<redacted>"));
}

#[test]
fn decode_accepts_partial_documents() {
    let config = decode_document(br#"{"radio": 40}"#).unwrap();
    assert_eq!(config.radio, 40);
    assert!(!config.switch);
    assert!(config.sub_rules.is_empty());

    let full = decode_document(doc(10, true).as_bytes()).unwrap();
    assert!(full.switch);
    assert_eq!(full.sub_rules[0].value, "u1,u2");
    assert_eq!(full.sub_rules[0].path, "/pay");
}

#[test]
fn decode_rejects_garbage_and_empty() {
    assert!(matches!(
        decode_document(b"{not json"),
        Err(PolicyError::Decode(_))
    ));
    assert!(matches!(decode_document(b""), Err(PolicyError::Decode(_))));
}

#[test]
fn readers_never_observe_torn_snapshots() {
    let center = Arc::new(PolicyCenter::new(
        ServerName::parse("checkout").unwrap(),
        SignConfig::default(),
    ));
    let writer = {
        let center = Arc::clone(&center);
        std::thread::spawn(move || {
            for step in 1..=500 {
                let radio = step % 100;
                let sub_rules = (0..radio)
                    .map(|_| SubRuleConfig::new("*", "", radio))
                    .collect();
                center.publish_intercept(InterceptConfig {
                    sub_rules,
                    radio,
                    switch: true,
                });
            }
        })
    };
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let center = Arc::clone(&center);
            std::thread::spawn(move || {
                for _ in 0..2_000 {
                    if let Some(config) = center.intercept() {
                        assert_eq!(config.sub_rules.len() as i32, config.radio);
                        assert!(config.sub_rules.iter().all(|r| r.radio == config.radio));
                    }
                }
            })
        })
        .collect();
    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(center.revision(), 500);
}

#[tokio::test]
async fn subscribers_see_each_publish() {
    let center = PolicyCenter::new(ServerName::parse("checkout").unwrap(), SignConfig::default());
    let mut rx = center.subscribe();
    assert_eq!(*rx.borrow(), 0);
    center.publish_intercept(InterceptConfig::default());
    rx.changed().await.unwrap();
    assert_eq!(*rx.borrow(), 1);
    center.update_sign_config(SignConfig::enabled("k"));
    rx.changed().await.unwrap();
    assert_eq!(*rx.borrow(), 2);
    assert!(center.sign_config().is_active());
}

#[tokio::test]
async fn missing_store_is_a_startup_error() {
    let result = init_intercept_config("checkout", None, None).await;
    assert!(matches!(result, Err(PolicyError::MissingStore)));
}

#[tokio::test]
async fn blank_server_name_is_rejected() {
    let store: Arc<dyn PolicyStore> = Arc::new(InMemoryPolicyStore::new());
    let result = SyncBootstrap::new("  ").with_store(store).build();
    assert!(matches!(result, Err(PolicyError::InvalidServerName(_))));
}

#[tokio::test(start_paused = true)]
async fn initial_fetch_publishes_before_start_returns() {
    let store = Arc::new(InMemoryPolicyStore::new());
    store.put(KEY, doc(25, true));
    let sync = init_intercept_config("checkout", Some(store), Some(SignConfig::enabled("k")))
        .await
        .unwrap();
    let center = sync.center();
    let config = center.intercept().expect("published");
    assert_eq!(config.radio, 25);
    assert!(center.sign_config().is_active());
    assert!(sync.is_running());
    assert_eq!(sync.key(), KEY);
}

#[tokio::test(start_paused = true)]
async fn failed_fetch_keeps_previous_snapshot() {
    let store = Arc::new(InMemoryPolicyStore::new());
    store.put(KEY, doc(10, true));
    let sync = SyncBootstrap::new("checkout")
        .with_store(store.clone())
        .with_options(fast_options())
        .build()
        .unwrap();

    assert_eq!(sync.poll_once().await, PollOutcome::Updated { revision: 1 });

    store.fail_next(1);
    assert!(matches!(
        sync.poll_once().await,
        PollOutcome::FetchFailed(StoreError::Unavailable(_))
    ));
    assert_eq!(sync.center().intercept().unwrap().radio, 10);
    let status = sync.center().sync_status();
    assert_eq!(status.consecutive_failures, 1);
    assert!(status.last_error.is_some());

    store.put(KEY, "{broken");
    assert!(matches!(
        sync.poll_once().await,
        PollOutcome::DecodeFailed(_)
    ));
    assert_eq!(sync.center().intercept().unwrap().radio, 10);
    assert_eq!(sync.center().sync_status().consecutive_failures, 2);

    store.put(KEY, doc(55, true));
    assert_eq!(sync.poll_once().await, PollOutcome::Updated { revision: 2 });
    assert_eq!(sync.center().intercept().unwrap().radio, 55);
    let status = sync.center().sync_status();
    assert_eq!(status.consecutive_failures, 0);
    assert!(status.last_error.is_none());
    assert_eq!(status.polls, 4);
}

#[tokio::test(start_paused = true)]
async fn identical_document_does_not_republish() {
    let store = Arc::new(InMemoryPolicyStore::new());
    store.put(KEY, doc(10, false));
    let sync = SyncBootstrap::new("checkout")
        .with_store(store)
        .build()
        .unwrap();
    assert!(sync.poll_once().await.is_success());
    assert_eq!(sync.poll_once().await, PollOutcome::Unchanged);
    assert_eq!(sync.center().revision(), 1);
}

#[tokio::test(start_paused = true)]
async fn missing_key_leaves_center_empty() {
    let store = Arc::new(InMemoryPolicyStore::new());
    let sync = SyncBootstrap::new("checkout")
        .with_store(store)
        .with_options(fast_options())
        .start()
        .await
        .unwrap();
    assert!(sync.center().intercept().is_none());
    assert!(sync.center().sync_status().last_error.is_some());
}

#[tokio::test(start_paused = true)]
async fn start_runs_once_and_loop_picks_up_changes() {
    let store = Arc::new(CountingStore::new(None));
    store.inner.put(KEY, doc(10, true));
    let sync = SyncBootstrap::new("checkout")
        .with_store(store.clone())
        .with_options(fast_options())
        .build()
        .unwrap();

    sync.start().await;
    sync.start().await;
    assert_eq!(store.calls(), 1);

    store.inner.put(KEY, doc(70, true));
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(store.calls(), 2);
    assert_eq!(sync.center().intercept().unwrap().radio, 70);
}

#[tokio::test(start_paused = true)]
async fn panicking_loop_is_restarted() {
    let store = Arc::new(CountingStore::new(Some(2)));
    store.inner.put(KEY, doc(10, true));
    let sync = SyncBootstrap::new("checkout")
        .with_store(store.clone())
        .with_options(fast_options())
        .start()
        .await
        .unwrap();

    // poll #2 panics at 100ms, the loop comes back after 50ms and polls again 100ms later.
    store.inner.put(KEY, doc(90, true));
    tokio::time::sleep(Duration::from_millis(400)).await;

    let status = sync.center().sync_status();
    assert_eq!(status.restarts, 1);
    assert!(store.calls() >= 3);
    assert_eq!(sync.center().intercept().unwrap().radio, 90);
    assert!(sync.is_running());
}

#[tokio::test(start_paused = true)]
async fn dropping_synchronizer_stops_polling() {
    let store = Arc::new(CountingStore::new(None));
    store.inner.put(KEY, doc(10, true));
    let sync = SyncBootstrap::new("checkout")
        .with_store(store.clone())
        .with_options(fast_options())
        .start()
        .await
        .unwrap();
    let center = sync.center();
    drop(sync);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(store.calls(), 1);
    assert_eq!(center.intercept().unwrap().radio, 10);
}

#[tokio::test(start_paused = true)]
async fn shutdown_waits_for_loop() {
    let store = Arc::new(InMemoryPolicyStore::new());
    store.put(KEY, doc(10, true));
    let sync = SyncBootstrap::new("checkout")
        .with_store(store)
        .with_options(fast_options())
        .start()
        .await
        .unwrap();
    sync.shutdown().await;
    assert!(!sync.is_running());
}

#[tokio::test(start_paused = true)]
async fn initial_fetch_timeout_is_honored() {
    let options = SyncOptions {
        initial_fetch_timeout: Some(Duration::from_millis(500)),
        ..fast_options()
    };
    let sync = SyncBootstrap::new("checkout")
        .with_store(Arc::new(HangingStore))
        .with_options(options)
        .start()
        .await
        .unwrap();
    assert!(sync.center().intercept().is_none());
    assert_eq!(
        sync.center().sync_status().last_error.as_deref(),
        Some("initial fetch timed out")
    );
}

#[tokio::test]
async fn file_store_reads_documents_by_key() {
    let dir = tempfile::tempdir().unwrap();
    let store = FilePolicyStore::new(dir.path());
    assert!(matches!(
        store.get(KEY).await,
        Err(StoreError::NotFound(_))
    ));

    std::fs::write(store.path_for(KEY), doc(5, true)).unwrap();
    let raw = store.get(KEY).await.unwrap();
    assert_eq!(decode_document(raw.as_bytes()).unwrap().radio, 5);
}

#[tokio::test]
async fn in_memory_store_injects_failures() {
    let store = InMemoryPolicyStore::new();
    store.put("k", "v");
    store.fail_next(2);
    assert!(store.get("k").await.is_err());
    assert!(store.get("k").await.is_err());
    assert_eq!(store.get("k").await.unwrap(), "v");
    assert!(store.remove("k"));
    assert!(matches!(store.get("k").await, Err(StoreError::NotFound(_))));
}
