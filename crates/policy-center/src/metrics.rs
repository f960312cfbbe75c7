use lazy_static::lazy_static;
use prometheus::{core::Collector, opts, IntCounter, IntCounterVec, IntGauge, Registry};
use tracing::error;

lazy_static! {
    static ref POLICY_SYNC_TOTAL: IntCounterVec = IntCounterVec::new(
        opts!(
            "traffic_policy_sync_total",
            "Interception policy polls grouped by result"
        ),
        &["result"]
    )
    .unwrap();
    static ref POLICY_LAST_SYNC_MS: IntGauge = IntGauge::new(
        "traffic_policy_last_sync_timestamp_ms",
        "Unix milliseconds of the last successful policy poll",
    )
    .unwrap();
    static ref POLICY_LOOP_RESTARTS: IntCounter = IntCounter::new(
        "traffic_policy_loop_restarts_total",
        "Policy polling loop restarts after a panic",
    )
    .unwrap();
}

fn register<C>(registry: &Registry, collector: C)
where
    C: Collector + Clone + Send + Sync + 'static,
{
    if let Err(err) = registry.register(Box::new(collector.clone())) {
        if !matches!(err, prometheus::Error::AlreadyReg) {
            error!(?err, "failed to register policy metric");
        }
    }
}

pub fn register_metrics(registry: &Registry) {
    register(registry, POLICY_SYNC_TOTAL.clone());
    register(registry, POLICY_LAST_SYNC_MS.clone());
    register(registry, POLICY_LOOP_RESTARTS.clone());
}

pub fn record_sync(result: &str) {
    POLICY_SYNC_TOTAL.with_label_values(&[result]).inc();
}

pub fn set_last_sync(timestamp_ms: i64) {
    POLICY_LAST_SYNC_MS.set(timestamp_ms);
}

pub fn record_loop_restart() {
    POLICY_LOOP_RESTARTS.inc();
}
