use std::time::Duration;

pub const DEFAULT_SIGNATURE_LENGTH: i64 = 8;
pub const DEFAULT_MAX_TIME_DRIFT_SECS: i64 = 300;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);
pub const DEFAULT_START_JITTER: Duration = Duration::from_millis(2_000);
pub const DEFAULT_RESTART_BACKOFF: Duration = Duration::from_millis(1_000);
pub const DEFAULT_RESTART_BACKOFF_MAX: Duration = Duration::from_secs(30);
