pub mod api;
pub mod defaults;
pub mod errors;
pub mod loader;
pub mod metrics;
pub mod model;
#[cfg(feature = "redis")]
pub mod redis;
pub mod store;
pub mod sync;

pub use api::{PolicyCenter, SyncStatus};
pub use errors::{PolicyError, StoreError};
pub use loader::{
    load_settings, load_settings_with_options, GuardSettings, LoadOptions, LoadedSettings,
    SettingsSource,
};
pub use model::{decode_document, InterceptConfig, SignConfig, SubRuleConfig};
pub use store::{FilePolicyStore, InMemoryPolicyStore, PolicyStore};
pub use sync::{
    init_intercept_config, ConfigSynchronizer, PollOutcome, SyncBootstrap, SyncOptions,
};

#[cfg(test)]
mod tests;
