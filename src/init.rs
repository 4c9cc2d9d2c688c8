use std::{sync::Arc, time::Duration};

use tokio::sync::Mutex;

use crate::{
    constants::{
        DEFAULT_DATABASE_URL, DEFAULT_SERVER_RESOURCE, DEFAULT_SERVER_URL,
        DEFAULT_SYNC_INTERVAL_SECS,
    },
    models::sync::ConflictPolicy,
    remote::HttpQuoteSource,
    storage::{MemoryStorage, SqliteStorage},
    store::QuoteStore,
    sync::{timer::SyncTimer, Reconciler},
    Data,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub database_url: String,
    pub server_url: String,
    pub server_resource: String,
    pub sync_interval: Duration,
    pub conflict_policy: ConflictPolicy,
}

impl Config {
    /// Reads the configuration from the environment. Invalid values are
    /// reported and replaced by their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let database_url = lookup("DATABASE_URL").unwrap_or_else(|| {
            tracing::info!("no DATABASE_URL set, using {}.", DEFAULT_DATABASE_URL);
            DEFAULT_DATABASE_URL.to_string()
        });

        let server_url =
            lookup("QUOTES_SERVER_URL").unwrap_or_else(|| DEFAULT_SERVER_URL.to_string());

        let server_resource = lookup("QUOTES_SERVER_RESOURCE")
            .unwrap_or_else(|| DEFAULT_SERVER_RESOURCE.to_string());

        let sync_interval = lookup("QUOTES_SYNC_INTERVAL_SECS")
            .and_then(|secs| {
                secs.parse::<u64>()
                    .ok()
                    .filter(|secs| *secs > 0)
                    .or_else(|| {
                        tracing::warn!(value = %secs, "invalid QUOTES_SYNC_INTERVAL_SECS, using the default.");
                        None
                    })
            })
            .unwrap_or(DEFAULT_SYNC_INTERVAL_SECS);

        let conflict_policy = lookup("QUOTES_CONFLICT_POLICY")
            .and_then(|policy| {
                policy
                    .parse::<ConflictPolicy>()
                    .inspect_err(|e| tracing::warn!(err = %e, "invalid QUOTES_CONFLICT_POLICY, using the default."))
                    .ok()
            })
            .unwrap_or_default();

        Config {
            database_url,
            server_url,
            server_resource,
            sync_interval: Duration::from_secs(sync_interval),
            conflict_policy,
        }
    }
}

pub async fn init(config: Config) -> anyhow::Result<Data> {
    tracing::info!("initializing... please wait warmly.");

    let durable = SqliteStorage::connect(&config.database_url)
        .await
        .inspect_err(|e| tracing::error!(err = ?e, "an error occurred when opening the database"))?;
    let store = QuoteStore::load(Arc::new(durable), Arc::new(MemoryStorage::new())).await;

    let source = HttpQuoteSource::new(&config.server_url, &config.server_resource)?;
    tracing::info!(url = %source.url(), policy = %config.conflict_policy, "syncing with remote quotes");
    let reconciler = Reconciler::new(Arc::new(source), config.conflict_policy);

    tracing::info!("finished initializing!");
    Ok(Data {
        store: Arc::new(Mutex::new(store)),
        reconciler: Arc::new(reconciler),
        config: Arc::new(config),
    })
}

pub fn spawn_background_tasks(data: &Data) -> SyncTimer {
    SyncTimer::start(
        data.reconciler.clone(),
        data.store.clone(),
        data.config.sync_interval,
    )
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config_from(&[]);

        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.server_url, DEFAULT_SERVER_URL);
        assert_eq!(config.server_resource, DEFAULT_SERVER_RESOURCE);
        assert_eq!(config.sync_interval, Duration::from_secs(DEFAULT_SYNC_INTERVAL_SECS));
        assert_eq!(config.conflict_policy, ConflictPolicy::ServerWins);
    }

    #[test]
    fn invalid_values_fall_back() {
        let config = config_from(&[
            ("QUOTES_SYNC_INTERVAL_SECS", "0"),
            ("QUOTES_CONFLICT_POLICY", "newest-wins"),
        ]);

        assert_eq!(config.sync_interval, Duration::from_secs(DEFAULT_SYNC_INTERVAL_SECS));
        assert_eq!(config.conflict_policy, ConflictPolicy::ServerWins);
    }

    #[test]
    fn values_are_read_from_env() {
        let config = config_from(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("QUOTES_SERVER_URL", "http://localhost:3000"),
            ("QUOTES_SYNC_INTERVAL_SECS", "15"),
            ("QUOTES_CONFLICT_POLICY", "manual"),
        ]);

        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.server_url, "http://localhost:3000");
        assert_eq!(config.sync_interval, Duration::from_secs(15));
        assert_eq!(config.conflict_policy, ConflictPolicy::Manual);
    }
}
