use std::sync::Arc;

use troupe_core::{
    AssignmentCoordinator, CacheOptions, Connectivity, EntityAdapter, EntityStore, FileStore,
    LocalCache, RestBackend, TableBackend,
};

use crate::config::Config;

/// Everything a command needs: cache, connectivity and the backend.
pub struct AppContext {
    pub config: Config,
    pub cache: LocalCache,
    pub connectivity: Connectivity,
    backend: Option<Arc<dyn TableBackend>>,
}

impl AppContext {
    /// Builds the cache and, unless `offline`, probes the backend once.
    ///
    /// An unreachable or unconfigured backend leaves the context disconnected;
    /// reads then come from the cache and writes fail.
    pub async fn connect(config: Config, offline: bool) -> Self {
        let options = CacheOptions {
            max_backups: config.cache.max_backups,
            quota_bytes: config.cache.quota_bytes,
        };
        let store = FileStore::new(config.cache_dir()).with_quota(options.quota_bytes);
        let cache = LocalCache::with_options(Arc::new(store), options);
        let connectivity = Connectivity::new(false);

        let backend = match config.backend.credentials() {
            Some((url, key)) if !offline => {
                let rest = RestBackend::new(url.to_string(), key.to_string());
                if rest.ping().await {
                    connectivity.set_connected(true);
                    tracing::info!("Connected to backend at {}", rest.base_url());
                } else {
                    tracing::warn!("Backend at {} is unreachable, using cache", url);
                }
                Some(Arc::new(rest) as Arc<dyn TableBackend>)
            }
            _ => {
                if !offline {
                    tracing::debug!("No backend configured, using cache");
                }
                None
            }
        };

        Self {
            config,
            cache,
            connectivity,
            backend,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.backend.is_some() && self.connectivity.is_connected()
    }

    /// Fresh store for one entity type, honoring the realtime setting.
    pub fn store<A: EntityAdapter>(&self) -> EntityStore<A> {
        EntityStore::with_binding(
            A::binding().realtime(self.config.backend.realtime),
            self.backend.clone(),
            self.connectivity.clone(),
            self.cache.clone(),
        )
    }

    pub fn coordinator(&self) -> AssignmentCoordinator {
        AssignmentCoordinator::new(self.store(), self.store())
    }
}
