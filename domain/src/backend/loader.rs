//! Builds the built-in adapters and feeds them into a [`BackendRegistry`].

use super::registry::BackendRegistry;
use crate::gateway;
use log::*;
use meeting_auth::http::HttpClientConfig;
use meeting_backend::{Backend, Error as BackendError};
use service::config::Config;
use service::settings::{ProviderSettings, Settings};
use std::sync::{Arc, RwLock};

/// What an adapter needs to construct itself.
#[derive(Clone)]
pub struct BackendContext {
    pub settings: Arc<dyn Settings>,
    pub http: HttpClientConfig,
    /// Public base URL of the hosting application, without trailing slash.
    pub base_url: String,
}

impl BackendContext {
    pub fn new(settings: Arc<dyn Settings>, base_url: &str) -> Self {
        Self {
            settings,
            http: HttpClientConfig::default(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &Config, settings: Arc<dyn Settings>) -> Self {
        Self {
            settings,
            http: HttpClientConfig {
                timeout: config.http_timeout(),
                max_retries: config.http_max_retries,
                user_agent: format!("video-sessions/{}", env!("CARGO_PKG_VERSION")),
            },
            base_url: config.base_url().to_string(),
        }
    }

    pub fn provider_settings(&self, provider_id: &str) -> ProviderSettings {
        ProviderSettings::new(self.settings.clone(), provider_id)
    }
}

pub type BuildFn = fn(&BackendContext) -> Result<Arc<dyn Backend>, BackendError>;

/// A statically registered adapter constructor.
#[derive(Clone, Copy)]
pub struct BackendFactory {
    pub id: &'static str,
    pub build: BuildFn,
}

pub const BUILTIN_BACKENDS: &[BackendFactory] = &[
    BackendFactory {
        id: gateway::bbb::ID,
        build: gateway::bbb::build,
    },
    BackendFactory {
        id: gateway::jitsi::ID,
        build: gateway::jitsi::build,
    },
    BackendFactory {
        id: gateway::opentalk::ID,
        build: gateway::opentalk::build,
    },
    BackendFactory {
        id: gateway::zoom::ID,
        build: gateway::zoom::build,
    },
];

/// Instantiates every factory once and caches the result.
///
/// A factory that fails, or that builds a backend under a different id than the
/// one it was registered with, is skipped with a warning; the others still load.
pub struct BackendLoader {
    context: BackendContext,
    factories: Vec<BackendFactory>,
    loaded: RwLock<Option<Vec<Arc<dyn Backend>>>>,
}

impl BackendLoader {
    pub fn new(context: BackendContext) -> Self {
        Self::with_factories(context, BUILTIN_BACKENDS)
    }

    pub fn with_factories(context: BackendContext, factories: &[BackendFactory]) -> Self {
        Self {
            context,
            factories: factories.to_vec(),
            loaded: RwLock::new(None),
        }
    }

    /// Every backend that could be built, cached after the first call.
    pub fn discover(&self) -> Vec<Arc<dyn Backend>> {
        if let Some(loaded) = self.loaded.read().unwrap_or_else(|e| e.into_inner()).as_ref() {
            return loaded.clone();
        }

        let mut loaded = self.loaded.write().unwrap_or_else(|e| e.into_inner());
        if let Some(backends) = loaded.as_ref() {
            return backends.clone();
        }

        let backends: Vec<Arc<dyn Backend>> = self
            .factories
            .iter()
            .filter_map(|factory| self.build(factory))
            .collect();
        info!("Discovered {} conferencing backends", backends.len());

        *loaded = Some(backends.clone());
        backends
    }

    /// Registers every discovered backend. Calling it again registers the same
    /// instances, so the registry ends up unchanged.
    pub fn load_into(&self, registry: &mut BackendRegistry) -> usize {
        let backends = self.discover();
        let count = backends.len();
        for backend in backends {
            registry.register(backend);
        }
        count
    }

    pub fn backend_exists(&self, id: &str) -> bool {
        self.discover().iter().any(|backend| backend.id() == id)
    }

    /// Forgets the built instances; the next discovery builds fresh ones.
    pub fn clear_cache(&self) {
        *self.loaded.write().unwrap_or_else(|e| e.into_inner()) = None;
    }

    fn build(&self, factory: &BackendFactory) -> Option<Arc<dyn Backend>> {
        match (factory.build)(&self.context) {
            Ok(backend) if backend.id() == factory.id => {
                debug!("Loaded backend {} ({})", backend.id(), backend.name());
                Some(backend)
            }
            Ok(backend) => {
                warn!(
                    "Skipping backend factory {}: it built a backend with id {}",
                    factory.id,
                    backend.id()
                );
                None
            }
            Err(e) => {
                warn!("Skipping backend {}: {e}", factory.id);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::AllowList;
    use crate::test_support::StubBackend;
    use service::settings::MemorySettings;

    fn context() -> BackendContext {
        BackendContext::new(Arc::new(MemorySettings::new()), "https://intranet.example.com/")
    }

    fn build_alpha(_: &BackendContext) -> Result<Arc<dyn Backend>, BackendError> {
        Ok(StubBackend::new("alpha", "Alpha").into_arc())
    }

    fn build_broken(_: &BackendContext) -> Result<Arc<dyn Backend>, BackendError> {
        Err(BackendError::Configuration("HTTP client could not be built".to_string()))
    }

    fn build_mislabelled(_: &BackendContext) -> Result<Arc<dyn Backend>, BackendError> {
        Ok(StubBackend::new("gamma", "Gamma").into_arc())
    }

    const FACTORIES: &[BackendFactory] = &[
        BackendFactory {
            id: "alpha",
            build: build_alpha,
        },
        BackendFactory {
            id: "broken",
            build: build_broken,
        },
        BackendFactory {
            id: "beta",
            build: build_mislabelled,
        },
    ];

    #[test]
    fn test_failing_and_mislabelled_factories_are_skipped() {
        let loader = BackendLoader::with_factories(context(), FACTORIES);

        let ids: Vec<String> = loader.discover().iter().map(|b| b.id().to_string()).collect();

        assert_eq!(ids, vec!["alpha".to_string()]);
        assert!(loader.backend_exists("alpha"));
        assert!(!loader.backend_exists("broken"));
        assert!(!loader.backend_exists("gamma"));
    }

    #[test]
    fn test_discovery_is_cached_until_cleared() {
        let loader = BackendLoader::with_factories(context(), FACTORIES);

        let first = loader.discover();
        let second = loader.discover();
        assert!(Arc::ptr_eq(&first[0], &second[0]));

        loader.clear_cache();
        let third = loader.discover();
        assert!(!Arc::ptr_eq(&first[0], &third[0]));
    }

    #[test]
    fn test_load_into_is_idempotent() {
        let loader = BackendLoader::with_factories(context(), FACTORIES);
        let mut registry = BackendRegistry::new(AllowList::new(Arc::new(MemorySettings::new())));

        assert_eq!(loader.load_into(&mut registry), 1);
        assert_eq!(loader.load_into(&mut registry), 1);
        assert_eq!(registry.all().len(), 1);
    }

    #[test]
    fn test_builtin_backends_all_load() {
        let loader = BackendLoader::new(context());

        let mut ids: Vec<String> = loader.discover().iter().map(|b| b.id().to_string()).collect();
        ids.sort();

        assert_eq!(ids, vec!["bbb", "jitsi", "opentalk", "zoom"]);
    }

    #[test]
    fn test_context_trims_base_url() {
        assert_eq!(context().base_url, "https://intranet.example.com");
    }
}
