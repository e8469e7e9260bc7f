//! The engine facade.
//!
//! Wires the registry, composer, gateway and cache together behind the
//! three operations a dashboard needs:
//!
//! ```text
//! compose(name, &filter)         → ComposedQuery
//! execute(ComposedQuery)         → TabularResult
//! get_or_compute(name, &filter)  → Arc<TabularResult>   (cached)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use dashq::config::Settings;
//! use dashq::engine::Engine;
//! use dashq::filter::FilterSelection;
//!
//! let settings = Settings::load()?;
//! let engine = Engine::from_settings(&settings, Default::default())?;
//! let filter = FilterSelection::builder().regions(["West", "East"]).build()?;
//! let result = engine.get_or_compute("region_perf", &filter)?;
//! ```

use std::sync::Arc;

use tracing::info;

use crate::cache::{CacheError, CacheStats, DatasetVersion, ResultCache};
use crate::compose::{ComposeError, ComposedQuery, Composer};
use crate::config::{Settings, SettingsError};
use crate::filter::{FilterError, FilterSelection};
use crate::gateway::{
    ExecutionError, ExecutionErrorKind, ExecutionGateway, SqliteStore, StorageEngine,
};
use crate::result::TabularResult;
use crate::template::library::standard_templates;
use crate::template::loader::{self, LoadError};
use crate::template::{RegistryBuilder, RegistryError, TemplateRegistry};

// ============================================================================
// Error Types
// ============================================================================

/// Errors surfaced by the engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Composition error: {0}")]
    Compose(#[from] ComposeError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Filter error: {0}")]
    Filter(#[from] FilterError),

    #[error("Configuration error: {0}")]
    Settings(#[from] SettingsError),

    #[error("Template file error: {0}")]
    Load(#[from] LoadError),
}

pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    /// The execution failure class, if this is an execution error.
    pub fn execution_kind(&self) -> Option<ExecutionErrorKind> {
        match self {
            EngineError::Execution(e) => Some(e.kind()),
            _ => None,
        }
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Shared entry point for composing and running templates.
///
/// `Engine` is `Send + Sync`; wrap it in an `Arc` to share it between
/// sessions.
#[derive(Debug)]
pub struct Engine {
    registry: Arc<TemplateRegistry>,
    composer: Composer,
    gateway: ExecutionGateway,
    cache: ResultCache,
}

impl Engine {
    pub fn new(
        registry: Arc<TemplateRegistry>,
        composer: Composer,
        gateway: ExecutionGateway,
        cache: ResultCache,
    ) -> Self {
        Self {
            registry,
            composer,
            gateway,
            cache,
        }
    }

    /// Build the registry from settings and open the configured database.
    pub fn from_settings(settings: &Settings, version: DatasetVersion) -> EngineResult<Self> {
        let registry = build_registry(settings)?;
        let path = settings.database.resolved_path()?;
        let store = SqliteStore::open(&path, settings.store_options())?;
        Ok(Self::with_store(settings, Arc::new(registry), store, version))
    }

    /// Assemble an engine over any storage engine, taking everything else
    /// from settings.
    pub fn with_store(
        settings: &Settings,
        registry: Arc<TemplateRegistry>,
        store: impl StorageEngine + 'static,
        version: DatasetVersion,
    ) -> Self {
        let cache = if settings.cache.enabled {
            ResultCache::new(version)
        } else {
            ResultCache::disabled(version)
        };
        Self::new(
            registry,
            Composer::new(settings.filters.clone()),
            ExecutionGateway::new(store, settings.gateway_options()),
            cache,
        )
    }

    /// Compose the named template against a filter selection.
    pub fn compose(&self, template: &str, filter: &FilterSelection) -> EngineResult<ComposedQuery> {
        let registered = self.registry.lookup(template)?;
        Ok(self.composer.compose(registered, filter)?)
    }

    /// Run a composed statement. Not cached.
    pub fn execute(&self, query: ComposedQuery) -> EngineResult<TabularResult> {
        Ok(self.gateway.execute(query)?)
    }

    /// Cached compose-and-execute.
    ///
    /// Unknown templates fail before the cache is consulted. Composition
    /// and execution failures are returned and never stored.
    pub fn get_or_compute(
        &self,
        template: &str,
        filter: &FilterSelection,
    ) -> EngineResult<Arc<TabularResult>> {
        let registered = self.registry.lookup(template)?;
        self.cache.get_or_compute(template, filter, || {
            let query = self.composer.compose(registered, filter)?;
            Ok(self.gateway.execute(query)?)
        })
    }

    pub fn dataset_version(&self) -> &DatasetVersion {
        self.cache.version()
    }

    pub fn registry(&self) -> &Arc<TemplateRegistry> {
        &self.registry
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn invalidate_cache(&self) {
        self.cache.invalidate_all();
    }
}

/// Build the registry the settings describe: the standard library (unless
/// disabled), then every configured template file in order.
pub fn build_registry(settings: &Settings) -> EngineResult<TemplateRegistry> {
    let mut builder = RegistryBuilder::new();
    if settings.templates.include_standard {
        builder.register_all(standard_templates())?;
    }
    for path in settings.templates.resolved_files()? {
        let templates = loader::load_file(&path)?;
        builder
            .register_all(templates)
            .map_err(|source| LoadError::Register { path, source })?;
    }
    info!(templates = builder.len(), "template registry built");
    Ok(builder.build())
}
