//! Engine context.
//!
//! The [`Engine`] bundles everything that used to be process-wide state:
//! - the registry of precompiled modules
//! - runtime configuration
//! - the module cache
//!
//! Create one per process (or per test) and pass it to whatever loads
//! modules. Clones share the registry and the cache.

use std::sync::Arc;

use tracing::{debug, info};

use aotwasm_common::{RefKind, RuntimeConfig, RuntimeError};

use crate::checksum::Checksum;
use crate::loader::{Loader, ModuleCache};
use crate::memory::Memory;
use crate::module::Module;
use crate::registry::ModuleRegistry;
use crate::table::Table;

/// Thread-safe handle to a registry, its configuration and its module cache.
///
/// # Example
///
/// ```ignore
/// use aotwasm_common::RuntimeConfig;
/// use aotwasm_core::{Engine, ModuleRegistry};
///
/// let engine = Engine::new(ModuleRegistry::new(entries)?, &RuntimeConfig::default());
/// let module = engine.load_module(&bytes)?;
/// ```
#[derive(Debug, Clone)]
pub struct Engine {
    registry: Arc<ModuleRegistry>,
    config: RuntimeConfig,
    cache: Arc<ModuleCache>,
}

impl Engine {
    pub fn new(registry: ModuleRegistry, config: &RuntimeConfig) -> Self {
        Self::from_shared(Arc::new(registry), config)
    }

    /// An engine over a registry that is shared with other engines.
    ///
    /// Each engine gets its own module cache.
    pub fn from_shared(registry: Arc<ModuleRegistry>, config: &RuntimeConfig) -> Self {
        info!(
            modules = registry.len(),
            cache_modules = config.engine.cache_modules,
            "Engine initialized"
        );

        Self {
            registry,
            config: config.clone(),
            cache: Arc::new(ModuleCache::new()),
        }
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// A loader honouring the `cache_modules` setting.
    pub fn loader(&self) -> Loader<'_> {
        if self.config.engine.cache_modules {
            Loader::with_cache(&self.registry, &self.cache)
        } else {
            Loader::new(&self.registry)
        }
    }

    /// See [`Loader::load_module`].
    pub fn load_module(&self, bytes: &[u8]) -> Result<Arc<Module>, RuntimeError> {
        self.loader().load_module(bytes)
    }

    /// See [`Loader::load_module_by_name`].
    pub fn load_module_by_name(
        &self,
        name: &str,
        checksum: &Checksum,
    ) -> Result<Arc<Module>, RuntimeError> {
        self.loader().load_module_by_name(name, checksum)
    }

    /// See [`Loader::load_module_from_contents`].
    pub fn load_module_from_contents(&self, bytes: &[u8]) -> Result<Arc<Module>, RuntimeError> {
        self.loader().load_module_from_contents(bytes)
    }

    /// Allocate a 32-bit memory, defaulting the maximum from the configuration.
    pub fn create_memory(
        &self,
        initial: u64,
        maximum: Option<u64>,
    ) -> Result<Memory, RuntimeError> {
        let maximum = maximum.unwrap_or(self.config.memory.default_maximum_pages);
        Memory::new(initial, maximum, false)
    }

    /// Allocate a table, defaulting the maximum from the configuration.
    pub fn create_table(
        &self,
        kind: RefKind,
        initial: u32,
        maximum: Option<u32>,
    ) -> Result<Table, RuntimeError> {
        let maximum = maximum.unwrap_or(self.config.table.default_maximum_size);
        Table::new(kind, initial, Some(maximum))
    }

    /// Number of modules in the cache.
    pub fn cached_modules(&self) -> usize {
        self.cache.len()
    }

    /// Drop every cached module.
    ///
    /// Modules still referenced elsewhere stay alive.
    pub fn clear_cache(&self) {
        let count = self.cache.len();
        self.cache.clear();
        debug!(count, "Module cache cleared");
    }
}
