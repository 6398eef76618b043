//! Resolving module bytes to precompiled modules.
//!
//! Nothing is compiled here. The loader accepts either a metadata view or the
//! original `.wasm` contents and maps them to a registry entry:
//!
//! - metadata: look up the name, then check the checksum against the entry
//! - contents: hash them and look up the checksum

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, info, instrument, warn};

use aotwasm_common::RuntimeError;

use crate::checksum::{Checksum, compute_checksum};
use crate::metadata::ModuleMetadataView;
use crate::module::Module;
use crate::registry::{ModuleRegistry, RegistryEntry};

/// Constructed modules keyed by registry name.
pub type ModuleCache = DashMap<String, Arc<Module>>;

/// Resolves bytes against a registry.
#[derive(Debug, Clone, Copy)]
pub struct Loader<'a> {
    registry: &'a ModuleRegistry,
    cache: Option<&'a ModuleCache>,
}

impl<'a> Loader<'a> {
    /// A loader that constructs a fresh module for every call.
    pub fn new(registry: &'a ModuleRegistry) -> Self {
        Self {
            registry,
            cache: None,
        }
    }

    /// A loader that reuses modules from `cache`.
    pub fn with_cache(registry: &'a ModuleRegistry, cache: &'a ModuleCache) -> Self {
        Self {
            registry,
            cache: Some(cache),
        }
    }

    /// Load a module from a metadata view or from its original contents.
    #[instrument(skip(self, bytes), fields(bytes_len = bytes.len()))]
    pub fn load_module(&self, bytes: &[u8]) -> Result<Arc<Module>, RuntimeError> {
        if ModuleMetadataView::is_metadata(bytes) {
            let (name, checksum) = ModuleMetadataView::decode(bytes)?.into_parts();
            debug!(name = %name, "Loading module from metadata");
            self.load_module_by_name(&name, &checksum)
        } else {
            self.load_module_from_contents(bytes)
        }
    }

    /// Load the module registered as `name`, checking that it was compiled
    /// from content with `checksum`.
    ///
    /// # Errors
    ///
    /// - [`RuntimeError::ModuleNotPrecompiled`] if no module is registered as `name`
    /// - [`RuntimeError::ChecksumMismatch`] if the registered checksum differs
    pub fn load_module_by_name(
        &self,
        name: &str,
        checksum: &Checksum,
    ) -> Result<Arc<Module>, RuntimeError> {
        let entry = self
            .registry
            .get_by_name(name)
            .ok_or_else(|| RuntimeError::module_not_precompiled(name))?;

        if entry.checksum() != checksum {
            warn!(
                module = %name,
                expected = %checksum,
                registered = %entry.checksum(),
                "Module checksum mismatch"
            );
            return Err(RuntimeError::ChecksumMismatch {
                name: name.to_string(),
                expected: checksum.to_string(),
                actual: entry.checksum().to_string(),
            });
        }

        self.construct(entry)
    }

    /// Load the module compiled from `bytes`.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::UnknownModule`] if no registered module was
    /// compiled from these contents.
    pub fn load_module_from_contents(&self, bytes: &[u8]) -> Result<Arc<Module>, RuntimeError> {
        let checksum = compute_checksum(bytes);
        let entry = self
            .registry
            .find_by_checksum(&checksum)
            .ok_or_else(|| RuntimeError::unknown_module(checksum.as_str()))?;

        self.construct(entry)
    }

    fn construct(&self, entry: &RegistryEntry) -> Result<Arc<Module>, RuntimeError> {
        let Some(cache) = self.cache else {
            return Ok(Arc::new(entry.construct()?));
        };

        if let Some(module) = cache.get(entry.name()) {
            debug!(module = %entry.name(), "Module cache hit");
            return Ok(Arc::clone(module.value()));
        }

        let module = Arc::new(entry.construct()?);
        // Another thread may have raced us; keep whichever landed first
        let module = Arc::clone(
            cache
                .entry(entry.name().to_string())
                .or_insert(module)
                .value(),
        );

        info!(module = %entry.name(), checksum = %entry.checksum(), "Module loaded");

        Ok(module)
    }
}
