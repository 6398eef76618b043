//! Catalog of precompiled modules.
//!
//! The registry is built once from the modules bundled with the host and is
//! read-only afterwards, so lookups take `&self` and it can be shared across
//! threads behind an `Arc`.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use aotwasm_common::RuntimeError;

use crate::checksum::Checksum;
use crate::module::Module;

type Constructor = dyn Fn() -> Result<Module, RuntimeError> + Send + Sync;

/// A precompiled module: its name, the checksum of the `.wasm` it was
/// compiled from, and how to build its descriptor.
#[derive(Clone)]
pub struct RegistryEntry {
    name: String,
    checksum: Checksum,
    constructor: Arc<Constructor>,
}

impl RegistryEntry {
    pub fn new<F>(name: impl Into<String>, checksum: Checksum, constructor: F) -> Self
    where
        F: Fn() -> Result<Module, RuntimeError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            checksum,
            constructor: Arc::new(constructor),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn checksum(&self) -> &Checksum {
        &self.checksum
    }

    /// Build the module descriptor.
    pub fn construct(&self) -> Result<Module, RuntimeError> {
        (self.constructor)()
    }
}

impl fmt::Debug for RegistryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryEntry")
            .field("name", &self.name)
            .field("checksum", &self.checksum)
            .finish_non_exhaustive()
    }
}

/// An immutable, name-indexed set of [`RegistryEntry`]s.
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    names: Vec<String>,
    entries: HashMap<String, RegistryEntry>,
}

impl ModuleRegistry {
    /// Build a registry.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::DuplicateModule`] if two entries share a name.
    pub fn new(entries: impl IntoIterator<Item = RegistryEntry>) -> Result<Self, RuntimeError> {
        let mut registry = Self::default();
        for entry in entries {
            if registry.entries.contains_key(entry.name()) {
                return Err(RuntimeError::DuplicateModule {
                    name: entry.name,
                });
            }
            registry.names.push(entry.name.clone());
            registry.entries.insert(entry.name.clone(), entry);
        }

        info!(modules = registry.len(), "Module registry built");

        Ok(registry)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&RegistryEntry> {
        let entry = self.entries.get(name);
        debug!(name, found = entry.is_some(), "Registry lookup by name");
        entry
    }

    /// Find the entry compiled from content with `checksum`.
    ///
    /// If several entries share a checksum the first registered one wins.
    pub fn find_by_checksum(&self, checksum: &Checksum) -> Option<&RegistryEntry> {
        let entry = self.iter().find(|entry| entry.checksum() == checksum);
        debug!(checksum = %checksum, found = entry.is_some(), "Registry lookup by checksum");
        entry
    }

    /// Module names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Entries in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &RegistryEntry> {
        self.names.iter().filter_map(|name| self.entries.get(name))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
