//! Dynamically loaded module libraries.
//!
//! Some builds ship precompiled modules in a separate shared library instead
//! of linking them into the host. The loader only needs to resolve each
//! module's instantiate symbol by name, so a library is modelled as a
//! [`SymbolResolver`]. Releasing the library is tied to `Drop`: every module
//! created from a library holds an `Arc` to it, and the library is closed
//! when the last of them goes away.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use aotwasm_common::RuntimeError;

use crate::instance::{Exports, ResolvedImports};
use crate::module::InstanceFactory;

/// The instantiate entry point exported by a compiled module.
pub type InstantiateFn = fn(&ResolvedImports) -> Result<Exports, RuntimeError>;

/// Resolves instantiate symbols by name.
pub trait SymbolResolver: Send + Sync {
    fn resolve(&self, symbol: &str) -> Option<InstantiateFn>;
}

/// A library whose symbols are known at build time.
///
/// This is what statically linked builds register, and what tests use in
/// place of a shared object.
#[derive(Default)]
pub struct StaticLibrary {
    name: String,
    symbols: HashMap<String, InstantiateFn>,
}

impl StaticLibrary {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            symbols: HashMap::new(),
        }
    }

    /// Builder form of [`StaticLibrary::define`].
    #[must_use]
    pub fn with_symbol(mut self, symbol: impl Into<String>, instantiate: InstantiateFn) -> Self {
        self.define(symbol, instantiate);
        self
    }

    pub fn define(&mut self, symbol: impl Into<String>, instantiate: InstantiateFn) {
        self.symbols.insert(symbol.into(), instantiate);
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl SymbolResolver for StaticLibrary {
    fn resolve(&self, symbol: &str) -> Option<InstantiateFn> {
        self.symbols.get(symbol).copied()
    }
}

impl fmt::Debug for StaticLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut symbols: Vec<_> = self.symbols.keys().collect();
        symbols.sort();
        f.debug_struct("StaticLibrary")
            .field("name", &self.name)
            .field("symbols", &symbols)
            .finish()
    }
}

/// An instance factory backed by a library symbol.
///
/// Holds the library so the resolved function pointer stays valid.
pub(crate) struct LibraryFactory {
    _library: Arc<dyn SymbolResolver>,
    instantiate: InstantiateFn,
}

impl LibraryFactory {
    pub(crate) fn resolve(library: Arc<dyn SymbolResolver>, symbol: &str) -> Option<Self> {
        let instantiate = library.resolve(symbol)?;
        debug!(symbol, "Resolved instantiate symbol");
        Some(Self {
            _library: library,
            instantiate,
        })
    }
}

impl InstanceFactory for LibraryFactory {
    fn instantiate(&self, imports: &ResolvedImports) -> Result<Exports, RuntimeError> {
        (self.instantiate)(imports)
    }
}
