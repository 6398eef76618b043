//! Precompiled module descriptors.
//!
//! A [`Module`] never contains code. It describes what a precompiled module
//! imports and exports and carries the factory that the ahead-of-time
//! compiler produced for it. One module backs any number of instances.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use aotwasm_common::{ExternKind, RuntimeError};

use crate::instance::{Exports, Imports, Instance, ResolvedImports};
use crate::library::{LibraryFactory, SymbolResolver};
use crate::trap::catch_traps;

/// A declared import.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct ImportType {
    /// Import namespace.
    pub module: String,
    pub name: String,
    pub kind: ExternKind,
}

impl ImportType {
    pub fn new(module: impl Into<String>, name: impl Into<String>, kind: ExternKind) -> Self {
        Self {
            module: module.into(),
            name: name.into(),
            kind,
        }
    }
}

/// A declared export.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct ExportType {
    pub name: String,
    pub kind: ExternKind,
}

impl ExportType {
    pub fn new(name: impl Into<String>, kind: ExternKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Creates the native side of an instance.
///
/// Implemented by the compiler output for each precompiled module. The
/// factory receives the module's imports already resolved and kind-checked,
/// and returns the objects it exports. It runs inside the trap boundary.
pub trait InstanceFactory: Send + Sync {
    fn instantiate(&self, imports: &ResolvedImports) -> Result<Exports, RuntimeError>;
}

impl<F> InstanceFactory for F
where
    F: Fn(&ResolvedImports) -> Result<Exports, RuntimeError> + Send + Sync,
{
    fn instantiate(&self, imports: &ResolvedImports) -> Result<Exports, RuntimeError> {
        self(imports)
    }
}

/// An immutable descriptor of a precompiled module.
pub struct Module {
    name: String,
    imports: Vec<ImportType>,
    exports: Vec<ExportType>,
    factory: Arc<dyn InstanceFactory>,
}

impl Module {
    /// A module instantiated by the closure `factory`.
    pub fn new<F>(
        name: impl Into<String>,
        imports: Vec<ImportType>,
        exports: Vec<ExportType>,
        factory: F,
    ) -> Self
    where
        F: Fn(&ResolvedImports) -> Result<Exports, RuntimeError> + Send + Sync + 'static,
    {
        Self::with_factory(name, imports, exports, Arc::new(factory))
    }

    /// A module instantiated by `factory`.
    pub fn with_factory(
        name: impl Into<String>,
        imports: Vec<ImportType>,
        exports: Vec<ExportType>,
        factory: Arc<dyn InstanceFactory>,
    ) -> Self {
        Self {
            name: name.into(),
            imports,
            exports,
            factory,
        }
    }

    /// A module whose factory is the symbol `symbol` of `library`.
    ///
    /// The library stays loaded for as long as the module, or any module
    /// created from it, is alive.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::ModuleNotPrecompiled`] if the library does not
    /// define `symbol`.
    pub fn from_library(
        name: impl Into<String>,
        imports: Vec<ImportType>,
        exports: Vec<ExportType>,
        library: Arc<dyn SymbolResolver>,
        symbol: &str,
    ) -> Result<Self, RuntimeError> {
        let name = name.into();
        let factory = LibraryFactory::resolve(library, symbol).ok_or_else(|| {
            warn!(module = %name, symbol, "Instantiate symbol not found in library");
            RuntimeError::module_not_precompiled(&name)
        })?;
        Ok(Self::with_factory(name, imports, exports, Arc::new(factory)))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared imports, in order.
    pub fn imports(&self) -> &[ImportType] {
        &self.imports
    }

    /// Declared exports, in order.
    pub fn exports(&self) -> &[ExportType] {
        &self.exports
    }

    /// Link `imports` and instantiate the module.
    ///
    /// # Errors
    ///
    /// - [`RuntimeError::ImportResolution`] if a declared import is missing
    /// - [`RuntimeError::ImportKindMismatch`] if an import has the wrong kind
    /// - [`RuntimeError::Trap`] if the factory trapped
    /// - [`RuntimeError::InvalidArgument`] if the factory's exports differ from the declared ones
    #[instrument(skip(self, imports), fields(module = %self.name))]
    pub fn create_instance(self: &Arc<Self>, imports: &Imports) -> Result<Instance, RuntimeError> {
        let resolved = self.resolve_imports(imports)?;
        debug!(imports = resolved.len(), "Imports resolved");

        let exports = catch_traps(|| self.factory.instantiate(&resolved))?;
        let exports = self.check_exports(exports)?;

        let instance = Instance::new(Arc::clone(self), exports);
        info!(instance_id = %instance.id(), "Instance created");

        Ok(instance)
    }

    fn resolve_imports(&self, imports: &Imports) -> Result<ResolvedImports, RuntimeError> {
        let mut resolved = ResolvedImports::default();
        for import in &self.imports {
            let value = imports
                .get(&import.module, &import.name)
                .ok_or_else(|| RuntimeError::import_resolution(&import.module, &import.name))?;
            if value.kind() != import.kind {
                return Err(RuntimeError::ImportKindMismatch {
                    module: import.module.clone(),
                    name: import.name.clone(),
                    expected: import.kind,
                    found: value.kind(),
                });
            }
            resolved.push(import.clone(), value.share());
        }
        Ok(resolved)
    }

    /// Reorder `exports` to declaration order, rejecting anything undeclared.
    fn check_exports(&self, mut exports: Exports) -> Result<Exports, RuntimeError> {
        let mut checked = Exports::new();
        for export in &self.exports {
            let value = exports.remove(&export.name).ok_or_else(|| {
                RuntimeError::invalid_argument(format!(
                    "factory for '{}' did not provide export '{}'",
                    self.name, export.name
                ))
            })?;
            if value.kind() != export.kind {
                return Err(RuntimeError::invalid_argument(format!(
                    "factory for '{}' exported '{}' as a {}, declared as a {}",
                    self.name,
                    export.name,
                    value.kind(),
                    export.kind
                )));
            }
            checked.insert(export.name.clone(), value);
        }
        if let Some((name, _)) = exports.iter().next() {
            return Err(RuntimeError::invalid_argument(format!(
                "factory for '{}' exported undeclared '{name}'",
                self.name
            )));
        }
        Ok(checked)
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.name)
            .field("imports", &self.imports)
            .field("exports", &self.exports)
            .finish_non_exhaustive()
    }
}
