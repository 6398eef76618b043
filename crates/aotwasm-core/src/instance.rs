//! Instances and the values passed across instantiation.
//!
//! - [`Imports`]: the caller's import object, keyed by `(namespace, name)`
//! - [`ResolvedImports`]: the module's declared imports, resolved in order
//! - [`Exports`]: what an instantiation factory attaches to the instance
//! - [`Instance`]: a linked module with its exports

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use aotwasm_common::{ExternKind, RuntimeError};

use crate::func::Func;
use crate::global::Global;
use crate::memory::Memory;
use crate::module::{ImportType, Module};
use crate::table::Table;

/// A value that can be imported or exported.
#[derive(Debug)]
pub enum Extern {
    Func(Func),
    Memory(Memory),
    Table(Table),
    Global(Global),
}

impl Extern {
    pub fn kind(&self) -> ExternKind {
        match self {
            Extern::Func(_) => ExternKind::Function,
            Extern::Memory(_) => ExternKind::Memory,
            Extern::Table(_) => ExternKind::Table,
            Extern::Global(_) => ExternKind::Global,
        }
    }

    /// A handle to the same object that does not own its storage.
    pub fn share(&self) -> Extern {
        match self {
            Extern::Func(func) => Extern::Func(func.clone()),
            Extern::Memory(memory) => Extern::Memory(memory.share()),
            Extern::Table(table) => Extern::Table(table.share()),
            Extern::Global(global) => Extern::Global(global.share()),
        }
    }

    pub fn into_func(self) -> Option<Func> {
        match self {
            Extern::Func(func) => Some(func),
            _ => None,
        }
    }

    pub fn into_memory(self) -> Option<Memory> {
        match self {
            Extern::Memory(memory) => Some(memory),
            _ => None,
        }
    }

    pub fn into_table(self) -> Option<Table> {
        match self {
            Extern::Table(table) => Some(table),
            _ => None,
        }
    }

    pub fn into_global(self) -> Option<Global> {
        match self {
            Extern::Global(global) => Some(global),
            _ => None,
        }
    }
}

impl From<Func> for Extern {
    fn from(func: Func) -> Self {
        Extern::Func(func)
    }
}

impl From<Memory> for Extern {
    fn from(memory: Memory) -> Self {
        Extern::Memory(memory)
    }
}

impl From<Table> for Extern {
    fn from(table: Table) -> Self {
        Extern::Table(table)
    }
}

impl From<Global> for Extern {
    fn from(global: Global) -> Self {
        Extern::Global(global)
    }
}

/// An import object.
///
/// Objects defined here stay owned by the import object; instances linked
/// against it receive borrowed handles.
#[derive(Debug, Default)]
pub struct Imports {
    entries: HashMap<(String, String), Extern>,
}

impl Imports {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define `namespace.name`, replacing any previous definition.
    pub fn define(
        &mut self,
        namespace: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<Extern>,
    ) -> &mut Self {
        self.entries
            .insert((namespace.into(), name.into()), value.into());
        self
    }

    pub fn get(&self, namespace: &str, name: &str) -> Option<&Extern> {
        self.entries
            .get(&(namespace.to_string(), name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A module's imports resolved against an import object, in declaration
/// order.
#[derive(Debug, Default)]
pub struct ResolvedImports {
    entries: Vec<(ImportType, Extern)>,
}

impl ResolvedImports {
    pub(crate) fn push(&mut self, import: ImportType, value: Extern) {
        self.entries.push((import, value));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ImportType, &Extern)> {
        self.entries.iter().map(|(import, value)| (import, value))
    }

    /// The import at declaration position `index`.
    pub fn get(&self, index: usize) -> Option<&Extern> {
        self.entries.get(index).map(|(_, value)| value)
    }

    /// The import declared as `namespace.name`.
    pub fn find(&self, namespace: &str, name: &str) -> Option<&Extern> {
        self.entries
            .iter()
            .find(|(import, _)| import.module == namespace && import.name == name)
            .map(|(_, value)| value)
    }

    pub fn func(&self, namespace: &str, name: &str) -> Result<&Func, RuntimeError> {
        match self.find(namespace, name) {
            Some(Extern::Func(func)) => Ok(func),
            _ => Err(RuntimeError::import_resolution(namespace, name)),
        }
    }

    pub fn memory(&self, namespace: &str, name: &str) -> Result<&Memory, RuntimeError> {
        match self.find(namespace, name) {
            Some(Extern::Memory(memory)) => Ok(memory),
            _ => Err(RuntimeError::import_resolution(namespace, name)),
        }
    }

    pub fn table(&self, namespace: &str, name: &str) -> Result<&Table, RuntimeError> {
        match self.find(namespace, name) {
            Some(Extern::Table(table)) => Ok(table),
            _ => Err(RuntimeError::import_resolution(namespace, name)),
        }
    }

    pub fn global(&self, namespace: &str, name: &str) -> Result<&Global, RuntimeError> {
        match self.find(namespace, name) {
            Some(Extern::Global(global)) => Ok(global),
            _ => Err(RuntimeError::import_resolution(namespace, name)),
        }
    }
}

/// Exports attached by an instantiation factory, in order.
#[derive(Debug, Default)]
pub struct Exports {
    entries: Vec<(String, Extern)>,
}

impl Exports {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Exports::insert`].
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Extern>) -> Self {
        self.insert(name, value);
        self
    }

    /// Add an export, replacing any previous export of the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Extern>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Extern> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value)
    }

    pub(crate) fn remove(&mut self, name: &str) -> Option<Extern> {
        let index = self.entries.iter().position(|(existing, _)| existing == name)?;
        Some(self.entries.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Extern)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A linked module.
///
/// Dropping an instance releases the objects it owns, like [`Instance::destroy`].
#[derive(Debug)]
pub struct Instance {
    id: Uuid,
    module: Arc<Module>,
    exports: Option<Exports>,
}

impl Instance {
    pub(crate) fn new(module: Arc<Module>, exports: Exports) -> Self {
        Self {
            id: Uuid::new_v4(),
            module,
            exports: Some(exports),
        }
    }

    /// Unique identifier, used in logs.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The module this instance was created from.
    pub fn module(&self) -> &Arc<Module> {
        &self.module
    }

    pub fn is_destroyed(&self) -> bool {
        self.exports.is_none()
    }

    /// The instance's exports.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::InvalidArgument`] if the instance was destroyed.
    pub fn exports(&self) -> Result<&Exports, RuntimeError> {
        self.exports.as_ref().ok_or_else(|| {
            RuntimeError::invalid_argument(format!("instance {} was destroyed", self.id))
        })
    }

    /// A borrowed handle to export `name`.
    pub fn get_export(&self, name: &str) -> Result<Extern, RuntimeError> {
        self.exports()?
            .get(name)
            .map(Extern::share)
            .ok_or_else(|| {
                RuntimeError::invalid_argument(format!(
                    "module '{}' has no export named '{name}'",
                    self.module.name()
                ))
            })
    }

    pub fn get_func(&self, name: &str) -> Result<Func, RuntimeError> {
        let export = self.get_export(name)?;
        let found = export.kind();
        export
            .into_func()
            .ok_or_else(|| export_kind_error(name, ExternKind::Function, found))
    }

    pub fn get_memory(&self, name: &str) -> Result<Memory, RuntimeError> {
        let export = self.get_export(name)?;
        let found = export.kind();
        export
            .into_memory()
            .ok_or_else(|| export_kind_error(name, ExternKind::Memory, found))
    }

    pub fn get_table(&self, name: &str) -> Result<Table, RuntimeError> {
        let export = self.get_export(name)?;
        let found = export.kind();
        export
            .into_table()
            .ok_or_else(|| export_kind_error(name, ExternKind::Table, found))
    }

    pub fn get_global(&self, name: &str) -> Result<Global, RuntimeError> {
        let export = self.get_export(name)?;
        let found = export.kind();
        export
            .into_global()
            .ok_or_else(|| export_kind_error(name, ExternKind::Global, found))
    }

    /// Release everything the instance attached.
    ///
    /// Calling this more than once is a no-op. The module and other
    /// instances are unaffected; handles previously returned by
    /// [`Instance::get_export`] keep their objects alive.
    pub fn destroy(&mut self) {
        match self.exports.take() {
            Some(exports) => {
                info!(
                    instance_id = %self.id,
                    module = %self.module.name(),
                    exports = exports.len(),
                    "Instance destroyed"
                );
            }
            None => debug!(instance_id = %self.id, "Instance already destroyed"),
        }
    }
}

fn export_kind_error(name: &str, expected: ExternKind, found: ExternKind) -> RuntimeError {
    RuntimeError::invalid_argument(format!(
        "export '{name}' is a {found}, expected a {expected}"
    ))
}
