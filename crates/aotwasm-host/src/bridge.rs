//! The handle-based host API.
//!
//! [`HostBridge`] is what a scripting engine binds to. It owns every object
//! the host has a handle for and performs the operation-specific kind check
//! before touching the object.
//!
//! A bridge is tied to the thread that drives the host context and is
//! therefore `!Send`; create one bridge per context from a shared [`Engine`].

use std::cell::Ref;
use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, instrument};

use aotwasm_common::RuntimeError;
use aotwasm_core::{
    Engine, Extern, Func, Global, GlobalType, Imports, Memory, Module, Table, TableElement, Value,
};

use crate::descriptor::TableDescriptor;
use crate::handle::{Handle, HostObject, unknown, wrong_kind};
use crate::metadata::ModuleMetadata;

/// Owns the host's runtime objects and hands out handles to them.
#[derive(Debug)]
pub struct HostBridge {
    engine: Engine,
    objects: HashMap<Handle, HostObject>,
}

impl HostBridge {
    pub fn new(engine: Engine) -> Self {
        Self {
            engine,
            objects: HashMap::new(),
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Number of live handles.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn get(&self, handle: Handle) -> Result<&HostObject, RuntimeError> {
        self.objects.get(&handle).ok_or_else(|| unknown(handle))
    }

    fn insert(&mut self, object: HostObject) -> Handle {
        let handle = Handle::new();
        debug!(handle = %handle, kind = object.kind_name(), "Handle created");
        self.objects.insert(handle, object);
        handle
    }

    /// Drop the object behind `handle`, whatever its kind.
    pub fn release(&mut self, handle: Handle) -> Result<(), RuntimeError> {
        let object = self.objects.remove(&handle).ok_or_else(|| unknown(handle))?;
        debug!(handle = %handle, kind = object.kind_name(), "Handle released");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Modules
    // ------------------------------------------------------------------

    /// Load a module from its contents or a metadata view.
    #[instrument(skip(self, bytes), fields(bytes_len = bytes.len()))]
    pub fn load_module(&mut self, bytes: &[u8]) -> Result<(Handle, ModuleMetadata), RuntimeError> {
        let module = self.engine.load_module(bytes)?;
        let metadata = ModuleMetadata::from(module.as_ref());
        let handle = self.insert(HostObject::Module(module));

        info!(handle = %handle, module = %metadata.name, "Module handle created");

        Ok((handle, metadata))
    }

    pub fn unload_module(&mut self, handle: Handle) -> Result<(), RuntimeError> {
        self.module(handle)?;
        self.release(handle)
    }

    pub fn get_module_metadata(&self, handle: Handle) -> Result<ModuleMetadata, RuntimeError> {
        Ok(ModuleMetadata::from(self.module(handle)?.as_ref()))
    }

    pub fn module(&self, handle: Handle) -> Result<&Arc<Module>, RuntimeError> {
        match self.get(handle)? {
            HostObject::Module(module) => Ok(module),
            other => Err(wrong_kind(handle, "module", other)),
        }
    }

    // ------------------------------------------------------------------
    // Instances
    // ------------------------------------------------------------------

    /// Instantiate the module behind `module` against `imports`.
    ///
    /// Build `imports` with [`HostBridge::import_extern`] to link objects the
    /// host already holds.
    pub fn create_instance(
        &mut self,
        module: Handle,
        imports: &Imports,
    ) -> Result<Handle, RuntimeError> {
        let instance = self.module(module)?.create_instance(imports)?;
        Ok(self.insert(HostObject::Instance(instance)))
    }

    /// Destroy the instance behind `handle`.
    ///
    /// The handle stays valid so that destroying twice is a no-op; release it
    /// with [`HostBridge::release`].
    pub fn destroy_instance(&mut self, handle: Handle) -> Result<(), RuntimeError> {
        match self.objects.get_mut(&handle) {
            Some(HostObject::Instance(instance)) => {
                instance.destroy();
                Ok(())
            }
            Some(other) => Err(wrong_kind(handle, "instance", other)),
            None => Err(unknown(handle)),
        }
    }

    /// A new handle to export `name` of the instance behind `instance`.
    pub fn export_handle(&mut self, instance: Handle, name: &str) -> Result<Handle, RuntimeError> {
        let export = match self.get(instance)? {
            HostObject::Instance(object) => object.get_export(name)?,
            other => return Err(wrong_kind(instance, "instance", other)),
        };
        Ok(self.insert(extern_to_object(export)))
    }

    /// The object behind `handle` as an import value.
    ///
    /// The import shares storage with the handle's object.
    pub fn import_extern(&self, handle: Handle) -> Result<Extern, RuntimeError> {
        match self.get(handle)? {
            HostObject::Memory(memory) => Ok(Extern::Memory(memory.share())),
            HostObject::Table(table) => Ok(Extern::Table(table.share())),
            HostObject::Global(global) => Ok(Extern::Global(global.share())),
            HostObject::Func(func) => Ok(Extern::Func(func.clone())),
            other => Err(RuntimeError::invalid_handle(
                handle,
                format!("a {} cannot be imported", other.kind_name()),
            )),
        }
    }

    /// A second handle to the same object.
    ///
    /// Instance handles cannot be copied.
    pub fn copy_handle(&mut self, handle: Handle) -> Result<Handle, RuntimeError> {
        let copy = match self.get(handle)? {
            HostObject::Module(module) => HostObject::Module(Arc::clone(module)),
            HostObject::Memory(memory) => HostObject::Memory(memory.share()),
            HostObject::Table(table) => HostObject::Table(table.share()),
            HostObject::Global(global) => HostObject::Global(global.share()),
            HostObject::Func(func) => HostObject::Func(func.clone()),
            HostObject::Instance(_) => {
                return Err(RuntimeError::invalid_handle(
                    handle,
                    "instances cannot be copied",
                ));
            }
        };
        Ok(self.insert(copy))
    }

    // ------------------------------------------------------------------
    // Memories
    // ------------------------------------------------------------------

    /// Create a memory; `maximum` defaults to the engine configuration.
    pub fn create_memory(
        &mut self,
        initial: u64,
        maximum: Option<u64>,
    ) -> Result<Handle, RuntimeError> {
        let memory = self.engine.create_memory(initial, maximum)?;
        Ok(self.insert(HostObject::Memory(memory)))
    }

    /// A view of the memory's current contents.
    ///
    /// The view must be dropped before the memory can grow; take a fresh one
    /// afterwards.
    pub fn get_memory_buffer(&self, handle: Handle) -> Result<Ref<'_, [u8]>, RuntimeError> {
        self.memory(handle)?.data()
    }

    /// Grow the memory, returning its new size in pages.
    pub fn grow_memory(&self, handle: Handle, delta: i64) -> Result<u64, RuntimeError> {
        self.memory(handle)?.grow(delta)
    }

    pub fn memory(&self, handle: Handle) -> Result<&Memory, RuntimeError> {
        match self.get(handle)? {
            HostObject::Memory(memory) => Ok(memory),
            other => Err(wrong_kind(handle, "memory", other)),
        }
    }

    // ------------------------------------------------------------------
    // Globals
    // ------------------------------------------------------------------

    pub fn create_global(&mut self, ty: GlobalType, mutable: bool, initial: f64) -> Handle {
        self.insert(HostObject::Global(Global::new(ty, initial, mutable)))
    }

    pub fn get_global_value(&self, handle: Handle) -> Result<f64, RuntimeError> {
        self.global(handle)?.get_value()
    }

    pub fn set_global_value(&self, handle: Handle, value: f64) -> Result<(), RuntimeError> {
        self.global(handle)?.set_value(value)
    }

    pub fn global(&self, handle: Handle) -> Result<&Global, RuntimeError> {
        match self.get(handle)? {
            HostObject::Global(global) => Ok(global),
            other => Err(wrong_kind(handle, "global", other)),
        }
    }

    // ------------------------------------------------------------------
    // Tables
    // ------------------------------------------------------------------

    pub fn create_table(&mut self, descriptor: &TableDescriptor) -> Result<Handle, RuntimeError> {
        let table =
            self.engine
                .create_table(descriptor.element, descriptor.initial, descriptor.maximum)?;
        Ok(self.insert(HostObject::Table(table)))
    }

    /// Grow the table, filling new slots with `init` or null.
    pub fn grow_table(
        &self,
        handle: Handle,
        delta: i64,
        init: Option<TableElement>,
    ) -> Result<u32, RuntimeError> {
        let table = self.table(handle)?;
        match init {
            Some(init) => table.grow_with(delta, init),
            None => table.grow(delta),
        }
    }

    pub fn get_table_element(
        &self,
        handle: Handle,
        index: u64,
    ) -> Result<TableElement, RuntimeError> {
        self.table(handle)?.get_element(index)
    }

    pub fn set_table_element(
        &self,
        handle: Handle,
        index: u64,
        element: TableElement,
    ) -> Result<(), RuntimeError> {
        self.table(handle)?.set_element(index, element)
    }

    pub fn get_table_size(&self, handle: Handle) -> Result<u32, RuntimeError> {
        self.table(handle)?.size()
    }

    pub fn table(&self, handle: Handle) -> Result<&Table, RuntimeError> {
        match self.get(handle)? {
            HostObject::Table(table) => Ok(table),
            other => Err(wrong_kind(handle, "table", other)),
        }
    }

    // ------------------------------------------------------------------
    // Functions
    // ------------------------------------------------------------------

    pub fn create_function(&mut self, func: Func) -> Handle {
        self.insert(HostObject::Func(func))
    }

    pub fn call_function(
        &self,
        handle: Handle,
        args: &[Value],
    ) -> Result<Vec<Value>, RuntimeError> {
        self.func(handle)?.call(args)
    }

    pub fn func(&self, handle: Handle) -> Result<&Func, RuntimeError> {
        match self.get(handle)? {
            HostObject::Func(func) => Ok(func),
            other => Err(wrong_kind(handle, "function", other)),
        }
    }
}

fn extern_to_object(value: Extern) -> HostObject {
    match value {
        Extern::Func(func) => HostObject::Func(func),
        Extern::Memory(memory) => HostObject::Memory(memory),
        Extern::Table(table) => HostObject::Table(table),
        Extern::Global(global) => HostObject::Global(global),
    }
}
