//! Registry, loader and runtime object model for precompiled WebAssembly.
//!
//! Modules are compiled to native code ahead of time. This crate never sees
//! bytecode; it maps module bytes (or a metadata view naming a module) to the
//! precompiled module, instantiates it against an import object, and manages
//! the memories, tables and globals that instances share with the host:
//! - [`Engine`]: registry, configuration and module cache
//! - [`Loader`]: bytes or metadata to [`Module`]
//! - [`Module`] / [`Instance`]: descriptor and linked instance
//! - [`Memory`], [`Table`], [`Global`], [`Func`]: runtime objects
//! - [`trap`]: the boundary that turns traps into errors
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                        Engine                           │
//! │  (Shared across threads)                                │
//! │  - ModuleRegistry (name / checksum index)               │
//! │  - Module cache                                         │
//! └─────────────────────────────────────────────────────────┘
//!                            │  load_module(bytes | metadata)
//!                            ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │                       Module                            │
//! │  (Arc, shared across instances)                         │
//! │  - Declared imports / exports                           │
//! │  - Instantiation factory                                │
//! └─────────────────────────────────────────────────────────┘
//!                            │  create_instance(imports)
//!                            ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │                      Instance                           │
//! │  (Single-threaded, Rc-based)                            │
//! │  - Memory / Table / Global / Func exports               │
//! │  - Owned or borrowed from the import object             │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod checksum;
pub mod engine;
pub mod func;
pub mod global;
pub mod instance;
pub mod library;
pub mod loader;
pub mod memory;
pub mod metadata;
pub mod module;
pub mod registry;
mod shared;
pub mod table;
pub mod trap;

pub use checksum::{Checksum, compute_checksum, compute_file_checksum};
pub use engine::Engine;
pub use func::{Func, FuncType, ValType, Value};
pub use global::{Global, GlobalType, GlobalValue};
pub use instance::{Exports, Extern, Imports, Instance, ResolvedImports};
pub use library::{InstantiateFn, StaticLibrary, SymbolResolver};
pub use loader::{Loader, ModuleCache};
pub use memory::{Memory, PAGE_SIZE};
pub use metadata::ModuleMetadataView;
pub use module::{ExportType, ImportType, InstanceFactory, Module};
pub use registry::{ModuleRegistry, RegistryEntry};
pub use shared::Ownership;
pub use table::{ExternRef, ExternRefTable, FuncRefTable, Table, TableElement, TableRef};
