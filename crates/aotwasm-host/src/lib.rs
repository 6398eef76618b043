//! Host bridge for aotwasm.
//!
//! This crate exposes the runtime to a host scripting engine whose object
//! model is not WebAssembly-aware. The host sees opaque handles; the bridge
//! owns the objects behind them.
//!
//! # Modules
//!
//! - [`bridge`]: [`HostBridge`], the handle-based API
//! - [`handle`]: [`Handle`] and the closed set of [`HostObject`] kinds
//! - [`metadata`]: [`ModuleMetadata`] reported when a module is loaded
//! - [`descriptor`]: [`TableDescriptor`] for creating tables
//!
//! # Handle Model
//!
//! 1. **Kind checked**: every operation checks the handle's object kind and
//!    fails with `InvalidHandle` instead of misinterpreting the object.
//! 2. **Shared storage**: copying a handle or exporting an instance's object
//!    shares the underlying storage; it stays alive until the last handle is
//!    released.
//! 3. **Explicit release**: handles live until [`HostBridge::release`] or
//!    until the bridge is dropped.

pub mod bridge;
pub mod descriptor;
pub mod handle;
pub mod metadata;

pub use bridge::HostBridge;
pub use descriptor::TableDescriptor;
pub use handle::{Handle, HostObject};
pub use metadata::ModuleMetadata;
