//! Host handles and the objects behind them.
//!
//! The host's object model knows nothing about WebAssembly types, so every
//! runtime object it holds is an opaque [`Handle`]. The bridge maps handles to
//! a closed set of [`HostObject`]s and checks the kind on every access.

use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use aotwasm_common::RuntimeError;
use aotwasm_core::{Func, Global, Instance, Memory, Module, Table};

/// An opaque reference to a runtime object held by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(Uuid);

impl Handle {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Every kind of object a handle can refer to.
#[derive(Debug)]
pub enum HostObject {
    Module(Arc<Module>),
    Instance(Instance),
    Memory(Memory),
    Table(Table),
    Global(Global),
    Func(Func),
}

impl HostObject {
    /// Name of the object kind, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            HostObject::Module(_) => "module",
            HostObject::Instance(_) => "instance",
            HostObject::Memory(_) => "memory",
            HostObject::Table(_) => "table",
            HostObject::Global(_) => "global",
            HostObject::Func(_) => "function",
        }
    }
}

pub(crate) fn wrong_kind(handle: Handle, expected: &str, object: &HostObject) -> RuntimeError {
    RuntimeError::invalid_handle(
        handle,
        format!("expected a {expected}, found a {}", object.kind_name()),
    )
}

pub(crate) fn unknown(handle: Handle) -> RuntimeError {
    RuntimeError::invalid_handle(handle, "no such object")
}

#[cfg(test)]
mod tests {
    use super::*;
    use aotwasm_core::GlobalType;

    #[test]
    fn test_handles_are_unique() {
        assert_ne!(Handle::new(), Handle::new());
    }

    #[test]
    fn test_wrong_kind_message() {
        let handle = Handle::new();
        let object = HostObject::Global(Global::new(GlobalType::I32, 0.0, false));

        let err = wrong_kind(handle, "memory", &object);
        assert_eq!(
            err.to_string(),
            format!("Invalid handle {handle}: expected a memory, found a global")
        );
    }
}
