//! Error types for aotwasm.
//!
//! [`RuntimeError`] covers every failure of the embedding layer, grouped by
//! the stage that produces it:
//! - loading: resolving bytes or metadata to a precompiled module
//! - instantiation: linking imports against an import object
//! - object access: memories, tables, globals and host handles
//! - execution: traps raised by compiled code

use std::io;

use thiserror::Error;

use crate::kinds::{ExternKind, RefKind, TrapKind};

/// Top-level runtime errors.
///
/// None of these are transient: they indicate a caller/build mismatch or an
/// invalid operation, so they are surfaced to the caller and never retried.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// No precompiled module is registered under the requested name.
    #[error(
        "Failed to load WebAssembly module '{name}': the module was not precompiled. \
         Perhaps you forgot to run code generation?"
    )]
    ModuleNotPrecompiled {
        /// The name of the module that was requested.
        name: String,
    },

    /// The registered module differs from the one the caller expected.
    #[error(
        "Module checksums for '{name}' differ (expected {expected}, registered {actual}). \
         Perhaps you forgot to rebuild the project?"
    )]
    ChecksumMismatch {
        /// The module name.
        name: String,
        /// The checksum supplied by the caller.
        expected: String,
        /// The checksum of the precompiled module.
        actual: String,
    },

    /// The module contents do not match any precompiled module.
    #[error(
        "Tried to load an unknown WebAssembly module (checksum {checksum}). \
         Only precompiled modules can be loaded"
    )]
    UnknownModule {
        /// Checksum of the supplied contents.
        checksum: String,
    },

    /// Two registry entries share a name.
    #[error("Duplicate module name in registry: {name}")]
    DuplicateModule {
        /// The repeated name.
        name: String,
    },

    /// A checksum string is not a 256-bit hex digest.
    #[error("Invalid checksum '{value}': expected 64 hex characters")]
    InvalidChecksum {
        /// The rejected value.
        value: String,
    },

    /// A metadata descriptor could not be decoded.
    #[error("Invalid module metadata: {reason}")]
    InvalidMetadata {
        /// Description of the problem.
        reason: String,
    },

    /// A declared import is missing from the import object.
    #[error("Unresolved import: {module}.{name}")]
    ImportResolution {
        /// Import namespace.
        module: String,
        /// Import name.
        name: String,
    },

    /// A resolved import has a different kind than declared.
    #[error("Import {module}.{name} kind mismatch: expected {expected}, found {found}")]
    ImportKindMismatch {
        /// Import namespace.
        module: String,
        /// Import name.
        name: String,
        /// The declared kind.
        expected: ExternKind,
        /// The kind found in the import object.
        found: ExternKind,
    },

    /// Growing would exceed the maximum size.
    #[error("Cannot grow {what} of size {current} by {delta}: maximum is {maximum}")]
    GrowOutOfRange {
        /// `"memory"` or `"table"`.
        what: &'static str,
        /// Size before the call.
        current: u64,
        /// Requested delta.
        delta: u64,
        /// Maximum size.
        maximum: u64,
    },

    /// An argument is outside the domain of the operation.
    #[error("Invalid argument: {reason}")]
    InvalidArgument {
        /// Description of why the argument was invalid.
        reason: String,
    },

    /// An index is past the end of a table or memory.
    #[error("Index {index} out of range for size {size}")]
    IndexOutOfRange {
        /// The requested index.
        index: u64,
        /// The current size.
        size: u64,
    },

    /// A table element of the wrong kind was stored.
    #[error("Table element type mismatch: expected {expected}, found {found}")]
    ElementTypeMismatch {
        /// The table kind.
        expected: RefKind,
        /// The element kind.
        found: RefKind,
    },

    /// An immutable global was written.
    #[error("Cannot change immutable WebAssembly global value")]
    ImmutableGlobal,

    /// Compiled code trapped.
    #[error("Wasm trap: {kind}")]
    Trap {
        /// Why execution stopped.
        kind: TrapKind,
    },

    /// A host handle is unknown or refers to a different kind of object.
    #[error("Invalid handle {handle}: {reason}")]
    InvalidHandle {
        /// The handle as displayed to the host.
        handle: String,
        /// Description of the mismatch.
        reason: String,
    },

    /// The backing buffer is currently viewed and cannot be resized.
    #[error("The {what} buffer is in use by an outstanding view")]
    BufferBorrowed {
        /// `"memory"` or `"table"`.
        what: &'static str,
    },

    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl RuntimeError {
    /// Create a new `ModuleNotPrecompiled` error.
    pub fn module_not_precompiled(name: impl Into<String>) -> Self {
        Self::ModuleNotPrecompiled { name: name.into() }
    }

    /// Create a new `UnknownModule` error.
    pub fn unknown_module(checksum: impl Into<String>) -> Self {
        Self::UnknownModule {
            checksum: checksum.into(),
        }
    }

    /// Create a new `InvalidMetadata` error.
    pub fn invalid_metadata(reason: impl Into<String>) -> Self {
        Self::InvalidMetadata {
            reason: reason.into(),
        }
    }

    /// Create a new `InvalidArgument` error.
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// Create a new `ImportResolution` error.
    pub fn import_resolution(module: impl Into<String>, name: impl Into<String>) -> Self {
        Self::ImportResolution {
            module: module.into(),
            name: name.into(),
        }
    }

    /// Create a new `IndexOutOfRange` error.
    pub fn index_out_of_range(index: u64, size: u64) -> Self {
        Self::IndexOutOfRange { index, size }
    }

    /// Create a new `Trap` error.
    pub fn trap(kind: TrapKind) -> Self {
        Self::Trap { kind }
    }

    /// Create a new `InvalidHandle` error.
    pub fn invalid_handle(handle: impl ToString, reason: impl Into<String>) -> Self {
        Self::InvalidHandle {
            handle: handle.to_string(),
            reason: reason.into(),
        }
    }

    /// Returns `true` if this error comes from resolving a module.
    pub fn is_loading_error(&self) -> bool {
        matches!(
            self,
            Self::ModuleNotPrecompiled { .. }
                | Self::ChecksumMismatch { .. }
                | Self::UnknownModule { .. }
                | Self::InvalidMetadata { .. }
        )
    }

    /// Returns `true` if this error comes from linking imports.
    pub fn is_link_error(&self) -> bool {
        matches!(
            self,
            Self::ImportResolution { .. } | Self::ImportKindMismatch { .. }
        )
    }

    /// Returns the trap kind if compiled code trapped.
    pub fn trap_kind(&self) -> Option<TrapKind> {
        match self {
            Self::Trap { kind } => Some(*kind),
            _ => None,
        }
    }
}
