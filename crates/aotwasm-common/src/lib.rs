//! Common types, errors, and configuration for aotwasm.
//!
//! This crate provides shared functionality used across the aotwasm workspace:
//! - Error types using `thiserror` for type-safe error handling
//! - Vocabulary enums shared by errors and the runtime ([`ExternKind`], [`RefKind`], [`TrapKind`])
//! - Configuration structures for runtime settings and TOML config files

pub mod config;
pub mod config_file;
pub mod error;
pub mod kinds;

pub use config::{EngineConfig, MemoryConfig, RuntimeConfig, TableConfig};
pub use config_file::{ConfigFile, ConfigFileError, ModuleEntry};
pub use error::RuntimeError;
pub use kinds::{ExternKind, RefKind, TrapKind};
