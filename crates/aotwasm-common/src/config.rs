//! Configuration structures for aotwasm.
//!
//! This module defines configuration options for various components:
//! - [`RuntimeConfig`]: Top-level configuration containing all settings
//! - [`EngineConfig`]: Engine context settings (module caching)
//! - [`MemoryConfig`]: Defaults for memories created by the host
//! - [`TableConfig`]: Defaults for tables created by the host

use serde::{Deserialize, Serialize};

/// Maximum number of pages of a host-created memory without an explicit maximum.
pub const DEFAULT_MEMORY_MAXIMUM_PAGES: u64 = 100;

/// Capacity of a table created without an explicit maximum.
pub const DEFAULT_TABLE_MAXIMUM_SIZE: u32 = 512;

/// Top-level runtime configuration.
///
/// This structure contains all configuration options for the engine context.
/// It can be loaded from files (TOML, JSON) through [`crate::ConfigFile`].
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RuntimeConfig {
    /// Engine context configuration.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Host-created memory defaults.
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Host-created table defaults.
    #[serde(default)]
    pub table: TableConfig,
}

/// Engine context configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Cache constructed modules by registry name.
    ///
    /// When enabled, repeated loads of the same precompiled module return
    /// the same shared module descriptor instead of constructing a new one.
    #[serde(default = "defaults::cache_modules")]
    pub cache_modules: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_modules: defaults::cache_modules(),
        }
    }
}

/// Defaults for memories created through the host API.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MemoryConfig {
    /// Maximum pages used when the host does not pass a maximum.
    #[serde(default = "defaults::default_maximum_pages")]
    pub default_maximum_pages: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            default_maximum_pages: defaults::default_maximum_pages(),
        }
    }
}

/// Defaults for tables created through the host API.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TableConfig {
    /// Capacity used when the host does not pass a maximum.
    #[serde(default = "defaults::default_maximum_size")]
    pub default_maximum_size: u32,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            default_maximum_size: defaults::default_maximum_size(),
        }
    }
}

/// Default value functions for serde.
mod defaults {
    pub const fn cache_modules() -> bool {
        true
    }

    pub const fn default_maximum_pages() -> u64 {
        super::DEFAULT_MEMORY_MAXIMUM_PAGES
    }

    pub const fn default_maximum_size() -> u32 {
        super::DEFAULT_TABLE_MAXIMUM_SIZE
    }
}
