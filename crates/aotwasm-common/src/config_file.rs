//! Configuration file structures for aotwasm.
//!
//! This module defines structures for TOML configuration files:
//! - [`ConfigFile`]: Top-level configuration file structure
//! - [`ModuleEntry`]: A WebAssembly module expected to be precompiled

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::RuntimeConfig;

/// Top-level configuration file structure.
///
/// # Example
///
/// ```toml
/// [runtime.engine]
/// cache_modules = true
///
/// [runtime.memory]
/// default_maximum_pages = 100
///
/// [[modules]]
/// name = "example"
/// path = "./wasm/example.wasm"
/// checksum = "ab12..."
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ConfigFile {
    /// Runtime configuration.
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// Modules that the host application bundles in precompiled form.
    #[serde(default)]
    pub modules: Vec<ModuleEntry>,
}

impl ConfigFile {
    /// Load configuration from a TOML file.
    ///
    /// Relative module paths stay relative; use [`ConfigFile::resolve_path`]
    /// to anchor them at the configuration file's directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigFileError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigFileError::Io {
            path: path.as_ref().display().to_string(),
            source: e,
        })?;

        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string cannot be parsed as TOML.
    pub fn from_toml(content: &str) -> Result<Self, ConfigFileError> {
        toml::from_str(content).map_err(|e| ConfigFileError::Parse {
            message: e.to_string(),
        })
    }

    /// Resolve a module path against the directory of the config file.
    pub fn resolve_path(config_path: impl AsRef<Path>, module: &ModuleEntry) -> PathBuf {
        let module_path = Path::new(&module.path);
        if module_path.is_absolute() {
            return module_path.to_path_buf();
        }

        config_path
            .as_ref()
            .parent()
            .map_or_else(|| module_path.to_path_buf(), |dir| dir.join(module_path))
    }
}

/// A module the host expects to find precompiled.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModuleEntry {
    /// Registry name of the module.
    pub name: String,

    /// Path to the WebAssembly binary the module was compiled from.
    pub path: String,

    /// Checksum recorded when the module was compiled.
    ///
    /// When absent, verification only reports the current checksum.
    #[serde(default)]
    pub checksum: Option<String>,
}

/// Configuration file errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    /// Failed to read configuration file.
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse configuration file.
    #[error("Failed to parse config file: {message}")]
    Parse { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_file() {
        let config = ConfigFile::default();

        assert!(config.runtime.engine.cache_modules);
        assert!(config.modules.is_empty());
    }

    #[test]
    fn test_parse_minimal_config() {
        let toml = r"
            [runtime.table]
            default_maximum_size = 64
        ";

        let config = ConfigFile::from_toml(toml).unwrap();

        assert_eq!(config.runtime.table.default_maximum_size, 64);
        // Defaults applied
        assert_eq!(config.runtime.memory.default_maximum_pages, 100);
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            [runtime.engine]
            cache_modules = false

            [runtime.memory]
            default_maximum_pages = 16

            [[modules]]
            name = "example"
            path = "./wasm/example.wasm"
            checksum = "00ff"

            [[modules]]
            name = "hello"
            path = "/abs/hello.wasm"
        "#;

        let config = ConfigFile::from_toml(toml).unwrap();

        assert!(!config.runtime.engine.cache_modules);
        assert_eq!(config.runtime.memory.default_maximum_pages, 16);
        assert_eq!(config.modules.len(), 2);
        assert_eq!(config.modules[0].name, "example");
        assert_eq!(config.modules[0].checksum.as_deref(), Some("00ff"));
        assert!(config.modules[1].checksum.is_none());
    }

    #[test]
    fn test_resolve_path() {
        let relative = ModuleEntry {
            name: "a".into(),
            path: "wasm/a.wasm".into(),
            checksum: None,
        };
        let resolved = ConfigFile::resolve_path("/project/aotwasm.toml", &relative);
        assert_eq!(resolved, PathBuf::from("/project/wasm/a.wasm"));

        let absolute = ModuleEntry {
            name: "b".into(),
            path: "/opt/b.wasm".into(),
            checksum: None,
        };
        let resolved = ConfigFile::resolve_path("/project/aotwasm.toml", &absolute);
        assert_eq!(resolved, PathBuf::from("/opt/b.wasm"));
    }

    #[test]
    fn test_parse_invalid_toml() {
        let invalid = "this is not valid toml [";
        let result = ConfigFile::from_toml(invalid);
        assert!(result.is_err());
    }
}
