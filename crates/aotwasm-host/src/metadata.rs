//! Module metadata reported to the host.

use serde::{Deserialize, Serialize};

use aotwasm_core::{ExportType, ImportType, Module};

/// A module's name and declared imports and exports.
///
/// Serialises to the shape the host's scripting layer expects:
/// `{"name": .., "imports": [{"module", "name", "kind"}], "exports": [{"name", "kind"}]}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ModuleMetadata {
    pub name: String,
    pub imports: Vec<ImportType>,
    pub exports: Vec<ExportType>,
}

impl From<&Module> for ModuleMetadata {
    fn from(module: &Module) -> Self {
        Self {
            name: module.name().to_string(),
            imports: module.imports().to_vec(),
            exports: module.exports().to_vec(),
        }
    }
}
