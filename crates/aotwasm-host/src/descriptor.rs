//! Descriptors the host passes when creating objects.

use serde::{Deserialize, Serialize};

use aotwasm_common::RefKind;

/// Describes a table to create.
///
/// Accepts the JavaScript API spelling, e.g.
/// `{"element": "anyfunc", "initial": 1, "maximum": 10}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct TableDescriptor {
    pub element: RefKind,
    pub initial: u32,
    /// Falls back to the engine's configured default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<u32>,
}

impl TableDescriptor {
    pub fn new(element: RefKind, initial: u32) -> Self {
        Self {
            element,
            initial,
            maximum: None,
        }
    }

    #[must_use]
    pub fn with_maximum(mut self, maximum: u32) -> Self {
        self.maximum = Some(maximum);
        self
    }
}
