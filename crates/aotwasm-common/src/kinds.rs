//! Vocabulary enums shared between the error types and the runtime.
//!
//! - [`ExternKind`]: what an import or export refers to
//! - [`RefKind`]: the element kind of a table
//! - [`TrapKind`]: why compiled code stopped executing

use std::fmt;

use serde::{Deserialize, Serialize};

/// The kind of an import or export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExternKind {
    /// A callable function.
    Function,
    /// A table of references.
    Table,
    /// A linear memory.
    Memory,
    /// A global cell.
    Global,
}

impl fmt::Display for ExternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExternKind::Function => f.write_str("function"),
            ExternKind::Table => f.write_str("table"),
            ExternKind::Memory => f.write_str("memory"),
            ExternKind::Global => f.write_str("global"),
        }
    }
}

/// The kind of reference stored in a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RefKind {
    /// References to callable functions (`anyfunc` in the JS API).
    #[serde(alias = "anyfunc")]
    FuncRef,
    /// Opaque references to host objects.
    ExternRef,
}

impl fmt::Display for RefKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefKind::FuncRef => f.write_str("funcref"),
            RefKind::ExternRef => f.write_str("externref"),
        }
    }
}

/// A fault raised by compiled code.
///
/// The numeric codes match the trap codes emitted by the ahead-of-time
/// compiler's runtime, see [`TrapKind::from_code`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrapKind {
    /// An out-of-bounds memory or table access.
    MemoryOutOfBounds,
    /// An integer arithmetic operation caused an overflow.
    IntegerOverflow,
    /// An integer division by zero.
    IntegerDivisionByZero,
    /// Failed float-to-int conversion.
    BadConversionToInteger,
    /// Code that was supposed to have been unreachable was reached.
    UnreachableCodeReached,
    /// Indirect call to a null entry or with a mismatched signature.
    BadSignature,
    /// An exception was thrown and never caught.
    UncaughtException,
    /// An atomic operation was presented with a misaligned address.
    HeapMisaligned,
    /// The current stack space was exhausted.
    StackOverflow,
    /// A null reference was dereferenced.
    NullReference,
}

impl TrapKind {
    /// Map a trap code from compiled code to a [`TrapKind`].
    ///
    /// Code `0` means "no trap" and, like unknown codes, yields `None`.
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(Self::MemoryOutOfBounds),
            2 => Some(Self::IntegerOverflow),
            3 => Some(Self::IntegerDivisionByZero),
            4 => Some(Self::BadConversionToInteger),
            5 => Some(Self::UnreachableCodeReached),
            6 => Some(Self::BadSignature),
            7 => Some(Self::UncaughtException),
            8 => Some(Self::HeapMisaligned),
            9 => Some(Self::StackOverflow),
            10 => Some(Self::NullReference),
            _ => None,
        }
    }

    /// The numeric trap code of this kind.
    pub fn code(self) -> u32 {
        match self {
            Self::MemoryOutOfBounds => 1,
            Self::IntegerOverflow => 2,
            Self::IntegerDivisionByZero => 3,
            Self::BadConversionToInteger => 4,
            Self::UnreachableCodeReached => 5,
            Self::BadSignature => 6,
            Self::UncaughtException => 7,
            Self::HeapMisaligned => 8,
            Self::StackOverflow => 9,
            Self::NullReference => 10,
        }
    }
}

impl fmt::Display for TrapKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrapKind::MemoryOutOfBounds => f.write_str("out of bounds memory access"),
            TrapKind::IntegerOverflow => f.write_str("integer overflow"),
            TrapKind::IntegerDivisionByZero => f.write_str("integer divide by zero"),
            TrapKind::BadConversionToInteger => f.write_str("invalid conversion to integer"),
            TrapKind::UnreachableCodeReached => f.write_str("unreachable code executed"),
            TrapKind::BadSignature => f.write_str("indirect call signature mismatch"),
            TrapKind::UncaughtException => f.write_str("uncaught exception"),
            TrapKind::HeapMisaligned => f.write_str("unaligned atomic operation"),
            TrapKind::StackOverflow => f.write_str("call stack exhausted"),
            TrapKind::NullReference => f.write_str("null reference"),
        }
    }
}
