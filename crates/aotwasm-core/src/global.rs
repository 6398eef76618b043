//! Global cells.
//!
//! The host sees every global value as an `f64`. Values of 64-bit integer
//! globals beyond 2^53 lose precision on the way out; this is accepted.

use std::fmt;

use serde::{Deserialize, Serialize};

use aotwasm_common::RuntimeError;

use crate::shared::{Ownership, Shared};

/// The declared type of a global.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GlobalType {
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
}

impl fmt::Display for GlobalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GlobalType::I32 => f.write_str("i32"),
            GlobalType::U32 => f.write_str("u32"),
            GlobalType::I64 => f.write_str("i64"),
            GlobalType::U64 => f.write_str("u64"),
            GlobalType::F32 => f.write_str("f32"),
            GlobalType::F64 => f.write_str("f64"),
        }
    }
}

/// A typed global value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GlobalValue {
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
}

impl GlobalValue {
    pub fn ty(&self) -> GlobalType {
        match self {
            GlobalValue::I32(_) => GlobalType::I32,
            GlobalValue::U32(_) => GlobalType::U32,
            GlobalValue::I64(_) => GlobalType::I64,
            GlobalValue::U64(_) => GlobalType::U64,
            GlobalValue::F32(_) => GlobalType::F32,
            GlobalValue::F64(_) => GlobalType::F64,
        }
    }

    /// Narrow `value` to `ty`.
    ///
    /// Float to integer conversion truncates toward zero and saturates at the
    /// bounds of the target type; NaN becomes 0.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn from_f64(ty: GlobalType, value: f64) -> Self {
        match ty {
            GlobalType::I32 => GlobalValue::I32(value as i32),
            GlobalType::U32 => GlobalValue::U32(value as u32),
            GlobalType::I64 => GlobalValue::I64(value as i64),
            GlobalType::U64 => GlobalValue::U64(value as u64),
            GlobalType::F32 => GlobalValue::F32(value as f32),
            GlobalType::F64 => GlobalValue::F64(value),
        }
    }

    /// Widen to `f64`.
    #[allow(clippy::cast_precision_loss)]
    pub fn to_f64(&self) -> f64 {
        match *self {
            GlobalValue::I32(v) => f64::from(v),
            GlobalValue::U32(v) => f64::from(v),
            GlobalValue::I64(v) => v as f64,
            GlobalValue::U64(v) => v as f64,
            GlobalValue::F32(v) => f64::from(v),
            GlobalValue::F64(v) => v,
        }
    }
}

/// A typed, optionally mutable scalar cell.
pub struct Global {
    ty: GlobalType,
    mutable: bool,
    value: Shared<GlobalValue>,
}

impl Global {
    /// Create an owned global of type `ty` holding `initial` narrowed to `ty`.
    pub fn new(ty: GlobalType, initial: f64, mutable: bool) -> Self {
        Self::with_value(GlobalValue::from_f64(ty, initial), mutable)
    }

    /// Create an owned global holding `value`.
    pub fn with_value(value: GlobalValue, mutable: bool) -> Self {
        Self {
            ty: value.ty(),
            mutable,
            value: Shared::owned(value),
        }
    }

    /// A borrowed handle to the same cell.
    pub fn share(&self) -> Self {
        Self {
            ty: self.ty,
            mutable: self.mutable,
            value: self.value.share(),
        }
    }

    pub fn ownership(&self) -> Ownership {
        self.value.ownership()
    }

    pub fn is_owned(&self) -> bool {
        self.ownership() == Ownership::Owned
    }

    pub fn same_storage(&self, other: &Global) -> bool {
        self.value.ptr_eq(&other.value)
    }

    pub fn ty(&self) -> GlobalType {
        self.ty
    }

    pub fn is_mutable(&self) -> bool {
        self.mutable
    }

    /// The current value.
    pub fn get(&self) -> Result<GlobalValue, RuntimeError> {
        Ok(*self.value.borrow("global")?)
    }

    /// The current value widened to `f64`.
    pub fn get_value(&self) -> Result<f64, RuntimeError> {
        Ok(self.get()?.to_f64())
    }

    /// Store `value`.
    ///
    /// # Errors
    ///
    /// - [`RuntimeError::ImmutableGlobal`] if the global is immutable
    /// - [`RuntimeError::InvalidArgument`] if `value` has a different type
    pub fn set(&self, value: GlobalValue) -> Result<(), RuntimeError> {
        if !self.mutable {
            return Err(RuntimeError::ImmutableGlobal);
        }
        if value.ty() != self.ty {
            return Err(RuntimeError::invalid_argument(format!(
                "cannot store {} in a {} global",
                value.ty(),
                self.ty
            )));
        }
        *self.value.borrow_mut("global")? = value;
        Ok(())
    }

    /// Narrow `value` to the global's type and store it.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::ImmutableGlobal`] if the global is immutable;
    /// the value is left unchanged.
    pub fn set_value(&self, value: f64) -> Result<(), RuntimeError> {
        self.set(GlobalValue::from_f64(self.ty, value))
    }
}

impl fmt::Debug for Global {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Global")
            .field("ty", &self.ty)
            .field("mutable", &self.mutable)
            .field("ownership", &self.ownership())
            .finish_non_exhaustive()
    }
}
