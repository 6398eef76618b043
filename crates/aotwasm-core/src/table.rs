//! Tables of references.
//!
//! A table stores references of exactly one [`RefKind`]. The typed API
//! ([`FuncRefTable`], [`ExternRefTable`]) makes storing the wrong kind
//! unrepresentable; the untyped [`Table`] enum is what instances and the host
//! pass around and checks element kinds at runtime.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use tracing::debug;

use aotwasm_common::config::DEFAULT_TABLE_MAXIMUM_SIZE;
use aotwasm_common::{RefKind, RuntimeError};

use crate::func::Func;
use crate::shared::{Ownership, Shared};

/// An opaque reference to a host object.
#[derive(Clone)]
pub struct ExternRef(Rc<dyn Any>);

impl ExternRef {
    pub fn new<T: Any>(value: T) -> Self {
        Self(Rc::new(value))
    }

    /// The referenced object, if it is a `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }

    /// Whether both references point at the same object.
    pub fn ptr_eq(&self, other: &ExternRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for ExternRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExternRef({:p})", Rc::as_ptr(&self.0))
    }
}

/// A nullable reference tagged with its kind.
#[derive(Debug, Clone)]
pub enum TableElement {
    FuncRef(Option<Func>),
    ExternRef(Option<ExternRef>),
}

impl TableElement {
    /// The null reference of `kind`.
    pub fn null(kind: RefKind) -> Self {
        match kind {
            RefKind::FuncRef => TableElement::FuncRef(None),
            RefKind::ExternRef => TableElement::ExternRef(None),
        }
    }

    pub fn kind(&self) -> RefKind {
        match self {
            TableElement::FuncRef(_) => RefKind::FuncRef,
            TableElement::ExternRef(_) => RefKind::ExternRef,
        }
    }

    pub fn is_null(&self) -> bool {
        match self {
            TableElement::FuncRef(func) => func.is_none(),
            TableElement::ExternRef(value) => value.is_none(),
        }
    }

    /// Whether both elements have the same kind and reference the same
    /// object (or are both null).
    pub fn same_ref(&self, other: &TableElement) -> bool {
        match (self, other) {
            (TableElement::FuncRef(a), TableElement::FuncRef(b)) => match (a, b) {
                (Some(a), Some(b)) => a.ptr_eq(b),
                (None, None) => true,
                _ => false,
            },
            (TableElement::ExternRef(a), TableElement::ExternRef(b)) => match (a, b) {
                (Some(a), Some(b)) => a.ptr_eq(b),
                (None, None) => true,
                _ => false,
            },
            _ => false,
        }
    }
}

impl From<Func> for TableElement {
    fn from(func: Func) -> Self {
        TableElement::FuncRef(Some(func))
    }
}

impl From<ExternRef> for TableElement {
    fn from(value: ExternRef) -> Self {
        TableElement::ExternRef(Some(value))
    }
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for crate::func::Func {}
    impl Sealed for super::ExternRef {}
}

/// A reference type that can be stored in a table.
pub trait TableRef: sealed::Sealed + Clone + 'static {
    const KIND: RefKind;

    fn into_element(value: Option<Self>) -> TableElement;

    fn from_element(element: TableElement) -> Result<Option<Self>, RuntimeError>;
}

impl TableRef for Func {
    const KIND: RefKind = RefKind::FuncRef;

    fn into_element(value: Option<Self>) -> TableElement {
        TableElement::FuncRef(value)
    }

    fn from_element(element: TableElement) -> Result<Option<Self>, RuntimeError> {
        match element {
            TableElement::FuncRef(func) => Ok(func),
            other => Err(RuntimeError::ElementTypeMismatch {
                expected: Self::KIND,
                found: other.kind(),
            }),
        }
    }
}

impl TableRef for ExternRef {
    const KIND: RefKind = RefKind::ExternRef;

    fn into_element(value: Option<Self>) -> TableElement {
        TableElement::ExternRef(value)
    }

    fn from_element(element: TableElement) -> Result<Option<Self>, RuntimeError> {
        match element {
            TableElement::ExternRef(value) => Ok(value),
            other => Err(RuntimeError::ElementTypeMismatch {
                expected: Self::KIND,
                found: other.kind(),
            }),
        }
    }
}

/// A table holding references of type `R`.
pub struct TypedTable<R: TableRef> {
    elements: Shared<Vec<Option<R>>>,
    maximum: u32,
}

/// A table of function references.
pub type FuncRefTable = TypedTable<Func>;

/// A table of host references.
pub type ExternRefTable = TypedTable<ExternRef>;

impl<R: TableRef> TypedTable<R> {
    /// Allocate an owned table of `initial` null references.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::InvalidArgument`] if `initial > maximum`.
    pub fn new(initial: u32, maximum: u32) -> Result<Self, RuntimeError> {
        if initial > maximum {
            return Err(RuntimeError::invalid_argument(format!(
                "initial size {initial} exceeds maximum {maximum}"
            )));
        }

        let mut elements = Vec::new();
        elements.try_reserve_exact(initial as usize).map_err(|e| {
            RuntimeError::invalid_argument(format!("cannot allocate {initial} elements: {e}"))
        })?;
        elements.resize(initial as usize, None);

        Ok(Self {
            elements: Shared::owned(elements),
            maximum,
        })
    }

    /// A borrowed handle to the same storage.
    pub fn share(&self) -> Self {
        Self {
            elements: self.elements.share(),
            maximum: self.maximum,
        }
    }

    pub fn ownership(&self) -> Ownership {
        self.elements.ownership()
    }

    pub fn same_storage(&self, other: &Self) -> bool {
        self.elements.ptr_eq(&other.elements)
    }

    /// Current number of elements.
    pub fn size(&self) -> Result<u32, RuntimeError> {
        let len = self.elements.borrow("table")?.len();
        // Never grows past `maximum`, which is a u32
        Ok(u32::try_from(len).unwrap_or(u32::MAX))
    }

    /// Maximum number of elements.
    pub fn capacity(&self) -> u32 {
        self.maximum
    }

    /// Grow by `delta` null references, returning the new size.
    pub fn grow(&self, delta: i64) -> Result<u32, RuntimeError> {
        self.grow_with(delta, None)
    }

    /// Grow by `delta` copies of `init`, returning the new size.
    ///
    /// On failure the table is left exactly as it was.
    pub fn grow_with(&self, delta: i64, init: Option<R>) -> Result<u32, RuntimeError> {
        let delta = u64::try_from(delta).map_err(|_| {
            RuntimeError::invalid_argument(format!("cannot grow table by {delta} elements"))
        })?;

        let mut elements = self.elements.borrow_mut("table")?;
        let current = elements.len() as u64;
        let out_of_range = || RuntimeError::GrowOutOfRange {
            what: "table",
            current,
            delta,
            maximum: u64::from(self.maximum),
        };
        let size = current
            .checked_add(delta)
            .filter(|size| *size <= u64::from(self.maximum))
            .and_then(|size| u32::try_from(size).ok())
            .ok_or_else(out_of_range)?;

        let additional = size as usize - elements.len();
        elements
            .try_reserve_exact(additional)
            .map_err(|_| out_of_range())?;
        elements.resize(size as usize, init);
        if delta > 0 {
            debug!(from = current, to = size, kind = %R::KIND, "Table grown");
        }

        Ok(size)
    }

    /// The reference at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::IndexOutOfRange`] if `index >= size`.
    pub fn get(&self, index: u64) -> Result<Option<R>, RuntimeError> {
        let elements = self.elements.borrow("table")?;
        slot(&elements, index)
            .map(|i| elements[i].clone())
            .ok_or(RuntimeError::index_out_of_range(index, elements.len() as u64))
    }

    /// Replace the reference at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::IndexOutOfRange`] if `index >= size`.
    pub fn set(&self, index: u64, value: Option<R>) -> Result<(), RuntimeError> {
        let mut elements = self.elements.borrow_mut("table")?;
        let size = elements.len() as u64;
        let i = slot(&elements, index).ok_or(RuntimeError::index_out_of_range(index, size))?;
        elements[i] = value;
        Ok(())
    }
}

impl<R: TableRef> fmt::Debug for TypedTable<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedTable")
            .field("kind", &R::KIND)
            .field("ownership", &self.ownership())
            .field("maximum", &self.maximum)
            .finish_non_exhaustive()
    }
}

fn slot<T>(elements: &[T], index: u64) -> Option<usize> {
    usize::try_from(index)
        .ok()
        .filter(|i| *i < elements.len())
}

/// A table of either kind.
#[derive(Debug)]
pub enum Table {
    FuncRef(FuncRefTable),
    ExternRef(ExternRefTable),
}

impl Table {
    /// Allocate an owned table of `kind`.
    ///
    /// `maximum` defaults to [`DEFAULT_TABLE_MAXIMUM_SIZE`].
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::InvalidArgument`] if `initial > maximum`.
    pub fn new(kind: RefKind, initial: u32, maximum: Option<u32>) -> Result<Self, RuntimeError> {
        let maximum = maximum.unwrap_or(DEFAULT_TABLE_MAXIMUM_SIZE);
        Ok(match kind {
            RefKind::FuncRef => Table::FuncRef(FuncRefTable::new(initial, maximum)?),
            RefKind::ExternRef => Table::ExternRef(ExternRefTable::new(initial, maximum)?),
        })
    }

    pub fn kind(&self) -> RefKind {
        match self {
            Table::FuncRef(_) => RefKind::FuncRef,
            Table::ExternRef(_) => RefKind::ExternRef,
        }
    }

    pub fn share(&self) -> Self {
        match self {
            Table::FuncRef(table) => Table::FuncRef(table.share()),
            Table::ExternRef(table) => Table::ExternRef(table.share()),
        }
    }

    pub fn ownership(&self) -> Ownership {
        match self {
            Table::FuncRef(table) => table.ownership(),
            Table::ExternRef(table) => table.ownership(),
        }
    }

    pub fn is_owned(&self) -> bool {
        self.ownership() == Ownership::Owned
    }

    pub fn same_storage(&self, other: &Table) -> bool {
        match (self, other) {
            (Table::FuncRef(a), Table::FuncRef(b)) => a.same_storage(b),
            (Table::ExternRef(a), Table::ExternRef(b)) => a.same_storage(b),
            _ => false,
        }
    }

    pub fn size(&self) -> Result<u32, RuntimeError> {
        match self {
            Table::FuncRef(table) => table.size(),
            Table::ExternRef(table) => table.size(),
        }
    }

    pub fn capacity(&self) -> u32 {
        match self {
            Table::FuncRef(table) => table.capacity(),
            Table::ExternRef(table) => table.capacity(),
        }
    }

    /// Grow by `delta` null references, returning the new size.
    ///
    /// # Errors
    ///
    /// - [`RuntimeError::InvalidArgument`] if `delta` is negative
    /// - [`RuntimeError::GrowOutOfRange`] if the new size would exceed the capacity
    pub fn grow(&self, delta: i64) -> Result<u32, RuntimeError> {
        match self {
            Table::FuncRef(table) => table.grow(delta),
            Table::ExternRef(table) => table.grow(delta),
        }
    }

    /// Grow by `delta` copies of `init`, returning the new size.
    ///
    /// # Errors
    ///
    /// As [`Table::grow`], plus [`RuntimeError::ElementTypeMismatch`] if `init`
    /// has the wrong kind.
    pub fn grow_with(&self, delta: i64, init: TableElement) -> Result<u32, RuntimeError> {
        match self {
            Table::FuncRef(table) => table.grow_with(delta, Func::from_element(init)?),
            Table::ExternRef(table) => table.grow_with(delta, ExternRef::from_element(init)?),
        }
    }

    /// The element at `index`, tagged with the table kind.
    pub fn get_element(&self, index: u64) -> Result<TableElement, RuntimeError> {
        Ok(match self {
            Table::FuncRef(table) => Func::into_element(table.get(index)?),
            Table::ExternRef(table) => ExternRef::into_element(table.get(index)?),
        })
    }

    /// Replace the element at `index`.
    ///
    /// The kind is checked before the index, and on failure the table is
    /// unchanged.
    ///
    /// # Errors
    ///
    /// - [`RuntimeError::ElementTypeMismatch`] if the element kind differs from the table kind
    /// - [`RuntimeError::IndexOutOfRange`] if `index >= size`
    pub fn set_element(&self, index: u64, element: TableElement) -> Result<(), RuntimeError> {
        match self {
            Table::FuncRef(table) => table.set(index, Func::from_element(element)?),
            Table::ExternRef(table) => table.set(index, ExternRef::from_element(element)?),
        }
    }

    pub fn as_funcref(&self) -> Option<&FuncRefTable> {
        match self {
            Table::FuncRef(table) => Some(table),
            Table::ExternRef(_) => None,
        }
    }

    pub fn as_externref(&self) -> Option<&ExternRefTable> {
        match self {
            Table::ExternRef(table) => Some(table),
            Table::FuncRef(_) => None,
        }
    }
}

impl From<FuncRefTable> for Table {
    fn from(table: FuncRefTable) -> Self {
        Table::FuncRef(table)
    }
}

impl From<ExternRefTable> for Table {
    fn from(table: ExternRefTable) -> Self {
        Table::ExternRef(table)
    }
}
