//! Shared storage behind memories, tables and globals.
//!
//! An object either owns its storage (it allocated it) or borrows storage
//! owned elsewhere, typically by the instance that linked it. The storage
//! itself lives as long as any handle refers to it, so a borrowed handle can
//! never observe freed memory.
//!
//! Handles are `!Send`: each object graph is driven by a single thread and
//! the type system enforces that instead of locks.

use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

use aotwasm_common::RuntimeError;

/// Whether a handle allocated its storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// Allocated by this handle.
    Owned,
    /// Points at storage allocated by another handle.
    Borrowed,
}

pub(crate) struct Shared<T> {
    cell: Rc<RefCell<T>>,
    ownership: Ownership,
}

impl<T> Shared<T> {
    pub(crate) fn owned(value: T) -> Self {
        Self {
            cell: Rc::new(RefCell::new(value)),
            ownership: Ownership::Owned,
        }
    }

    pub(crate) fn share(&self) -> Self {
        Self {
            cell: Rc::clone(&self.cell),
            ownership: Ownership::Borrowed,
        }
    }

    pub(crate) fn ownership(&self) -> Ownership {
        self.ownership
    }

    pub(crate) fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.cell, &other.cell)
    }

    pub(crate) fn borrow(&self, what: &'static str) -> Result<Ref<'_, T>, RuntimeError> {
        self.cell
            .try_borrow()
            .map_err(|_| RuntimeError::BufferBorrowed { what })
    }

    pub(crate) fn borrow_mut(&self, what: &'static str) -> Result<RefMut<'_, T>, RuntimeError> {
        self.cell
            .try_borrow_mut()
            .map_err(|_| RuntimeError::BufferBorrowed { what })
    }
}
