//! Linear memory.
//!
//! A [`Memory`] is a zero-initialised byte buffer sized in 64 KiB pages. It
//! grows monotonically up to its maximum and keeps previously written bytes
//! across growth.
//!
//! Growing may move the backing storage. Views returned by [`Memory::data`]
//! borrow the memory, so a view cannot outlive a resize: growing while a view
//! is alive fails with [`RuntimeError::BufferBorrowed`] and the caller takes a
//! fresh view afterwards.

use std::cell::{Ref, RefMut};
use std::fmt;

use tracing::debug;

use aotwasm_common::RuntimeError;

use crate::shared::{Ownership, Shared};

/// Page size in bytes (64 KiB).
pub const PAGE_SIZE: u64 = 64 * 1024;

/// Page limit of a memory with 32-bit indices.
pub const MAX_PAGES_32: u64 = 1 << 16;

/// Page limit of a memory with 64-bit indices.
pub const MAX_PAGES_64: u64 = 1 << 48;

struct LinearMemory {
    data: Vec<u8>,
    pages: u64,
}

/// A growable linear memory.
pub struct Memory {
    inner: Shared<LinearMemory>,
    maximum: u64,
    index64: bool,
}

impl Memory {
    /// Allocate an owned memory of `initial` pages.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::InvalidArgument`] if `initial > maximum`, if
    /// `maximum` exceeds the page limit of the index width, or if the initial
    /// buffer cannot be allocated.
    pub fn new(initial: u64, maximum: u64, index64: bool) -> Result<Self, RuntimeError> {
        let limit = if index64 { MAX_PAGES_64 } else { MAX_PAGES_32 };
        if maximum > limit {
            return Err(RuntimeError::invalid_argument(format!(
                "maximum of {maximum} pages exceeds the limit of {limit}"
            )));
        }
        if initial > maximum {
            return Err(RuntimeError::invalid_argument(format!(
                "initial size {initial} exceeds maximum {maximum}"
            )));
        }

        let mut data = Vec::new();
        let len = byte_len(initial).ok_or_else(|| {
            RuntimeError::invalid_argument(format!("{initial} pages do not fit in memory"))
        })?;
        data.try_reserve_exact(len).map_err(|e| {
            RuntimeError::invalid_argument(format!("cannot allocate {initial} pages: {e}"))
        })?;
        data.resize(len, 0);

        Ok(Self {
            inner: Shared::owned(LinearMemory {
                data,
                pages: initial,
            }),
            maximum,
            index64,
        })
    }

    /// A borrowed handle to the same storage.
    pub fn share(&self) -> Self {
        Self {
            inner: self.inner.share(),
            maximum: self.maximum,
            index64: self.index64,
        }
    }

    /// Whether this handle allocated the storage.
    pub fn ownership(&self) -> Ownership {
        self.inner.ownership()
    }

    /// Shorthand for `ownership() == Ownership::Owned`.
    pub fn is_owned(&self) -> bool {
        self.ownership() == Ownership::Owned
    }

    /// Whether both handles refer to the same storage.
    pub fn same_storage(&self, other: &Memory) -> bool {
        self.inner.ptr_eq(&other.inner)
    }

    /// Maximum size in pages.
    pub fn maximum(&self) -> u64 {
        self.maximum
    }

    /// Whether the memory uses 64-bit indices.
    pub fn is_64(&self) -> bool {
        self.index64
    }

    /// Current size in pages.
    pub fn size(&self) -> Result<u64, RuntimeError> {
        Ok(self.inner.borrow("memory")?.pages)
    }

    /// Current size in bytes.
    pub fn data_size(&self) -> Result<usize, RuntimeError> {
        Ok(self.inner.borrow("memory")?.data.len())
    }

    /// Grow by `delta` pages, returning the new size in pages.
    ///
    /// On failure the memory is left exactly as it was.
    ///
    /// # Errors
    ///
    /// - [`RuntimeError::InvalidArgument`] if `delta` is negative
    /// - [`RuntimeError::GrowOutOfRange`] if the new size would exceed the maximum
    /// - [`RuntimeError::BufferBorrowed`] if a view is alive
    pub fn grow(&self, delta: i64) -> Result<u64, RuntimeError> {
        let delta = u64::try_from(delta).map_err(|_| {
            RuntimeError::invalid_argument(format!("cannot grow memory by {delta} pages"))
        })?;

        let mut memory = self.inner.borrow_mut("memory")?;
        let current = memory.pages;
        let out_of_range = || RuntimeError::GrowOutOfRange {
            what: "memory",
            current,
            delta,
            maximum: self.maximum,
        };

        let pages = current
            .checked_add(delta)
            .filter(|pages| *pages <= self.maximum)
            .ok_or_else(out_of_range)?;
        if delta == 0 {
            return Ok(current);
        }

        let len = byte_len(pages).ok_or_else(out_of_range)?;
        let additional = len - memory.data.len();
        memory
            .data
            .try_reserve_exact(additional)
            .map_err(|_| out_of_range())?;
        memory.data.resize(len, 0);
        memory.pages = pages;

        debug!(from = current, to = pages, "Memory grown");

        Ok(pages)
    }

    /// A read-only view of the current contents.
    pub fn data(&self) -> Result<Ref<'_, [u8]>, RuntimeError> {
        Ok(Ref::map(self.inner.borrow("memory")?, |m| m.data.as_slice()))
    }

    /// A mutable view of the current contents.
    pub fn data_mut(&self) -> Result<RefMut<'_, [u8]>, RuntimeError> {
        Ok(RefMut::map(self.inner.borrow_mut("memory")?, |m| {
            m.data.as_mut_slice()
        }))
    }

    /// Copy `buf.len()` bytes starting at `offset` into `buf`.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::IndexOutOfRange`] if the range is not inside the memory.
    pub fn read(&self, offset: u64, buf: &mut [u8]) -> Result<(), RuntimeError> {
        let data = self.data()?;
        let range = checked_range(offset, buf.len(), data.len())?;
        buf.copy_from_slice(&data[range]);
        Ok(())
    }

    /// Copy `bytes` into the memory starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::IndexOutOfRange`] if the range is not inside the memory.
    pub fn write(&self, offset: u64, bytes: &[u8]) -> Result<(), RuntimeError> {
        let mut data = self.data_mut()?;
        let range = checked_range(offset, bytes.len(), data.len())?;
        data[range].copy_from_slice(bytes);
        Ok(())
    }
}

impl fmt::Debug for Memory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memory")
            .field("ownership", &self.ownership())
            .field("maximum", &self.maximum)
            .field("index64", &self.index64)
            .finish_non_exhaustive()
    }
}

fn byte_len(pages: u64) -> Option<usize> {
    pages
        .checked_mul(PAGE_SIZE)
        .and_then(|bytes| usize::try_from(bytes).ok())
}

fn checked_range(
    offset: u64,
    len: usize,
    size: usize,
) -> Result<std::ops::Range<usize>, RuntimeError> {
    let size_u64 = size as u64;
    usize::try_from(offset)
        .ok()
        .and_then(|start| start.checked_add(len).map(|end| start..end))
        .filter(|range| range.end <= size)
        .ok_or_else(|| RuntimeError::index_out_of_range(offset, size_u64))
}
