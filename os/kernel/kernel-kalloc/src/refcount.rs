//! Per-page reference counts.

use crate::error::InvariantViolation;
use kernel_memory_addresses::{PageSize, PhysicalAddress, Size4K};

/// One 8-bit count per page slot in `[base, base + N pages)`.
///
/// A count of 0 means the page is free (or was never seeded); `n >= 1`
/// means `n` mappings (or the allocator's caller) hold the page.
///
/// The table itself is not synchronized. The allocator keeps it behind the
/// same lock as the free list so a count change and the matching list
/// change are one atomic step.
pub struct RefCountTable<const N: usize> {
    base: PhysicalAddress,
    counts: [u8; N],
}

impl<const N: usize> RefCountTable<N> {
    /// An all-zero table whose slot 0 is the page at `base`.
    #[must_use]
    pub const fn new(base: PhysicalAddress) -> Self {
        Self {
            base,
            counts: [0; N],
        }
    }

    /// Exclusive upper bound of the covered range.
    #[must_use]
    pub const fn end(&self) -> PhysicalAddress {
        PhysicalAddress::new(self.base.as_u64() + (N as u64) * Size4K::SIZE)
    }

    /// Slot of `pa`: `(pa - base) >> PAGE_SHIFT`.
    ///
    /// # Errors
    /// If `pa` is not page aligned or not covered by the table.
    pub const fn index(&self, pa: PhysicalAddress) -> Result<usize, InvariantViolation> {
        if !pa.is_aligned::<Size4K>() {
            return Err(InvariantViolation::Misaligned(pa));
        }
        match pa.page_index::<Size4K>(self.base) {
            Some(i) if i < N => Ok(i),
            _ => Err(InvariantViolation::OutOfRange {
                pa,
                start: self.base,
                end: self.end(),
            }),
        }
    }

    /// Current count of the page at `pa`.
    ///
    /// # Errors
    /// See [`index`](Self::index).
    pub const fn get(&self, pa: PhysicalAddress) -> Result<u8, InvariantViolation> {
        match self.index(pa) {
            Ok(i) => Ok(self.counts[i]),
            Err(e) => Err(e),
        }
    }

    /// Lenient lookup for diagnostics: rounds `pa` down to its page and
    /// returns `None` outside the table instead of failing.
    #[must_use]
    pub const fn try_get(&self, pa: PhysicalAddress) -> Option<u8> {
        match pa.page_index::<Size4K>(self.base) {
            Some(i) if i < N => Some(self.counts[i]),
            _ => None,
        }
    }

    /// Overwrite the count of `pa`.
    ///
    /// # Errors
    /// See [`index`](Self::index).
    pub const fn set(&mut self, pa: PhysicalAddress, count: u8) -> Result<(), InvariantViolation> {
        match self.index(pa) {
            Ok(i) => {
                self.counts[i] = count;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Add one reference and return the new count.
    ///
    /// # Errors
    /// [`InvariantViolation::RefCountOverflow`] at 255, or an index error.
    pub fn increment(&mut self, pa: PhysicalAddress) -> Result<u8, InvariantViolation> {
        let i = self.index(pa)?;
        let next = self.counts[i]
            .checked_add(1)
            .ok_or(InvariantViolation::RefCountOverflow(pa))?;
        self.counts[i] = next;
        Ok(next)
    }

    /// Drop one reference and return the new count.
    ///
    /// # Errors
    /// [`InvariantViolation::RefCountUnderflow`] at 0, or an index error.
    pub fn decrement(&mut self, pa: PhysicalAddress) -> Result<u8, InvariantViolation> {
        let i = self.index(pa)?;
        let next = self.counts[i]
            .checked_sub(1)
            .ok_or(InvariantViolation::RefCountUnderflow(pa))?;
        self.counts[i] = next;
        Ok(next)
    }
}
