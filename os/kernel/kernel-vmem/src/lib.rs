//! # Virtual Memory Support
//!
//! Sv39 page-table types and a read-only diagnostic walker.
//!
//! ## What you get
//! - [`PageEntryBits`]: a RISC-V Sv39 page-table entry as a typed bitfield,
//!   including the software copy-on-write marker.
//! - [`PageTable`]: a 4 KiB-aligned array of 512 entries.
//! - [`PhysMapper`]: converts physical addresses into pointers the kernel can
//!   dereference. The kernel direct-maps RAM, so [`IdentityMapper`] is what it
//!   uses in practice.
//! - [`walker`]: a recursive printer over a live page-table tree that shows the
//!   reference count of every mapped page.
//!
//! ## Sv39 Virtual Address → Physical Address Walk
//!
//! ```text
//! | 38‒30 | 29‒21 | 20‒12 | 11‒0   |
//! |  L2   |  L1   |  L0   | Offset |
//! ```
//!
//! Each level is a 4 KiB page holding 512 eight-byte entries. An entry with
//! `V=1` and none of `R`/`W`/`X` set points at the next-level table; an entry
//! with any of them set is a leaf and maps memory directly (4 KiB at L0,
//! 2 MiB megapages at L1, 1 GiB gigapages at L2).
//!
//! ```text
//!  root (L2) → L1 → L0 → physical page
//! ```
//!
//! ## Copy-on-write
//!
//! Fork shares a page by installing the same PPN in the child with `W`
//! cleared and the `COW` software bit set (see [`PageEntryBits::mark_cow`]).
//! A later store traps; the fault handler either re-enables `W` in place
//! (last owner) or copies the page.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod page_entry_bits;
mod page_table;
pub mod walker;

pub use crate::page_entry_bits::PageEntryBits;
pub use crate::page_table::PageTable;
pub use crate::walker::{PageTableWalker, RefCountLookup, WalkRecord};

pub use kernel_info::memory as info;
pub use kernel_memory_addresses::{PageSize, PhysicalAddress, PhysicalPage, Size4K};

/// Converts physical addresses to pointers usable in the current address space.
///
/// # Safety
/// Implementations must return a pointer through which the kernel can access
/// the physical memory at `pa` for as long as that memory is managed.
pub unsafe trait PhysMapper {
    /// Convert a *physical* address to a pointer in the current address space.
    ///
    /// Computing the pointer is safe; dereferencing it is only sound while `pa`
    /// refers to memory that is owned by the caller (or read-only shared).
    fn phys_to_ptr<T>(&self, pa: PhysicalAddress) -> *mut T;

    /// Borrow the page table stored in `page`.
    ///
    /// # Safety
    /// - `page` must hold a page table (512 initialized entries).
    /// - No one may write that table while the returned reference lives.
    #[inline]
    unsafe fn table<'a>(&self, page: PhysicalPage<Size4K>) -> &'a PageTable {
        unsafe { &*self.phys_to_ptr::<PageTable>(page.base()) }
    }
}

/// [`PhysMapper`] for a kernel that maps physical RAM at the same virtual address.
#[derive(Debug, Default, Copy, Clone)]
pub struct IdentityMapper;

unsafe impl PhysMapper for IdentityMapper {
    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    fn phys_to_ptr<T>(&self, pa: PhysicalAddress) -> *mut T {
        core::ptr::with_exposed_provenance_mut(pa.as_u64() as usize)
    }
}
