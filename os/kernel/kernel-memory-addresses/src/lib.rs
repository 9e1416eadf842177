//! # Physical Memory Address Types
//!
//! Strongly typed wrappers for raw physical addresses and page bases used by
//! the page allocator and the page-table walker.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`PhysicalAddress`] | A raw 64-bit physical address; may point anywhere inside a page. |
//! | [`PhysicalPage<S>`] | The page-aligned base of a page of size `S`. |
//!
//! The allocator identifies a page purely by its address. Wrapping that
//! address in [`PhysicalPage`] moves the "is it aligned?" question to the one
//! place a page is constructed, instead of every call site.
//!
//! ```rust
//! # use kernel_memory_addresses::*;
//! let pa = PhysicalAddress::new(0x8000_1234);
//! let page = pa.page::<Size4K>();
//! assert_eq!(page.base().as_u64(), 0x8000_1000);
//! assert!(PhysicalPage::<Size4K>::try_from_addr(pa).is_none());
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

mod physical_address;
mod physical_page;

use core::fmt;
use core::hash::Hash;

pub use physical_address::PhysicalAddress;
pub use physical_page::PhysicalPage;

/// Sealed trait pattern to restrict `PageSize` impls to our markers.
mod sealed {
    pub trait Sealed {}
}

/// Marker trait for supported page sizes.
pub trait PageSize:
    sealed::Sealed + Clone + Copy + Eq + PartialEq + Ord + PartialOrd + Hash + fmt::Debug
{
    /// Page size in bytes (power of two).
    const SIZE: u64;
    /// log2(SIZE), i.e., number of low bits used for the offset.
    const SHIFT: u32;
}

/// 4 KiB page (4096 bytes), the only granularity the page allocator hands out.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Size4K;
impl sealed::Sealed for Size4K {}
impl PageSize for Size4K {
    const SIZE: u64 = 4096;
    const SHIFT: u32 = 12;
}
