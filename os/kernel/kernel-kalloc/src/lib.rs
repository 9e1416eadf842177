//! # Reference-counted physical page allocator
//!
//! Hands out 4 KiB physical pages and tracks how many mappings share each
//! one, so fork can share pages copy-on-write instead of copying them.
//!
//! ## Pieces
//!
//! - [`RefCountTable`]: one `u8` per page slot, indexed by
//!   `(pa - base) >> PAGE_SHIFT`.
//! - [`FreeList`]: intrusive LIFO of free pages; the link lives in the first
//!   word of each free page.
//! - [`PageAllocator`]: both of the above behind one spin lock, plus the
//!   `kalloc`/`kfree`/`incref`/`decref`/`getref` interface.
//! - [`SharedPage`]: an owning handle for one reference that frees on drop.
//!
//! ## How the VM layer uses it
//!
//! ```text
//! fork:        for each user page: incref(pa), clear W and set COW in both PTEs
//! store fault: if getref(pa) == 1 { set W, clear COW }
//!              else { new = kalloc(); copy; map new; kfree(pa) }
//! unmap:       kfree(pa)
//! ```
//!
//! ## Errors
//!
//! Running out of pages is normal and reported as `None` /
//! [`KallocError::OutOfMemory`]. A misaligned or out-of-range address, a
//! count overflow, or a corrupted free list means a kernel bug and panics
//! with an [`InvariantViolation`] message after logging it.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod allocator;
mod error;
mod free_list;
mod refcount;
mod shared_page;

pub use crate::allocator::{AllocatorStats, PageAllocator};
pub use crate::error::{InvariantViolation, KallocError};
pub use crate::free_list::FreeList;
pub use crate::refcount::RefCountTable;
pub use crate::shared_page::SharedPage;
