//! # Kernel Memory Configuration
//!
//! This crate is the single source of truth for the physical memory layout
//! the kernel's page allocator manages. Every other memory crate reads its
//! page geometry and managed range from here so the reference-count table,
//! the free list and the page-table walker agree on what a "page" is.
//!
//! ## Physical Memory Layout
//!
//! ```text
//! KERNBASE    ┌─────────────────────────────────┐ 0x8000_0000
//!             │       Kernel Image              │
//!             │   (Text, Data, BSS)             │
//! kernel_end  ├─────────────────────────────────┤ (linker symbol `end`)
//!             │    Available RAM                │
//!             │  (Managed by the page allocator)│
//! PHYSTOP     └─────────────────────────────────┘ KERNBASE + 128 MiB
//! ```
//!
//! The reference-count table covers the whole `[KERNBASE, PHYSTOP)` window,
//! one byte per page, even though only `[kernel_end, PHYSTOP)` is ever handed
//! out. This keeps the index computation a plain subtract-and-shift.
//!
//! ## Runtime Layout
//!
//! The compile-time constants describe the real machine. [`MemoryLayout`]
//! carries the same three boundaries as values so the allocator can also be
//! pointed at a test arena on the host.
//!
//! ```rust
//! # use kernel_info::memory::{MemoryLayout, PAGE_SIZE};
//! let layout = MemoryLayout::new(0x1000_0000, 0x1000_0000, 0x1000_0000 + 3 * PAGE_SIZE);
//! assert_eq!(layout.managed_pages(), 3);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod memory;
