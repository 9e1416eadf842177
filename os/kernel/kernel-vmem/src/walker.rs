//! # Page-table walker
//!
//! Read-only recursive descent over a live Sv39 tree that reports, for every
//! valid entry, where it points and how many mappings share that page.
//!
//! The printed form is meant for a diagnostics syscall:
//!
//! ```text
//! page table 0x0000000087f49000
//!
//! > Page 0: pte 0x0000000021fd1801, pa 0x0000000087f46000, refs: 1, writable: False
//! |
//! +---> Page 0: pte 0x0000000021fd1401, pa 0x0000000087f45000, refs: 1, writable: False
//!       |
//!       +---> Page 0: pte 0x0000000021fd205b, pa 0x0000000087f48000, refs: 2, writable: False
//! ```
//!
//! Depth never exceeds [`PAGE_TABLE_LEVELS`]: a pointer entry found at the
//! last level is reported but not followed.

use crate::{PageEntryBits, PhysMapper, PhysicalAddress, PhysicalPage, Size4K};
use core::fmt;
use kernel_info::memory::PAGE_TABLE_LEVELS;

/// Indentation of one tree level in the printed output.
const INDENT: &str = "      ";

/// Source of per-page reference counts.
pub trait RefCountLookup {
    /// Current count for the page containing `pa`; `None` if the page is not
    /// covered by the count table (MMIO, memory outside RAM).
    fn refcount(&self, pa: PhysicalAddress) -> Option<u8>;
}

/// One valid entry seen during a walk.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct WalkRecord {
    /// Level below the root (root entries have depth 0).
    pub depth: usize,
    /// Slot index within its table.
    pub index: usize,
    pub entry: PageEntryBits,
    pub pa: PhysicalAddress,
    pub refs: Option<u8>,
}

impl WalkRecord {
    #[inline]
    #[must_use]
    pub const fn writable(&self) -> bool {
        self.entry.writable()
    }

    #[inline]
    #[must_use]
    pub const fn is_leaf(&self) -> bool {
        self.entry.is_leaf()
    }
}

/// Walks page tables through a [`PhysMapper`], looking up counts in `R`.
pub struct PageTableWalker<'a, M, R> {
    mapper: &'a M,
    refs: &'a R,
}

impl<'a, M: PhysMapper, R: RefCountLookup> PageTableWalker<'a, M, R> {
    #[must_use]
    pub const fn new(mapper: &'a M, refs: &'a R) -> Self {
        Self { mapper, refs }
    }

    /// Call `f` for every valid entry, parents before children, slots in order.
    ///
    /// Stops at the first error returned by `f`.
    ///
    /// # Errors
    /// Whatever `f` returns.
    ///
    /// # Safety
    /// - `root` and every table reachable from it must be valid page-table pages.
    /// - The tree must not be modified for the duration of the walk.
    pub unsafe fn visit<E>(
        &self,
        root: PhysicalPage<Size4K>,
        f: &mut impl FnMut(&WalkRecord) -> Result<(), E>,
    ) -> Result<(), E> {
        unsafe { self.descend(root, 0, f) }
    }

    /// Print the tree rooted at `root` in the diagnostic format shown above.
    ///
    /// # Errors
    /// Propagates formatter errors from `out`.
    ///
    /// # Safety
    /// Same as [`visit`](Self::visit).
    pub unsafe fn print(&self, root: PhysicalPage<Size4K>, out: &mut impl fmt::Write) -> fmt::Result {
        writeln!(out, "\npage table {root}")?;
        unsafe { self.visit(root, &mut |r: &WalkRecord| write_record(&mut *out, r))? };
        out.write_char('\n')
    }

    unsafe fn descend<E>(
        &self,
        table: PhysicalPage<Size4K>,
        depth: usize,
        f: &mut impl FnMut(&WalkRecord) -> Result<(), E>,
    ) -> Result<(), E> {
        let t = unsafe { self.mapper.table(table) };
        for (index, entry) in t.iter_valid() {
            let pa = entry.physical_address();
            let record = WalkRecord {
                depth,
                index,
                entry,
                pa,
                refs: self.refs.refcount(pa),
            };
            f(&record)?;

            if entry.is_leaf() {
                continue;
            }
            if depth + 1 < PAGE_TABLE_LEVELS {
                unsafe { self.descend(pa.page(), depth + 1, f)? };
            } else {
                log::warn!(
                    "table {table}: slot {index} points to another table below the last level, not descending"
                );
            }
        }
        Ok(())
    }
}

fn write_record(out: &mut impl fmt::Write, r: &WalkRecord) -> fmt::Result {
    if r.depth == 0 {
        out.write_char('\n')?;
    } else {
        for _ in 1..r.depth {
            out.write_str(INDENT)?;
        }
        out.write_str("|\n")?;
        for _ in 1..r.depth {
            out.write_str(INDENT)?;
        }
        out.write_str("+---")?;
    }

    let raw: u64 = r.entry.into();
    write!(out, "> Page {}: pte {raw:#018x}, pa {}, refs: ", r.index, r.pa)?;
    match r.refs {
        Some(n) => write!(out, "{n}")?,
        None => out.write_char('-')?,
    }
    writeln!(
        out,
        ", writable: {}",
        if r.writable() { "True" } else { "False" }
    )
}
