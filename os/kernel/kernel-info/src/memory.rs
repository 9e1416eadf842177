//! # Memory Layout

/// Size of one physical page in bytes.
pub const PAGE_SIZE: u64 = 4096;

/// log2([`PAGE_SIZE`]); bits of in-page offset.
pub const PAGE_SHIFT: u32 = 12;

/// Start of physical RAM; the kernel image is loaded here.
///
/// Also the base of the reference-count table index.
pub const KERNBASE: u64 = 0x8000_0000;

/// First address past the end of the physical RAM the kernel uses.
pub const PHYSTOP: u64 = KERNBASE + 128 * 1024 * 1024;

/// Number of page slots between [`KERNBASE`] and [`PHYSTOP`].
#[allow(clippy::cast_possible_truncation)]
pub const MAX_MANAGED_PAGES: usize = ((PHYSTOP - KERNBASE) >> PAGE_SHIFT) as usize;

/// Byte written over a page when it is handed out by the allocator.
pub const JUNK_ON_ALLOC: u8 = 0x05;

/// Byte written over a page when its last reference is dropped.
pub const JUNK_ON_FREE: u8 = 0x01;

/// Number of entries in one page-table page.
pub const PTES_PER_TABLE: usize = 512;

/// Number of page-table levels (Sv39).
pub const PAGE_TABLE_LEVELS: usize = 3;

const _: () = {
    assert!(PAGE_SIZE == 1 << PAGE_SHIFT);
    assert!(KERNBASE.is_multiple_of(PAGE_SIZE));
    assert!(PHYSTOP.is_multiple_of(PAGE_SIZE));
    assert!(PHYSTOP > KERNBASE);
    assert!(JUNK_ON_ALLOC != JUNK_ON_FREE);
    assert!(JUNK_ON_ALLOC != 0 && JUNK_ON_FREE != 0);
    assert!(PTES_PER_TABLE * 8 == PAGE_SIZE as usize);
};

/// Physical range managed by the page allocator.
///
/// ### Invariants
/// - `base <= kernel_end <= phys_top`
/// - `base` and `phys_top` are page aligned; `kernel_end` need not be.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct MemoryLayout {
    /// Base of the reference-count table index.
    pub base: u64,
    /// First byte after the kernel image. Only memory above this is managed.
    pub kernel_end: u64,
    /// Exclusive upper bound of physical RAM.
    pub phys_top: u64,
}

impl MemoryLayout {
    /// Build a layout from raw boundaries.
    ///
    /// # Panics
    /// If the boundaries are out of order or `base`/`phys_top` are not page aligned.
    #[must_use]
    pub const fn new(base: u64, kernel_end: u64, phys_top: u64) -> Self {
        assert!(base <= kernel_end && kernel_end <= phys_top, "memory layout out of order");
        assert!(base.is_multiple_of(PAGE_SIZE), "layout base not page aligned");
        assert!(phys_top.is_multiple_of(PAGE_SIZE), "layout top not page aligned");
        Self {
            base,
            kernel_end,
            phys_top,
        }
    }

    /// The machine layout, given the end of the kernel image.
    ///
    /// `kernel_end` is the address of the linker-provided `end` symbol.
    #[must_use]
    pub const fn kernel(kernel_end: u64) -> Self {
        Self::new(KERNBASE, kernel_end, PHYSTOP)
    }

    /// Number of page slots covered by the reference-count table.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn table_pages(&self) -> usize {
        ((self.phys_top - self.base) >> PAGE_SHIFT) as usize
    }

    /// Number of whole pages in `[round_up(kernel_end), phys_top)`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn managed_pages(&self) -> usize {
        let first = (self.kernel_end + PAGE_SIZE - 1) & !(PAGE_SIZE - 1);
        if first >= self.phys_top {
            0
        } else {
            ((self.phys_top - first) >> PAGE_SHIFT) as usize
        }
    }

    /// Whether `pa` lies in the range the allocator may hand out.
    #[must_use]
    pub const fn contains(&self, pa: u64) -> bool {
        pa >= self.kernel_end && pa < self.phys_top
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn machine_layout_covers_all_ram() {
        let layout = MemoryLayout::kernel(KERNBASE + 0x2_3456);
        assert_eq!(layout.table_pages(), MAX_MANAGED_PAGES);
        // kernel image occupies 0x23456 bytes -> 36 pages (rounded up)
        assert_eq!(layout.managed_pages(), MAX_MANAGED_PAGES - 36);
    }

    #[test]
    fn contains_excludes_kernel_image_and_top() {
        let layout = MemoryLayout::new(0x1000, 0x3000, 0x8000);
        assert!(!layout.contains(0x2000));
        assert!(layout.contains(0x3000));
        assert!(layout.contains(0x7000));
        assert!(!layout.contains(0x8000));
    }

    #[test]
    fn empty_range_has_no_pages() {
        let layout = MemoryLayout::new(0x1000, 0x8000, 0x8000);
        assert_eq!(layout.managed_pages(), 0);
    }
}
