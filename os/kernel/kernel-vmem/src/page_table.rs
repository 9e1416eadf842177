use crate::PageEntryBits;
use kernel_info::memory::PTES_PER_TABLE;

/// One level of an Sv39 page table: 512 entries, 4 KiB-aligned.
///
/// The same type serves all three levels; leaf vs. pointer is encoded in
/// each entry (see [`PageEntryBits::is_leaf`]).
#[repr(C, align(4096))]
pub struct PageTable {
    entries: [PageEntryBits; PTES_PER_TABLE],
}

const _: () = assert!(size_of::<PageTable>() == 4096);

impl PageTable {
    /// A fully zeroed table (all entries invalid).
    #[inline]
    #[must_use]
    pub const fn zeroed() -> Self {
        Self {
            entries: [PageEntryBits::new(); PTES_PER_TABLE],
        }
    }

    /// Read the entry at `i`.
    ///
    /// # Panics
    /// If `i >= 512`.
    #[inline]
    #[must_use]
    pub const fn get(&self, i: usize) -> PageEntryBits {
        self.entries[i]
    }

    /// Write the entry at `i`.
    ///
    /// Callers changing an active table are responsible for `sfence.vma`.
    ///
    /// # Panics
    /// If `i >= 512`.
    #[inline]
    pub const fn set(&mut self, i: usize, e: PageEntryBits) {
        self.entries[i] = e;
    }

    /// Iterate the valid entries as `(index, entry)` in slot order.
    pub fn iter_valid(&self) -> impl Iterator<Item = (usize, PageEntryBits)> + '_ {
        self.entries
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, e)| e.valid())
    }
}

impl Default for PageTable {
    fn default() -> Self {
        Self::zeroed()
    }
}
