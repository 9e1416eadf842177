use bitfield_struct::bitfield;
use kernel_memory_addresses::PhysicalAddress;

/// A single 64-bit Sv39 page-table entry in its raw bitfield form.
///
/// The same layout is used at every level; whether an entry is a leaf or a
/// pointer to the next table is decided by the `R`/`W`/`X` bits.
///
/// ### Bit layout
///
/// | Bits   | Name  | Meaning |
/// |--------|-------|---------|
/// | 0      | `V`   | Valid entry if set |
/// | 1      | `R`   | Readable |
/// | 2      | `W`   | Writable |
/// | 3      | `X`   | Executable |
/// | 4      | `U`   | User-mode accessible |
/// | 5      | `G`   | Global mapping |
/// | 6      | `A`   | Accessed |
/// | 7      | `D`   | Dirty |
/// | 8      | `RSW` | Copy-on-write marker (software) |
/// | 9      | `RSW` | Reserved for software |
/// | 10–53  | `PPN` | Physical page number |
/// | 54–63  | –     | Reserved, must be zero |
///
/// ### Example
/// ```rust
/// # use kernel_vmem::{PageEntryBits, PhysicalAddress};
/// let e = PageEntryBits::new_user_rw(PhysicalAddress::new(0x8765_4000));
/// assert!(e.valid() && e.writable() && e.is_leaf());
/// assert_eq!(e.physical_address().as_u64(), 0x8765_4000);
/// ```
#[bitfield(u64)]
#[derive(PartialEq, Eq)]
pub struct PageEntryBits {
    /// Valid (V, bit 0).
    pub valid: bool,

    /// Readable (R, bit 1).
    pub readable: bool,

    /// Writable (W, bit 2).
    ///
    /// Cleared on both sides of a copy-on-write share.
    pub writable: bool,

    /// Executable (X, bit 3).
    pub executable: bool,

    /// User (U, bit 4).
    pub user: bool,

    /// Global (G, bit 5).
    pub global: bool,

    /// Accessed (A, bit 6).
    pub accessed: bool,

    /// Dirty (D, bit 7).
    pub dirty: bool,

    /// Copy-on-write marker (RSW, bit 8).
    ///
    /// Hardware ignores it. Set together with `W=0` when a page is shared by
    /// fork so that a store faults and the handler can tell a COW fault apart
    /// from a genuine protection violation.
    pub cow: bool,

    /// Second software bit (RSW, bit 9). Unused.
    pub software: bool,

    /// Physical page number (bits 10..=53).
    #[bits(44)]
    ppn: u64,

    /// Reserved (bits 54..=63).
    #[bits(10)]
    __: u16,
}

impl PageEntryBits {
    /// Physical address the entry points at (`PPN << 12`).
    #[inline]
    #[must_use]
    pub const fn physical_address(&self) -> PhysicalAddress {
        PhysicalAddress::new(self.ppn() << 12)
    }

    #[inline]
    pub const fn set_physical_address(&mut self, pa: PhysicalAddress) {
        self.set_ppn(pa.as_u64() >> 12);
    }

    #[inline]
    #[must_use]
    pub const fn with_physical_address(mut self, pa: PhysicalAddress) -> Self {
        self.set_physical_address(pa);
        self
    }

    /// Whether the entry maps memory (any of R/W/X set) rather than a table.
    #[inline]
    #[must_use]
    pub const fn is_leaf(&self) -> bool {
        self.readable() || self.writable() || self.executable()
    }

    /// A valid pointer to a next-level table.
    #[inline]
    #[must_use]
    pub const fn new_table(table: PhysicalAddress) -> Self {
        Self::new().with_valid(true).with_physical_address(table)
    }

    /// A valid user read/write leaf for `page`.
    #[inline]
    #[must_use]
    pub const fn new_user_rw(page: PhysicalAddress) -> Self {
        Self::new()
            .with_valid(true)
            .with_readable(true)
            .with_writable(true)
            .with_user(true)
            .with_physical_address(page)
    }

    /// A valid user read/execute leaf for `page`.
    #[inline]
    #[must_use]
    pub const fn new_user_rx(page: PhysicalAddress) -> Self {
        Self::new()
            .with_valid(true)
            .with_readable(true)
            .with_executable(true)
            .with_user(true)
            .with_physical_address(page)
    }

    /// Turn a writable leaf into a shared copy-on-write leaf.
    ///
    /// Read-only leaves are left alone: they never need a private copy.
    #[inline]
    pub const fn mark_cow(&mut self) {
        if self.writable() {
            self.set_writable(false);
            self.set_cow(true);
        }
    }

    /// Undo [`mark_cow`](Self::mark_cow) once the page is privately owned.
    #[inline]
    pub const fn resolve_cow(&mut self) {
        debug_assert!(self.cow(), "resolving a non-COW entry");
        self.set_cow(false);
        self.set_writable(true);
    }
}
