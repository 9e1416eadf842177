use crate::{PageSize, PhysicalPage};
use core::fmt;
use core::ops::{Add, AddAssign};

/// Physical memory address.
///
/// ### Notes
/// - Page-table entries store a physical page number, not an address; the
///   conversion lives with the entry type in `kernel-vmem`.
/// - The reference-count index of an address is `(pa - base) >> S::SHIFT`,
///   see [`PhysicalAddress::page_index`].
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PhysicalAddress(u64);

impl PhysicalAddress {
    #[inline]
    #[must_use]
    pub const fn new(v: u64) -> Self {
        Self(v)
    }

    #[inline]
    #[must_use]
    pub fn from_ptr<T>(ptr: *const T) -> Self {
        Self(ptr.expose_provenance() as u64)
    }

    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Whether the low `S::SHIFT` bits are clear.
    #[inline]
    #[must_use]
    pub const fn is_aligned<S: PageSize>(self) -> bool {
        self.0 & (S::SIZE - 1) == 0
    }

    /// Round up to the next page boundary (identity if already aligned).
    #[inline]
    #[must_use]
    pub const fn align_up<S: PageSize>(self) -> Self {
        Self((self.0 + S::SIZE - 1) & !(S::SIZE - 1))
    }

    /// Round down to the containing page boundary.
    #[inline]
    #[must_use]
    pub const fn align_down<S: PageSize>(self) -> Self {
        Self(self.0 & !(S::SIZE - 1))
    }

    /// The page of size `S` containing this address.
    #[inline]
    #[must_use]
    pub const fn page<S: PageSize>(self) -> PhysicalPage<S> {
        PhysicalPage::from_addr(self)
    }

    /// Index of the containing page relative to `base`, or `None` below `base`.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn page_index<S: PageSize>(self, base: Self) -> Option<usize> {
        match self.0.checked_sub(base.0) {
            Some(delta) => Some((delta >> S::SHIFT) as usize),
            None => None,
        }
    }
}

impl fmt::Debug for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PA(0x{:016x})", self.0)
    }
}

impl fmt::Display for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016x}", self.0)
    }
}

impl From<u64> for PhysicalAddress {
    #[inline]
    fn from(v: u64) -> Self {
        Self::new(v)
    }
}

impl<S: PageSize> From<PhysicalPage<S>> for PhysicalAddress {
    #[inline]
    fn from(value: PhysicalPage<S>) -> Self {
        value.base()
    }
}

impl Add<u64> for PhysicalAddress {
    type Output = Self;
    #[inline]
    fn add(self, rhs: u64) -> Self::Output {
        Self(self.0 + rhs)
    }
}

impl AddAssign<u64> for PhysicalAddress {
    #[inline]
    fn add_assign(&mut self, rhs: u64) {
        self.0 += rhs;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Size4K;

    #[test]
    fn rounding() {
        let pa = PhysicalAddress::new(0x8000_0001);
        assert_eq!(pa.align_up::<Size4K>().as_u64(), 0x8000_1000);
        assert_eq!(pa.align_down::<Size4K>().as_u64(), 0x8000_0000);
        let aligned = PhysicalAddress::new(0x8000_2000);
        assert_eq!(aligned.align_up::<Size4K>(), aligned);
        assert!(aligned.is_aligned::<Size4K>());
        assert!(!pa.is_aligned::<Size4K>());
    }

    #[test]
    fn page_index_relative_to_base() {
        let base = PhysicalAddress::new(0x8000_0000);
        assert_eq!(PhysicalAddress::new(0x8000_0000).page_index::<Size4K>(base), Some(0));
        assert_eq!(PhysicalAddress::new(0x8000_3fff).page_index::<Size4K>(base), Some(3));
        assert_eq!(PhysicalAddress::new(0x7fff_f000).page_index::<Size4K>(base), None);
    }

    #[test]
    fn display_is_lower_hex() {
        let pa = PhysicalAddress::new(0x87f4_3000);
        assert_eq!(format!("{pa}"), "0x0000000087f43000");
        assert_eq!(format!("{pa:?}"), "PA(0x0000000087f43000)");
    }
}
