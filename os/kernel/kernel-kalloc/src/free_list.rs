//! Intrusive list of free pages.
//!
//! A free page has no owner, so its own first word holds the physical
//! address of the next free page (0 terminates the list):
//!
//! ```text
//! head ──► +-----------+      +-----------+
//!          | next: pa ─┼────► | next: 0   |
//!          | (junk)    |      | (junk)    |
//!          +-----------+      +-----------+
//! ```
//!
//! This is the only code that reads or writes that word.

use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, Size4K};
use kernel_vmem::PhysMapper;

/// LIFO stack of free pages plus its length.
///
/// # Invariants
/// - `len` equals the number of nodes reachable from `head`.
/// - Every node is a page exclusively owned by the list.
pub struct FreeList {
    head: Option<PhysicalPage<Size4K>>,
    len: usize,
}

impl Default for FreeList {
    fn default() -> Self {
        Self::new()
    }
}

impl FreeList {
    #[must_use]
    pub const fn new() -> Self {
        Self { head: None, len: 0 }
    }

    /// Number of pages on the list, without walking it.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Push `page` onto the list.
    ///
    /// # Safety
    /// - `page` must be writable through `mapper` and owned by nobody else.
    /// - `page` must not already be on the list.
    pub unsafe fn push<M: PhysMapper>(&mut self, mapper: &M, page: PhysicalPage<Size4K>) {
        debug_assert_ne!(page.base().as_u64(), 0, "page 0 cannot be linked");
        let next = self.head.map_or(0, |p| p.base().as_u64());
        unsafe { mapper.phys_to_ptr::<u64>(page.base()).write(next) };
        self.head = Some(page);
        self.len += 1;
    }

    /// Pop the most recently pushed page.
    ///
    /// # Safety
    /// Every page on the list must still be readable through `mapper`.
    pub unsafe fn pop<M: PhysMapper>(&mut self, mapper: &M) -> Option<PhysicalPage<Size4K>> {
        let page = self.head?;
        let next = unsafe { mapper.phys_to_ptr::<u64>(page.base()).read() };
        self.head = link(next);
        self.len -= 1;
        Some(page)
    }

    /// Iterate the list from the head without modifying it.
    ///
    /// # Safety
    /// Every page on the list must be readable through `mapper`, and the
    /// list must not change while the iterator is alive.
    pub unsafe fn iter<'a, M: PhysMapper>(
        &'a self,
        mapper: &'a M,
    ) -> impl Iterator<Item = PhysicalPage<Size4K>> + 'a {
        let mut cursor = self.head;
        core::iter::from_fn(move || {
            let page = cursor?;
            cursor = link(unsafe { mapper.phys_to_ptr::<u64>(page.base()).read() });
            Some(page)
        })
    }
}

const fn link(raw: u64) -> Option<PhysicalPage<Size4K>> {
    if raw == 0 {
        None
    } else {
        Some(PhysicalPage::from_addr(PhysicalAddress::new(raw)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_vmem::IdentityMapper;

    #[repr(C, align(4096))]
    struct Frame([u8; 4096]);

    fn frames(n: usize) -> Vec<Frame> {
        let mut v = Vec::with_capacity(n);
        v.resize_with(n, || Frame([0; 4096]));
        v
    }

    fn page(mem: &mut [Frame], i: usize) -> PhysicalPage<Size4K> {
        PhysicalPage::from_addr(PhysicalAddress::from_ptr(mem.as_mut_ptr().wrapping_add(i)))
    }

    #[test]
    fn push_pop_is_lifo_and_tracks_len() {
        let mut mem = frames(3);
        let pages: Vec<_> = (0..3).map(|i| page(&mut mem, i)).collect();
        let mut list = FreeList::new();
        unsafe {
            for &p in &pages {
                list.push(&IdentityMapper, p);
            }
        }
        assert_eq!(list.len(), 3);

        let popped: Vec<_> = core::iter::from_fn(|| unsafe { list.pop(&IdentityMapper) }).collect();
        assert_eq!(popped, vec![pages[2], pages[1], pages[0]]);
        assert_eq!(list.len(), 0);
        assert!(list.is_empty());
    }

    #[test]
    fn link_lives_in_the_first_word() {
        let mut mem = frames(2);
        let (first, second) = (page(&mut mem, 0), page(&mut mem, 1));
        let mut list = FreeList::new();
        unsafe {
            list.push(&IdentityMapper, first);
            list.push(&IdentityMapper, second);
        }
        let word = u64::from_ne_bytes(mem[1].0[..8].try_into().unwrap());
        assert_eq!(word, first.base().as_u64());
        let tail = u64::from_ne_bytes(mem[0].0[..8].try_into().unwrap());
        assert_eq!(tail, 0);
    }

    #[test]
    fn iter_walks_without_consuming() {
        let mut mem = frames(4);
        let mut list = FreeList::new();
        unsafe {
            for i in 0..4 {
                list.push(&IdentityMapper, page(&mut mem, i));
            }
            assert_eq!(list.iter(&IdentityMapper).count(), 4);
        }
        assert_eq!(list.len(), 4);
    }
}
