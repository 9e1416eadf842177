//! The reference-counted page allocator.

use crate::error::{InvariantViolation, KallocError, fatal};
use crate::free_list::FreeList;
use crate::refcount::RefCountTable;
use core::fmt;
use kernel_info::memory::{JUNK_ON_ALLOC, JUNK_ON_FREE, MAX_MANAGED_PAGES, MemoryLayout, PAGE_SIZE};
use kernel_memory_addresses::{PageSize, PhysicalAddress, PhysicalPage, Size4K};
use kernel_sync::SpinMutex;
use kernel_vmem::{PhysMapper, RefCountLookup};

/// Everything guarded by the allocator lock.
struct Kmem<const N: usize> {
    /// Free pages; its length is the free-page counter.
    free: FreeList,
    refs: RefCountTable<N>,
    initialized: bool,
}

/// Snapshot of allocator occupancy.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct AllocatorStats {
    pub free_pages: usize,
    /// Whole pages in the layout's managed range, `[round_up(kernel_end), phys_top)`.
    pub managed_pages: usize,
    pub page_size: u64,
}

impl AllocatorStats {
    #[must_use]
    pub const fn used_pages(&self) -> usize {
        self.managed_pages.saturating_sub(self.free_pages)
    }

    #[must_use]
    pub const fn free_bytes(&self) -> u64 {
        self.free_pages as u64 * self.page_size
    }
}

impl fmt::Display for AllocatorStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} pages free ({} KiB)",
            self.free_pages,
            self.managed_pages,
            self.free_bytes() / 1024
        )
    }
}

/// Physical page allocator with per-page reference counts for copy-on-write.
///
/// Pages come from `[round_up(layout.kernel_end), layout.phys_top)`. The
/// reference-count table covers `N` pages starting at `layout.base`. The
/// free list, the free-page counter and the table all live behind one
/// [`SpinMutex`], taken with interrupts disabled, so every count change and
/// the list change it implies happen as one step.
///
/// ## Lifecycle of a page
///
/// ```text
///            kinit/seed_range            kalloc
/// unmanaged ───────────────────► free ───────────► allocated (1)
///                                 ▲                  │    ▲
///                                 │ kfree (1 → 0)    │    │ incref / decref
///                                 └──────────────────┘    ▼
///                                                    allocated (n)
/// ```
///
/// A `kfree` that leaves the count above zero only drops a reference: the
/// page stays mapped for its other owners and its contents are untouched.
///
/// The allocator is usable from a `static`:
///
/// ```
/// use kernel_info::memory::{KERNBASE, MemoryLayout};
/// use kernel_kalloc::PageAllocator;
/// use kernel_vmem::IdentityMapper;
///
/// static KMEM: PageAllocator<IdentityMapper> =
///     PageAllocator::new(MemoryLayout::kernel(KERNBASE + 0x4_0000), IdentityMapper);
///
/// assert_eq!(KMEM.num_free_pages(), 0);
/// assert!(KMEM.kalloc().is_none());
/// ```
pub struct PageAllocator<M, const N: usize = MAX_MANAGED_PAGES> {
    layout: MemoryLayout,
    mapper: M,
    kmem: SpinMutex<Kmem<N>>,
}

impl<M: PhysMapper, const N: usize> PageAllocator<M, N> {
    /// An allocator with an empty free list. Call [`kinit`](Self::kinit)
    /// before handing out pages.
    ///
    /// # Panics
    /// If the table size `N` cannot cover `layout`.
    #[must_use]
    pub const fn new(layout: MemoryLayout, mapper: M) -> Self {
        assert!(layout.table_pages() <= N, "reference-count table too small for layout");
        Self {
            layout,
            mapper,
            kmem: SpinMutex::new(Kmem {
                free: FreeList::new(),
                refs: RefCountTable::new(PhysicalAddress::new(layout.base)),
                initialized: false,
            }),
        }
    }

    #[must_use]
    pub const fn layout(&self) -> &MemoryLayout {
        &self.layout
    }

    #[must_use]
    pub const fn mapper(&self) -> &M {
        &self.mapper
    }

    /// Seed the free list with every whole page between the end of the
    /// kernel image and the top of physical memory.
    ///
    /// # Safety
    /// That range must be RAM reachable through the mapper that nothing else
    /// uses. Must run on one hart before any other allocator call.
    ///
    /// # Panics
    /// If called more than once.
    pub unsafe fn kinit(&self) {
        {
            let mut kmem = self.kmem.lock_irq();
            if kmem.initialized {
                fatal(InvariantViolation::AlreadyInitialized);
            }
            kmem.initialized = true;
            kmem.free = FreeList::new();
        }

        unsafe {
            self.seed_range(
                PhysicalAddress::new(self.layout.kernel_end),
                PhysicalAddress::new(self.layout.phys_top),
            );
        }

        log::info!(
            "kalloc: {} pages free in [{:#x}, {:#x})",
            self.num_free_pages(),
            self.layout.kernel_end,
            self.layout.phys_top
        );

        if cfg!(debug_assertions) {
            self.check_consistency();
        }
    }

    /// Hand every whole page in `[round_up(start), end)` to the free list.
    ///
    /// Each page gets a count of 1 and goes through [`kfree`](Self::kfree),
    /// which validates it and drops the count to 0.
    ///
    /// # Safety
    /// The range must lie inside the managed range and be unused memory
    /// reachable through the mapper. Pages must not be seeded twice.
    pub unsafe fn seed_range(&self, start: PhysicalAddress, end: PhysicalAddress) {
        let mut pa = start.align_up::<Size4K>();
        let mut seeded = 0usize;
        while pa.as_u64() + Size4K::SIZE <= end.as_u64() {
            or_fatal(self.kmem.lock_irq().refs.set(pa, 1));
            unsafe { self.kfree(pa) };
            seeded += 1;
            pa += Size4K::SIZE;
        }
        log::debug!("kalloc: seeded {seeded} pages from [{start}, {end})");
    }

    /// Take a page off the free list with a reference count of 1.
    ///
    /// The page is filled with [`JUNK_ON_ALLOC`]. `None` means out of memory.
    #[must_use]
    pub fn kalloc(&self) -> Option<PhysicalPage<Size4K>> {
        let page = {
            let mut guard = self.kmem.lock_irq();
            let kmem = &mut *guard;
            let page = unsafe { kmem.free.pop(&self.mapper) };
            if let Some(page) = page {
                let count = or_fatal(kmem.refs.get(page.base()));
                if count != 0 {
                    fatal(InvariantViolation::FreePageReferenced {
                        pa: page.base(),
                        count,
                    });
                }
                or_fatal(kmem.refs.set(page.base(), 1));
            }
            page
        };

        let Some(page) = page else {
            log::warn!("kalloc: out of memory");
            return None;
        };

        // The page is off the list and counted, so it belongs to the caller alone.
        unsafe { self.fill(page, JUNK_ON_ALLOC) };
        log::trace!("kalloc: {page}");
        Some(page)
    }

    /// [`kalloc`](Self::kalloc) for callers that propagate errors with `?`.
    ///
    /// # Errors
    /// [`KallocError::OutOfMemory`] when no page is free.
    pub fn try_kalloc(&self) -> Result<PhysicalPage<Size4K>, KallocError> {
        self.kalloc().ok_or(KallocError::OutOfMemory)
    }

    /// Drop one reference to the page at `pa`; the last one puts the page
    /// back on the free list, filled with [`JUNK_ON_FREE`].
    ///
    /// A page whose count is already 0 is left alone and a warning logged.
    ///
    /// # Safety
    /// The caller must own the reference it drops. Once the count reaches 0
    /// nobody may access the page until it is handed out again.
    ///
    /// # Panics
    /// If `pa` is not page aligned or lies outside the managed range.
    #[track_caller]
    pub unsafe fn kfree(&self, pa: PhysicalAddress) {
        self.check_managed(pa);

        let mut guard = self.kmem.lock_irq();
        let kmem = &mut *guard;
        if or_fatal(kmem.refs.get(pa)) == 0 {
            log::warn!("kfree: {pa} is already free, ignoring");
            return;
        }

        let left = or_fatal(kmem.refs.decrement(pa));
        if left > 0 {
            log::trace!("kfree: {pa} still has {left} references");
            return;
        }

        let page = pa.page();
        unsafe {
            self.fill(page, JUNK_ON_FREE);
            kmem.free.push(&self.mapper, page);
        }
        log::trace!("kfree: {pa} returned to free list");
    }

    /// Current reference count of the page at `pa`.
    ///
    /// # Panics
    /// If `pa` is misaligned or outside the managed range.
    #[must_use]
    #[track_caller]
    pub fn getref(&self, pa: PhysicalAddress) -> u8 {
        self.check_managed(pa);
        or_fatal(self.kmem.lock_irq().refs.get(pa))
    }

    /// Add a reference to the page at `pa` and return the new count.
    ///
    /// # Panics
    /// If the count would exceed 255, or `pa` is misaligned or outside the
    /// managed range.
    #[track_caller]
    pub fn incref(&self, pa: PhysicalAddress) -> u8 {
        self.check_managed(pa);
        or_fatal(self.kmem.lock_irq().refs.increment(pa))
    }

    /// Remove a reference from the page at `pa` and return the new count.
    ///
    /// Never frees the page, even at 0. Callers that may drop the last
    /// reference use [`kfree`](Self::kfree).
    ///
    /// # Panics
    /// If the count is already 0, or `pa` is misaligned or outside the
    /// managed range.
    #[track_caller]
    pub fn decref(&self, pa: PhysicalAddress) -> u8 {
        self.check_managed(pa);
        or_fatal(self.kmem.lock_irq().refs.decrement(pa))
    }

    /// The free-page counter, read under the lock.
    #[must_use]
    pub fn num_free_pages(&self) -> usize {
        self.kmem.lock_irq().free.len()
    }

    #[must_use]
    pub fn stats(&self) -> AllocatorStats {
        AllocatorStats {
            free_pages: self.num_free_pages(),
            managed_pages: self.layout.managed_pages(),
            page_size: PAGE_SIZE,
        }
    }

    /// Walk the free list and check it against the counter and the table.
    ///
    /// # Panics
    /// If the counter disagrees with the list, or a free page is referenced.
    pub fn check_consistency(&self) {
        let kmem = self.kmem.lock_irq();
        let counter = kmem.free.len();
        let mut actual = 0usize;
        // A cycle would never end; one extra step is enough to see the mismatch.
        for page in unsafe { kmem.free.iter(&self.mapper) }.take(counter + 1) {
            let count = kmem.refs.try_get(page.base()).unwrap_or(u8::MAX);
            if count != 0 {
                fatal(InvariantViolation::FreePageReferenced {
                    pa: page.base(),
                    count,
                });
            }
            actual += 1;
        }
        if actual != counter {
            fatal(InvariantViolation::FreeCountMismatch { counter, actual });
        }
    }

    /// Fatal unless `pa` is a page-aligned address in `[kernel_end, phys_top)`.
    #[track_caller]
    fn check_managed(&self, pa: PhysicalAddress) {
        if !pa.is_aligned::<Size4K>() {
            fatal(InvariantViolation::Misaligned(pa));
        }
        if !self.layout.contains(pa.as_u64()) {
            fatal(InvariantViolation::OutOfRange {
                pa,
                start: PhysicalAddress::new(self.layout.kernel_end),
                end: PhysicalAddress::new(self.layout.phys_top),
            });
        }
    }

    /// # Safety
    /// The caller must have exclusive access to `page`.
    #[allow(clippy::cast_possible_truncation)]
    unsafe fn fill(&self, page: PhysicalPage<Size4K>, byte: u8) {
        unsafe {
            self.mapper
                .phys_to_ptr::<u8>(page.base())
                .write_bytes(byte, Size4K::SIZE as usize);
        }
    }
}

impl<M: PhysMapper, const N: usize> RefCountLookup for PageAllocator<M, N> {
    fn refcount(&self, pa: PhysicalAddress) -> Option<u8> {
        self.kmem.lock_irq().refs.try_get(pa)
    }
}

#[track_caller]
fn or_fatal<T>(r: Result<T, InvariantViolation>) -> T {
    match r {
        Ok(v) => v,
        Err(v) => fatal(v),
    }
}
