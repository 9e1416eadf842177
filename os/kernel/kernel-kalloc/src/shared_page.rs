use crate::allocator::PageAllocator;
use crate::error::KallocError;
use core::fmt;
use core::mem::ManuallyDrop;
use kernel_info::memory::MAX_MANAGED_PAGES;
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, Size4K};
use kernel_vmem::PhysMapper;

/// One counted reference to an allocated page.
///
/// Dropping the handle calls [`PageAllocator::kfree`], so the page goes back
/// to the free list exactly when the last handle is gone. There is no
/// `Clone`: a new reference is taken explicitly with [`share`](Self::share),
/// which is what fork does for every page it maps into the child.
///
/// ```
/// # use kernel_info::memory::MemoryLayout;
/// # use kernel_kalloc::{PageAllocator, SharedPage};
/// # use kernel_memory_addresses::PhysicalAddress;
/// # use kernel_vmem::IdentityMapper;
/// # #[repr(C, align(4096))] struct Frame([u8; 4096]);
/// # let mut mem = vec![Frame([0; 4096]), Frame([0; 4096])];
/// # let base = PhysicalAddress::from_ptr(mem.as_mut_ptr()).as_u64();
/// # let layout = MemoryLayout::new(base, base, base + 2 * 4096);
/// let kmem: PageAllocator<IdentityMapper, 2> = PageAllocator::new(layout, IdentityMapper);
/// unsafe { kmem.kinit() };
///
/// let parent = SharedPage::alloc(&kmem)?;
/// let child = parent.share();
/// assert_eq!(parent.refs(), 2);
///
/// drop(parent);
/// assert!(child.is_exclusive());
/// drop(child);
/// assert_eq!(kmem.num_free_pages(), 2);
/// # Ok::<(), kernel_kalloc::KallocError>(())
/// ```
pub struct SharedPage<'a, M: PhysMapper, const N: usize = MAX_MANAGED_PAGES> {
    page: PhysicalPage<Size4K>,
    allocator: &'a PageAllocator<M, N>,
}

impl<'a, M: PhysMapper, const N: usize> SharedPage<'a, M, N> {
    /// Allocate a fresh page holding the only reference.
    ///
    /// # Errors
    /// [`KallocError::OutOfMemory`] when no page is free.
    pub fn alloc(allocator: &'a PageAllocator<M, N>) -> Result<Self, KallocError> {
        let page = allocator.try_kalloc()?;
        Ok(Self { page, allocator })
    }

    /// Take another reference to the same page.
    ///
    /// # Panics
    /// If the page already has 255 references.
    #[must_use]
    pub fn share(&self) -> Self {
        self.allocator.incref(self.page.base());
        Self {
            page: self.page,
            allocator: self.allocator,
        }
    }

    #[must_use]
    pub fn refs(&self) -> u8 {
        self.allocator.getref(self.page.base())
    }

    /// Whether this handle holds the only reference, so the page may be
    /// written in place instead of copied.
    #[must_use]
    pub fn is_exclusive(&self) -> bool {
        self.refs() == 1
    }

    #[must_use]
    pub const fn page(&self) -> PhysicalPage<Size4K> {
        self.page
    }

    #[must_use]
    pub const fn address(&self) -> PhysicalAddress {
        self.page.base()
    }

    /// Pointer to the page contents through the allocator's mapper.
    #[must_use]
    pub fn as_ptr(&self) -> *mut u8 {
        self.allocator.mapper().phys_to_ptr(self.page.base())
    }

    /// Give up the handle without dropping the reference, e.g. once the page
    /// is installed in a page table that owns it from then on.
    #[must_use]
    pub fn into_raw(self) -> PhysicalPage<Size4K> {
        ManuallyDrop::new(self).page
    }

    /// Re-adopt a reference previously released with [`into_raw`](Self::into_raw).
    ///
    /// # Safety
    /// The caller must own one reference to `page` in `allocator` and not
    /// use it again except through the returned handle.
    pub const unsafe fn from_raw(allocator: &'a PageAllocator<M, N>, page: PhysicalPage<Size4K>) -> Self {
        Self { page, allocator }
    }
}

impl<M: PhysMapper, const N: usize> Drop for SharedPage<'_, M, N> {
    fn drop(&mut self) {
        // SAFETY: the handle owns exactly one reference.
        unsafe { self.allocator.kfree(self.page.base()) };
    }
}

impl<M: PhysMapper, const N: usize> fmt::Debug for SharedPage<'_, M, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedPage").field("page", &self.page).finish_non_exhaustive()
    }
}
