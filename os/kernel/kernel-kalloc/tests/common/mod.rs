#![allow(dead_code)]

use kernel_info::memory::{MemoryLayout, PAGE_SIZE};
use kernel_kalloc::PageAllocator;
use kernel_memory_addresses::PhysicalAddress;
use kernel_vmem::IdentityMapper;
use std::alloc::{Layout, alloc_zeroed, dealloc};

/// Page-aligned host memory standing in for physical RAM; host addresses
/// are the physical addresses.
pub struct Arena {
    ptr: *mut u8,
    pages: usize,
}

unsafe impl Send for Arena {}
unsafe impl Sync for Arena {}

impl Arena {
    pub fn new(pages: usize) -> Self {
        let ptr = unsafe { alloc_zeroed(Self::host_layout(pages)) };
        assert!(!ptr.is_null(), "host allocation failed");
        Self { ptr, pages }
    }

    fn host_layout(pages: usize) -> Layout {
        Layout::from_size_align(pages * PAGE_SIZE as usize, PAGE_SIZE as usize).unwrap()
    }

    pub fn base(&self) -> u64 {
        PhysicalAddress::from_ptr(self.ptr).as_u64()
    }

    pub fn page(&self, i: usize) -> PhysicalAddress {
        PhysicalAddress::new(self.base() + i as u64 * PAGE_SIZE)
    }

    /// Layout whose first `kernel_pages` pages play the kernel image.
    pub fn layout(&self, kernel_pages: usize) -> MemoryLayout {
        let base = self.base();
        MemoryLayout::new(
            base,
            base + kernel_pages as u64 * PAGE_SIZE,
            base + self.pages as u64 * PAGE_SIZE,
        )
    }

    /// Copy of the page contents at `pa`.
    pub fn read(&self, pa: PhysicalAddress) -> Vec<u8> {
        let offset = usize::try_from(pa.as_u64() - self.base()).unwrap();
        assert!(offset < self.pages * PAGE_SIZE as usize);
        unsafe { std::slice::from_raw_parts(self.ptr.add(offset), PAGE_SIZE as usize).to_vec() }
    }

    pub fn write(&self, pa: PhysicalAddress, byte: u8) {
        let offset = usize::try_from(pa.as_u64() - self.base()).unwrap();
        unsafe { self.ptr.add(offset).write_bytes(byte, PAGE_SIZE as usize) };
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        unsafe { dealloc(self.ptr, Self::host_layout(self.pages)) };
    }
}

/// Allocator over `N` arena pages, the first `kernel_pages` reserved.
pub fn allocator<const N: usize>(arena: &Arena, kernel_pages: usize) -> PageAllocator<IdentityMapper, N> {
    let kmem = PageAllocator::new(arena.layout(kernel_pages), IdentityMapper);
    unsafe { kmem.kinit() };
    kmem
}
