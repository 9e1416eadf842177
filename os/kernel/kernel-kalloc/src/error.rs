use kernel_memory_addresses::PhysicalAddress;

/// Recoverable allocation failures.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KallocError {
    /// The free list is empty.
    #[error("out of memory: no free pages")]
    OutOfMemory,
}

/// Broken allocator contract. Never returned to callers: the allocator
/// panics with this as the message.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    #[error("{0} is not page aligned")]
    Misaligned(PhysicalAddress),
    #[error("{pa} is outside the managed range [{start}, {end})")]
    OutOfRange {
        pa: PhysicalAddress,
        start: PhysicalAddress,
        end: PhysicalAddress,
    },
    #[error("reference count of {0} would exceed 255")]
    RefCountOverflow(PhysicalAddress),
    #[error("reference count of {0} is already zero")]
    RefCountUnderflow(PhysicalAddress),
    #[error("free-page counter says {counter} but the free list holds {actual} pages")]
    FreeCountMismatch { counter: usize, actual: usize },
    #[error("free page {pa} has reference count {count}")]
    FreePageReferenced { pa: PhysicalAddress, count: u8 },
    #[error("page allocator initialized twice")]
    AlreadyInitialized,
}

/// Log and halt on a broken invariant.
#[cold]
#[track_caller]
pub(crate) fn fatal(violation: InvariantViolation) -> ! {
    log::error!("kalloc: {violation}");
    panic!("kalloc: {violation}");
}
