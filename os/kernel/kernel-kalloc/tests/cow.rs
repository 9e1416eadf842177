//! Fork and store-fault sequences as the VM layer drives them.

mod common;

use common::{Arena, allocator};
use kernel_kalloc::{PageAllocator, SharedPage};
use kernel_vmem::{IdentityMapper, PageEntryBits, PageTable, PageTableWalker, PhysMapper, PhysicalAddress, WalkRecord};

type Kmem = PageAllocator<IdentityMapper, 8>;

/// Allocate and zero a page-table page.
fn new_table(kmem: &Kmem) -> PhysicalAddress {
    let page = kmem.kalloc().expect("table page");
    unsafe { IdentityMapper.phys_to_ptr::<PageTable>(page.base()).write(PageTable::zeroed()) };
    page.base()
}

fn table(pa: PhysicalAddress) -> &'static mut PageTable {
    unsafe { &mut *IdentityMapper.phys_to_ptr::<PageTable>(pa) }
}

/// Three-level tree mapping `data` at slot 0 of every level.
fn map_one(kmem: &Kmem, data: PhysicalAddress, leaf: PageEntryBits) -> PhysicalAddress {
    let root = new_table(kmem);
    let mid = new_table(kmem);
    let last = new_table(kmem);
    table(root).set(0, PageEntryBits::new_table(mid));
    table(mid).set(0, PageEntryBits::new_table(last));
    table(last).set(0, leaf.with_physical_address(data));
    root
}

fn cow_leaf(data: PhysicalAddress) -> PageEntryBits {
    let mut e = PageEntryBits::new_user_rw(data);
    e.mark_cow();
    e
}

/// Table holding the leaf of a tree built by [`map_one`].
fn last_level(root: PhysicalAddress) -> &'static mut PageTable {
    table(table(table(root).get(0).physical_address()).get(0).physical_address())
}

fn leaves(kmem: &Kmem, root: PhysicalAddress) -> Vec<WalkRecord> {
    let walker = PageTableWalker::new(&IdentityMapper, kmem);
    let mut out = Vec::new();
    unsafe {
        walker.visit(root.page(), &mut |r: &WalkRecord| {
            if r.is_leaf() {
                out.push(*r);
            }
            Ok::<(), ()>(())
        })
    }
    .unwrap();
    out
}

#[test]
fn fork_shares_then_fault_copies_for_the_second_owner() {
    let arena = Arena::new(8);
    let kmem: Kmem = allocator(&arena, 0);

    let data = kmem.kalloc().expect("data").base();
    arena.write(data, 0x5A);
    let parent = map_one(&kmem, data, PageEntryBits::new_user_rw(data));

    // fork: share the page, write-protect both mappings.
    kmem.incref(data);
    last_level(parent).set(0, cow_leaf(data));
    let child = map_one(&kmem, data, cow_leaf(data));

    for root in [parent, child] {
        let found = leaves(&kmem, root);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].pa, data);
        assert_eq!(found[0].refs, Some(2));
        assert!(!found[0].writable());
        assert!(found[0].entry.cow());
    }

    // Store fault in the child: shared, so copy.
    assert_eq!(kmem.getref(data), 2);
    let copy = kmem.kalloc().expect("copy").base();
    unsafe {
        IdentityMapper
            .phys_to_ptr::<u8>(copy)
            .copy_from_nonoverlapping(IdentityMapper.phys_to_ptr::<u8>(data), 4096);
    }
    last_level(child).set(0, PageEntryBits::new_user_rw(copy));
    unsafe { kmem.kfree(data) };
    assert!(arena.read(copy).iter().all(|&b| b == 0x5A));

    // Store fault in the parent: last owner, flip the bit in place.
    assert_eq!(kmem.getref(data), 1);
    let mut pte = last_level(parent).get(0);
    pte.resolve_cow();
    assert!(pte.writable() && !pte.cow());
    last_level(parent).set(0, pte);

    let found = leaves(&kmem, parent);
    assert_eq!(found[0].refs, Some(1));
    assert!(found[0].writable());
    assert!(arena.read(data).iter().all(|&b| b == 0x5A));
}

#[test]
fn printed_tree_shows_live_counts() {
    let arena = Arena::new(8);
    let kmem: Kmem = allocator(&arena, 0);
    let data = kmem.kalloc().expect("data").base();
    kmem.incref(data);
    let root = map_one(&kmem, data, PageEntryBits::new_user_rx(data));

    let walker = PageTableWalker::new(&IdentityMapper, &kmem);
    let mut out = String::new();
    unsafe { walker.print(root.page(), &mut out) }.unwrap();

    let lines: Vec<&str> = out.lines().filter(|l| l.contains("> Page")).collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].ends_with("refs: 1, writable: False"));
    assert!(lines[2].starts_with("      +---> Page 0:"));
    assert!(lines[2].contains(&format!("pa {data}, refs: 2, writable: False")));
}

#[test]
fn shared_page_handles_model_fork_and_exit() {
    let arena = Arena::new(2);
    let kmem: PageAllocator<IdentityMapper, 2> = allocator(&arena, 0);

    let parent = SharedPage::alloc(&kmem).expect("page");
    unsafe { parent.as_ptr().write_bytes(0x3C, 4096) };
    let children: Vec<_> = (0..3).map(|_| parent.share()).collect();
    assert_eq!(parent.refs(), 4);
    assert!(!parent.is_exclusive());

    assert_eq!(children[2].address(), parent.address());
    drop(children);
    assert!(parent.is_exclusive());
    assert!(arena.read(parent.address()).iter().all(|&b| b == 0x3C));
    assert_eq!(kmem.num_free_pages(), 1);

    let raw = parent.into_raw();
    assert_eq!(kmem.getref(raw.base()), 1);
    drop(unsafe { SharedPage::from_raw(&kmem, raw) });
    assert_eq!(kmem.num_free_pages(), 2);
}

#[test]
fn shared_page_alloc_fails_cleanly_when_empty() {
    let arena = Arena::new(1);
    let kmem: PageAllocator<IdentityMapper, 1> = allocator(&arena, 0);
    let _only = SharedPage::alloc(&kmem).expect("page");
    assert!(SharedPage::alloc(&kmem).is_err());
}
