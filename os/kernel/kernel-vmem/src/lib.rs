//! # Virtual Memory Support
//!
//! ARMv7 short-descriptor paging helpers for a small teaching kernel.
//!
//! ## What you get
//! - An [`address space`](address_space) describing a first-level page
//!   directory and the mapping operations over it.
//! - Bit-exact first-level ([`PdEntry`]) and second-level ([`PtEntry`])
//!   descriptor types with practical explanations.
//! - A 16 KiB-aligned [`PageDirectory`] and a 1 KiB [`PageTable`] wrapper
//!   with typed index helpers.
//! - The [`TableAllocator`] that packs four second-level tables into each
//!   allocated frame.
//! - A tiny allocator/mapper interface ([`FrameManager`], [`PhysMapper`]).
//!
//! ## ARMv7 Virtual Address → Physical Address Walk
//!
//! Each 32-bit virtual address is divided into three fields:
//!
//! ```text
//! | 31‒20     | 19‒12     | 11‒0   |
//! | Directory | Table     | Offset |
//! ```
//!
//! The MMU uses these fields as **indices** into two levels of translation
//! tables: a first-level directory of 4096 entries and second-level tables of
//! 256 entries, 4 bytes each.
//!
//! ```text
//!  Directory  →  Page Table  →  Physical Page
//!   │              │
//!   │              └───► PTE (small page 4 KiB, large page 64 KiB)
//!   └──────────────────► PDE (coarse pointer, section 1 MiB, supersection 16 MiB)
//! ```
//!
//! ### Levels and their roles
//!
//! | Level | Table name | Entry name | Description |
//! |:------|:------------|:-----------|:-------------|
//! | 1 | **Directory** (first-level table, 16 KiB-aligned) | **PDE** | One entry per 1 MiB of address space. Either a *coarse pointer* to a second-level table, a *section* that maps 1 MiB directly, or a *supersection* that maps 16 MiB directly. The directory's physical base lives in the translation-table base register. |
//! | 2 | **Page Table** (second-level table, 1 KiB) | **PTE** | Each entry maps a 4 KiB *small page* (or, read-only for this core, a 64 KiB *large page*). |
//!
//! ### Leaf vs. non-leaf entries
//!
//! - A **leaf entry** directly maps physical memory — it contains the
//!   physical base and the permission bits (AP plus the APX read-only bit).
//!   - A **PTE** is always a leaf.
//!   - A **PDE** in section or supersection form is a leaf.
//! - A **non-leaf entry** (coarse-pointer PDE) points to a second-level table
//!   and continues the walk.
//!
//! ### Offset
//!
//! - The final **Offset** field (bits 11–0) selects the byte inside the
//!   4 KiB (or larger) page.
//!
//! ### Summary
//!
//! A 32-bit virtual address is effectively:
//!
//! ```text
//! VA = [Directory:12] [Table:8] [Offset:12]
//! ```
//!
//! This creates a two-level translation tree mapping the full **4 GiB** of
//! virtual address space, with leaves of 16 MiB, 1 MiB, 64 KiB, or 4 KiB
//! depending on which level the translation stops.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code, clippy::inline_always)]

pub mod address_space;
mod page_table;
mod permissions;
mod table_alloc;

pub use crate::address_space::AddressSpace;
pub use crate::page_table::{
    DirIndex, L1View, L2View, PageDirectory, PageTable, PdEntry, PdEntryKind, PdeCoarse,
    PdeSection, PtEntry, PtEntryKind, PteLarge, PteSmall, TableIndex, compose_address,
};
pub use crate::permissions::{AccessPermissions, PagePermissions};
pub use crate::table_alloc::TableAllocator;

use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, Size4K};

/// Insertion of a mapping failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MapError {
    /// The walker could not allocate a second-level table.
    #[error("out of memory allocating a second-level table")]
    OutOfMemory,
}

/// Minimal frame interface used to obtain **physical** 4 KiB frames for
/// second-level tables and to keep the mapping reference counts honest.
///
/// The implementation decides where frames come from and how their lifetime
/// is accounted (a refcounted frame pool in this kernel). Returned frames
/// **must** be 4 KiB aligned.
pub trait FrameManager {
    /// Allocate one 4 KiB *physical* frame. Must return page-aligned frames.
    ///
    /// Returns `None` on out-of-memory. The returned frame is unreferenced;
    /// callers that store its address somewhere durable must [`retain`](Self::retain) it.
    fn alloc_frame(&mut self) -> Option<PhysicalPage<Size4K>>;

    /// Record one additional live mapping of `frame`.
    fn retain(&mut self, frame: PhysicalPage<Size4K>);

    /// Drop one live mapping of `frame`; the frame returns to the free pool
    /// when the last mapping goes away.
    fn release(&mut self, frame: PhysicalPage<Size4K>);
}

/// Converts physical addresses to *temporarily* usable pointers in the current
/// virtual address space (identity-mapped early on; via the high-half RAM
/// alias once the kernel directory is live).
///
/// # Safety
/// - You must ensure `pa` is mapped as writable in the current translation
///   tables for `&mut T`.
/// - Lifetime `'a` is purely borrow-checked; the mapping must remain valid
///   for `'a`.
/// - Type `T` must match the bytes at `pa` (no aliasing UB).
pub trait PhysMapper {
    /// Convert a *physical* address to a usable mutable pointer in the
    /// current address space.
    ///
    /// # Safety
    /// See the trait-level contract.
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T;
}

/// Map a physical second-level table into the current virtual address space
/// and return a mutable reference to it.
///
/// # Safety
/// - `phys` must point to a valid 1 KiB-aligned second-level table.
/// - The mapping must be writable for mut access.
#[inline]
unsafe fn get_table<'a, M: PhysMapper>(m: &M, phys: PhysicalAddress) -> &'a mut PageTable {
    unsafe { m.phys_to_mut::<PageTable>(phys) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_info::memory::{PAGE_SIZE, TABLE_BYTES};
    use kernel_memory_addresses::VirtualAddress;

    /// A trivial **bump** frame manager: always hands out the next 4 KiB
    /// frame and counts retain/release calls.
    ///
    /// There's no free list, no reuse, no accounting beyond the counters
    /// (perfect for walker tests; the real refcounted pool lives in the
    /// physical-memory crate).
    struct BumpFrames {
        /// Next free physical byte address (must remain 4 KiB aligned)
        next: u32,
        /// Exclusive end (bounds check)
        end: u32,
        /// Frames handed out so far.
        allocated: usize,
        /// retain() minus release() calls.
        references: isize,
    }

    impl BumpFrames {
        fn new(start: u32, end: u32) -> Self {
            Self {
                next: start,
                end,
                allocated: 0,
                references: 0,
            }
        }
    }

    impl FrameManager for BumpFrames {
        fn alloc_frame(&mut self) -> Option<PhysicalPage<Size4K>> {
            if self.next + PAGE_SIZE > self.end {
                return None;
            }
            let p = self.next;
            self.next += PAGE_SIZE;
            self.allocated += 1;
            Some(PhysicalPage::from_addr(PhysicalAddress::new(p)))
        }

        fn retain(&mut self, _frame: PhysicalPage<Size4K>) {
            self.references += 1;
        }

        fn release(&mut self, _frame: PhysicalPage<Size4K>) {
            self.references -= 1;
        }
    }

    /// A tiny in-memory "RAM" for the walker to chew on.
    ///
    /// We simulate physical memory as a vector of 16 KiB-aligned chunks;
    /// physical addresses are simple byte offsets from the start of the
    /// buffer. The mapper adds the buffer base, exactly like the high-half
    /// alias does on the real machine.
    ///
    /// This is *only* for tests. Real mappers must honor whatever alias or
    /// identity mapping is in force.
    #[repr(align(16384))]
    struct Aligned16K(#[allow(dead_code)] [u8; 16384]);

    struct TestPhys {
        chunks: Vec<Aligned16K>,
    }

    impl TestPhys {
        fn with_frames(frames: usize) -> Self {
            let chunks = frames.div_ceil(4);
            let mut v = Vec::with_capacity(chunks);
            for _ in 0..chunks {
                v.push(Aligned16K([0; 16384]));
            }
            Self { chunks: v }
        }

        fn base_ptr(&self) -> *mut u8 {
            self.chunks.as_ptr() as *mut u8
        }

        fn size(&self) -> u32 {
            u32::try_from(self.chunks.len() * 16384).unwrap()
        }
    }

    impl PhysMapper for TestPhys {
        unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
            assert!(pa.as_u32() < self.size(), "address outside simulated RAM");
            // SAFETY: The caller promises `T` matches the bytes at `pa`.
            unsafe { &mut *(self.base_ptr().add(pa.as_u32() as usize).cast::<T>()) }
        }
    }

    /// Carve a directory out of the front of the simulated RAM and hand the
    /// rest to a bump frame manager.
    fn fresh_space(phys: &TestPhys) -> (AddressSpace<'_, TestPhys>, BumpFrames, TableAllocator) {
        let root = PhysicalAddress::zero();
        unsafe {
            phys.phys_to_mut::<PageDirectory>(root).zero();
        }
        let space = AddressSpace::from_root(phys, root);
        let frames = BumpFrames::new(16384, phys.size());
        (space, frames, TableAllocator::new())
    }

    #[test]
    fn walk_or_create_builds_coarse_chain() {
        let phys = TestPhys::with_frames(64);
        let (space, mut frames, mut tables) = fresh_space(&phys);

        let va = VirtualAddress::new(0x0040_3000);
        let slot = space
            .walk_or_create(&mut frames, &mut tables, va)
            .expect("walk_or_create");
        *slot = PtEntry::small(
            PhysicalPage::from_addr(PhysicalAddress::new(0x0002_0000)),
            PagePermissions::KERNEL,
        );

        // The directory entry for the 4 MiB slot must now be a coarse pointer.
        let dir = unsafe { phys.phys_to_mut::<PageDirectory>(PhysicalAddress::zero()) };
        match dir.get(DirIndex::from(va)).kind().expect("present") {
            PdEntryKind::CoarseTable(table, _) => {
                assert_eq!(table.as_u32() % TABLE_BYTES, 0);
                let pt = unsafe { phys.phys_to_mut::<PageTable>(table) };
                let entry = pt.get(TableIndex::from(va));
                match entry.kind().expect("present") {
                    PtEntryKind::Small(page, flags) => {
                        assert_eq!(page.base().as_u32(), 0x0002_0000);
                        assert_eq!(flags.ap(), AccessPermissions::KernelOnly);
                        assert!(!flags.read_only());
                    }
                    PtEntryKind::Large(..) => panic!("expected a small page"),
                }
            }
            _ => panic!("expected a coarse pointer"),
        }
    }

    #[test]
    fn walk_is_deterministic_once_created() {
        let phys = TestPhys::with_frames(64);
        let (space, mut frames, mut tables) = fresh_space(&phys);

        let va = VirtualAddress::new(0x1234_5000);
        let created = space
            .walk_or_create(&mut frames, &mut tables, va)
            .expect("walk_or_create");
        let walked = space.walk(va).expect("walk");
        assert!(core::ptr::eq(created, walked));
        // Creating again must not move the slot either.
        let again = space
            .walk_or_create(&mut frames, &mut tables, va)
            .expect("walk_or_create");
        assert!(core::ptr::eq(created, again));
    }

    #[test]
    fn four_fresh_tables_consume_one_frame() {
        let phys = TestPhys::with_frames(64);
        let (space, mut frames, mut tables) = fresh_space(&phys);

        // Four addresses in four distinct 1 MiB slots.
        for mib in 0..4u32 {
            space
                .walk_or_create(&mut frames, &mut tables, VirtualAddress::new(mib << 20))
                .expect("walk_or_create");
        }
        assert_eq!(frames.allocated, 1);
        // The backing frame is pinned exactly once.
        assert_eq!(frames.references, 1);

        // A fifth slot spills into a second frame.
        space
            .walk_or_create(&mut frames, &mut tables, VirtualAddress::new(4 << 20))
            .expect("walk_or_create");
        assert_eq!(frames.allocated, 2);
        assert_eq!(frames.references, 2);
    }

    #[test]
    fn new_tables_come_up_invalid() {
        let phys = TestPhys::with_frames(64);
        let (space, mut frames, mut tables) = fresh_space(&phys);

        // Scribble over the frame the cursor will grab next.
        let scratch: &mut [u8; PAGE_SIZE as usize] =
            unsafe { phys.phys_to_mut(PhysicalAddress::new(16384)) };
        scratch.fill(0xFF);

        space
            .walk_or_create(&mut frames, &mut tables, VirtualAddress::zero())
            .expect("walk_or_create");
        let dir = unsafe { phys.phys_to_mut::<PageDirectory>(PhysicalAddress::zero()) };
        let PdEntryKind::CoarseTable(table, _) = dir.get(DirIndex::new(0)).kind().expect("present")
        else {
            panic!("expected a coarse pointer");
        };
        let pt = unsafe { phys.phys_to_mut::<PageTable>(table) };
        for i in 0..256 {
            assert!(pt.get(TableIndex::new(u8::try_from(i).unwrap())).kind().is_none());
        }
    }

    #[test]
    fn walker_failure_surfaces_as_none() {
        let phys = TestPhys::with_frames(4);
        let (space, mut frames, mut tables) = fresh_space(&phys);

        // Drain the bump pool.
        while frames.alloc_frame().is_some() {}

        assert!(
            space
                .walk_or_create(&mut frames, &mut tables, VirtualAddress::new(0x0010_0000))
                .is_none()
        );
    }

    #[test]
    fn query_decodes_sections_and_pages() {
        let phys = TestPhys::with_frames(64);
        let (space, mut frames, mut tables) = fresh_space(&phys);

        // A section at 8 MiB mapping physical 1 MiB.
        space.map_section(
            VirtualAddress::new(0x0080_0000),
            PhysicalAddress::new(0x0010_0000),
            PagePermissions::KERNEL,
        );
        assert_eq!(
            space.query(VirtualAddress::new(0x0080_0042)),
            Some(PhysicalAddress::new(0x0010_0042))
        );

        // A small page.
        let va = VirtualAddress::new(0x0000_3000);
        let slot = space
            .walk_or_create(&mut frames, &mut tables, va)
            .expect("walk_or_create");
        *slot = PtEntry::small(
            PhysicalPage::from_addr(PhysicalAddress::new(0x0002_0000)),
            PagePermissions::KERNEL,
        );
        assert_eq!(
            space.query(VirtualAddress::new(0x0000_3fe0)),
            Some(PhysicalAddress::new(0x0002_0fe0))
        );

        // Unmapped addresses translate to nothing.
        assert_eq!(space.query(VirtualAddress::new(0x4000_0000)), None);
    }
}
