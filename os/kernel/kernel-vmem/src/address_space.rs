//! # Address Space (ARMv7, directory-rooted)
//!
//! Strongly-typed helpers to build and manipulate a **single** virtual
//! address space (tree rooted at a first-level directory). This complements
//! the typed paging layers ([`PageDirectory`], [`PageTable`]).
//!
//! ## Highlights
//!
//! - [`AddressSpace::insert`] to install or replace one 4 KiB mapping with
//!   reference-count accounting.
//! - [`AddressSpace::remove`] to drop a mapping (releasing its frame).
//! - [`AddressSpace::lookup`] to find the frame and slot behind a VA.
//! - [`AddressSpace::boot_map_region`] for permanent boot-time mappings.
//! - [`AddressSpace::query`] to translate a VA to PA (handles sections,
//!   supersections, and both page sizes).
//! - [`AddressSpace::activate`] to install this space's directory into the
//!   translation-table base register.
//!
//! ## Design
//!
//! - Second-level tables are created on demand from a caller-owned
//!   [`TableAllocator`]; the allocating walk pins each fresh frame once and
//!   the tables are never reclaimed.
//! - Frames are only touched through the [`FrameManager`] seam, which keeps
//!   the reference-count discipline in one place: exactly one count per live
//!   `(directory, va)` mapping, none for boot mappings.
//! - Keeps `unsafe` confined to mapping physical table frames to typed
//!   references through the [`PhysMapper`].
//!
//! ## Safety
//!
//! - Mutating active mappings requires **TLB maintenance**; [`insert`](AddressSpace::insert)
//!   and [`remove`](AddressSpace::remove) issue the single-entry invalidation
//!   themselves once the directory is live.
//! - The provided `PhysMapper` must yield **writable** references to table
//!   frames.

use crate::page_table::{DirIndex, PageDirectory, PdEntry, PdEntryKind, PtEntry, TableIndex};
use crate::permissions::PagePermissions;
use crate::table_alloc::TableAllocator;
use crate::{FrameManager, MapError, PhysMapper, get_table};
use core::sync::atomic::{AtomicBool, Ordering};
use kernel_info::memory::{DIRECTORY_BYTES, PAGE_SIZE, PHYS_MEMORY_SIZE};
use kernel_memory_addresses::{
    PhysicalAddress, PhysicalPage, Size1M, Size4K, Size16M, Size64K, VirtualAddress,
};
use log::trace;

/// Set once the kernel directory has been installed. Before that the MMU
/// cannot hold stale entries for it, so invalidation is a no-op.
static TRANSLATION_LIVE: AtomicBool = AtomicBool::new(false);

/// Whether a directory has been installed and per-entry TLB maintenance is
/// therefore required.
#[inline]
#[must_use]
pub fn translation_live() -> bool {
    TRANSLATION_LIVE.load(Ordering::Relaxed)
}

/// Handle to a single, concrete address space.
pub struct AddressSpace<'m, M: PhysMapper> {
    /// Physical base of the 16 KiB first-level directory.
    root: PhysicalAddress,
    mapper: &'m M,
}

impl<'m, M: PhysMapper> AddressSpace<'m, M> {
    /// Wrap an existing (already zeroed or populated) first-level directory.
    ///
    /// `root` must be 16 KiB-aligned, as the hardware demands.
    #[inline]
    #[must_use]
    pub const fn from_root(mapper: &'m M, root: PhysicalAddress) -> Self {
        debug_assert!(
            root.as_u32() % DIRECTORY_BYTES == 0,
            "directory base must be 16K-aligned"
        );
        Self { root, mapper }
    }

    /// Physical base of the first-level directory.
    #[inline]
    #[must_use]
    pub const fn root_phys(&self) -> PhysicalAddress {
        self.root
    }

    /// Borrow the first-level directory through the mapper.
    #[inline]
    fn directory(&self) -> &'m mut PageDirectory {
        unsafe { self.mapper.phys_to_mut::<PageDirectory>(self.root) }
    }

    /// Return the PTE slot for `va`, or `None` when no second-level table
    /// covers it.
    ///
    /// # Panics
    /// Panics when the first-level entry for `va` is present but not a
    /// coarse pointer, or references a table outside RAM — both are
    /// corruption of structures this walker owns.
    #[must_use]
    pub fn walk<'a>(&self, va: VirtualAddress) -> Option<&'a mut PtEntry> {
        let dir = self.directory();
        match dir.get(DirIndex::from(va)).kind() {
            None => None,
            Some(PdEntryKind::CoarseTable(table, _)) => {
                assert!(
                    table.as_u32() < PHYS_MEMORY_SIZE,
                    "coarse entry references a table outside RAM"
                );
                let table = unsafe { get_table(self.mapper, table) };
                Some(table.entry_mut(TableIndex::from(va)))
            }
            Some(_) => panic!("page walk hit a direct-mapped region"),
        }
    }

    /// Like [`walk`](Self::walk), but allocate and link a second-level table
    /// when none covers `va` yet.
    ///
    /// Returns `None` when the table allocation fails; the caller surfaces
    /// that as out-of-memory.
    pub fn walk_or_create<'a, F: FrameManager>(
        &self,
        frames: &mut F,
        tables: &mut TableAllocator,
        va: VirtualAddress,
    ) -> Option<&'a mut PtEntry> {
        let dir = self.directory();
        let index = DirIndex::from(va);
        if !dir.get(index).present() {
            let table = tables.take_slot(self.mapper, frames)?;
            dir.set(index, PdEntry::coarse(table));
            trace!("new second-level table at {table} covering {}", va);
        }
        self.walk(va)
    }

    /// Translate a `VirtualAddress` to a `PhysicalAddress` if mapped.
    ///
    /// Handles section, supersection, large-page, and small-page leaves by
    /// adding the appropriate **in-page offset**.
    #[must_use]
    pub fn query(&self, va: VirtualAddress) -> Option<PhysicalAddress> {
        let dir = self.directory();
        match dir.get(DirIndex::from(va)).kind()? {
            PdEntryKind::Section(base, _) => Some(base.join(va.offset::<Size1M>())),
            PdEntryKind::Supersection(base, _) => Some(base.join(va.offset::<Size16M>())),
            PdEntryKind::CoarseTable(table, _) => {
                let table = unsafe { get_table(self.mapper, table) };
                match table.get(TableIndex::from(va)).kind()? {
                    crate::PtEntryKind::Small(base, _) => Some(base.join(va.offset::<Size4K>())),
                    crate::PtEntryKind::Large(base, _) => Some(base.join(va.offset::<Size64K>())),
                }
            }
        }
    }

    /// Map **one** 4 KiB frame at `va` with `perm`, accounting for whatever
    /// was mapped there before.
    ///
    /// - Re-inserting the frame already mapped at `va` only refreshes the
    ///   permission bits (and invalidates the stale TLB entry); the frame's
    ///   reference count does not change and the frame is never freed.
    /// - Replacing a different frame removes the old mapping first, which
    ///   releases that frame.
    /// - A successful insert owns exactly one reference for this `(va)`
    ///   mapping.
    ///
    /// # Errors
    /// [`MapError::OutOfMemory`] when the second-level table cannot be
    /// allocated.
    pub fn insert<F: FrameManager>(
        &self,
        frames: &mut F,
        tables: &mut TableAllocator,
        frame: PhysicalPage<Size4K>,
        va: VirtualAddress,
        perm: PagePermissions,
    ) -> Result<(), MapError> {
        let slot = self
            .walk_or_create(frames, tables, va)
            .ok_or(MapError::OutOfMemory)?;

        if let Some(previous) = slot.mapped_frame() {
            if previous == frame {
                // Same frame again: only the permission bits change. The
                // existing reference already covers this mapping.
                *slot = PtEntry::small(frame, perm);
                self.tlb_invalidate(va);
                trace!("refreshed {} -> {} ({:?})", va, frame.base(), perm);
                return Ok(());
            }
            // A different frame lives here; drop that mapping first.
            self.release_slot(frames, slot, va);
        }

        *slot = PtEntry::small(frame, perm);
        frames.retain(frame);
        trace!("mapped {} -> {} ({:?})", va, frame.base(), perm);
        Ok(())
    }

    /// Find the mapping for `va`: the mapped 4 KiB frame and the PTE slot
    /// holding it. Returns `None` when nothing is mapped.
    #[must_use]
    pub fn lookup<'a>(
        &self,
        va: VirtualAddress,
    ) -> Option<(PhysicalPage<Size4K>, &'a mut PtEntry)> {
        let slot = self.walk(va)?;
        let frame = slot.mapped_frame()?;
        Some((frame, slot))
    }

    /// Unmap `va` if mapped: release the frame, clear the slot, and
    /// invalidate the TLB entry. A miss is a no-op.
    pub fn remove<F: FrameManager>(&self, frames: &mut F, va: VirtualAddress) {
        if let Some(slot) = self.walk(va) {
            self.release_slot(frames, slot, va);
        }
    }

    /// Drop whatever mapping sits in `slot` (which translates `va`).
    fn release_slot<F: FrameManager>(
        &self,
        frames: &mut F,
        slot: &mut PtEntry,
        va: VirtualAddress,
    ) {
        let Some(frame) = slot.mapped_frame() else {
            return;
        };
        frames.release(frame);
        *slot = PtEntry::zero();
        self.tlb_invalidate(va);
        trace!("unmapped {}", va);
    }

    /// Tile `[va .. va+size)` onto `[pa .. pa+size)` with 4 KiB pages.
    ///
    /// Boot mappings are permanent and kernel-only: they take no reference
    /// counts and no permission argument. No TLB maintenance is performed —
    /// this runs before the directory is installed, and installation flushes
    /// everything.
    ///
    /// # Panics
    /// Panics when `va`, `pa`, or `size` is not page-aligned, or when a
    /// second-level table cannot be allocated; the boot sequence cannot
    /// continue without its mappings.
    pub fn boot_map_region<F: FrameManager>(
        &self,
        frames: &mut F,
        tables: &mut TableAllocator,
        va: VirtualAddress,
        size: u32,
        pa: PhysicalAddress,
    ) {
        assert!(va.as_u32() % PAGE_SIZE == 0, "unaligned virtual base");
        assert!(pa.as_u32() % PAGE_SIZE == 0, "unaligned physical base");
        assert!(size % PAGE_SIZE == 0, "region size must be page-granular");

        for i in (0..size).step_by(PAGE_SIZE as usize) {
            let Some(slot) = self.walk_or_create(frames, tables, va + i) else {
                panic!("out of memory while building boot mappings");
            };
            *slot = PtEntry::small(
                PhysicalPage::from_addr(pa + i),
                PagePermissions::KERNEL,
            );
        }
    }

    /// Write a 1 MiB section entry mapping `va` to `pa`.
    ///
    /// The section base is truncated to 1 MiB alignment exactly like the
    /// hardware would truncate the written word.
    pub fn map_section(&self, va: VirtualAddress, pa: PhysicalAddress, perm: PagePermissions) {
        let dir = self.directory();
        dir.set(
            DirIndex::from(va),
            PdEntry::section(PhysicalPage::<Size1M>::from_addr(pa), perm),
        );
    }

    /// Clear the first-level entry at `index` back to invalid.
    pub fn clear_directory_entry(&self, index: DirIndex) {
        self.directory().set_zero(index);
    }

    /// Invalidate the TLB entry for `va` in this address space.
    ///
    /// A no-op until a directory has been installed — nothing can be cached
    /// before that. Single-processor scope; a multi-core kernel would turn
    /// this into a shootdown.
    pub fn tlb_invalidate(&self, va: VirtualAddress) {
        if !translation_live() {
            return;
        }
        #[cfg(target_arch = "arm")]
        kernel_registers::tlb::invalidate_mva(va);
        #[cfg(not(target_arch = "arm"))]
        let _ = va;
    }

    /// Install this space's directory into the translation-table base
    /// register and flush the TLB.
    ///
    /// # Safety
    /// The directory must map everything the executing code touches (its own
    /// instructions, the stack, this table tree) before the switch, and must
    /// stay alive for as long as it is installed.
    #[cfg(target_arch = "arm")]
    pub unsafe fn activate(&self) {
        use kernel_registers::StoreRegisterUnsafe;
        use kernel_registers::ttbr0::Ttbr0;

        unsafe {
            Ttbr0::from_directory_phys(self.root).store_unsafe();
        }
        kernel_registers::tlb::invalidate_all();
        kernel_registers::tlb::dsb();
        kernel_registers::tlb::isb();
        TRANSLATION_LIVE.store(true, Ordering::Relaxed);
    }
}
