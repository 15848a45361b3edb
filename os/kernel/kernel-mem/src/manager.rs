//! Kernel memory manager: the frame pool, the table cursor, and the kernel
//! address space under one roof.
//!
//! This is the seam the rest of the kernel talks to. It borrows the frame
//! table (a large static on the real machine), owns the second-level-table
//! cursor, and wraps the kernel [`AddressSpace`], re-exposing the mapping
//! operations with the frame accounting already threaded through.

use kernel_info::boot::BootMemoryInfo;
use kernel_info::memory::{
    DIRECTORY_SPAN, GPIO_BASE, GPIO_PHYS_BASE, KERNEL_BASE, KERNEL_STACK_SIZE, KERNEL_STACK_TOP,
    PHYS_MEMORY_SIZE, physical,
};
use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};
use kernel_pmem::{FrameIndex, FrameTable};
use kernel_vmem::{
    AddressSpace, DirIndex, MapError, PagePermissions, PhysMapper, PtEntry, TableAllocator,
};
use log::info;

/// The kernel's memory manager.
///
/// Construction performs what the boot path calls `mem_init`: seed the frame
/// pool, then build the kernel directory. Installing the directory into the
/// MMU is a separate, target-only step (`install`).
pub struct MemoryManager<'m, M: PhysMapper> {
    frames: &'m mut FrameTable,
    tables: TableAllocator,
    kernel_space: AddressSpace<'m, M>,
}

impl<'m, M: PhysMapper> MemoryManager<'m, M> {
    /// Seed the frame pool from `info` and build the kernel directory in the
    /// (zeroed) 16 KiB of physical memory at `root`.
    ///
    /// The directory ends up with:
    /// - 1 MiB sections aliasing all of RAM at [`KERNEL_BASE`], kernel-only,
    ///   with the corresponding low-half entries explicitly cleared (the
    ///   entry directory populated some of them);
    /// - a section mapping the boot stack window below [`KERNEL_STACK_TOP`];
    /// - a section mapping [`GPIO_BASE`] to the GPIO controller block.
    pub fn new(
        mapper: &'m M,
        frames: &'m mut FrameTable,
        root: PhysicalAddress,
        info: &BootMemoryInfo,
    ) -> Self {
        frames.init(info);

        let manager = Self {
            frames,
            tables: TableAllocator::new(),
            kernel_space: AddressSpace::from_root(mapper, root),
        };
        manager.build_kernel_directory(info);
        info!("kernel directory built at {root}");
        manager
    }

    fn build_kernel_directory(&self, info: &BootMemoryInfo) {
        let space = &self.kernel_space;

        // Alias all of physical RAM in the high half, one section per
        // megabyte, and drop whatever the entry directory left at the
        // corresponding low-half slots.
        let mut offset = 0u32;
        while offset < PHYS_MEMORY_SIZE {
            let va = VirtualAddress::new(KERNEL_BASE + offset);
            let pa = match physical(va) {
                Ok(pa) => pa,
                Err(_) => unreachable!("the alias window starts at KERNEL_BASE"),
            };
            space.map_section(va, pa, PagePermissions::KERNEL);
            space.clear_directory_entry(DirIndex::from(VirtualAddress::new(offset)));
            offset += DIRECTORY_SPAN;
        }

        // The boot stack, one section below the alias window.
        space.map_section(
            VirtualAddress::new(KERNEL_STACK_TOP - KERNEL_STACK_SIZE),
            info.boot_stack,
            PagePermissions::KERNEL,
        );

        // The GPIO controller block.
        space.map_section(
            VirtualAddress::new(GPIO_BASE),
            PhysicalAddress::new(GPIO_PHYS_BASE),
            PagePermissions::KERNEL,
        );
    }

    /// Install the kernel directory into the MMU and put domain 0 into
    /// client mode, so translation-table permission bits are enforced from
    /// here on.
    ///
    /// # Safety
    /// Must run exactly once, from the boot path, while executing from
    /// addresses the new directory maps (the high-half alias).
    #[cfg(target_arch = "arm")]
    pub unsafe fn install(&self) {
        use kernel_registers::dacr::{Dacr, DomainMode};
        use kernel_registers::{LoadRegisterUnsafe, StoreRegisterUnsafe};

        unsafe {
            self.kernel_space.activate();
            Dacr::load_unsafe()
                .with_domain(0, DomainMode::Client)
                .store_unsafe();
        }
        info!("kernel directory installed; domain 0 in client mode");
    }

    /// Map `frame` at `va` with `perm`; see [`AddressSpace::insert`] for the
    /// replacement and reference-count rules.
    ///
    /// # Errors
    /// [`MapError::OutOfMemory`] when a second-level table cannot be
    /// allocated.
    pub fn insert(
        &mut self,
        frame: FrameIndex,
        va: VirtualAddress,
        perm: PagePermissions,
    ) -> Result<(), MapError> {
        self.kernel_space
            .insert(self.frames, &mut self.tables, frame.page(), va, perm)
    }

    /// Find the mapping for `va`: the mapped frame and its PTE slot.
    #[must_use]
    pub fn lookup(&self, va: VirtualAddress) -> Option<(FrameIndex, &mut PtEntry)> {
        let (page, slot) = self.kernel_space.lookup(va)?;
        Some((FrameIndex::from_page(page), slot))
    }

    /// Unmap `va` if mapped, releasing the frame. A miss is a no-op.
    pub fn remove(&mut self, va: VirtualAddress) {
        self.kernel_space.remove(self.frames, va);
    }

    /// Translate `va` through the kernel directory.
    #[must_use]
    pub fn query(&self, va: VirtualAddress) -> Option<PhysicalAddress> {
        self.kernel_space.query(va)
    }

    /// Permanent, kernel-only boot mappings; see
    /// [`AddressSpace::boot_map_region`].
    pub fn boot_map_region(&mut self, va: VirtualAddress, size: u32, pa: PhysicalAddress) {
        self.kernel_space
            .boot_map_region(self.frames, &mut self.tables, va, size, pa);
    }

    /// The kernel address space.
    #[must_use]
    pub const fn kernel_space(&self) -> &AddressSpace<'m, M> {
        &self.kernel_space
    }

    /// The frame pool.
    #[must_use]
    pub fn frames(&self) -> &FrameTable {
        self.frames
    }

    /// The frame pool, mutably.
    #[must_use]
    pub fn frames_mut(&mut self) -> &mut FrameTable {
        self.frames
    }
}
