use crate::{LoadRegisterUnsafe, StoreRegisterUnsafe};
use bitfield_struct::bitfield;
use kernel_memory_addresses::PhysicalAddress;

/// TTBR0 — Translation Table Base Register 0 (short-descriptor format,
/// `TTBCR.N = 0`).
///
/// Holds the physical base address of the first-level translation table and
/// walk-attribute hints. With `N = 0`, TTBR0 covers the whole address space
/// and the table must be 16 KiB-aligned.
#[bitfield(u32)]
pub struct Ttbr0 {
    /// Bit 0 — C: Inner-cacheable translation table walks (ARMv6 encoding).
    pub cacheable: bool,

    /// Bit 1 — S: Translation table walks are to shareable memory.
    pub shareable: bool,

    /// Bit 2 — IMP: Implementation defined.
    pub imp: bool,

    /// Bits 3–4 — RGN: Outer cacheability for translation table walks.
    #[bits(2)]
    pub region: u8,

    /// Bit 5 — NOS: Not outer shareable.
    pub not_outer_shareable: bool,

    /// Bits 6–13 — Reserved (must be 0 with a 16 KiB-aligned table).
    #[bits(8)]
    pub reserved0: u8,

    /// Bits 14–31 — first-level table physical base >> 14.
    ///
    /// These bits store the physical base address of the translation table,
    /// shifted right by 14 (16 KiB alignment). To get the full physical
    /// address: `table_base_phys = table_base_16k << 14`.
    #[bits(18)]
    table_base_16k: u32,
}

impl Ttbr0 {
    /// Create a `Ttbr0` value from a first-level directory physical base.
    ///
    /// `directory_phys` must be 16 KiB-aligned.
    #[must_use]
    pub fn from_directory_phys(directory_phys: PhysicalAddress) -> Self {
        debug_assert_eq!(
            directory_phys.as_u32() & 0x3FFF,
            0,
            "directory base must be 16K-aligned"
        );
        let mut ttbr = Self::new();
        ttbr.set_table_base_16k(directory_phys.as_u32() >> 14);
        ttbr
    }

    /// Return the full physical address of the first-level directory.
    #[must_use]
    pub const fn directory_phys(&self) -> PhysicalAddress {
        PhysicalAddress::new(self.table_base_16k() << 14)
    }
}

#[cfg(all(feature = "asm", target_arch = "arm"))]
impl LoadRegisterUnsafe for Ttbr0 {
    unsafe fn load_unsafe() -> Self {
        let mut ttbr0: u32;
        unsafe {
            core::arch::asm!(
                "mrc p15, 0, {}, c2, c0, 0",
                out(reg) ttbr0,
                options(nomem, nostack, preserves_flags)
            );
        }
        Self::from_bits(ttbr0)
    }
}

#[cfg(all(feature = "asm", target_arch = "arm"))]
impl StoreRegisterUnsafe for Ttbr0 {
    unsafe fn store_unsafe(self) {
        let ttbr0 = self.into_bits();
        unsafe {
            core::arch::asm!(
                "mcr p15, 0, {}, c2, c0, 0",
                in(reg) ttbr0,
                options(nostack, preserves_flags)
            );
        }
    }
}
