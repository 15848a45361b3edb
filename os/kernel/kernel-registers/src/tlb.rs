//! # TLB Maintenance
//!
//! Single-processor TLB maintenance operations. These are CP15 `c8` writes;
//! the virtual-address form invalidates exactly one entry, keyed on the
//! modified-virtual-address operand.

#[cfg(all(feature = "asm", target_arch = "arm"))]
use kernel_memory_addresses::VirtualAddress;

/// Invalidate the unified TLB entry for `va` (TLBIMVA).
///
/// Local to this processor; a multi-core kernel would broadcast.
#[cfg(all(feature = "asm", target_arch = "arm"))]
#[inline]
pub fn invalidate_mva(va: VirtualAddress) {
    unsafe {
        core::arch::asm!(
            "mcr p15, 0, {}, c8, c7, 1",
            in(reg) va.as_u32(),
            options(nostack, preserves_flags)
        );
    }
}

/// Invalidate the entire unified TLB (TLBIALL).
#[cfg(all(feature = "asm", target_arch = "arm"))]
#[inline]
pub fn invalidate_all() {
    unsafe {
        core::arch::asm!(
            "mcr p15, 0, {}, c8, c7, 0",
            in(reg) 0u32,
            options(nostack, preserves_flags)
        );
    }
}

/// Data synchronization barrier.
#[cfg(all(feature = "asm", target_arch = "arm"))]
#[inline]
pub fn dsb() {
    unsafe {
        core::arch::asm!("dsb", options(nostack, preserves_flags));
    }
}

/// Instruction synchronization barrier.
#[cfg(all(feature = "asm", target_arch = "arm"))]
#[inline]
pub fn isb() {
    unsafe {
        core::arch::asm!("isb", options(nostack, preserves_flags));
    }
}
