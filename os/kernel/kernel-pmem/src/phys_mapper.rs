//! # High-Half `PhysMapper` for Kernel Virtual Memory
//!
//! This module provides the [`PhysMapper`] implementation used on the real
//! machine, where every physical address is aliased at
//! `KERNEL_BASE + pa` once the kernel directory is live (the entry directory
//! provides the same alias for the first 16 MiB during early boot).
//!
//! ## Why is this needed?
//! - Code can only dereference virtual addresses, not physical ones.
//! - When manipulating translation tables or zero-filling frames, you need a
//!   way to "touch" a physical address from the kernel.
//! - The mapping strategy differs between the real machine and the host test
//!   rigs (which simulate RAM in a buffer), so the trait abstracts over it.
//!
//! ## Example
//! ```rust,ignore
//! use kernel_pmem::HighHalfMapper;
//! use kernel_vmem::{PageTable, PhysMapper};
//! use kernel_memory_addresses::PhysicalAddress;
//!
//! let mapper = HighHalfMapper;
//! unsafe {
//!     let table: &mut PageTable = mapper.phys_to_mut(PhysicalAddress::new(0x0123_4000));
//!     table.zero();
//! }
//! ```

use kernel_info::memory::kernel_alias;
use kernel_memory_addresses::PhysicalAddress;
use kernel_vmem::PhysMapper;

/// [`PhysMapper`] for the kernel's high-half RAM alias.
///
/// Adds [`KERNEL_BASE`](kernel_info::memory::KERNEL_BASE) to the physical
/// address and returns a pointer.
///
/// # Safety
/// - The alias mapping must be in force and cover the referenced range
///   (guaranteed for all of RAM after the kernel directory is installed).
/// - The returned pointer must only be used for valid, mapped, writable
///   memory.
pub struct HighHalfMapper;

impl PhysMapper for HighHalfMapper {
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        let va = kernel_alias(pa).as_u32() as usize as *mut T;
        // SAFETY: Caller must ensure the physical address is valid and
        // reachable through the high-half alias.
        unsafe { &mut *va }
    }
}
