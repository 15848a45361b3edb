//! # Memory Layout
//!
//! Compile-time geometry of the ARMv7 short-descriptor translation scheme and
//! the fixed virtual-memory layout of this kernel, plus the arithmetic between
//! physical addresses and their kernel-virtual aliases.

use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};

/// Bytes in one page / frame (the base translation granularity).
pub const PAGE_SIZE: u32 = 4096;

/// log2([`PAGE_SIZE`]).
pub const PAGE_SHIFT: u32 = 12;

/// Entries in a first-level directory. The directory covers the full 4 GiB
/// address space in 1 MiB steps and is 16 KiB long.
pub const DIRECTORY_ENTRIES: usize = 4096;

/// Entries in a second-level page table (one 1 KiB table maps 1 MiB).
pub const TABLE_ENTRIES: usize = 256;

/// Bytes of virtual address space spanned by one first-level entry (1 MiB).
pub const DIRECTORY_SPAN: u32 = PAGE_SIZE * TABLE_ENTRIES as u32;

/// Bytes occupied by one second-level table (256 × 4-byte entries).
///
/// Four of these pack into a single 4 KiB frame.
pub const TABLE_BYTES: u32 = TABLE_ENTRIES as u32 * 4;

/// Bytes occupied by a first-level directory (4096 × 4-byte entries).
/// The hardware requires this to be the directory's alignment as well.
pub const DIRECTORY_BYTES: u32 = DIRECTORY_ENTRIES as u32 * 4;

/// Size of the contiguous physical RAM this kernel manages.
pub const PHYS_MEMORY_SIZE: u32 = 256 * 1024 * 1024;

/// Number of physical frames backing [`PHYS_MEMORY_SIZE`].
pub const FRAME_COUNT: usize = (PHYS_MEMORY_SIZE / PAGE_SIZE) as usize;

/// High-half base at which all of physical RAM is aliased.
///
/// Anything you map at `KERNEL_BASE + pa` lets the kernel access physical
/// memory via a fixed offset; the 256 MiB of RAM exactly fill the top of the
/// 32-bit address space.
pub const KERNEL_BASE: u32 = 0xF000_0000;

/// Where the kernel image is placed in *physical* memory by the loader.
///
/// # Kernel Build
/// This information is sourced in the kernel's `build.rs` to configure
/// the linker.
pub const KERNEL_LOAD: u32 = 0x0010_0000; // 1 MiB

/// Top of the boot stack. The stack grows down from here and is mapped by a
/// single 1 MiB section below the RAM alias window.
pub const KERNEL_STACK_TOP: u32 = KERNEL_BASE;

/// The size of the boot stack.
pub const KERNEL_STACK_SIZE: u32 = 8 * PAGE_SIZE;

/// Virtual window for the GPIO controller block.
pub const GPIO_BASE: u32 = 0xEF20_0000;

/// Physical base of the GPIO controller block.
pub const GPIO_PHYS_BASE: u32 = 0x3F20_0000;

const _: () = {
    assert!(KERNEL_BASE % DIRECTORY_SPAN == 0);
    assert!(KERNEL_BASE as u64 + PHYS_MEMORY_SIZE as u64 == 1 << 32);
    assert!(KERNEL_STACK_SIZE % PAGE_SIZE == 0);
    // The whole boot stack must sit inside the single section mapped for it.
    assert!(KERNEL_STACK_SIZE <= DIRECTORY_SPAN);
    assert!((KERNEL_STACK_TOP - KERNEL_STACK_SIZE) / DIRECTORY_SPAN == (KERNEL_STACK_TOP - 1) / DIRECTORY_SPAN);
    assert!(GPIO_BASE % DIRECTORY_SPAN == 0);
    assert!(GPIO_PHYS_BASE % DIRECTORY_SPAN == 0);
    assert!(GPIO_BASE < KERNEL_STACK_TOP - KERNEL_STACK_SIZE);
    assert!(KERNEL_LOAD % PAGE_SIZE == 0);
};

/// A virtual address below [`KERNEL_BASE`] has no physical counterpart in the
/// high-half alias window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("virtual address {va:#010X} lies below the high-half RAM alias")]
pub struct BadAddressError {
    /// The offending virtual address.
    pub va: u32,
}

/// The kernel-virtual alias of a physical address.
///
/// # Panics
/// Panics if `pa` lies outside the managed RAM; such an address has no alias.
///
/// ### Examples
/// ```rust
/// # use kernel_info::memory::kernel_alias;
/// # use kernel_memory_addresses::PhysicalAddress;
/// let va = kernel_alias(PhysicalAddress::new(0x0000_1000));
/// assert_eq!(va.as_u32(), 0xF000_1000);
/// ```
#[must_use]
pub const fn kernel_alias(pa: PhysicalAddress) -> VirtualAddress {
    assert!(pa.as_u32() < PHYS_MEMORY_SIZE, "physical address outside RAM");
    VirtualAddress::new(KERNEL_BASE + pa.as_u32())
}

/// The physical address behind a kernel-virtual alias.
///
/// # Errors
/// Returns [`BadAddressError`] when `va` lies below [`KERNEL_BASE`] and is
/// therefore not part of the alias window.
///
/// ### Examples
/// ```rust
/// # use kernel_info::memory::physical;
/// # use kernel_memory_addresses::VirtualAddress;
/// let pa = physical(VirtualAddress::new(0xF000_1000)).unwrap();
/// assert_eq!(pa.as_u32(), 0x0000_1000);
/// assert!(physical(VirtualAddress::new(0x8000_0000)).is_err());
/// ```
pub const fn physical(va: VirtualAddress) -> Result<PhysicalAddress, BadAddressError> {
    if va.as_u32() < KERNEL_BASE {
        return Err(BadAddressError { va: va.as_u32() });
    }
    Ok(PhysicalAddress::new(va.as_u32() - KERNEL_BASE))
}
