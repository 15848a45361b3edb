//! # Translation-Table Modeling
//!
//! Bit-exact types for the two levels of the ARMv7 short-descriptor format:
//!
//! - [`pd`]: the first-level directory — 4096 entries, 16 KiB-aligned;
//!   entries are coarse pointers, sections, or supersections.
//! - [`pt`]: the second-level page table — 256 entries, 1 KiB; entries map
//!   4 KiB small pages or 64 KiB large pages.
//!
//! Both levels share the same decode discipline: the low two bits of an
//! entry select its role, and a zero word means "no mapping".

pub mod pd;
pub mod pt;

pub use pd::{DirIndex, L1View, PageDirectory, PdEntry, PdEntryKind, PdeCoarse, PdeSection};
pub use pt::{L2View, PageTable, PtEntry, PtEntryKind, PteLarge, PteSmall, TableIndex};

use kernel_memory_addresses::VirtualAddress;

/// Recompose a virtual address from its directory index, table index, and
/// in-page offset — the inverse of [`DirIndex::from`] / [`TableIndex::from`] /
/// `va.offset::<Size4K>()`.
///
/// ### Examples
/// ```rust
/// # use kernel_vmem::{DirIndex, TableIndex, compose_address};
/// # use kernel_memory_addresses::{Size4K, VirtualAddress};
/// let va = VirtualAddress::new(0xF123_4567);
/// let rebuilt = compose_address(
///     DirIndex::from(va),
///     TableIndex::from(va),
///     va.offset::<Size4K>().as_u32(),
/// );
/// assert_eq!(rebuilt, va);
/// ```
#[inline]
#[must_use]
pub const fn compose_address(dir: DirIndex, table: TableIndex, offset: u32) -> VirtualAddress {
    debug_assert!(offset < 4096);
    VirtualAddress::new(((dir.as_usize() as u32) << 20) | ((table.as_usize() as u32) << 12) | offset)
}
