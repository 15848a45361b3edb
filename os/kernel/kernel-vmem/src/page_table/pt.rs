//! # ARMv7 Second-Level Page Table (PTE level)
//!
//! This module models the second paging level:
//!
//! - [`TableIndex`]: index type for virtual-address bits `[19:12]`.
//! - [`PtEntry`]: a second-level entry mapping a 4 KiB *small page* or a
//!   64 KiB *large page*.
//! - [`PtEntryKind`]: decoded view of an entry.
//! - [`PageTable`]: a 1 KiB array of 256 second-level entries.
//!
//! ## Semantics
//!
//! The low two bits of an entry select its role:
//! - `0b00`: invalid, no mapping.
//! - `0b01`: large page; bits `[31:16]` hold a 64 KiB-aligned physical base.
//! - `0b1x`: small page; bits `[31:12]` hold a 4 KiB-aligned physical base.
//!
//! This core only ever *writes* small pages; large pages are recognized when
//! translating.
//!
//! ## Invariants & Notes
//!
//! - A second-level table is 1 KiB long and 1 KiB-aligned; four of them pack
//!   into one 4 KiB frame.
//! - Raw constructors don't validate consistency; callers must ensure
//!   correctness.
//! - After modifying active mappings, the caller must perform any required
//!   TLB maintenance.

use crate::permissions::{AccessPermissions, PagePermissions};
use bitfield_struct::bitfield;
use kernel_info::memory::TABLE_ENTRIES;
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, Size4K, Size64K, VirtualAddress};

/// Either of the low two role bits set means "present".
const PRESENT_MASK: u32 = 0b11;

/// Small-page role bit.
const SMALL_BIT: u32 = 0b10;

/// **Borrowed view** into a second-level entry.
///
/// Returned by [`PtEntry::view`].
pub enum L2View {
    /// 4 KiB small-page leaf view.
    Small(PteSmall),
    /// 64 KiB large-page leaf view.
    Large(PteLarge),
}

/// **Second-level entry union** — overlays the [`PteSmall`] and [`PteLarge`]
/// leaf forms on the same 32-bit storage.
///
/// Prefer [`PtEntry::view`] or [`PtEntry::kind`] for safe typed access.
#[derive(Copy, Clone)]
#[repr(C)]
pub union PtEntry {
    /// Raw 32-bit storage of the entry.
    bits: u32,
    /// 4 KiB small-page form.
    small: PteSmall,
    /// 64 KiB large-page form.
    large: PteLarge,
}

/// **Small-page PTE (leaf)** — maps a single 4 KiB page.
///
/// - Physical base uses bits **31:12** and must be **4 KiB aligned**.
/// - `AP` (bits 5:4) and `APX` (bit 9) carry the access permissions.
#[bitfield(u32)]
pub struct PteSmall {
    /// Role bits (1:0): **`0b10`** marks a small page.
    #[bits(2, default = 0b10)]
    pub role: u8,
    /// Bits 3:2 — memory-type hints, unused by this core.
    #[bits(2)]
    __res2_3: u8,
    /// AP access-permission field (bits 5:4).
    #[bits(2)]
    ap_bits: u8,
    /// Bits 8:6 — memory-type hints, unused by this core.
    #[bits(3)]
    __res6_8: u8,
    /// **APX** (bit 9): makes the AP composition read-only.
    pub read_only: bool,
    /// Bits 11:10 — shareability hints, unused by this core.
    #[bits(2)]
    __res10_11: u8,
    /// Physical page base (bits 31:12, 4 KiB-aligned).
    #[bits(20)]
    page_base_4k: u32,
}

/// **Large-page PTE (leaf)** — maps a single 64 KiB page.
///
/// - Physical base uses bits **31:16** and must be **64 KiB aligned**.
/// - Permission bits sit in the same positions as for small pages.
#[bitfield(u32)]
pub struct PteLarge {
    /// Role bits (1:0): **`0b01`** marks a large page.
    #[bits(2, default = 0b01)]
    pub role: u8,
    /// Bits 3:2 — memory-type hints, unused by this core.
    #[bits(2)]
    __res2_3: u8,
    /// AP access-permission field (bits 5:4).
    #[bits(2)]
    ap_bits: u8,
    /// Bits 8:6 — memory-type hints, unused by this core.
    #[bits(3)]
    __res6_8: u8,
    /// **APX** (bit 9): makes the AP composition read-only.
    pub read_only: bool,
    /// Bits 15:10 — shareability and type hints, unused by this core.
    #[bits(6)]
    __res10_15: u8,
    /// Physical page base (bits 31:16, 64 KiB-aligned).
    #[bits(16)]
    page_base_64k: u32,
}

impl PteSmall {
    /// Set the 4 KiB page base (4 KiB-aligned).
    #[inline]
    #[must_use]
    pub const fn with_physical_page(mut self, phys: PhysicalPage<Size4K>) -> Self {
        self.set_physical_page(phys);
        self
    }

    /// Set the 4 KiB page base (4 KiB-aligned).
    #[inline]
    pub const fn set_physical_page(&mut self, phys: PhysicalPage<Size4K>) {
        self.set_page_base_4k(phys.base().as_u32() >> 12);
    }

    /// Get the 4 KiB page base.
    #[inline]
    #[must_use]
    pub const fn physical_page(self) -> PhysicalPage<Size4K> {
        PhysicalPage::from_addr(PhysicalAddress::new(self.page_base_4k() << 12))
    }

    /// Decoded access permissions.
    #[inline]
    #[must_use]
    pub const fn ap(self) -> AccessPermissions {
        AccessPermissions::from_bits(self.ap_bits())
    }

    /// Set the access permissions.
    #[inline]
    #[must_use]
    pub const fn with_ap(self, ap: AccessPermissions) -> Self {
        self.with_ap_bits(ap.into_bits())
    }
}

impl PteLarge {
    /// Get the 64 KiB page base.
    #[inline]
    #[must_use]
    pub const fn physical_page(self) -> PhysicalPage<Size64K> {
        PhysicalPage::from_addr(PhysicalAddress::new(self.page_base_64k() << 16))
    }

    /// Decoded access permissions.
    #[inline]
    #[must_use]
    pub const fn ap(self) -> AccessPermissions {
        AccessPermissions::from_bits(self.ap_bits())
    }
}

/// Index into a second-level table (derived from VA bits `[19:12]`).
///
/// Strongly typed to avoid mixing with the directory index. Range is `0..256`.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct TableIndex(u8);

/// Decoded second-level entry kind.
pub enum PtEntryKind {
    /// 4 KiB leaf.
    Small(PhysicalPage<Size4K>, PteSmall),
    /// 64 KiB leaf.
    Large(PhysicalPage<Size64K>, PteLarge),
}

/// A second-level page table: 256 entries, 1 KiB long and 1 KiB-aligned.
#[doc(alias = "PT")]
#[repr(C, align(1024))]
pub struct PageTable {
    entries: [PtEntry; TABLE_ENTRIES],
}

impl TableIndex {
    /// Build an index from a virtual address (extracts bits `[19:12]`).
    #[inline]
    #[must_use]
    pub const fn from(va: VirtualAddress) -> Self {
        Self::new(((va.as_u32() >> 12) & 0xFF) as u8)
    }

    /// Construct from a raw `u8` (every value is a valid index).
    #[inline]
    #[must_use]
    pub const fn new(v: u8) -> Self {
        Self(v)
    }

    /// Return the index as `usize` for table access.
    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl Default for PtEntry {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl PtEntry {
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self { bits: 0 }
    }

    /// Construct union from raw `bits` (no validation).
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self { bits }
    }

    /// Extract raw `bits` back from the union.
    #[inline]
    #[must_use]
    pub const fn into_bits(self) -> u32 {
        unsafe { self.bits }
    }

    #[inline]
    #[must_use]
    pub const fn present(self) -> bool {
        unsafe { self.bits & PRESENT_MASK != 0 }
    }

    /// Create a zero (non-present) entry.
    #[inline]
    #[must_use]
    pub const fn zero() -> Self {
        Self::new()
    }

    /// Create a present 4 KiB mapping with the given permissions.
    #[inline]
    #[must_use]
    pub const fn small(page: PhysicalPage<Size4K>, perm: PagePermissions) -> Self {
        Self {
            small: PteSmall::new()
                .with_physical_page(page)
                .with_ap(perm.access)
                .with_read_only(perm.read_only),
        }
    }

    /// **Typed read-only view** chosen by the role bits.
    ///
    /// - `0b1x` → [`L2View::Small`]
    /// - `0b01` → [`L2View::Large`]
    #[inline]
    #[must_use]
    pub const fn view(self) -> L2View {
        unsafe {
            if (self.bits & SMALL_BIT) != 0 {
                L2View::Small(self.small)
            } else {
                L2View::Large(self.large)
            }
        }
    }

    /// Decode the entry into its semantic kind, or `None` if not present.
    #[inline]
    #[must_use]
    pub const fn kind(self) -> Option<PtEntryKind> {
        if !self.present() {
            return None;
        }

        Some(match self.view() {
            L2View::Small(entry) => PtEntryKind::Small(entry.physical_page(), entry),
            L2View::Large(entry) => PtEntryKind::Large(entry.physical_page(), entry),
        })
    }

    /// The 4 KiB frame holding the mapped memory, regardless of leaf size.
    #[inline]
    #[must_use]
    pub const fn mapped_frame(self) -> Option<PhysicalPage<Size4K>> {
        match self.kind() {
            None => None,
            Some(PtEntryKind::Small(page, _)) => Some(page),
            Some(PtEntryKind::Large(page, _)) => {
                Some(PhysicalPage::from_addr(page.base()))
            }
        }
    }
}

impl From<PteSmall> for PtEntry {
    #[inline]
    fn from(e: PteSmall) -> Self {
        Self { small: e }
    }
}

impl From<PteLarge> for PtEntry {
    #[inline]
    fn from(e: PteLarge) -> Self {
        Self { large: e }
    }
}

impl PageTable {
    /// Create a fully zeroed table (all entries non-present).
    #[inline]
    #[must_use]
    pub const fn zeroed() -> Self {
        Self {
            entries: [PtEntry::zero(); TABLE_ENTRIES],
        }
    }

    /// Zero out the entire table in place.
    #[inline]
    pub fn zero(&mut self) {
        self.entries = [PtEntry::zero(); TABLE_ENTRIES];
    }

    /// Read the entry at `i`.
    #[inline]
    #[must_use]
    pub const fn get(&self, i: TableIndex) -> PtEntry {
        self.entries[i.as_usize()]
    }

    /// Write the entry at `i`.
    ///
    /// Caller must handle any required TLB invalidation when changing active
    /// mappings.
    #[inline]
    pub const fn set(&mut self, i: TableIndex, e: PtEntry) {
        self.entries[i.as_usize()] = e;
    }

    /// Set the entry at `i` to [`PtEntry::zero`].
    #[inline]
    pub const fn set_zero(&mut self, i: TableIndex) {
        self.set(i, PtEntry::zero());
    }

    /// Mutable access to the slot at `i`.
    #[inline]
    #[must_use]
    pub const fn entry_mut(&mut self, i: TableIndex) -> &mut PtEntry {
        &mut self.entries[i.as_usize()]
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn small_page_bit_layout() {
        let page = PhysicalPage::<Size4K>::from_addr(PhysicalAddress::new(0x0002_0000));
        assert_eq!(
            PtEntry::small(page, PagePermissions::KERNEL).into_bits(),
            0x0002_0012
        );
        assert_eq!(
            PtEntry::small(page, PagePermissions::USER_READ_WRITE).into_bits(),
            0x0002_0032
        );
        assert_eq!(
            PtEntry::small(page, PagePermissions::USER_READ.with_read_only(true)).into_bits(),
            0x0002_0222
        );
    }

    #[test]
    fn small_page_round_trip() {
        let page = PhysicalPage::<Size4K>::from_addr(PhysicalAddress::new(0x0FFF_F000));
        let e = PtEntry::small(page, PagePermissions::USER_READ);
        match e.kind().unwrap() {
            PtEntryKind::Small(p, f) => {
                assert_eq!(p.base().as_u32(), 0x0FFF_F000);
                assert_eq!(f.ap(), AccessPermissions::UserRead);
                assert!(!f.read_only());
            }
            PtEntryKind::Large(..) => panic!("expected a small page"),
        }
    }

    #[test]
    fn large_page_base_mask() {
        let e = PtEntry::from_bits(0x0003_0000 | 0b01);
        match e.kind().unwrap() {
            PtEntryKind::Large(p, _) => assert_eq!(p.base().as_u32(), 0x0003_0000),
            PtEntryKind::Small(..) => panic!("expected a large page"),
        }
        assert_eq!(
            e.mapped_frame().unwrap(),
            PhysicalPage::from_addr(PhysicalAddress::new(0x0003_0000))
        );
    }

    #[test]
    fn zero_is_not_present() {
        assert!(PtEntry::zero().kind().is_none());
        assert!(!PtEntry::zero().present());
    }
}
