//! # ARMv7 First-Level Directory (PDE level)
//!
//! This module models the first paging level:
//!
//! - [`DirIndex`]: index type for virtual-address bits `[31:20]`.
//! - [`PdEntry`]: a first-level entry that is either a *coarse pointer* to a
//!   second-level table, a 1 MiB *section* leaf, or a 16 MiB *supersection*
//!   leaf.
//! - [`PdEntryKind`]: decoded view of an entry.
//! - [`PageDirectory`]: a 16 KiB-aligned array of 4096 first-level entries.
//!
//! ## Semantics
//!
//! The low two bits of an entry select its role:
//! - `0b00`: invalid, no mapping.
//! - `0b01`: coarse pointer; bits `[31:10]` hold the 1 KiB-aligned physical
//!   base of a second-level table.
//! - `0b10`: section; bits `[31:20]` hold a 1 MiB-aligned physical base, and
//!   bit 18 upgrades the entry to a 16 MiB supersection.
//!
//! ## Invariants & Notes
//!
//! - [`PageDirectory`] is 16 KiB-aligned and contains exactly 4096 entries
//!   (the hardware requires the alignment to equal the table size).
//! - Raw constructors don't validate consistency; callers must ensure
//!   correctness.
//! - TLB maintenance is the caller's responsibility after mutating active
//!   mappings.

use crate::permissions::{AccessPermissions, PagePermissions};
use bitfield_struct::bitfield;
use kernel_info::memory::DIRECTORY_ENTRIES;
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, Size1M, Size16M, VirtualAddress};

/// Either of the low two role bits set means "present".
const PRESENT_MASK: u32 = 0b11;

/// Coarse-pointer role bit.
const COARSE_BITS: u32 = 0b01;

/// **Borrowed view** into a first-level entry.
///
/// Returned by [`PdEntry::view`].
pub enum L1View {
    /// Non-leaf PDE view (coarse pointer to a second-level table).
    Coarse(PdeCoarse),
    /// Section / supersection leaf view.
    Section(PdeSection),
}

/// **First-level entry union** — overlays the non-leaf [`PdeCoarse`] and the
/// leaf [`PdeSection`] on the same 32-bit storage.
///
/// Prefer [`PdEntry::view`] or [`PdEntry::kind`] for safe typed access.
/// These check the role bits and hand you the correct variant.
#[derive(Copy, Clone)]
#[repr(C)]
pub union PdEntry {
    /// Raw 32-bit storage of the entry.
    bits: u32,
    /// Non-leaf form: coarse pointer to a second-level table.
    coarse: PdeCoarse,
    /// Leaf form: 1 MiB section or 16 MiB supersection.
    section: PdeSection,
}

/// **Coarse PDE** — pointer to a second-level **page table** (non-leaf).
///
/// - Physical address (bits **31:10**) is a 1 KiB-aligned second-level table;
///   masking with `!0x3FF` recovers it from the raw word.
/// - The domain tag selects the two-bit field of the domain access-control
///   register that arbitrates accesses through this entry.
#[bitfield(u32)]
pub struct PdeCoarse {
    /// Role bits (1:0): **must be `0b01`** for a coarse pointer.
    #[bits(2, default = 0b01)]
    pub role: u8,
    /// Bits 4:2 — should be zero.
    #[bits(3)]
    __res2_4: u8,
    /// Domain tag (bits 8:5). This kernel keeps everything in domain 0.
    #[bits(4)]
    pub domain: u8,
    /// Bit 9 — implementation defined.
    __imp: bool,
    /// **Second-level table physical address** (bits 31:10, 1 KiB-aligned).
    #[bits(22)]
    table_base_1k: u32,
}

/// **Section PDE (leaf)** — maps 1 MiB directly (16 MiB with the
/// supersection bit).
///
/// - Physical base uses bits **31:20** and must be **1 MiB aligned** (the
///   hardware ignores the low bits of whatever is written).
/// - `AP` (bits 11:10) and `APX` (bit 15) carry the access permissions.
#[bitfield(u32)]
pub struct PdeSection {
    /// Role bits (1:0): **must be `0b10`** for a section.
    #[bits(2, default = 0b10)]
    pub role: u8,
    /// Bits 4:2 — memory-type hints, unused by this core.
    #[bits(3)]
    __res2_4: u8,
    /// Domain tag (bits 8:5). This kernel keeps everything in domain 0.
    #[bits(4)]
    pub domain: u8,
    /// Bit 9 — implementation defined.
    __imp: bool,
    /// AP access-permission field (bits 11:10).
    #[bits(2)]
    ap_bits: u8,
    /// Bits 14:12 — memory-type hints, unused by this core.
    #[bits(3)]
    __res12_14: u8,
    /// **APX** (bit 15): makes the AP composition read-only.
    pub read_only: bool,
    /// Bits 17:16 — shareability hints, unused by this core.
    #[bits(2)]
    __res16_17: u8,
    /// **Supersection** (bit 18): the entry maps 16 MiB instead of 1 MiB.
    pub supersection: bool,
    /// Bit 19 — non-secure, unused by this core.
    __res19: bool,
    /// Physical section base (bits 31:20, 1 MiB-aligned).
    #[bits(12)]
    section_base_1m: u32,
}

impl PdeCoarse {
    /// Set the second-level table base (1 KiB-aligned).
    #[inline]
    #[must_use]
    pub const fn with_table_phys(mut self, phys: PhysicalAddress) -> Self {
        self.set_table_phys(phys);
        self
    }

    /// Set the second-level table base (1 KiB-aligned).
    #[inline]
    pub const fn set_table_phys(&mut self, phys: PhysicalAddress) {
        debug_assert!(phys.as_u32() & 0x3FF == 0, "table base must be 1K-aligned");
        self.set_table_base_1k(phys.as_u32() >> 10);
    }

    /// Get the second-level table base.
    #[inline]
    #[must_use]
    pub const fn table_phys(self) -> PhysicalAddress {
        PhysicalAddress::new(self.table_base_1k() << 10)
    }
}

impl PdeSection {
    /// Set the section base (aligns down to 1 MiB, as the hardware would).
    #[inline]
    #[must_use]
    pub const fn with_physical_page(mut self, phys: PhysicalPage<Size1M>) -> Self {
        self.set_physical_page(phys);
        self
    }

    /// Set the section base (1 MiB-aligned).
    #[inline]
    pub const fn set_physical_page(&mut self, phys: PhysicalPage<Size1M>) {
        self.set_section_base_1m(phys.base().as_u32() >> 20);
    }

    /// Get the section base.
    #[inline]
    #[must_use]
    pub const fn physical_page(self) -> PhysicalPage<Size1M> {
        PhysicalPage::from_addr(PhysicalAddress::new(self.section_base_1m() << 20))
    }

    /// Get the supersection base (bits 31:24).
    #[inline]
    #[must_use]
    pub const fn physical_supersection(self) -> PhysicalPage<Size16M> {
        PhysicalPage::from_addr(PhysicalAddress::new(self.section_base_1m() << 20))
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

/// Index into the first-level directory (derived from VA bits `[31:20]`).
///
/// Strongly typed to avoid mixing with the second-level index. Range is
/// `0..4096` (checked in debug builds).
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct DirIndex(u16);

/// Decoded first-level entry kind.
///
/// - [`CoarseTable`](PdEntryKind::CoarseTable): non-leaf, carries the
///   1 KiB-aligned second-level table base.
/// - [`Section`](PdEntryKind::Section): 1 MiB leaf.
/// - [`Supersection`](PdEntryKind::Supersection): 16 MiB leaf.
pub enum PdEntryKind {
    CoarseTable(PhysicalAddress, PdeCoarse),
    Section(PhysicalPage<Size1M>, PdeSection),
    Supersection(PhysicalPage<Size16M>, PdeSection),
}

/// The first-level directory: 4096 entries, 16 KiB-aligned.
#[doc(alias = "PD")]
#[repr(C, align(16384))]
pub struct PageDirectory {
    entries: [PdEntry; DIRECTORY_ENTRIES],
}

impl DirIndex {
    /// Build an index from a virtual address (extracts bits `[31:20]`).
    ///
    /// Returns a value in `0..4096`.
    #[inline]
    #[must_use]
    pub const fn from(va: VirtualAddress) -> Self {
        Self::new((va.as_u32() >> 20) as u16)
    }

    /// Construct from a raw `u16`.
    ///
    /// ### Debug assertions
    /// - Asserts `v < 4096` in debug builds.
    #[inline]
    #[must_use]
    pub const fn new(v: u16) -> Self {
        debug_assert!((v as usize) < DIRECTORY_ENTRIES);
        Self(v)
    }

    /// Return the index as `usize` for table access.
    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl Default for PdEntry {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl PdEntry {
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

    /// Create a coarse pointer to a 1 KiB-aligned second-level table.
    #[inline]
    #[must_use]
    pub const fn coarse(table: PhysicalAddress) -> Self {
        Self {
            coarse: PdeCoarse::new().with_table_phys(table),
        }
    }

    /// Create a 1 MiB section leaf with the given permissions.
    #[inline]
    #[must_use]
    pub const fn section(page: PhysicalPage<Size1M>, perm: PagePermissions) -> Self {
        Self {
            section: PdeSection::new()
                .with_physical_page(page)
                .with_ap(perm.access)
                .with_read_only(perm.read_only),
        }
    }

    /// **Typed read-only view** chosen by the role bits.
    ///
    /// - `0b01` → [`L1View::Coarse`]
    /// - `0b10` / `0b11` → [`L1View::Section`]
    #[inline]
    #[must_use]
    pub const fn view(self) -> L1View {
        unsafe {
            if (self.bits & PRESENT_MASK) == COARSE_BITS {
                L1View::Coarse(self.coarse)
            } else {
                L1View::Section(self.section)
            }
        }
    }

    /// Decode the entry into its semantic kind, or `None` if not present.
    #[inline]
    #[must_use]
    pub const fn kind(self) -> Option<PdEntryKind> {
        if !self.present() {
            return None;
        }

        Some(match self.view() {
            L1View::Coarse(entry) => PdEntryKind::CoarseTable(entry.table_phys(), entry),
            L1View::Section(entry) => {
                if entry.supersection() {
                    PdEntryKind::Supersection(entry.physical_supersection(), entry)
                } else {
                    PdEntryKind::Section(entry.physical_page(), entry)
                }
            }
        })
    }
}

impl From<PdeCoarse> for PdEntry {
    #[inline]
    fn from(e: PdeCoarse) -> Self {
        Self { coarse: e }
    }
}

impl From<PdeSection> for PdEntry {
    #[inline]
    fn from(e: PdeSection) -> Self {
        Self { section: e }
    }
}

impl PageDirectory {
    /// Create a fully zeroed directory (all entries non-present).
    #[inline]
    #[must_use]
    pub const fn zeroed() -> Self {
        Self {
            entries: [PdEntry::zero(); DIRECTORY_ENTRIES],
        }
    }

    /// Zero out the entire directory in place.
    #[inline]
    pub fn zero(&mut self) {
        self.entries = [PdEntry::zero(); DIRECTORY_ENTRIES];
    }

    /// Read the entry at `i`.
    ///
    /// Plain load; does not imply any TLB synchronization.
    #[inline]
    #[must_use]
    pub const fn get(&self, i: DirIndex) -> PdEntry {
        self.entries[i.as_usize()]
    }

    /// Write the entry at `i`.
    ///
    /// Caller must handle any required TLB invalidation when changing active
    /// mappings.
    #[inline]
    pub const fn set(&mut self, i: DirIndex, e: PdEntry) {
        self.entries[i.as_usize()] = e;
    }

    /// Set the entry at `i` to [`PdEntry::zero`].
    #[inline]
    pub const fn set_zero(&mut self, i: DirIndex) {
        self.set(i, PdEntry::zero());
    }

    /// Derive the directory index from a virtual address.
    #[inline]
    #[must_use]
    pub const fn index_of(va: VirtualAddress) -> DirIndex {
        DirIndex::from(va)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn coarse_vs_section() {
        let tbl = PhysicalAddress::new(0x0002_0400);
        let e_tbl = PdEntry::coarse(tbl);
        assert_eq!(e_tbl.into_bits(), 0x0002_0401);
        match e_tbl.kind().unwrap() {
            PdEntryKind::CoarseTable(p, _) => assert_eq!(p.as_u32(), 0x0002_0400),
            _ => panic!("expected a coarse pointer"),
        }

        let m1 = PhysicalPage::<Size1M>::from_addr(PhysicalAddress::new(0x0010_0000));
        let e_1m = PdEntry::section(m1, PagePermissions::KERNEL);
        assert_eq!(e_1m.into_bits(), 0x0010_0402);
        match e_1m.kind().unwrap() {
            PdEntryKind::Section(p, f) => {
                assert_eq!(p.base().as_u32(), 0x0010_0000);
                assert_eq!(f.ap(), AccessPermissions::KernelOnly);
            }
            _ => panic!("expected a section"),
        }
    }

    #[test]
    fn supersection_bit_upgrades_the_leaf() {
        let raw = PdEntry::from_bits(0x0700_0002 | 1 << 18);
        match raw.kind().unwrap() {
            PdEntryKind::Supersection(p, _) => assert_eq!(p.base().as_u32(), 0x0700_0000),
            _ => panic!("expected a supersection"),
        }
    }

    #[test]
    fn coarse_base_mask_ignores_the_low_bits() {
        // A coarse entry with the domain tag set still decodes the table
        // base as bits 31:10.
        let e = PdEntry::from_bits(0x0002_0400 | 0b0001 << 5 | 0b01);
        match e.kind().unwrap() {
            PdEntryKind::CoarseTable(p, f) => {
                assert_eq!(p.as_u32(), 0x0002_0400);
                assert_eq!(f.domain(), 1);
            }
            _ => panic!("expected a coarse pointer"),
        }
    }

    #[test]
    fn zero_is_not_present() {
        assert!(PdEntry::zero().kind().is_none());
        assert!(!PdEntry::zero().present());
    }
}
