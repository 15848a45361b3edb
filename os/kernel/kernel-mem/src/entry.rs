//! # Entry Directory
//!
//! The statically initialized first-level directory the entry assembly
//! installs before any Rust code runs. It maps just enough to get the
//! kernel going:
//!
//! - the first 16 MiB of RAM, identity-mapped with 1 MiB sections (the
//!   kernel image executes from its load address here);
//! - the same 16 MiB aliased at the high half, so the switch to high-half
//!   addresses can happen before the real kernel directory exists;
//! - the GPIO window, for early diagnostics.
//!
//! All sections carry an all-zero AP field. That is fine during early boot:
//! the entry code runs with its domain in manager mode, which bypasses
//! permission checks entirely; `MemoryManager::install` later drops domain 0
//! to client mode together with switching to the kernel directory.
//!
//! The directory is abandoned (not freed — it is part of the image) once
//! the kernel directory is installed.

use kernel_info::memory::{DIRECTORY_SPAN, GPIO_BASE, GPIO_PHYS_BASE, KERNEL_BASE};
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, Size1M};
use kernel_vmem::{DirIndex, PageDirectory, PagePermissions, PdEntry};

/// How much of RAM the entry directory covers (16 sections of 1 MiB).
const ENTRY_SECTIONS: u16 = 16;

/// The first-level directory used between reset and `MemoryManager::install`.
///
/// 16 KiB-aligned by its type, as the translation-table base register
/// requires.
pub static ENTRY_DIRECTORY: PageDirectory = build();

const fn build() -> PageDirectory {
    let mut dir = PageDirectory::zeroed();

    let mut section = 0u16;
    while section < ENTRY_SECTIONS {
        let pa = PhysicalPage::<Size1M>::from_addr(PhysicalAddress::new(
            section as u32 * DIRECTORY_SPAN,
        ));
        // Identity mapping for the running image…
        dir.set(DirIndex::new(section), PdEntry::section(pa, PagePermissions::NONE));
        // …and the same megabyte at its high-half alias.
        dir.set(
            DirIndex::new((KERNEL_BASE / DIRECTORY_SPAN) as u16 + section),
            PdEntry::section(pa, PagePermissions::NONE),
        );
        section += 1;
    }

    dir.set(
        DirIndex::new((GPIO_BASE / DIRECTORY_SPAN) as u16),
        PdEntry::section(
            PhysicalPage::<Size1M>::from_addr(PhysicalAddress::new(GPIO_PHYS_BASE)),
            PagePermissions::NONE,
        ),
    );

    dir
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_vmem::PdEntryKind;

    #[test]
    fn identity_and_high_alias_agree() {
        for section in 0..ENTRY_SECTIONS {
            let low = ENTRY_DIRECTORY.get(DirIndex::new(section));
            let high =
                ENTRY_DIRECTORY.get(DirIndex::new((KERNEL_BASE / DIRECTORY_SPAN) as u16 + section));
            assert_eq!(low.into_bits(), high.into_bits());
            match low.kind().expect("present") {
                PdEntryKind::Section(pa, _) => {
                    assert_eq!(pa.base().as_u32(), u32::from(section) * DIRECTORY_SPAN);
                }
                _ => panic!("expected a section"),
            }
        }
    }

    #[test]
    fn early_sections_match_the_hardware_words() {
        // Section entries with an all-zero AP field: base | 0b10.
        assert_eq!(ENTRY_DIRECTORY.get(DirIndex::new(0)).into_bits(), 0x0000_0002);
        assert_eq!(ENTRY_DIRECTORY.get(DirIndex::new(1)).into_bits(), 0x0010_0002);
        assert_eq!(
            ENTRY_DIRECTORY.get(DirIndex::new(0xF0F)).into_bits(),
            0x00F0_0002
        );
        assert_eq!(
            ENTRY_DIRECTORY
                .get(DirIndex::new((GPIO_BASE / DIRECTORY_SPAN) as u16))
                .into_bits(),
            GPIO_PHYS_BASE | 0x2
        );
    }

    #[test]
    fn everything_else_is_invalid() {
        let gpio = (GPIO_BASE / DIRECTORY_SPAN) as u16;
        let high = (KERNEL_BASE / DIRECTORY_SPAN) as u16;
        for i in 0..4096u16 {
            let mapped = i < ENTRY_SECTIONS
                || (high..high + ENTRY_SECTIONS).contains(&i)
                || i == gpio;
            assert_eq!(ENTRY_DIRECTORY.get(DirIndex::new(i)).present(), mapped);
        }
    }
}
