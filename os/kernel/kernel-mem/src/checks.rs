//! Boot-time consistency checks for the memory manager, retained as the
//! host test suite.
//!
//! The rig simulates physical RAM as one contiguous, 16 KiB-aligned buffer;
//! physical addresses are byte offsets into it, and the test `PhysMapper`
//! adds the buffer base exactly like the high-half alias does on the real
//! machine. The first-level directory and the boot stack live inside the
//! simulated "kernel image", so the frame pool never hands them out.

use crate::MemoryManager;
use kernel_info::boot::BootMemoryInfo;
use kernel_info::memory::{
    DIRECTORY_BYTES, DIRECTORY_SPAN, GPIO_BASE, GPIO_PHYS_BASE, KERNEL_BASE, KERNEL_LOAD,
    KERNEL_STACK_SIZE, KERNEL_STACK_TOP, PAGE_SIZE,
};
use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};
use kernel_pmem::{FrameIndex, FrameTable};
use kernel_vmem::{
    AccessPermissions, DirIndex, MapError, PageDirectory, PagePermissions, PdEntryKind,
    PhysMapper, PtEntryKind,
};

/// 4 MiB of simulated RAM.
const RIG_FRAMES: u32 = 1024;

/// The kernel directory sits at the image load address.
const ROOT: u32 = KERNEL_LOAD;

/// The boot stack follows the directory inside the image.
const BOOT_STACK: u32 = KERNEL_LOAD + DIRECTORY_BYTES;

/// Image extent reported to the frame pool.
const IMAGE_END: u32 = BOOT_STACK + KERNEL_STACK_SIZE;

const STACK_INDEX: u16 = ((KERNEL_STACK_TOP - KERNEL_STACK_SIZE) / DIRECTORY_SPAN) as u16;
const GPIO_INDEX: u16 = (GPIO_BASE / DIRECTORY_SPAN) as u16;
const ALIAS_INDEX: u16 = (KERNEL_BASE / DIRECTORY_SPAN) as u16;

#[repr(align(16384))]
struct Aligned16K(#[allow(dead_code)] [u8; 16384]);

/// Contiguous simulated physical RAM.
struct SimRam {
    chunks: Vec<Aligned16K>,
}

impl SimRam {
    fn new() -> Self {
        let count = (RIG_FRAMES as usize) / 4;
        let mut chunks = Vec::with_capacity(count);
        for _ in 0..count {
            chunks.push(Aligned16K([0; 16384]));
        }
        Self { chunks }
    }

    fn base_ptr(&self) -> *mut u8 {
        self.chunks.as_ptr() as *mut u8
    }

    fn directory<'a>(&self) -> &'a PageDirectory {
        unsafe { self.phys_to_mut::<PageDirectory>(PhysicalAddress::new(ROOT)) }
    }

    fn read_u32(&self, pa: PhysicalAddress) -> u32 {
        unsafe { *self.phys_to_mut::<u32>(pa) }
    }

    fn write_u32(&self, pa: PhysicalAddress, value: u32) {
        unsafe {
            *self.phys_to_mut::<u32>(pa) = value;
        }
    }

    fn fill_frame(&self, frame: FrameIndex, byte: u8) {
        let bytes: &mut [u8; PAGE_SIZE as usize] = unsafe { self.phys_to_mut(frame.base()) };
        bytes.fill(byte);
    }
}

impl PhysMapper for SimRam {
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        assert!(
            (pa.as_u32() as usize) < self.chunks.len() * 16384,
            "address {pa} outside simulated RAM"
        );
        unsafe { &mut *self.base_ptr().add(pa.as_u32() as usize).cast::<T>() }
    }
}

fn boot_info() -> BootMemoryInfo {
    BootMemoryInfo {
        ram_frames: RIG_FRAMES,
        image_end: PhysicalAddress::new(IMAGE_END),
        boot_stack: PhysicalAddress::new(BOOT_STACK),
    }
}

fn rig() -> (SimRam, Box<FrameTable>) {
    (SimRam::new(), Box::new(FrameTable::new()))
}

/// Temporarily steal every remaining free frame.
fn drain(manager: &mut MemoryManager<'_, SimRam>) -> Vec<FrameIndex> {
    let mut taken = Vec::new();
    while let Some(frame) = manager.frames_mut().alloc() {
        taken.push(frame);
    }
    taken
}

#[test]
fn free_list_is_well_formed_after_boot() {
    let (phys, mut frames) = rig();
    let manager = MemoryManager::new(&phys, &mut frames, PhysicalAddress::new(ROOT), &boot_info());

    let mut count = 0usize;
    for frame in manager.frames().free_frames() {
        assert_eq!(manager.frames().refcount(frame), 0);
        count += 1;
        assert!(count <= RIG_FRAMES as usize, "free list cycles");
    }
    assert!(count > 0);
}

#[test]
fn kernel_directory_has_the_boot_layout() {
    let (phys, mut frames) = rig();
    let _manager = MemoryManager::new(&phys, &mut frames, PhysicalAddress::new(ROOT), &boot_info());

    let dir = phys.directory();
    for i in 0..4096u16 {
        let entry = dir.get(DirIndex::new(i));
        match i {
            STACK_INDEX | GPIO_INDEX => assert!(entry.present(), "entry {i:#X} missing"),
            _ if i >= ALIAS_INDEX => match entry.kind().expect("alias section missing") {
                PdEntryKind::Section(pa, flags) => {
                    assert_eq!(pa.base().as_u32(), u32::from(i - ALIAS_INDEX) * DIRECTORY_SPAN);
                    assert_eq!(flags.ap(), AccessPermissions::KernelOnly);
                }
                _ => panic!("alias entry {i:#X} is not a section"),
            },
            _ => assert_eq!(entry.into_bits(), 0, "stray low-half entry {i:#X}"),
        }
    }
}

#[test]
fn high_half_alias_translates_to_physical_ram() {
    let (phys, mut frames) = rig();
    let manager = MemoryManager::new(&phys, &mut frames, PhysicalAddress::new(ROOT), &boot_info());

    for offset in (0..PAGE_SIZE * 16).step_by(PAGE_SIZE as usize) {
        assert_eq!(
            manager.query(VirtualAddress::new(KERNEL_BASE + offset)),
            Some(PhysicalAddress::new(offset))
        );
    }
    // A probe deep in the alias window, with a byte offset.
    assert_eq!(
        manager.query(VirtualAddress::new(KERNEL_BASE + 0x0123_4567)),
        Some(PhysicalAddress::new(0x0123_4567))
    );
    // The GPIO window.
    assert_eq!(
        manager.query(VirtualAddress::new(GPIO_BASE + 0x42)),
        Some(PhysicalAddress::new(GPIO_PHYS_BASE + 0x42))
    );
    // The stack window maps the (section-aligned) boot stack.
    assert_eq!(
        manager.query(VirtualAddress::new(KERNEL_STACK_TOP - 4)),
        Some(PhysicalAddress::new(
            (BOOT_STACK & !(DIRECTORY_SPAN - 1)) + DIRECTORY_SPAN - 4
        ))
    );
    // Below the stack section nothing is mapped.
    assert_eq!(
        manager.query(VirtualAddress::new(
            KERNEL_STACK_TOP - KERNEL_STACK_SIZE - DIRECTORY_SPAN
        )),
        None
    );
}

#[test]
fn allocator_survives_exhaustion_and_reuse() {
    let (phys, mut frames) = rig();
    let mut manager =
        MemoryManager::new(&phys, &mut frames, PhysicalAddress::new(ROOT), &boot_info());

    let p0 = manager.frames_mut().alloc().expect("first frame");
    let p1 = manager.frames_mut().alloc().expect("second frame");
    let p2 = manager.frames_mut().alloc().expect("third frame");
    assert_ne!(p0, p1);
    assert_ne!(p1, p2);
    assert_ne!(p0, p2);

    let rest = drain(&mut manager);
    assert!(manager.frames_mut().alloc().is_none());

    manager.frames_mut().free(p0);
    manager.frames_mut().free(p1);
    manager.frames_mut().free(p2);
    let r0 = manager.frames_mut().alloc().expect("re-allocation");
    let r1 = manager.frames_mut().alloc().expect("re-allocation");
    let r2 = manager.frames_mut().alloc().expect("re-allocation");
    assert_ne!(r0, r1);
    assert_ne!(r1, r2);
    assert!(manager.frames_mut().alloc().is_none());

    for frame in [r0, r1, r2].into_iter().chain(rest) {
        manager.frames_mut().free(frame);
    }
}

/// The mapping state machine: out-of-memory inserts, table reuse,
/// permission refreshes, replacement accounting, and removal.
#[test]
fn mapping_state_machine() {
    let (phys, mut frames) = rig();
    let mut manager =
        MemoryManager::new(&phys, &mut frames, PhysicalAddress::new(ROOT), &boot_info());

    let va0 = VirtualAddress::zero();
    let va1 = VirtualAddress::new(PAGE_SIZE);

    let p0 = manager.frames_mut().alloc().expect("frame");
    let p1 = manager.frames_mut().alloc().expect("frame");
    let p2 = manager.frames_mut().alloc().expect("frame");
    let _rest = drain(&mut manager);

    // Nothing is mapped at zero, and without free memory no second-level
    // table can appear.
    assert!(manager.lookup(va0).is_none());
    assert_eq!(
        manager.insert(p1, va0, PagePermissions::KERNEL),
        Err(MapError::OutOfMemory)
    );

    // Hand back one frame; it becomes the second-level table.
    manager.frames_mut().free(p0);
    manager
        .insert(p1, va0, PagePermissions::KERNEL)
        .expect("insert after free");
    match phys.directory().get(DirIndex::new(0)).kind().expect("PDE") {
        PdEntryKind::CoarseTable(table, _) => {
            assert_eq!(table, p0.base(), "table not carved from p0");
        }
        _ => panic!("expected a coarse pointer at slot zero"),
    }
    assert_eq!(manager.query(va0), Some(p1.base()));
    assert_eq!(manager.frames().refcount(p0), 1);
    assert_eq!(manager.frames().refcount(p1), 1);
    let (found, _) = manager.lookup(va0).expect("lookup");
    assert_eq!(found, p1);

    // The next page shares p0's table; no extra memory is needed.
    manager
        .insert(p2, va1, PagePermissions::KERNEL)
        .expect("insert in the same table");
    assert_eq!(manager.query(va1), Some(p2.base()));
    assert_eq!(manager.frames().refcount(p2), 1);
    assert!(manager.frames_mut().alloc().is_none());

    // Re-inserting the same frame refreshes permissions without touching
    // the count or freeing anything.
    manager
        .insert(p2, va1, PagePermissions::USER_READ_WRITE)
        .expect("permission refresh");
    assert_eq!(manager.query(va1), Some(p2.base()));
    assert_eq!(manager.frames().refcount(p2), 1);
    assert!(manager.frames_mut().alloc().is_none());
    {
        let (_, slot) = manager.lookup(va1).expect("slot");
        match slot.kind().expect("present") {
            PtEntryKind::Small(_, flags) => {
                assert_eq!(flags.ap(), AccessPermissions::UserReadWrite);
            }
            PtEntryKind::Large(..) => panic!("expected a small page"),
        }
    }

    // Replacing p2 with p1 releases p2 and double-counts p1.
    manager
        .insert(p1, va1, PagePermissions::KERNEL)
        .expect("replacement");
    assert_eq!(manager.query(va0), Some(p1.base()));
    assert_eq!(manager.query(va1), Some(p1.base()));
    assert_eq!(manager.frames().refcount(p1), 2);
    assert_eq!(manager.frames().refcount(p2), 0);
    assert_eq!(manager.frames_mut().alloc(), Some(p2));

    // Unmapping at zero keeps the other mapping alive…
    manager.remove(va0);
    assert_eq!(manager.query(va0), None);
    assert_eq!(manager.query(va1), Some(p1.base()));
    assert_eq!(manager.frames().refcount(p1), 1);

    // …and dropping the last mapping frees the frame for re-use.
    manager.remove(va1);
    assert_eq!(manager.query(va1), None);
    assert_eq!(manager.frames().refcount(p1), 0);
    assert_eq!(manager.frames_mut().alloc(), Some(p1));
}

/// Four inserts into four fresh 1 MiB slots consume exactly one frame for
/// tables: the sub-allocator packs four 1 KiB tables per frame.
#[test]
fn second_level_tables_pack_four_per_frame() {
    let (phys, mut frames) = rig();
    let mut manager =
        MemoryManager::new(&phys, &mut frames, PhysicalAddress::new(ROOT), &boot_info());

    let before = manager.frames().free_count();

    for mib in 0..4u32 {
        let frame = manager.frames_mut().alloc().expect("frame");
        manager
            .insert(
                frame,
                VirtualAddress::new(mib * DIRECTORY_SPAN),
                PagePermissions::KERNEL,
            )
            .expect("insert");
    }

    // Four mapped frames plus a single table frame.
    assert_eq!(manager.frames().free_count(), before - 5);

    // A fifth megabyte needs a second table frame.
    let frame = manager.frames_mut().alloc().expect("frame");
    manager
        .insert(
            frame,
            VirtualAddress::new(4 * DIRECTORY_SPAN),
            PagePermissions::KERNEL,
        )
        .expect("insert");
    assert_eq!(manager.frames().free_count(), before - 7);
}

/// The simulated rendition of the installed-directory check: data written
/// through a translated address shows up at the frame's kernel alias.
#[test]
fn mappings_are_coherent_with_the_frame_contents() {
    let (phys, mut frames) = rig();
    let mut manager =
        MemoryManager::new(&phys, &mut frames, PhysicalAddress::new(ROOT), &boot_info());

    let va = VirtualAddress::new(PAGE_SIZE);

    let p0 = manager.frames_mut().alloc().expect("frame");
    let p1 = manager.frames_mut().alloc().expect("frame");
    let p2 = manager.frames_mut().alloc().expect("frame");
    manager.frames_mut().free(p0); // becomes the second-level table

    phys.fill_frame(p1, 0x01);
    phys.fill_frame(p2, 0x02);

    manager
        .insert(p1, va, PagePermissions::KERNEL)
        .expect("insert");
    assert_eq!(manager.frames().refcount(p1), 1);
    let translated = manager.query(va).expect("mapped");
    assert_eq!(phys.read_u32(translated), 0x0101_0101);

    manager
        .insert(p2, va, PagePermissions::KERNEL)
        .expect("replacement");
    let translated = manager.query(va).expect("mapped");
    assert_eq!(phys.read_u32(translated), 0x0202_0202);
    assert_eq!(manager.frames().refcount(p2), 1);
    assert_eq!(manager.frames().refcount(p1), 0);

    // A store through the mapping lands in p2's frame.
    phys.write_u32(translated, 0x0303_0303);
    assert_eq!(phys.read_u32(p2.base()), 0x0303_0303);

    manager.remove(va);
    assert_eq!(manager.frames().refcount(p2), 0);
}
