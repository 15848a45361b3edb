use kernel_info::boot::BootMemoryInfo;
use kernel_info::memory::{FRAME_COUNT, KERNEL_LOAD, PAGE_SHIFT, PAGE_SIZE};
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, Size4K};
use kernel_vmem::{FrameManager, PhysMapper};
use log::debug;

/// Index of a physical frame: frame `i` backs physical address `i * 4096`.
///
/// The descriptor array is the arena; the index is the handle. Free-list
/// links are indices too, so the pool never stores cross-frame pointers.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct FrameIndex(u32);

impl FrameIndex {
    /// The frame backing `page`.
    #[inline]
    #[must_use]
    pub const fn from_page(page: PhysicalPage<Size4K>) -> Self {
        Self(page.base().as_u32() >> PAGE_SHIFT)
    }

    /// The 4 KiB physical page this frame backs.
    #[inline]
    #[must_use]
    pub const fn page(self) -> PhysicalPage<Size4K> {
        PhysicalPage::from_addr(self.base())
    }

    /// Physical base address of this frame.
    #[inline]
    #[must_use]
    pub const fn base(self) -> PhysicalAddress {
        PhysicalAddress::new(self.0 << PAGE_SHIFT)
    }

    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

/// Bookkeeping for one physical frame.
#[derive(Copy, Clone)]
struct FrameDescriptor {
    /// Number of live `(directory, va)` mappings of this frame. Boot
    /// mappings are not counted.
    refcount: u16,
    /// Next frame on the free list; populated only while this descriptor is
    /// free-listed.
    link: Option<FrameIndex>,
}

impl FrameDescriptor {
    const EMPTY: Self = Self {
        refcount: 0,
        link: None,
    };
}

/// The physical frame pool: one descriptor per frame plus an intrusive LIFO
/// free list of frame indices.
///
/// All state is stored inline; no heap is required. The structure is large
/// (one descriptor per possible frame), so on the real machine it lives in a
/// static.
pub struct FrameTable {
    descriptors: [FrameDescriptor; FRAME_COUNT],
    free_head: Option<FrameIndex>,
    /// Number of frames actually managed (`ram_frames` from boot info).
    managed: u32,
}

impl Default for FrameTable {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameTable {
    /// An empty pool; call [`init`](Self::init) before first use.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            descriptors: [FrameDescriptor::EMPTY; FRAME_COUNT],
            free_head: None,
            managed: 0,
        }
    }

    /// Seed the free list from the boot memory map. Called exactly once.
    ///
    /// Walks physical RAM in ascending page strides and free-lists every
    /// frame except the zero frame (it backs the exception vectors) and the
    /// kernel image between [`KERNEL_LOAD`] and `info.image_end`. Because
    /// pushes are LIFO over an ascending walk, frames are subsequently
    /// handed out from the top of RAM downward — a fixed, reproducible
    /// order.
    ///
    /// # Panics
    /// Panics when `info.ram_frames` exceeds the descriptor capacity.
    pub fn init(&mut self, info: &BootMemoryInfo) {
        assert!(
            info.ram_frames as usize <= FRAME_COUNT,
            "boot memory map larger than the descriptor table"
        );
        self.managed = info.ram_frames;

        let mut listed = 0u32;
        for index in 0..info.ram_frames {
            let index = FrameIndex(index);
            let pa = index.base().as_u32();
            if pa == 0 || (KERNEL_LOAD <= pa && pa < info.image_end.as_u32()) {
                continue;
            }
            let descriptor = &mut self.descriptors[index.as_usize()];
            descriptor.refcount = 0;
            descriptor.link = self.free_head;
            self.free_head = Some(index);
            listed += 1;
        }
        debug!(
            "frame pool: {} of {} frames free",
            listed, info.ram_frames
        );
    }

    /// Detach and return the head of the free list, or `None` when RAM is
    /// exhausted. The returned frame has no references and no link.
    pub fn alloc(&mut self) -> Option<FrameIndex> {
        let head = self.free_head?;
        let descriptor = &mut self.descriptors[head.as_usize()];
        self.free_head = descriptor.link;
        descriptor.link = None;
        Some(head)
    }

    /// Like [`alloc`](Self::alloc), but zero-fill the frame through its
    /// kernel-virtual alias before handing it out.
    pub fn alloc_zeroed<M: PhysMapper>(&mut self, mapper: &M) -> Option<FrameIndex> {
        let frame = self.alloc()?;
        let bytes: &mut [u8; PAGE_SIZE as usize] = unsafe { mapper.phys_to_mut(frame.base()) };
        bytes.fill(0);
        Some(frame)
    }

    /// Push `frame` back onto the free list.
    ///
    /// # Panics
    /// Panics when the frame still has live references — freeing mapped
    /// memory is a programming error, not a runtime condition.
    pub fn free(&mut self, frame: FrameIndex) {
        let descriptor = &mut self.descriptors[frame.as_usize()];
        assert!(
            descriptor.refcount == 0,
            "freeing frame {} with {} live references",
            frame.as_usize(),
            descriptor.refcount
        );
        descriptor.link = self.free_head;
        self.free_head = Some(frame);
    }

    /// Record one more live mapping of `frame`.
    ///
    /// # Panics
    /// Panics on reference-count overflow.
    pub fn incref(&mut self, frame: FrameIndex) {
        let descriptor = &mut self.descriptors[frame.as_usize()];
        descriptor.refcount = descriptor
            .refcount
            .checked_add(1)
            .expect("frame reference count overflow");
    }

    /// Drop one live mapping of `frame`; frees it when the last mapping
    /// goes away.
    ///
    /// # Panics
    /// Panics when the frame has no references to drop.
    pub fn decref(&mut self, frame: FrameIndex) {
        let descriptor = &mut self.descriptors[frame.as_usize()];
        assert!(
            descriptor.refcount > 0,
            "dropping a reference to unreferenced frame {}",
            frame.as_usize()
        );
        descriptor.refcount -= 1;
        if descriptor.refcount == 0 {
            self.free(frame);
        }
    }

    /// Current number of live mappings of `frame`.
    #[must_use]
    pub fn refcount(&self, frame: FrameIndex) -> u16 {
        self.descriptors[frame.as_usize()].refcount
    }

    /// Number of frames this pool manages.
    #[must_use]
    pub const fn managed_frames(&self) -> u32 {
        self.managed
    }

    /// Iterate the free list from its head.
    pub fn free_frames(&self) -> FreeFrames<'_> {
        FreeFrames {
            table: self,
            next: self.free_head,
        }
    }

    /// Number of frames currently on the free list.
    #[must_use]
    pub fn free_count(&self) -> usize {
        self.free_frames().count()
    }
}

/// Iterator over the free list, head first.
pub struct FreeFrames<'t> {
    table: &'t FrameTable,
    next: Option<FrameIndex>,
}

impl Iterator for FreeFrames<'_> {
    type Item = FrameIndex;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.table.descriptors[current.as_usize()].link;
        Some(current)
    }
}

impl FrameManager for FrameTable {
    fn alloc_frame(&mut self) -> Option<PhysicalPage<Size4K>> {
        self.alloc().map(FrameIndex::page)
    }

    fn retain(&mut self, frame: PhysicalPage<Size4K>) {
        self.incref(FrameIndex::from_page(frame));
    }

    fn release(&mut self, frame: PhysicalPage<Size4K>) {
        self.decref(FrameIndex::from_page(frame));
    }
}
