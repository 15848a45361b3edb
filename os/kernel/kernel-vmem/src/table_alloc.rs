//! # Second-Level Table Sub-Allocation
//!
//! A second-level table occupies only a quarter of a frame (256 entries ×
//! 4 bytes = 1 KiB), so handing a whole 4 KiB frame to every table would
//! waste three quarters of it. The [`TableAllocator`] carves frames into
//! 1 KiB slots instead: whenever its cursor sits on a frame boundary it
//! allocates a fresh zeroed frame, pins it, and then deals out four
//! consecutive slots before needing the next frame.
//!
//! The cursor is ordinary state owned by whoever drives the address space —
//! there is no hidden global — which keeps the four-tables-per-frame
//! packing observable and testable.

use crate::{FrameManager, PhysMapper};
use kernel_info::memory::{PAGE_SIZE, TABLE_BYTES};
use kernel_memory_addresses::PhysicalAddress;

/// Carves 4 KiB frames into 1 KiB second-level-table slots.
///
/// Frames handed out for tables are retained once and never released; the
/// translation tables of this kernel live forever.
#[derive(Debug)]
pub struct TableAllocator {
    /// Physical address of the next 1 KiB slot to hand out. On a frame
    /// boundary (including the initial zero) a new frame must be fetched.
    next: PhysicalAddress,
}

impl TableAllocator {
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next: PhysicalAddress::zero(),
        }
    }

    /// Hand out the next 1 KiB table slot, fetching (and zeroing, and
    /// pinning) a fresh frame when the current one is exhausted.
    ///
    /// Returns `None` when no frame can be allocated on a slot boundary.
    pub(crate) fn take_slot<M: PhysMapper, F: FrameManager>(
        &mut self,
        mapper: &M,
        frames: &mut F,
    ) -> Option<PhysicalAddress> {
        if self.next.as_u32() % PAGE_SIZE == 0 {
            let frame = frames.alloc_frame()?;
            // A zeroed frame makes all four tables start out all-invalid.
            let bytes: &mut [u8; PAGE_SIZE as usize] =
                unsafe { mapper.phys_to_mut(frame.base()) };
            bytes.fill(0);
            frames.retain(frame);
            self.next = frame.base();
        }
        let slot = self.next;
        self.next += TABLE_BYTES;
        Some(slot)
    }
}

impl Default for TableAllocator {
    fn default() -> Self {
        Self::new()
    }
}
