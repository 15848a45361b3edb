//! # Physical Frame Pool
//!
//! This crate provides the physical memory manager of the kernel: one
//! descriptor per 4 KiB frame of RAM, an intrusive free list threaded
//! through those descriptors, and the mapping reference counts that tie the
//! frame pool to the translation tables.
//!
//! ## Architecture Overview
//!
//! The memory management system is built on a three-layer architecture:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │              Address Space (kernel-vmem)            │
//! │    • Translation-table manipulation                 │
//! │    • insert / lookup / remove with refcounts        │
//! └─────────────────┬───────────────────────────────────┘
//!                   │ FrameManager + PhysMapper
//! ┌─────────────────▼───────────────────────────────────┐
//! │              Physical Mapper                        │
//! │    • Physical-to-virtual address translation        │
//! │    • High-half RAM alias                            │
//! └─────────────────┬───────────────────────────────────┘
//! ┌─────────────────▼───────────────────────────────────┐
//! │           Physical Frame Pool (this crate)          │
//! │    • 4 KiB frame descriptors with refcounts         │
//! │    • Index-linked LIFO free list                    │
//! │    • No-heap allocation strategy                    │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Invariants
//!
//! The descriptor state machine is small but unforgiving:
//!
//! - A descriptor with `refcount == 0` is either on the free list or
//!   entirely unreferenced by any translation table.
//! - A descriptor with `refcount > 0` is **never** on the free list.
//! - The free-list link is populated only while the descriptor sits on the
//!   free list.
//!
//! Violations are programming errors and fault loudly: freeing a frame that
//! still has live mappings panics rather than corrupting the pool.
//!
//! ## Usage Example
//! ```rust
//! use kernel_info::boot::BootMemoryInfo;
//! use kernel_memory_addresses::PhysicalAddress;
//! use kernel_pmem::FrameTable;
//!
//! let mut frames = Box::new(FrameTable::new());
//! frames.init(&BootMemoryInfo {
//!     ram_frames: 1024,
//!     image_end: PhysicalAddress::new(0x0012_0000),
//!     boot_stack: PhysicalAddress::new(0x0011_0000),
//! });
//! let frame = frames.alloc().unwrap();
//! frames.free(frame);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod frame_table;
mod phys_mapper;

pub use frame_table::{FrameIndex, FrameTable};
pub use phys_mapper::HighHalfMapper;
