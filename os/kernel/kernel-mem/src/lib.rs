//! # Kernel Memory Bootstrap
//!
//! This crate ties the physical frame pool and the translation-table layer
//! together into the kernel's memory manager, and builds the kernel's first
//! address space during boot.
//!
//! ## Boot flow
//!
//! 1. The entry assembly runs with the statically initialized
//!    [`entry directory`](entry) installed: identity mappings for the first
//!    16 MiB, the same 16 MiB aliased in the high half, and the GPIO window.
//! 2. [`MemoryManager::new`] seeds the frame pool from the boot memory map
//!    and constructs the real kernel directory: 1 MiB sections covering all
//!    of RAM at the high-half alias, the boot stack window, and the GPIO
//!    window, with the stale low-half aliases cleared.
//! 3. `MemoryManager::install` (target only) switches the translation-table
//!    base register to the new directory and puts domain 0 into client mode
//!    so the permission bits actually bite.
//! 4. From then on, [`insert`](MemoryManager::insert) /
//!    [`remove`](MemoryManager::remove) / [`lookup`](MemoryManager::lookup)
//!    manage 4 KiB mappings with reference-count discipline, growing
//!    second-level tables on demand.
//!
//! The boot-time consistency checks of this layer run as the host test
//! suite against a simulated physical RAM; see the crate's test modules.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod entry;
mod manager;

pub use manager::MemoryManager;

#[cfg(test)]
mod checks;
