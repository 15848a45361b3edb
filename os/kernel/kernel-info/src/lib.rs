//! # Kernel Configuration and Boot Interface
//!
//! This crate defines the memory layout constants and the boot handoff
//! contract that govern the kernel's initialization on the 32-bit ARM target.
//! It serves as the authoritative source for system-wide configuration and
//! keeps the entry assembly, the memory core, and the rest of the kernel from
//! drifting apart.
//!
//! ## Architecture
//!
//! The crate is organized into two primary modules:
//!
//! ### Boot Information ([`boot`])
//! Defines the entry-code-to-kernel handoff interface:
//! * **Boot Data Structures**: kernel image extent, boot stack placement,
//!   managed RAM size
//! * **ABI Stability**: C-compatible structures for use from assembly
//!
//! ### Memory Layout ([`memory`])
//! Establishes the kernel's virtual memory architecture:
//! * **Address Space Layout**: the high-half RAM alias, the boot stack
//!   window, and the GPIO MMIO window
//! * **Translation Geometry**: page, table, and directory dimensions of the
//!   two-level short-descriptor format
//! * **Alias Arithmetic**: conversions between physical addresses and their
//!   kernel-virtual aliases
//!
//! ## Virtual Memory Architecture
//!
//! The kernel employs a high-half design; all of physical RAM is aliased at
//! the top of the 32-bit address space:
//!
//! ```text
//! Virtual Address Space Layout (32-bit):
//!
//! 0x0000_0000 ┌─────────────────────────────────┐
//!             │                                 │
//!             │         User Space              │
//!             │   (Applications & Libraries)    │
//!             │                                 │
//! GPIO_BASE   ├─────────────────────────────────┤ 0xEF20_0000
//!             │      GPIO MMIO Window (1 MiB)   │
//!             ├─────────────────────────────────┤
//!             │       Boot Stack Window         │
//! KERNEL_BASE ├─────────────────────────────────┤ 0xF000_0000
//!             │   High-Half RAM Alias (256 MiB) │
//!             │  (Kernel image, frame pool, …)  │
//! 0xFFFF_FFFF └─────────────────────────────────┘
//! ```
//!
//! ### Design Principles
//! * **Fixed Layout**: Compile-time constants enable static optimization
//! * **Direct Alias**: `KERNEL_BASE + pa` reaches any physical byte once the
//!   kernel directory is installed
//! * **Guarded Conversions**: physical↔virtual translation checks its
//!   preconditions instead of silently wrapping
//!
//! ## Physical Memory Layout
//!
//! ```text
//! Physical Memory Layout:
//! 0x0000_0000 ┌─────────────────────────────────┐
//!             │     Zero Frame (reserved)       │
//! KERNEL_LOAD ├─────────────────────────────────┤ 0x0010_0000 (1 MiB)
//!             │       Kernel Image              │
//!             │   (Text, Data, BSS)             │
//!             ├─────────────────────────────────┤ image end (from linker)
//!             │    Available RAM                │
//!             │  (Managed by the frame pool)    │
//! 0x1000_0000 └─────────────────────────────────┘ 256 MiB
//! ```
//!
//! All layout constants are `const` values verified by compile-time
//! assertions; there is no runtime configuration at this layer.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod boot;
pub mod memory;
