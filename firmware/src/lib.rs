//! rvsbi is the hart core of a RISC-V machine-mode firmware.
//!
//! It runs below the operating system or hypervisor and takes care of everything a hart needs
//! before leaving M-mode for good: discovering which optional CSRs the silicon implements,
//! programming physical memory protection for the boot domain, delegating traps to S-mode and
//! finally switching to the next privilege level.
//!
//! All hardware accesses go through the [`hal::HartCsr`] trait, so the whole core can be
//! exercised on the host against an in-memory CSR file.

// Freestanding, except for the host test harness
#![cfg_attr(not(test), no_std)]
// Keep things clean and tidy
#![warn(missing_docs)]
#![warn(clippy::missing_safety_doc)]
#![warn(clippy::undocumented_unsafe_blocks)]
#![deny(unsafe_op_in_unsafe_fn)]

#[macro_use]
pub mod macros;

pub mod arch;
pub mod config;
pub mod console;
pub mod domain;
pub mod hal;
pub mod hart;
pub mod panic;
pub mod scratch;

#[cfg(test)]
pub(crate) mod testing;
