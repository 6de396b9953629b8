//! This crate provides RISC-V specific definitions for machine-mode software:
//! CSR numbers, register fields, trap causes and privilege modes, plus thin
//! wrappers around the few special instructions a firmware needs.
//!
//! Definitions are available on every target so that code built on top of them
//! can be tested on the host. Functions executing RISC-V instructions are only
//! available when compiling for a RISC-V target.

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![deny(missing_debug_implementations)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod csr;
#[cfg(any(target_arch = "riscv32", target_arch = "riscv64"))]
pub mod instructions;
pub mod registers;
pub mod trap;

pub use csr::Csr;
pub use trap::{Exception, PrivilegeMode, TrapInfo};

/// Native register width of the target, in bits.
pub const XLEN: u32 = usize::BITS;
