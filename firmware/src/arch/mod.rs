//! Architecture-specific backends.

/// Bare-metal RISC-V backend.
#[cfg(any(target_arch = "riscv32", target_arch = "riscv64"))]
pub mod riscv;
#[cfg(any(target_arch = "riscv32", target_arch = "riscv64"))]
pub use self::riscv::Metal;
