//! Special RISC-V instructions.

use core::arch::asm;

/// Halts the hart until the next interrupt arrives.
#[inline]
pub fn wfi() {
    // SAFETY: `wfi` has no side effects
    unsafe {
        asm!("wfi", options(nostack, nomem));
    }
}

/// Returns from M-mode to the mode and address held in `mstatus.MPP` and `mepc`,
/// passing `arg0` and `arg1` in `a0` and `a1`.
///
/// # Safety
///
/// `mstatus` and `mepc` must describe a valid execution context for the target
/// privilege mode. Control never comes back.
#[inline]
pub unsafe fn mret(arg0: usize, arg1: usize) -> ! {
    // SAFETY: assuming the caller has upheld the safety contract
    unsafe {
        asm!(
            "mret",
            in("a0") arg0,
            in("a1") arg1,
            options(noreturn, nostack)
        );
    }
}
