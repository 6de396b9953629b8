//! Abstraction layer between the hart core and the machine it runs on.
//!
//! The hart core never touches CSRs directly: everything goes through [`HartCsr`], which is
//! implemented by the bare-metal backend in `arch` and by the in-memory CSR file used in tests.

use riscv::{registers::misa_has_extension, Csr, TrapInfo};

/// Outcome of a guarded CSR access: the value read (or `()` for writes), or the trap that the
/// access raised.
pub type ProbeResult<T = usize> = Result<T, TrapInfo>;

/// Access to the CSR file of the executing hart.
///
/// Guarded accessors (`*_allowed`) never bring the hart down: an access to a register that is
/// not implemented is reported as an `Err` carrying the trap information, and execution resumes
/// right after the faulting instruction. Unguarded accessors must only be used on registers
/// known to exist.
pub trait HartCsr {
    /// Reads `csr`, catching the trap raised if it is not implemented.
    fn read_allowed(&mut self, csr: Csr) -> ProbeResult;

    /// Writes `value` to `csr`, catching the trap raised if it is not implemented or writable.
    ///
    /// A successful probe does modify the register.
    fn write_allowed(&mut self, csr: Csr, value: usize) -> ProbeResult<()>;

    /// Reads `csr`.
    fn read(&mut self, csr: Csr) -> usize;

    /// Writes `value` to `csr`.
    fn write(&mut self, csr: Csr, value: usize);

    /// Atomically writes `value` to `csr`, returning its previous content.
    fn swap(&mut self, csr: Csr, value: usize) -> usize;

    /// Clears all floating-point registers and `fcsr`.
    fn init_fp_regs(&mut self);

    /// Waits for the next interrupt.
    fn wait_for_interrupt(&mut self);

    /// Returns to the mode and address configured in `mstatus` and `mepc`, with `arg0` and
    /// `arg1` in the argument registers.
    ///
    /// # Safety
    ///
    /// The target context must be fully prepared. This function never returns.
    unsafe fn enter(&mut self, arg0: usize, arg1: usize) -> !;

    /// Returns `true` if `misa` advertises the single-letter extension `ext`.
    fn misa_extension(&mut self, ext: char) -> bool {
        misa_has_extension(self.read(Csr::MISA), ext)
    }

    /// Returns the ID of the executing hart.
    fn hart_id(&mut self) -> usize {
        self.read(Csr::MHARTID)
    }
}
