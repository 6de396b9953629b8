//! Bare-metal RISC-V backend, running in M-mode.

#[cfg(target_feature = "f")]
use core::arch::asm;

use riscv::{instructions, registers::misa_has_extension, Csr, TrapInfo};

use crate::hal::{HartCsr, ProbeResult};

mod csr;

extern "C" {
    // Defined in expected_trap.S
    fn expected_trap();
    fn expected_trap_hext();
}

/// CSR access to the executing hart.
///
/// A `Metal` instance must only be used on the hart that created it.
#[derive(Debug)]
pub struct Metal {
    expected_trap: usize,
}

impl Metal {
    /// Creates the backend for the executing hart.
    ///
    /// The expected-trap handler used by guarded accesses is chosen here: harts implementing the
    /// H extension also record `mtval2` and `mtinst`.
    ///
    /// # Safety
    ///
    /// Must be called in M-mode, with M-mode interrupts disabled for as long as guarded accesses
    /// are performed.
    pub unsafe fn new() -> Self {
        let mut slf = Self {
            expected_trap: expected_trap as *const () as usize,
        };
        if misa_has_extension(slf.read(Csr::MISA), 'H') {
            slf.expected_trap = expected_trap_hext as *const () as usize;
        }
        slf
    }
}

impl HartCsr for Metal {
    fn read_allowed(&mut self, csr: Csr) -> ProbeResult {
        let mut trap = TrapInfo::default();

        // SAFETY: `expected_trap` is a valid handler and interrupts are disabled per `new`
        match unsafe { csr::read_allowed(csr.number(), &mut trap, self.expected_trap) } {
            Some(_) if trap.trapped() => Err(trap),
            Some(value) => Ok(value),
            None => Err(TrapInfo::illegal_instruction(0, csr.number() as usize)),
        }
    }

    fn write_allowed(&mut self, csr: Csr, value: usize) -> ProbeResult<()> {
        let mut trap = TrapInfo::default();

        // SAFETY: `expected_trap` is a valid handler and interrupts are disabled per `new`
        match unsafe { csr::write_allowed(csr.number(), &mut trap, self.expected_trap, value) } {
            Some(()) if trap.trapped() => Err(trap),
            Some(()) => Ok(()),
            None => Err(TrapInfo::illegal_instruction(0, csr.number() as usize)),
        }
    }

    fn read(&mut self, csr: Csr) -> usize {
        // SAFETY: callers only use unguarded reads on implemented registers
        match unsafe { csr::read(csr.number()) } {
            Some(value) => value,
            None => panic!("no accessor for {:?}", csr),
        }
    }

    fn write(&mut self, csr: Csr, value: usize) {
        // SAFETY: callers only use unguarded writes on implemented registers
        if unsafe { csr::write(csr.number(), value) }.is_none() {
            panic!("no accessor for {:?}", csr);
        }
    }

    fn swap(&mut self, csr: Csr, value: usize) -> usize {
        // SAFETY: callers only use unguarded swaps on implemented registers
        match unsafe { csr::swap(csr.number(), value) } {
            Some(old) => old,
            None => panic!("no accessor for {:?}", csr),
        }
    }

    fn init_fp_regs(&mut self) {
        #[cfg(target_feature = "d")]
        // SAFETY: nothing lives in FP registers this early
        unsafe {
            asm!(
                "fmv.d.x f0, zero", "fmv.d.x f1, zero", "fmv.d.x f2, zero", "fmv.d.x f3, zero",
                "fmv.d.x f4, zero", "fmv.d.x f5, zero", "fmv.d.x f6, zero", "fmv.d.x f7, zero",
                "fmv.d.x f8, zero", "fmv.d.x f9, zero", "fmv.d.x f10, zero", "fmv.d.x f11, zero",
                "fmv.d.x f12, zero", "fmv.d.x f13, zero", "fmv.d.x f14, zero", "fmv.d.x f15, zero",
                "fmv.d.x f16, zero", "fmv.d.x f17, zero", "fmv.d.x f18, zero", "fmv.d.x f19, zero",
                "fmv.d.x f20, zero", "fmv.d.x f21, zero", "fmv.d.x f22, zero", "fmv.d.x f23, zero",
                "fmv.d.x f24, zero", "fmv.d.x f25, zero", "fmv.d.x f26, zero", "fmv.d.x f27, zero",
                "fmv.d.x f28, zero", "fmv.d.x f29, zero", "fmv.d.x f30, zero", "fmv.d.x f31, zero",
                out("f0") _, out("f1") _, out("f2") _, out("f3") _,
                out("f4") _, out("f5") _, out("f6") _, out("f7") _,
                out("f8") _, out("f9") _, out("f10") _, out("f11") _,
                out("f12") _, out("f13") _, out("f14") _, out("f15") _,
                out("f16") _, out("f17") _, out("f18") _, out("f19") _,
                out("f20") _, out("f21") _, out("f22") _, out("f23") _,
                out("f24") _, out("f25") _, out("f26") _, out("f27") _,
                out("f28") _, out("f29") _, out("f30") _, out("f31") _,
                options(nostack, nomem)
            );
        }

        #[cfg(all(target_feature = "f", not(target_feature = "d")))]
        // SAFETY: nothing lives in FP registers this early
        unsafe {
            asm!(
                "fmv.w.x f0, zero", "fmv.w.x f1, zero", "fmv.w.x f2, zero", "fmv.w.x f3, zero",
                "fmv.w.x f4, zero", "fmv.w.x f5, zero", "fmv.w.x f6, zero", "fmv.w.x f7, zero",
                "fmv.w.x f8, zero", "fmv.w.x f9, zero", "fmv.w.x f10, zero", "fmv.w.x f11, zero",
                "fmv.w.x f12, zero", "fmv.w.x f13, zero", "fmv.w.x f14, zero", "fmv.w.x f15, zero",
                "fmv.w.x f16, zero", "fmv.w.x f17, zero", "fmv.w.x f18, zero", "fmv.w.x f19, zero",
                "fmv.w.x f20, zero", "fmv.w.x f21, zero", "fmv.w.x f22, zero", "fmv.w.x f23, zero",
                "fmv.w.x f24, zero", "fmv.w.x f25, zero", "fmv.w.x f26, zero", "fmv.w.x f27, zero",
                "fmv.w.x f28, zero", "fmv.w.x f29, zero", "fmv.w.x f30, zero", "fmv.w.x f31, zero",
                out("f0") _, out("f1") _, out("f2") _, out("f3") _,
                out("f4") _, out("f5") _, out("f6") _, out("f7") _,
                out("f8") _, out("f9") _, out("f10") _, out("f11") _,
                out("f12") _, out("f13") _, out("f14") _, out("f15") _,
                out("f16") _, out("f17") _, out("f18") _, out("f19") _,
                out("f20") _, out("f21") _, out("f22") _, out("f23") _,
                out("f24") _, out("f25") _, out("f26") _, out("f27") _,
                out("f28") _, out("f29") _, out("f30") _, out("f31") _,
                options(nostack, nomem)
            );
        }

        if cfg!(target_feature = "f") {
            self.write(Csr::FCSR, 0);
        }
    }

    fn wait_for_interrupt(&mut self) {
        instructions::wfi();
    }

    unsafe fn enter(&mut self, arg0: usize, arg1: usize) -> ! {
        // SAFETY: assuming the caller has upheld the safety contract
        unsafe { instructions::mret(arg0, arg1) }
    }
}
