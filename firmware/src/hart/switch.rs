//! Transition to the next privilege mode.
//!
//! A switch goes through three stages: the target mode is validated against `misa`, the
//! machine state is prepared, and finally `mret` is issued. Each stage consumes the previous
//! one, so the hart can only leave M-mode through a fully prepared switch.

use core::fmt;

use log::error;
use riscv::{
    registers::{extract_field, insert_field, mstatus},
    Csr, PrivilegeMode,
};

use super::hang;
use crate::hal::HartCsr;

/// Errors that may occur while preparing a mode switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchError {
    /// The requested mode does not exist.
    UnsupportedMode(usize),
    /// The hart does not implement the requested mode.
    MissingExtension(PrivilegeMode),
    /// A register did not take the value written to it.
    Inconsistent {
        /// Register at fault.
        csr: Csr,
        /// Value of the field that was written.
        expected: usize,
        /// Value of the field that was read back.
        found: usize,
    },
}

impl fmt::Display for SwitchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwitchError::UnsupportedMode(mode) => write!(f, "invalid privilege mode {}", mode),
            SwitchError::MissingExtension(mode) => write!(f, "{} not implemented", mode),
            SwitchError::Inconsistent {
                csr,
                expected,
                found,
            } => write!(
                f,
                "{:?} reads back {:#x} instead of {:#x}",
                csr, found, expected
            ),
        }
    }
}

/// A requested mode switch.
#[derive(Debug, Clone, Copy)]
pub struct ModeSwitch {
    next_addr: usize,
    next_mode: usize,
    next_virt: bool,
}

impl ModeSwitch {
    /// Requests a switch to `next_mode` at `next_addr`, virtualized if `next_virt` is set and
    /// the hart implements the H extension.
    pub const fn new(next_addr: usize, next_mode: usize, next_virt: bool) -> Self {
        Self {
            next_addr,
            next_mode,
            next_virt,
        }
    }

    /// Checks that the executing hart implements the requested mode.
    pub fn validate<H: HartCsr + ?Sized>(
        self,
        csr: &mut H,
    ) -> Result<ValidatedSwitch, SwitchError> {
        let mode = PrivilegeMode::try_from(self.next_mode)
            .map_err(|_| SwitchError::UnsupportedMode(self.next_mode))?;

        let implemented = match mode {
            PrivilegeMode::Machine => true,
            PrivilegeMode::Supervisor => csr.misa_extension('S'),
            PrivilegeMode::User => csr.misa_extension('U'),
        };
        if !implemented {
            return Err(SwitchError::MissingExtension(mode));
        }

        Ok(ValidatedSwitch {
            next_addr: self.next_addr,
            mode,
            next_virt: self.next_virt,
        })
    }
}

/// A switch to a mode implemented by the hart.
#[derive(Debug, Clone, Copy)]
pub struct ValidatedSwitch {
    next_addr: usize,
    mode: PrivilegeMode,
    next_virt: bool,
}

impl ValidatedSwitch {
    /// Returns the target mode.
    pub fn mode(&self) -> PrivilegeMode {
        self.mode
    }

    /// Sets up the machine state for the return to the target mode.
    ///
    /// S-mode starts with translation and interrupts disabled, trapping to its entry point.
    pub fn prepare<H: HartCsr + ?Sized>(self, csr: &mut H) -> Result<PreparedSwitch, SwitchError> {
        let hext = csr.misa_extension('H');

        let mut val = csr.read(Csr::MSTATUS);
        val = insert_field(val, mstatus::MPP, self.mode.bits());
        val = insert_field(val, mstatus::MPIE, 0);

        #[cfg(target_pointer_width = "64")]
        if hext {
            val = insert_field(val, mstatus::MPV, self.next_virt as usize);
        }
        #[cfg(target_pointer_width = "32")]
        if hext {
            use riscv::registers::mstatush;

            let valh = csr.read(Csr::MSTATUSH);
            csr.write(
                Csr::MSTATUSH,
                insert_field(valh, mstatush::MPV, self.next_virt as usize),
            );
        }

        csr.write(Csr::MSTATUS, val);

        let found = extract_field(csr.read(Csr::MSTATUS), mstatus::MPP);
        if found != self.mode.bits() {
            return Err(SwitchError::Inconsistent {
                csr: Csr::MSTATUS,
                expected: self.mode.bits(),
                found,
            });
        }

        csr.write(Csr::MEPC, self.next_addr);

        match self.mode {
            PrivilegeMode::Supervisor => {
                csr.write(Csr::STVEC, self.next_addr);
                csr.write(Csr::SSCRATCH, 0);
                csr.write(Csr::SIE, 0);
                csr.write(Csr::SATP, 0);
            }
            PrivilegeMode::User if csr.misa_extension('N') => {
                csr.write(Csr::UTVEC, self.next_addr);
                csr.write(Csr::USCRATCH, 0);
                csr.write(Csr::UIE, 0);
            }
            _ => {}
        }

        Ok(PreparedSwitch { mode: self.mode })
    }
}

/// A switch ready to be committed.
#[derive(Debug)]
pub struct PreparedSwitch {
    mode: PrivilegeMode,
}

impl PreparedSwitch {
    /// Returns the target mode.
    pub fn mode(&self) -> PrivilegeMode {
        self.mode
    }

    /// Leaves M-mode, passing `arg0` and `arg1` to the next stage in `a0` and `a1`.
    ///
    /// # Safety
    ///
    /// The entry address must hold code able to run in the target mode.
    pub unsafe fn commit<H: HartCsr + ?Sized>(self, csr: &mut H, arg0: usize, arg1: usize) -> ! {
        // SAFETY: assuming the caller has upheld the safety contract
        unsafe { csr.enter(arg0, arg1) }
    }
}

/// Switches the executing hart to `next_mode` at `next_addr`.
///
/// If the switch cannot be prepared, the error is reported and the hart halts for good.
///
/// # Safety
///
/// `next_addr` must hold code able to run in `next_mode`.
pub unsafe fn switch_mode<H: HartCsr + ?Sized>(
    csr: &mut H,
    arg0: usize,
    arg1: usize,
    next_addr: usize,
    next_mode: usize,
    next_virt: bool,
) -> ! {
    let prepared = ModeSwitch::new(next_addr, next_mode, next_virt)
        .validate(csr)
        .and_then(|switch| switch.prepare(csr));

    match prepared {
        // SAFETY: assuming the caller has upheld the safety contract
        Ok(switch) => unsafe { switch.commit(csr, arg0, arg1) },
        Err(e) => {
            error!(
                "hart{}: cannot switch to mode {} at {:#x}: {}",
                csr.hart_id(),
                next_mode,
                next_addr,
                e
            );
            hang(csr)
        }
    }
}
