//! Trap causes, privilege modes and trap information.

use core::fmt;

/// Flag set in `mcause` when the trap was caused by an interrupt.
pub const CAUSE_IRQ_FLAG: usize = 1 << (usize::BITS - 1);

/// Privilege modes of a RISC-V hart.
#[repr(usize)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PrivilegeMode {
    /// User mode.
    User = 0,
    /// Supervisor mode.
    Supervisor = 1,
    /// Machine mode.
    Machine = 3,
}

impl PrivilegeMode {
    /// Returns the encoding of this mode, as found in `mstatus.MPP`.
    pub const fn bits(self) -> usize {
        self as usize
    }
}

/// Error returned when converting an invalid privilege mode encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidModeError(pub usize);

impl TryFrom<usize> for PrivilegeMode {
    type Error = InvalidModeError;

    fn try_from(v: usize) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(PrivilegeMode::User),
            1 => Ok(PrivilegeMode::Supervisor),
            3 => Ok(PrivilegeMode::Machine),
            _ => Err(InvalidModeError(v)),
        }
    }
}

impl fmt::Display for PrivilegeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PrivilegeMode::User => "U-mode",
            PrivilegeMode::Supervisor => "S-mode",
            PrivilegeMode::Machine => "M-mode",
        })
    }
}

/// Possible exception causes on a RISC-V hart.
#[repr(usize)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Exception {
    /// Instruction address misaligned.
    InstrAddrMisaligned = 0,
    /// Instruction access fault.
    InstrAccessFault = 1,
    /// Illegal instruction.
    IllegalInstr = 2,
    /// Breakpoint.
    Breakpoint = 3,
    /// Load address misaligned.
    LoadAddrMisaligned = 4,
    /// Load access fault.
    LoadAccessFault = 5,
    /// Store/AMO address misaligned.
    StoreAddrMisaligned = 6,
    /// Store/AMO access fault.
    StoreAccessFault = 7,
    /// Environment call from U-mode.
    EnvCallFromU = 8,
    /// Environment call from HS-mode.
    EnvCallFromS = 9,
    /// Environment call from VS-mode.
    EnvCallFromVS = 10,
    /// Environment call from M-mode.
    EnvCallFromM = 11,
    /// Instruction page fault.
    InstrPageFault = 12,
    /// Load page fault.
    LoadPageFault = 13,
    /// Store/AMO page fault.
    StorePageFault = 15,
    /// Instruction guest-page fault.
    InstrGuestPageFault = 20,
    /// Load guest-page fault.
    LoadGuestPageFault = 21,
    /// Virtual instruction.
    VirtualInstr = 22,
    /// Store/AMO guest-page fault.
    StoreGuestPageFault = 23,
}

impl TryFrom<usize> for Exception {
    type Error = usize;

    fn try_from(n: usize) -> Result<Self, Self::Error> {
        use Exception::*;

        Ok(match n {
            0 => InstrAddrMisaligned,
            1 => InstrAccessFault,
            2 => IllegalInstr,
            3 => Breakpoint,
            4 => LoadAddrMisaligned,
            5 => LoadAccessFault,
            6 => StoreAddrMisaligned,
            7 => StoreAccessFault,
            8 => EnvCallFromU,
            9 => EnvCallFromS,
            10 => EnvCallFromVS,
            11 => EnvCallFromM,
            12 => InstrPageFault,
            13 => LoadPageFault,
            15 => StorePageFault,
            20 => InstrGuestPageFault,
            21 => LoadGuestPageFault,
            22 => VirtualInstr,
            23 => StoreGuestPageFault,
            _ => return Err(n),
        })
    }
}

/// Information recorded when a trap is taken.
///
/// Note: the layout of this structure **must** match the offsets used by the
/// expected-trap handler, which stores one register-sized word per field.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TrapInfo {
    /// Address of the trapping instruction.
    pub epc: usize,
    /// Trap cause, as read from `mcause`.
    pub cause: usize,
    /// Trap value, as read from `mtval`.
    pub tval: usize,
    /// Second trap value, as read from `mtval2` (H extension).
    pub tval2: usize,
    /// Trapped instruction, as read from `mtinst` (H extension).
    pub tinst: usize,
}

impl TrapInfo {
    /// Creates the trap information for an illegal instruction at `epc`.
    pub const fn illegal_instruction(epc: usize, tval: usize) -> Self {
        Self {
            epc,
            cause: Exception::IllegalInstr as usize,
            tval,
            tval2: 0,
            tinst: 0,
        }
    }

    /// Returns `true` if a trap was actually recorded.
    ///
    /// A cause of zero (misaligned fetch) cannot be raised by a CSR access, so
    /// it doubles as the "no trap" marker.
    pub const fn trapped(&self) -> bool {
        self.cause != 0
    }

    /// Returns `true` if the trap was caused by an interrupt.
    pub const fn is_interrupt(&self) -> bool {
        self.cause & CAUSE_IRQ_FLAG != 0
    }

    /// Decodes the exception cause, if this trap was a known exception.
    pub fn exception(&self) -> Option<Exception> {
        if self.is_interrupt() {
            None
        } else {
            Exception::try_from(self.cause).ok()
        }
    }
}
