//! Control and status register numbers.
//!
//! CSR numbers are 12-bit values. Bits `[11:10]` encode read/write accessibility
//! (`0b11` is read-only) and bits `[9:8]` the lowest privilege level allowed to
//! access the register.

use core::fmt;

/// Number of PMP entries the privileged architecture allows for.
pub const PMP_MAX_ENTRIES: usize = 64;

/// Index of the first programmable hardware performance monitor counter.
pub const MHPM_FIRST: usize = 3;

/// Index of the last programmable hardware performance monitor counter.
pub const MHPM_LAST: usize = 31;

/// A control and status register, identified by its number.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Csr(u16);

impl Csr {
    /// User floating-point control and status.
    pub const FCSR: Csr = Csr(0x003);
    /// User interrupt enable (N extension).
    pub const UIE: Csr = Csr(0x004);
    /// User trap vector (N extension).
    pub const UTVEC: Csr = Csr(0x005);
    /// User scratch register (N extension).
    pub const USCRATCH: Csr = Csr(0x040);

    /// Supervisor status.
    pub const SSTATUS: Csr = Csr(0x100);
    /// Supervisor interrupt enable.
    pub const SIE: Csr = Csr(0x104);
    /// Supervisor trap vector.
    pub const STVEC: Csr = Csr(0x105);
    /// Supervisor counter enable.
    pub const SCOUNTEREN: Csr = Csr(0x106);
    /// Supervisor scratch register.
    pub const SSCRATCH: Csr = Csr(0x140);
    /// Supervisor address translation and protection.
    pub const SATP: Csr = Csr(0x180);

    /// Machine status.
    pub const MSTATUS: Csr = Csr(0x300);
    /// Machine ISA and extensions.
    pub const MISA: Csr = Csr(0x301);
    /// Machine exception delegation.
    pub const MEDELEG: Csr = Csr(0x302);
    /// Machine interrupt delegation.
    pub const MIDELEG: Csr = Csr(0x303);
    /// Machine interrupt enable.
    pub const MIE: Csr = Csr(0x304);
    /// Machine trap vector.
    pub const MTVEC: Csr = Csr(0x305);
    /// Machine counter enable.
    pub const MCOUNTEREN: Csr = Csr(0x306);
    /// Upper half of `mstatus` (RV32 only).
    pub const MSTATUSH: Csr = Csr(0x310);
    /// Machine counter inhibit.
    pub const MCOUNTINHIBIT: Csr = Csr(0x320);
    /// Machine scratch register.
    pub const MSCRATCH: Csr = Csr(0x340);
    /// Machine exception program counter.
    pub const MEPC: Csr = Csr(0x341);
    /// Machine trap cause.
    pub const MCAUSE: Csr = Csr(0x342);
    /// Machine trap value.
    pub const MTVAL: Csr = Csr(0x343);
    /// Machine interrupt pending.
    pub const MIP: Csr = Csr(0x344);
    /// Machine trap instruction (H extension).
    pub const MTINST: Csr = Csr(0x34a);
    /// Machine second trap value (H extension).
    pub const MTVAL2: Csr = Csr(0x34b);

    /// First PMP configuration register.
    pub const PMPCFG0: Csr = Csr(0x3a0);
    /// First PMP address register.
    pub const PMPADDR0: Csr = Csr(0x3b0);

    /// Machine cycle counter.
    pub const MCYCLE: Csr = Csr(0xb00);
    /// Machine instructions-retired counter.
    pub const MINSTRET: Csr = Csr(0xb02);
    /// First programmable performance counter.
    pub const MHPMCOUNTER3: Csr = Csr(0xb03);
    /// Upper half of the first programmable performance counter (RV32 only).
    pub const MHPMCOUNTER3H: Csr = Csr(0xb83);

    /// Real-time counter, read-only shadow of `mtime`.
    pub const TIME: Csr = Csr(0xc01);
    /// Counter overflow status (Sscofpmf extension), read-only.
    pub const SCOUNTOVF: Csr = Csr(0xda0);

    /// Hardware thread ID.
    pub const MHARTID: Csr = Csr(0xf14);

    /// Creates a CSR from its raw 12-bit number.
    ///
    /// # Panics
    ///
    /// Panics if `num` does not fit in 12 bits.
    pub const fn new(num: u16) -> Self {
        assert!(num < 0x1000, "CSR numbers are 12 bits wide");
        Self(num)
    }

    /// Returns the raw number of this CSR.
    pub const fn number(self) -> u16 {
        self.0
    }

    /// Returns `true` if the register is read-only by encoding.
    pub const fn is_read_only(self) -> bool {
        self.0 >> 10 == 0b11
    }

    /// Returns the `pmpaddr` register of entry `n`.
    ///
    /// # Panics
    ///
    /// Panics if `n` is not a valid PMP entry index.
    pub const fn pmpaddr(n: usize) -> Self {
        assert!(n < PMP_MAX_ENTRIES, "invalid PMP entry");
        Self(Self::PMPADDR0.0 + n as u16)
    }

    /// Returns the `pmpcfg` register with index `n`.
    ///
    /// # Panics
    ///
    /// Panics if `n` is not a valid `pmpcfg` index.
    pub const fn pmpcfg(n: usize) -> Self {
        assert!(n < PMP_MAX_ENTRIES / 4, "invalid pmpcfg index");
        Self(Self::PMPCFG0.0 + n as u16)
    }

    /// Returns the `mhpmcounter` register with index `n`.
    ///
    /// # Panics
    ///
    /// Panics if `n` is not in `3..=31`.
    pub const fn mhpmcounter(n: usize) -> Self {
        assert!(n >= MHPM_FIRST && n <= MHPM_LAST, "invalid mhpmcounter");
        Self(Self::MCYCLE.0 + n as u16)
    }

    /// Returns the upper half of the `mhpmcounter` register with index `n`.
    ///
    /// # Panics
    ///
    /// Panics if `n` is not in `3..=31`.
    pub const fn mhpmcounterh(n: usize) -> Self {
        assert!(n >= MHPM_FIRST && n <= MHPM_LAST, "invalid mhpmcounterh");
        Self(Self::MHPMCOUNTER3H.0 + (n - MHPM_FIRST) as u16)
    }
}

impl fmt::Debug for Csr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Csr({:#05x})", self.0)
    }
}
