//! Fields and flags of various system registers.

use bitflags::bitflags;

/// Fields of the `mstatus` register.
pub mod mstatus {
    /// M-Mode interrupt enable.
    pub const MIE: usize = 1 << 3;
    /// M-Mode previous interrupt enable.
    pub const MPIE: usize = 1 << 7;
    /// Vector extension state.
    pub const VS: usize = 3 << 9;
    /// M-Mode previous privilege level.
    pub const MPP: usize = 3 << 11;
    /// Floating point unit state.
    pub const FS: usize = 3 << 13;
    /// Previous virtualization mode (H extension, RV64 only).
    #[cfg(target_pointer_width = "64")]
    pub const MPV: usize = 1 << 39;
}

/// Fields of the `mstatush` register (RV32 only).
pub mod mstatush {
    /// Previous virtualization mode (H extension).
    pub const MPV: usize = 1 << 7;
}

/// Replaces the field selected by `mask` in `reg` with `value`.
///
/// `value` is shifted into place according to the lowest set bit of `mask`, and
/// truncated to the width of the field.
#[inline]
pub const fn insert_field(reg: usize, mask: usize, value: usize) -> usize {
    let shift = mask.trailing_zeros();
    (reg & !mask) | ((value << shift) & mask)
}

/// Extracts the field selected by `mask` from `reg`.
#[inline]
pub const fn extract_field(reg: usize, mask: usize) -> usize {
    (reg & mask) >> mask.trailing_zeros()
}

/// Returns `true` if `misa` advertises the single-letter extension `ext`.
///
/// `ext` is case-insensitive. Anything that is not an ASCII letter is never
/// advertised.
#[inline]
pub const fn misa_has_extension(misa: usize, ext: char) -> bool {
    let bit = match ext {
        'A'..='Z' => ext as u32 - 'A' as u32,
        'a'..='z' => ext as u32 - 'a' as u32,
        _ => return false,
    };
    misa & (1 << bit) != 0
}

bitflags! {
    /// Interrupt bits, shared by `mip`, `mie` and `mideleg`.
    pub struct Interrupts: usize {
        /// S-Mode software interrupt.
        const SSIP = 1 << 1;
        /// M-Mode software interrupt.
        const MSIP = 1 << 3;
        /// S-Mode timer interrupt.
        const STIP = 1 << 5;
        /// M-Mode timer interrupt.
        const MTIP = 1 << 7;
        /// S-Mode external interrupt.
        const SEIP = 1 << 9;
        /// M-Mode external interrupt.
        const MEIP = 1 << 11;
        /// Local counter overflow interrupt (Sscofpmf).
        const LCOFIP = 1 << 13;
    }
}

bitflags! {
    /// Exception bits of the `medeleg` register, one per exception cause.
    pub struct Exceptions: usize {
        /// Instruction address misaligned.
        const MISALIGNED_FETCH = 1 << 0;
        /// Instruction access fault.
        const FETCH_ACCESS = 1 << 1;
        /// Illegal instruction.
        const ILLEGAL_INSTRUCTION = 1 << 2;
        /// Breakpoint.
        const BREAKPOINT = 1 << 3;
        /// Load address misaligned.
        const MISALIGNED_LOAD = 1 << 4;
        /// Load access fault.
        const LOAD_ACCESS = 1 << 5;
        /// Store/AMO address misaligned.
        const MISALIGNED_STORE = 1 << 6;
        /// Store/AMO access fault.
        const STORE_ACCESS = 1 << 7;
        /// Environment call from U-Mode (or VU-Mode).
        const USER_ECALL = 1 << 8;
        /// Environment call from HS-Mode.
        const SUPERVISOR_ECALL = 1 << 9;
        /// Environment call from VS-Mode.
        const VIRTUAL_SUPERVISOR_ECALL = 1 << 10;
        /// Environment call from M-Mode.
        const MACHINE_ECALL = 1 << 11;
        /// Instruction page fault.
        const FETCH_PAGE_FAULT = 1 << 12;
        /// Load page fault.
        const LOAD_PAGE_FAULT = 1 << 13;
        /// Store/AMO page fault.
        const STORE_PAGE_FAULT = 1 << 15;
        /// Instruction guest-page fault.
        const FETCH_GUEST_PAGE_FAULT = 1 << 20;
        /// Load guest-page fault.
        const LOAD_GUEST_PAGE_FAULT = 1 << 21;
        /// Virtual instruction.
        const VIRTUAL_INST_FAULT = 1 << 22;
        /// Store/AMO guest-page fault.
        const STORE_GUEST_PAGE_FAULT = 1 << 23;
    }
}

bitflags! {
    /// Flags of a single `pmpcfg` octet.
    pub struct PmpFlags: u8 {
        /// Read access.
        const R = 1 << 0;
        /// Write access.
        const W = 1 << 1;
        /// Execute access.
        const X = 1 << 2;
        /// Address matching: top of range.
        const A_TOR = 1 << 3;
        /// Address matching: naturally aligned four-byte region.
        const A_NA4 = 2 << 3;
        /// Address matching: naturally aligned power-of-two region.
        const A_NAPOT = 3 << 3;
        /// Entry locked, also enforced on M-Mode.
        const L = 1 << 7;
    }
}

impl PmpFlags {
    /// Mask of the address-matching field.
    pub const A: PmpFlags = PmpFlags::A_NAPOT;

    /// Returns these flags with the address-matching field cleared.
    #[inline]
    pub fn without_matching(self) -> Self {
        self - Self::A
    }
}
