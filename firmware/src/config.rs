//! Build-time configuration of the hart core.

/// Size in bytes of the scratch area owned by each hart.
pub const SCRATCH_SIZE: usize = 0x1000;

/// Alignment of each hart's scratch area. Items stored in scratch space can't require more.
pub const SCRATCH_ALIGN: usize = 16;

/// Maximum number of harts a [`ScratchArena`](crate::scratch::ScratchArena) is sized for by
/// default.
pub const MAX_HARTS: usize = 8;

/// Value written to `pmpaddr0` when probing the implemented PMP address bits.
///
/// RV64 limits physical addresses to 56 bits, i.e. 54 bits of `pmpaddr`; RV32 uses all 32.
#[cfg(target_pointer_width = "64")]
pub const PMP_ADDR_MASK: usize = 0x003f_ffff_ffff_ffff;
/// Value written to `pmpaddr0` when probing the implemented PMP address bits.
#[cfg(target_pointer_width = "32")]
pub const PMP_ADDR_MASK: usize = 0xffff_ffff;

/// Value of `scounteren` after init: S-mode may read `cycle`, `time` and `instret`.
pub const SCOUNTEREN_DEFAULT: usize = 0b111;

/// Value of `mcountinhibit` after init: programmable counters are stopped until S-mode
/// starts them.
pub const MCOUNTINHIBIT_DEFAULT: usize = 0xffff_fff8;

/// Capacity of the buffer used when logging the hart feature string.
pub const FEATURES_STR_LEN: usize = 64;
