//! Detection of the optional CSRs implemented by a hart.
//!
//! Every probe goes through the guarded accessors of [`HartCsr`], so registers missing on the
//! executing silicon are simply reported as absent.

use core::mem;

use bitflags::bitflags;
use riscv::{
    csr::{MHPM_FIRST, MHPM_LAST, PMP_MAX_ENTRIES},
    Csr,
};
use static_assertions::const_assert;

use crate::{
    config::{PMP_ADDR_MASK, SCRATCH_SIZE},
    hal::HartCsr,
    scratch::ScratchItem,
};

bitflags! {
    /// Optional hart features.
    #[derive(Default)]
    pub struct FeatureFlags: usize {
        /// `scounteren` is implemented.
        const SCOUNTEREN = 1 << 0;
        /// `mcounteren` is implemented.
        const MCOUNTEREN = 1 << 1;
        /// `mcountinhibit` is implemented.
        const MCOUNTINHIBIT = 1 << 2;
        /// Counter overflow and privilege mode filtering (Sscofpmf).
        const SSCOFPMF = 1 << 3;
        /// The `time` CSR is implemented.
        const TIME = 1 << 4;
    }
}

impl FeatureFlags {
    /// Every feature, paired with its name, in bit order.
    pub const NAMED: [(FeatureFlags, &'static str); 5] = [
        (FeatureFlags::SCOUNTEREN, "scounteren"),
        (FeatureFlags::MCOUNTEREN, "mcounteren"),
        (FeatureFlags::MCOUNTINHIBIT, "mcountinhibit"),
        (FeatureFlags::SSCOFPMF, "sscofpmf"),
        (FeatureFlags::TIME, "time"),
    ];

    /// Returns the name of a single feature.
    pub fn name(self) -> Option<&'static str> {
        Self::NAMED
            .iter()
            .find(|(flag, _)| *flag == self)
            .map(|(_, name)| *name)
    }
}

/// Optional features and resources of a hart.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HartFeatures {
    /// Implemented optional CSRs.
    pub features: FeatureFlags,
    /// Number of implemented PMP entries.
    pub pmp_count: u32,
    /// Number of implemented bits in `pmpaddr` registers.
    pub pmp_addr_bits: u32,
    /// PMP granularity, in bytes.
    pub pmp_gran: usize,
    /// Number of implemented programmable counters.
    pub mhpm_count: u32,
    /// Width of the programmable counters, in bits.
    pub mhpm_bits: u32,
}

// SAFETY: made of integers only. Unknown feature bits are harmless.
unsafe impl ScratchItem for HartFeatures {}

const_assert!(mem::size_of::<HartFeatures>() <= SCRATCH_SIZE);

impl HartFeatures {
    /// Returns `true` if all features in `flags` are present.
    pub fn has(&self, flags: FeatureFlags) -> bool {
        self.features.contains(flags)
    }
}

/// Probes the executing hart.
///
/// Registers are left with the content they had before detection, except for `pmpcfg0`, which
/// is cleared, and `pmpaddr0`.
pub fn detect<H: HartCsr + ?Sized>(csr: &mut H) -> HartFeatures {
    let mut hfeatures = HartFeatures::default();

    detect_pmp(csr, &mut hfeatures);
    detect_mhpm(csr, &mut hfeatures);
    detect_optional(csr, &mut hfeatures);

    hfeatures
}

/// Returns `true` if `reg` holds `value` once written, restoring its previous content.
fn check_csr<H: HartCsr + ?Sized>(csr: &mut H, reg: Csr, value: usize) -> bool {
    let old = match csr.read_allowed(reg) {
        Ok(old) => old,
        Err(_) => return false,
    };

    if reg.is_read_only() {
        return true;
    }
    if csr.write_allowed(reg, value).is_err() {
        return false;
    }

    csr.swap(reg, old) == value
}

/// Returns the content of `pmpaddr0` after writing all implementable address bits, or 0 if PMP
/// is not implemented.
fn pmp_allowed_addr<H: HartCsr + ?Sized>(csr: &mut H) -> usize {
    if csr.write_allowed(Csr::PMPCFG0, 0).is_err() {
        return 0;
    }
    if csr.write_allowed(Csr::PMPADDR0, PMP_ADDR_MASK).is_err() {
        return 0;
    }
    csr.read_allowed(Csr::PMPADDR0).unwrap_or(0)
}

fn detect_pmp<H: HartCsr + ?Sized>(csr: &mut H, hfeatures: &mut HartFeatures) {
    let val = pmp_allowed_addr(csr);
    if val == 0 {
        return;
    }

    // pmpaddr holds bits [XLEN+1:2] of the address
    hfeatures.pmp_gran = 1 << (val.trailing_zeros() + 2);
    hfeatures.pmp_addr_bits = usize::BITS - val.leading_zeros();

    // Entries are implemented contiguously from 0
    hfeatures.pmp_count = (0..PMP_MAX_ENTRIES)
        .take_while(|&n| check_csr(csr, Csr::pmpaddr(n), val))
        .count() as u32;
}

/// Returns the width of `mhpmcounter3`, leaving its content untouched.
fn mhpm_allowed_bits<H: HartCsr + ?Sized>(csr: &mut H) -> u32 {
    let mut bits = match read_back(csr, Csr::MHPMCOUNTER3) {
        Some(0) | None => return 0,
        Some(val) => usize::BITS - val.leading_zeros(),
    };

    if usize::BITS == 32 {
        if let Some(val) = read_back(csr, Csr::mhpmcounterh(MHPM_FIRST)) {
            bits += usize::BITS - val.leading_zeros();
        }
    }

    bits
}

/// Writes all-ones to `reg` and returns what sticks, restoring the previous content.
fn read_back<H: HartCsr + ?Sized>(csr: &mut H, reg: Csr) -> Option<usize> {
    let old = csr.read_allowed(reg).ok()?;
    csr.write_allowed(reg, !0).ok()?;
    Some(csr.swap(reg, old))
}

fn detect_mhpm<H: HartCsr + ?Sized>(csr: &mut H, hfeatures: &mut HartFeatures) {
    if !check_csr(csr, Csr::MHPMCOUNTER3, 1) {
        return;
    }
    hfeatures.mhpm_bits = mhpm_allowed_bits(csr);

    hfeatures.mhpm_count = 1 + (MHPM_FIRST + 1..=MHPM_LAST)
        .take_while(|&n| check_csr(csr, Csr::mhpmcounter(n), 1))
        .count() as u32;
}

/// Returns `true` if `reg` can be read and its own value written back.
fn is_controllable<H: HartCsr + ?Sized>(csr: &mut H, reg: Csr) -> bool {
    match csr.read_allowed(reg) {
        Ok(val) => csr.write_allowed(reg, val).is_ok(),
        Err(_) => false,
    }
}

fn detect_optional<H: HartCsr + ?Sized>(csr: &mut H, hfeatures: &mut HartFeatures) {
    if is_controllable(csr, Csr::SCOUNTEREN) {
        hfeatures.features |= FeatureFlags::SCOUNTEREN;
    }
    if is_controllable(csr, Csr::MCOUNTEREN) {
        hfeatures.features |= FeatureFlags::MCOUNTEREN;
    }
    if is_controllable(csr, Csr::MCOUNTINHIBIT) {
        hfeatures.features |= FeatureFlags::MCOUNTINHIBIT;
    }

    // Overflow interrupts are useless without counter enable and inhibit
    if hfeatures.has(FeatureFlags::MCOUNTEREN | FeatureFlags::MCOUNTINHIBIT)
        && csr.read_allowed(Csr::SCOUNTOVF).is_ok()
    {
        hfeatures.features |= FeatureFlags::SSCOFPMF;
    }

    if csr.read_allowed(Csr::TIME).is_ok() {
        hfeatures.features |= FeatureFlags::TIME;
    }
}
