//! Trap delegation to S-mode.

use core::fmt;

use riscv::{
    registers::{Exceptions, Interrupts},
    Csr,
};

use super::{
    features::{FeatureFlags, HartFeatures},
    Platform,
};
use crate::hal::HartCsr;

/// Content of the delegation registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delegation {
    /// Interrupts handled directly by S-mode.
    pub interrupts: Interrupts,
    /// Exceptions handled directly by S-mode.
    pub exceptions: Exceptions,
}

impl Delegation {
    /// Computes the delegation policy of a hart.
    ///
    /// `hext` tells whether the hart implements the hypervisor extension, `mfaults` whether the
    /// platform lets S-mode handle its own page faults.
    pub fn new(features: &HartFeatures, hext: bool, mfaults: bool) -> Self {
        let mut interrupts = Interrupts::SSIP | Interrupts::STIP | Interrupts::SEIP;
        if features.has(FeatureFlags::SSCOFPMF) {
            interrupts |= Interrupts::LCOFIP;
        }

        let mut exceptions =
            Exceptions::MISALIGNED_FETCH | Exceptions::BREAKPOINT | Exceptions::USER_ECALL;

        if hext {
            // Calls from VS-mode are redirected to HS-mode instead
            exceptions -= Exceptions::USER_ECALL;
            exceptions |= Exceptions::VIRTUAL_SUPERVISOR_ECALL
                | Exceptions::FETCH_GUEST_PAGE_FAULT
                | Exceptions::LOAD_GUEST_PAGE_FAULT
                | Exceptions::VIRTUAL_INST_FAULT
                | Exceptions::STORE_GUEST_PAGE_FAULT;
        }

        if mfaults {
            exceptions |= Exceptions::FETCH_PAGE_FAULT
                | Exceptions::LOAD_PAGE_FAULT
                | Exceptions::STORE_PAGE_FAULT;
        }

        Self {
            interrupts,
            exceptions,
        }
    }
}

/// Delegates traps to S-mode, if the executing hart implements it.
pub fn delegate_traps<H, P>(csr: &mut H, features: &HartFeatures, platform: &P)
where
    H: HartCsr + ?Sized,
    P: Platform + ?Sized,
{
    if !csr.misa_extension('S') {
        return;
    }

    let hext = csr.misa_extension('H');
    let deleg = Delegation::new(features, hext, platform.has_mfaults_delegation());

    csr.write(Csr::MIDELEG, deleg.interrupts.bits());
    csr.write(Csr::MEDELEG, deleg.exceptions.bits());
}

/// Displays the delegation registers of a hart, one per line.
///
/// Nothing is displayed if the hart has no S-mode.
#[derive(Debug)]
pub struct DelegationDump<'a> {
    regs: Option<(usize, usize)>,
    prefix: &'a str,
    suffix: &'a str,
}

impl fmt::Display for DelegationDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (mideleg, medeleg) = match self.regs {
            Some(regs) => regs,
            None => return Ok(()),
        };
        let width = core::mem::size_of::<usize>() * 2;

        writeln!(f, "{}MIDELEG{}: {:#0w$x}", self.prefix, self.suffix, mideleg, w = width + 2)?;
        writeln!(f, "{}MEDELEG{}: {:#0w$x}", self.prefix, self.suffix, medeleg, w = width + 2)
    }
}

/// Returns a displayable snapshot of the delegation registers, each line being introduced by
/// `prefix` and `suffix`.
pub fn delegation_dump<'a, H: HartCsr + ?Sized>(
    csr: &mut H,
    prefix: &'a str,
    suffix: &'a str,
) -> DelegationDump<'a> {
    let regs = if csr.misa_extension('S') {
        Some((csr.read(Csr::MIDELEG), csr.read(Csr::MEDELEG)))
    } else {
        None
    };

    DelegationDump {
        regs,
        prefix,
        suffix,
    }
}
