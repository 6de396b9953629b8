//! Hart initialization and control.
//!
//! The boot flow calls [`init`] on every hart, with `cold_boot` set on the first one. Once the
//! platform has set up its domains, [`pmp::configure`] protects memory and
//! [`switch::switch_mode`] leaves M-mode for good.

use core::fmt;

use log::debug;
use riscv::{
    registers::{extract_field, mstatus},
    Csr,
};

use crate::{
    config::{FEATURES_STR_LEN, MCOUNTINHIBIT_DEFAULT, SCOUNTEREN_DEFAULT},
    hal::HartCsr,
    scratch::Scratch,
};

pub mod deleg;
pub mod features;
pub mod pmp;
pub mod store;
pub mod switch;

pub use self::{
    deleg::{delegate_traps, delegation_dump},
    features::{FeatureFlags, HartFeatures},
    store::{features_str, hart_features},
    switch::switch_mode,
};

/// Platform policies the hart core depends on.
pub trait Platform {
    /// Returns `true` if S-mode handles page faults without going through M-mode.
    fn has_mfaults_delegation(&self) -> bool {
        false
    }
}

/// Errors that may occur while initializing a hart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HartError {
    /// Scratch space is exhausted.
    NoMemory,
    /// Warm initialization before any cold boot.
    Uninitialized,
    /// The hart is in an unexpected state.
    InvalidState,
}

impl fmt::Display for HartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                HartError::NoMemory => "out of scratch space",
                HartError::Uninitialized => "hart core not initialized",
                HartError::InvalidState => "invalid hart state",
            }
        )
    }
}

/// Initializes the executing hart, whose scratch area is `scratch`.
///
/// Features are detected on every call. The first hart to boot must pass `cold_boot`, so that
/// the shared feature record gets allocated.
pub fn init<H, P>(
    csr: &mut H,
    scratch: &mut Scratch,
    platform: &P,
    cold_boot: bool,
) -> Result<(), HartError>
where
    H: HartCsr + ?Sized,
    P: Platform + ?Sized,
{
    let offset = if cold_boot {
        store::init_offset()?
    } else {
        store::offset().ok_or(HartError::Uninitialized)?
    };

    let hfeatures = features::detect(csr);
    *scratch.get_mut(offset) = hfeatures;

    let mut buf = [0; FEATURES_STR_LEN];
    debug!(
        "hart{}: features {}, {} PMP entries ({} bits, {}B granularity), {} HPM counters ({} bits)",
        csr.hart_id(),
        features_str(hfeatures.features, &mut buf),
        hfeatures.pmp_count,
        hfeatures.pmp_addr_bits,
        hfeatures.pmp_gran,
        hfeatures.mhpm_count,
        hfeatures.mhpm_bits
    );

    reinit(csr, scratch, platform)
}

/// Restores the baseline machine state of the executing hart from its detected features.
pub fn reinit<H, P>(csr: &mut H, scratch: &Scratch, platform: &P) -> Result<(), HartError>
where
    H: HartCsr + ?Sized,
    P: Platform + ?Sized,
{
    let offset = store::offset().ok_or(HartError::Uninitialized)?;
    let hfeatures = *scratch.get(offset);

    mstatus_init(csr, &hfeatures);
    fp_init(csr)?;
    delegate_traps(csr, &hfeatures, platform);

    Ok(())
}

/// Parks the executing hart for good.
pub fn hang<H: HartCsr + ?Sized>(csr: &mut H) -> ! {
    loop {
        csr.wait_for_interrupt();
    }
}

fn mstatus_init<H: HartCsr + ?Sized>(csr: &mut H, hfeatures: &HartFeatures) {
    // Nothing survives from earlier boot stages but the extension state
    let mut val = 0;
    if csr.misa_extension('F') || csr.misa_extension('D') {
        val |= mstatus::FS;
    }
    if csr.misa_extension('V') {
        val |= mstatus::VS;
    }
    csr.write(Csr::MSTATUS, val);

    let smode = csr.misa_extension('S');

    // Counters are readable from S-mode, and the programmable ones stopped
    if smode && hfeatures.has(FeatureFlags::SCOUNTEREN) {
        csr.write(Csr::SCOUNTEREN, SCOUNTEREN_DEFAULT);
    }
    if hfeatures.has(FeatureFlags::MCOUNTEREN) {
        csr.write(Csr::MCOUNTEREN, !0);
    }
    if hfeatures.has(FeatureFlags::MCOUNTINHIBIT) {
        csr.write(Csr::MCOUNTINHIBIT, MCOUNTINHIBIT_DEFAULT);
    }

    csr.write(Csr::MIE, 0);

    if smode {
        csr.write(Csr::SATP, 0);
    }
}

fn fp_init<H: HartCsr + ?Sized>(csr: &mut H) -> Result<(), HartError> {
    if !csr.misa_extension('F') && !csr.misa_extension('D') {
        return Ok(());
    }

    if extract_field(csr.read(Csr::MSTATUS), mstatus::FS) == 0 {
        return Err(HartError::InvalidState);
    }

    csr.init_fp_regs();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockHart;

    struct Board;

    impl Platform for Board {}

    fn hart() -> MockHart {
        MockHart::new("imafdcsu")
            .with_pmp(8, 0xffff_fc00)
            .with_mhpm(4, 64)
            .with_csr(Csr::SCOUNTEREN, 0, 0b111)
            .with_csr(Csr::MCOUNTEREN, 0, !0)
            .with_csr(Csr::MCOUNTINHIBIT, 0, !0b10)
            .read_only(Csr::TIME, 0)
    }

    #[test]
    fn cold_boot() {
        let mut hart = hart();
        let mut scratch = Box::new(Scratch::new());

        init(&mut hart, &mut scratch, &Board, true).unwrap();

        let hf = hart_features(&scratch);
        assert_eq!(hf.pmp_count, 8);
        assert_eq!(hf.mhpm_count, 4);
        assert!(hf.has(FeatureFlags::SCOUNTEREN | FeatureFlags::MCOUNTINHIBIT));

        let status = hart.value(Csr::MSTATUS);
        assert_eq!(status & mstatus::FS, mstatus::FS);
        assert_eq!(hart.value(Csr::SCOUNTEREN), 0b111);
        assert_eq!(hart.value(Csr::MCOUNTEREN), !0);
        assert_eq!(hart.value(Csr::MCOUNTINHIBIT), 0xffff_fff8);
        assert_eq!(hart.writes_to(Csr::MIE), vec![0]);
        assert_eq!(hart.writes_to(Csr::SATP), vec![0]);
        assert!(hart.fp_cleared);
        assert_eq!(hart.value(Csr::FCSR), 0);
        assert_eq!(hart.value(Csr::MIDELEG), 0x222);
    }

    #[test]
    fn warm_boot_redetects() {
        let mut cold = hart();
        let mut scratch = Box::new(Scratch::new());
        init(&mut cold, &mut scratch, &Board, true).unwrap();

        let mut warm = MockHart::new("imacsu").with_pmp(2, 0xffff_ff00);
        let mut scratch = Box::new(Scratch::new());
        init(&mut warm, &mut scratch, &Board, false).unwrap();

        let hf = hart_features(&scratch);
        assert_eq!(hf.pmp_count, 2);
        assert_eq!(hf.pmp_gran, 1024);
        assert_eq!(hf.features, FeatureFlags::empty());
        assert!(!warm.fp_cleared);
    }

    #[test]
    fn stale_machine_state_is_cleared() {
        let stale = mstatus::MIE | mstatus::MPIE | mstatus::MPP;
        let mut hart = hart().with_csr(
            Csr::MSTATUS,
            stale,
            stale | mstatus::FS | mstatus::VS,
        );
        let mut scratch = Box::new(Scratch::new());

        init(&mut hart, &mut scratch, &Board, true).unwrap();

        let status = hart.value(Csr::MSTATUS);
        assert_eq!(status & stale, 0);
        assert_eq!(status & mstatus::FS, mstatus::FS);
        assert_eq!(status & mstatus::VS, 0);
    }

    #[test]
    fn fp_state_must_be_enabled() {
        // FS hardwired to off despite F being advertised
        let mut hart = MockHart::new("imafcsu").with_csr(Csr::MSTATUS, 0, !mstatus::FS);
        let mut scratch = Box::new(Scratch::new());

        assert_eq!(
            init(&mut hart, &mut scratch, &Board, true),
            Err(HartError::InvalidState)
        );
        assert!(!hart.fp_cleared);
    }

    #[test]
    fn vector_state() {
        let mut hart = MockHart::new("imacvsu");
        let mut scratch = Box::new(Scratch::new());

        init(&mut hart, &mut scratch, &Board, true).unwrap();

        assert_eq!(hart.value(Csr::MSTATUS) & mstatus::VS, mstatus::VS);
        assert_eq!(extract_field(hart.value(Csr::MSTATUS), mstatus::FS), 0);
    }

    #[test]
    fn machine_only_hart() {
        let mut hart = MockHart::new("imac");
        let mut scratch = Box::new(Scratch::new());

        init(&mut hart, &mut scratch, &Board, true).unwrap();

        assert!(hart.writes_to(Csr::MIDELEG).is_empty());
        assert!(hart.writes_to(Csr::SATP).is_empty());
        assert_eq!(hart.writes_to(Csr::MIE), vec![0]);
    }

    #[test]
    #[should_panic(expected = "hart halted")]
    fn hang_waits_for_interrupts() {
        hang(&mut MockHart::new("imac"))
    }

    #[test]
    fn error_messages() {
        assert_eq!(HartError::NoMemory.to_string(), "out of scratch space");
        assert_eq!(
            switch::SwitchError::MissingExtension(riscv::PrivilegeMode::Supervisor).to_string(),
            "S-mode not implemented"
        );
    }
}
