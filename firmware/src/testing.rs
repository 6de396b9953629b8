//! In-memory hart used to exercise the hart core on the host.

use std::collections::BTreeMap;

use riscv::{
    csr::{MHPM_FIRST, PMP_MAX_ENTRIES},
    registers::{misa_has_extension, mstatus},
    Csr, TrapInfo, XLEN,
};

use crate::hal::{HartCsr, ProbeResult};

/// Address reported as `epc` for traps raised by the mock.
pub const TRAP_EPC: usize = 0x8000_0400;

/// Builds a `misa` value for the native XLEN advertising the extensions in `exts`.
pub fn misa(exts: &str) -> usize {
    let mxl: usize = if XLEN == 64 { 2 } else { 1 };
    exts.chars().fold(mxl << (XLEN - 2), |misa, ext| {
        misa | 1 << (ext.to_ascii_uppercase() as u32 - 'A' as u32)
    })
}

#[derive(Debug, Clone, Copy)]
struct Reg {
    value: usize,
    /// Bits that software can change.
    writable: usize,
    read_only: bool,
}

/// A hart whose CSR file lives in memory.
///
/// Unimplemented registers trap on guarded accesses and panic on unguarded ones. Writable
/// registers only retain the bits in their WARL mask. `wait_for_interrupt` and `enter` panic,
/// so that diverging paths can be observed with `#[should_panic]`.
#[derive(Debug)]
pub struct MockHart {
    regs: BTreeMap<u16, Reg>,
    writes: Vec<(Csr, usize)>,
    /// Set once the floating-point registers have been cleared.
    pub fp_cleared: bool,
}

impl MockHart {
    /// Creates a hart implementing the base machine-mode registers, plus those required by the
    /// extensions in `exts`.
    pub fn new(exts: &str) -> Self {
        let misa = misa(exts);
        let has = |ext| misa_has_extension(misa, ext);

        let mut mstatus_mask = mstatus::MIE | mstatus::MPIE | mstatus::MPP;
        if has('F') || has('D') {
            mstatus_mask |= mstatus::FS;
        }
        if has('V') {
            mstatus_mask |= mstatus::VS;
        }
        #[cfg(target_pointer_width = "64")]
        if has('H') {
            mstatus_mask |= mstatus::MPV;
        }

        let mut hart = Self {
            regs: BTreeMap::new(),
            writes: Vec::new(),
            fp_cleared: false,
        };

        hart = hart
            .read_only(Csr::MISA, misa)
            .read_only(Csr::MHARTID, 0)
            .with_csr(Csr::MSTATUS, 0, mstatus_mask)
            .with_csr(Csr::MEDELEG, 0, !0)
            .with_csr(Csr::MIDELEG, 0, !0)
            .with_csr(Csr::MIE, 0, !0)
            .with_csr(Csr::MTVEC, 0, !0b10)
            .with_csr(Csr::MSCRATCH, 0, !0)
            .with_csr(Csr::MEPC, 0, !0b1);

        if XLEN == 32 && has('H') {
            hart = hart.with_csr(Csr::MSTATUSH, 0, riscv::registers::mstatush::MPV);
        }
        if has('S') {
            hart = hart
                .with_csr(Csr::STVEC, 0, !0b10)
                .with_csr(Csr::SSCRATCH, 0, !0)
                .with_csr(Csr::SIE, 0, !0)
                .with_csr(Csr::SATP, 0, !0);
        }
        if has('N') {
            hart = hart
                .with_csr(Csr::UTVEC, 0, !0b10)
                .with_csr(Csr::USCRATCH, 0, !0)
                .with_csr(Csr::UIE, 0, !0);
        }
        if has('F') || has('D') {
            hart = hart.with_csr(Csr::FCSR, 0x1f, 0xff);
        }

        hart
    }

    /// Implements `csr`, holding `value` and retaining only the `writable` bits on writes.
    pub fn with_csr(mut self, csr: Csr, value: usize, writable: usize) -> Self {
        self.regs.insert(
            csr.number(),
            Reg {
                value,
                writable,
                read_only: false,
            },
        );
        self
    }

    /// Implements `csr` as a read-only register holding `value`.
    pub fn read_only(mut self, csr: Csr, value: usize) -> Self {
        self.regs.insert(
            csr.number(),
            Reg {
                value,
                writable: 0,
                read_only: true,
            },
        );
        self
    }

    /// Removes `csr` from the register file.
    pub fn without(mut self, csr: Csr) -> Self {
        self.regs.remove(&csr.number());
        self
    }

    /// Implements `count` PMP entries whose address registers retain `addr_mask`.
    ///
    /// Only even `pmpcfg` registers exist on RV64.
    pub fn with_pmp(mut self, count: usize, addr_mask: usize) -> Self {
        for n in 0..count {
            self = self.with_csr(Csr::pmpaddr(n), 0, addr_mask);
        }
        for n in 0..PMP_MAX_ENTRIES / 4 {
            if XLEN == 32 || n % 2 == 0 {
                self = self.with_csr(Csr::pmpcfg(n), 0, !0);
            }
        }
        self
    }

    /// Implements `count` programmable counters, `width` bits wide.
    pub fn with_mhpm(mut self, count: usize, width: u32) -> Self {
        let mask = if width >= XLEN { !0 } else { (1 << width) - 1 };
        for n in MHPM_FIRST..MHPM_FIRST + count {
            self = self.with_csr(Csr::mhpmcounter(n), 0, mask);
        }
        self
    }

    /// Returns the current value of `csr`.
    ///
    /// # Panics
    ///
    /// Panics if `csr` is not implemented.
    pub fn value(&self, csr: Csr) -> usize {
        match self.regs.get(&csr.number()) {
            Some(reg) => reg.value,
            None => panic!("{:?} not implemented", csr),
        }
    }

    /// Returns `true` if `csr` is implemented.
    pub fn has(&self, csr: Csr) -> bool {
        self.regs.contains_key(&csr.number())
    }

    /// Returns the values written to `csr`, oldest first.
    pub fn writes_to(&self, csr: Csr) -> Vec<usize> {
        self.writes
            .iter()
            .filter(|(c, _)| *c == csr)
            .map(|(_, v)| *v)
            .collect()
    }

    fn trap(csr: Csr) -> TrapInfo {
        TrapInfo::illegal_instruction(TRAP_EPC, csr.number() as usize)
    }

    fn store(&mut self, csr: Csr, value: usize) -> Result<usize, TrapInfo> {
        let reg = match self.regs.get_mut(&csr.number()) {
            Some(reg) if !reg.read_only => reg,
            _ => return Err(Self::trap(csr)),
        };

        let old = reg.value;
        reg.value = (old & !reg.writable) | (value & reg.writable);
        self.writes.push((csr, value));
        Ok(old)
    }
}

impl HartCsr for MockHart {
    fn read_allowed(&mut self, csr: Csr) -> ProbeResult {
        match self.regs.get(&csr.number()) {
            Some(reg) => Ok(reg.value),
            None => Err(Self::trap(csr)),
        }
    }

    fn write_allowed(&mut self, csr: Csr, value: usize) -> ProbeResult<()> {
        self.store(csr, value).map(|_| ())
    }

    fn read(&mut self, csr: Csr) -> usize {
        self.value(csr)
    }

    fn write(&mut self, csr: Csr, value: usize) {
        if self.store(csr, value).is_err() {
            panic!("illegal write to {:?}", csr);
        }
    }

    fn swap(&mut self, csr: Csr, value: usize) -> usize {
        match self.store(csr, value) {
            Ok(old) => old,
            Err(_) => panic!("illegal swap of {:?}", csr),
        }
    }

    fn init_fp_regs(&mut self) {
        self.fp_cleared = true;
        if self.has(Csr::FCSR) {
            self.write(Csr::FCSR, 0);
        }
    }

    fn wait_for_interrupt(&mut self) {
        panic!("hart halted");
    }

    unsafe fn enter(&mut self, arg0: usize, arg1: usize) -> ! {
        panic!(
            "mret to {:#x} with a0={:#x} a1={:#x}",
            self.value(Csr::MEPC),
            arg0,
            arg1
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probes_follow_register_file() {
        let mut hart = MockHart::new("imafdcsu").read_only(Csr::TIME, 1234);

        assert_eq!(hart.read_allowed(Csr::TIME), Ok(1234));
        assert!(hart.write_allowed(Csr::TIME, 1).is_err());

        let trap = hart.read_allowed(Csr::MCOUNTEREN).unwrap_err();
        assert_eq!(trap.epc, TRAP_EPC);
        assert_eq!(trap.tval, Csr::MCOUNTEREN.number() as usize);

        assert!(hart.write_allowed(Csr::MSCRATCH, 0xdead_beef).is_ok());
        assert_eq!(hart.read(Csr::MSCRATCH), 0xdead_beef);
        assert_eq!(hart.writes_to(Csr::MSCRATCH), vec![0xdead_beef]);
    }

    #[test]
    fn warl_masks() {
        let mut hart = MockHart::new("imasu").with_csr(Csr::MCOUNTEREN, 0, 0b101);

        assert_eq!(hart.swap(Csr::MCOUNTEREN, !0), 0);
        assert_eq!(hart.read(Csr::MCOUNTEREN), 0b101);
    }

    #[test]
    fn misa_encoding() {
        let misa = misa("imacsu");
        assert!(misa_has_extension(misa, 'S'));
        assert!(!misa_has_extension(misa, 'H'));
        assert_eq!(misa >> (XLEN - 2), if XLEN == 64 { 2 } else { 1 });
    }
}
