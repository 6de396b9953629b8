//! Physical memory protection.
//!
//! Regions of the boot domain are turned into PMP entries in list order, one slot cursor being
//! shared by both encodings: NAPOT regions take one slot, TOR regions take two.

use core::fmt;

use log::{debug, info, warn};
use riscv::{csr::PMP_MAX_ENTRIES, registers::PmpFlags, Csr, XLEN};

use super::features::HartFeatures;
use crate::{
    domain::{Domain, MemRegion, RegionExtent, RegionFlags},
    hal::HartCsr,
};

/// `pmpaddr` registers hold bits `[XLEN+1:2]` of physical addresses.
const PMP_SHIFT: u32 = 2;

/// Errors that may occur while programming PMP entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PmpError {
    /// The entry index is beyond the implemented entries.
    InvalidEntry(usize),
    /// The region size cannot be encoded.
    InvalidOrder(u32),
    /// The region is smaller than the PMP granularity.
    BelowGranularity(u32),
    /// The region base exceeds the implemented address bits.
    AddressOutOfRange(usize),
}

impl fmt::Display for PmpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PmpError::InvalidEntry(n) => write!(f, "invalid PMP entry {}", n),
            PmpError::InvalidOrder(order) => write!(f, "invalid region order {}", order),
            PmpError::BelowGranularity(order) => {
                write!(f, "region order {} below PMP granularity", order)
            }
            PmpError::AddressOutOfRange(addr) => {
                write!(f, "address {:#x} beyond PMP address bits", addr)
            }
        }
    }
}

/// A PMP entry, ready to be programmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PmpEntry {
    /// Naturally aligned power-of-two region, using one slot.
    Napot {
        /// Base address.
        base: usize,
        /// Base-two logarithm of the size.
        order: u32,
        /// Permissions.
        flags: PmpFlags,
    },
    /// Arbitrary `[start, end)` range, using two slots.
    Tor {
        /// First address of the range.
        start: usize,
        /// First address past the range.
        end: usize,
        /// Permissions.
        flags: PmpFlags,
    },
}

impl PmpEntry {
    /// Builds the entry protecting `region` on a hart with the given features.
    ///
    /// TOR boundaries are aligned down to the PMP granularity.
    pub fn from_region(region: &MemRegion, features: &HartFeatures) -> Result<Self, PmpError> {
        let flags = pmp_flags(region.flags);
        let gran = features.pmp_gran.max(1 << PMP_SHIFT);

        match region.extent {
            RegionExtent::Napot { order } => {
                if order < gran.trailing_zeros() {
                    return Err(PmpError::BelowGranularity(order));
                }
                if region.base >> PMP_SHIFT >= pmp_addr_max(features.pmp_addr_bits) {
                    return Err(PmpError::AddressOutOfRange(region.base));
                }
                Ok(PmpEntry::Napot {
                    base: region.base,
                    order,
                    flags,
                })
            }
            RegionExtent::Tor { .. } => Ok(PmpEntry::Tor {
                start: region.base & !(gran - 1),
                end: region.end() & !(gran - 1),
                flags,
            }),
        }
    }

    /// Returns the number of PMP slots used by this entry.
    pub const fn slots(&self) -> usize {
        match self {
            PmpEntry::Napot { .. } => 1,
            PmpEntry::Tor { .. } => 2,
        }
    }

    /// Programs this entry starting at slot `n`.
    pub fn program<H: HartCsr + ?Sized>(&self, csr: &mut H, n: usize) -> Result<(), PmpError> {
        match *self {
            PmpEntry::Napot { base, order, flags } => pmp_set(csr, n, flags, base, order),
            PmpEntry::Tor { start, end, flags } => pmp_set_tor(csr, n, flags, start, end),
        }
    }
}

/// Outcome of [`configure`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PmpReport {
    /// Number of PMP slots programmed.
    pub slots: usize,
    /// Number of regions enforced.
    pub configured: usize,
    /// Number of regions left unprotected.
    pub skipped: usize,
}

/// Largest `pmpaddr` value with `bits` implemented bits.
fn pmp_addr_max(bits: u32) -> usize {
    match bits {
        0 => 0,
        _ => {
            let top = 1usize << (bits.min(usize::BITS) - 1);
            top | (top - 1)
        }
    }
}

/// Translates region permissions into PMP permissions.
fn pmp_flags(flags: RegionFlags) -> PmpFlags {
    let mut pmp = PmpFlags::empty();
    if flags.contains(RegionFlags::READABLE) {
        pmp |= PmpFlags::R;
    }
    if flags.contains(RegionFlags::WRITEABLE) {
        pmp |= PmpFlags::W;
    }
    if flags.contains(RegionFlags::EXECUTABLE) {
        pmp |= PmpFlags::X;
    }
    if flags.contains(RegionFlags::MMODE) {
        pmp |= PmpFlags::L;
    }
    pmp
}

/// Returns the `pmpcfg` register holding the configuration of entry `n`, and the offset of
/// its octet. Only even `pmpcfg` registers exist on RV64.
fn pmpcfg_location(n: usize) -> (Csr, usize) {
    if XLEN == 64 {
        (Csr::pmpcfg((n >> 2) & !1), (n & 7) * 8)
    } else {
        (Csr::pmpcfg(n >> 2), (n & 3) * 8)
    }
}

/// Writes `addr` to `pmpaddr<n>`, then the configuration octet of entry `n`.
fn write_entry<H: HartCsr + ?Sized>(csr: &mut H, n: usize, cfg: PmpFlags, addr: usize) {
    let (cfg_csr, shift) = pmpcfg_location(n);

    let pmpcfg = csr.read(cfg_csr) & !(0xff << shift);
    let pmpcfg = pmpcfg | ((cfg.bits() as usize) << shift);

    csr.write(Csr::pmpaddr(n), addr);
    csr.write(cfg_csr, pmpcfg);
}

/// Protects the `1 << order` bytes at `addr` with PMP entry `n`.
///
/// Order 2 is encoded as NA4, order XLEN covers the whole address space.
pub fn pmp_set<H: HartCsr + ?Sized>(
    csr: &mut H,
    n: usize,
    flags: PmpFlags,
    addr: usize,
    order: u32,
) -> Result<(), PmpError> {
    if n >= PMP_MAX_ENTRIES {
        return Err(PmpError::InvalidEntry(n));
    }
    if !(PMP_SHIFT..=XLEN).contains(&order) {
        return Err(PmpError::InvalidOrder(order));
    }

    let flags = flags.without_matching();
    let (cfg, pmpaddr) = if order == PMP_SHIFT {
        (flags | PmpFlags::A_NA4, addr >> PMP_SHIFT)
    } else if order == XLEN {
        (flags | PmpFlags::A_NAPOT, !0)
    } else {
        let addrmask = (1usize << (order - PMP_SHIFT)) - 1;
        let pmpaddr = ((addr >> PMP_SHIFT) & !addrmask) | (addrmask >> 1);
        (flags | PmpFlags::A_NAPOT, pmpaddr)
    };

    write_entry(csr, n, cfg, pmpaddr);
    Ok(())
}

/// Protects `[start, end)` with PMP entries `n` and `n + 1`.
///
/// Entry `n` only holds the lower bound and matches nothing by itself, entry `n + 1` uses TOR
/// matching and carries the permissions.
pub fn pmp_set_tor<H: HartCsr + ?Sized>(
    csr: &mut H,
    n: usize,
    flags: PmpFlags,
    start: usize,
    end: usize,
) -> Result<(), PmpError> {
    if n + 1 >= PMP_MAX_ENTRIES {
        return Err(PmpError::InvalidEntry(n + 1));
    }

    let flags = flags.without_matching();

    write_entry(csr, n, flags, start >> PMP_SHIFT);
    write_entry(csr, n + 1, flags | PmpFlags::A_TOR, end >> PMP_SHIFT);
    Ok(())
}

/// Programs the PMP entries of the executing hart for the regions of `domain`.
///
/// Regions that cannot be encoded are skipped with a warning. Configuration stops when the
/// implemented entries run out.
pub fn configure<H: HartCsr + ?Sized>(
    csr: &mut H,
    features: &HartFeatures,
    domain: &Domain<'_>,
) -> PmpReport {
    let count = features.pmp_count as usize;
    let mut report = PmpReport::default();

    if count == 0 {
        report.skipped = domain.regions.len();
        return report;
    }

    for (i, region) in domain.regions.iter().enumerate() {
        if report.slots >= count {
            debug!(
                "domain {}: PMP entries exhausted, {} regions left",
                domain.name,
                domain.regions.len() - i
            );
            report.skipped += domain.regions.len() - i;
            break;
        }

        let entry = match PmpEntry::from_region(region, features) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(
                    "domain {}: cannot protect region {:#x} (order {}): {}",
                    domain.name,
                    region.base,
                    region_order(region),
                    e
                );
                report.skipped += 1;
                continue;
            }
        };

        if report.slots + entry.slots() > count {
            warn!(
                "domain {}: no room for range {:#x}..{:#x}",
                domain.name,
                region.base,
                region.end()
            );
            report.skipped += 1;
            continue;
        }

        match entry.program(csr, report.slots) {
            Ok(()) => {
                report.slots += entry.slots();
                report.configured += 1;
            }
            Err(e) => {
                warn!("domain {}: region {:#x}: {}", domain.name, region.base, e);
                report.skipped += 1;
            }
        }
    }

    if csr.hart_id() == domain.boot_hartid {
        info!(
            "domain {}: {} regions in {}/{} PMP entries, {} skipped",
            domain.name, report.configured, report.slots, count, report.skipped
        );
    }

    report
}

fn region_order(region: &MemRegion) -> u32 {
    match region.extent {
        RegionExtent::Napot { order } => order,
        RegionExtent::Tor { size } => usize::BITS - size.leading_zeros(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockHart;

    fn rw() -> RegionFlags {
        RegionFlags::READABLE | RegionFlags::WRITEABLE
    }

    fn rwx() -> RegionFlags {
        rw() | RegionFlags::EXECUTABLE
    }

    fn features(pmp_count: u32) -> HartFeatures {
        HartFeatures {
            pmp_count,
            pmp_gran: 4096,
            pmp_addr_bits: 34,
            ..HartFeatures::default()
        }
    }

    fn hart() -> MockHart {
        MockHart::new("imacsu").with_pmp(16, !0)
    }

    fn cfg_octet(hart: &MockHart, n: usize) -> PmpFlags {
        let (reg, shift) = pmpcfg_location(n);
        PmpFlags::from_bits_truncate((hart.value(reg) >> shift) as u8)
    }

    #[test]
    fn aligned_region_uses_one_slot() {
        let mut hart = hart();
        let regions = [MemRegion::napot(0x8000_0000, 12, rwx())];

        let report = configure(&mut hart, &features(16), &Domain::new("root", 0, &regions));

        assert_eq!(
            report,
            PmpReport {
                slots: 1,
                configured: 1,
                skipped: 0
            }
        );
        assert_eq!(hart.value(Csr::PMPADDR0), 0x2000_01ff);
        assert_eq!(
            cfg_octet(&hart, 0),
            PmpFlags::A_NAPOT | PmpFlags::R | PmpFlags::W | PmpFlags::X
        );
        assert!(hart.writes_to(Csr::pmpaddr(1)).is_empty());
    }

    #[test]
    fn bounded_region_uses_two_slots() {
        let mut hart = hart();
        let regions = [MemRegion::tor(0x8020_0000, 0x12_3456, rw())];

        let report = configure(&mut hart, &features(16), &Domain::new("root", 0, &regions));

        assert_eq!(report.slots, 2);
        assert_eq!(hart.value(Csr::pmpaddr(0)), 0x8020_0000 >> 2);
        assert_eq!(hart.value(Csr::pmpaddr(1)), 0x8032_3000 >> 2);

        let first = cfg_octet(&hart, 0);
        let second = cfg_octet(&hart, 1);
        assert_eq!(first & PmpFlags::A, PmpFlags::empty());
        assert_eq!(second & PmpFlags::A, PmpFlags::A_TOR);
        assert_eq!(second.without_matching(), PmpFlags::R | PmpFlags::W);
    }

    #[test]
    fn slot_cursor_is_shared() {
        let mut hart = hart();
        let regions = [
            MemRegion::napot(0x8000_0000, 16, rwx()),
            MemRegion::tor(0x9000_0000, 0x3000, rw()),
            MemRegion::napot(0x1000_0000, 12, rw()),
        ];

        let report = configure(&mut hart, &features(16), &Domain::new("root", 0, &regions));

        assert_eq!(report.slots, 4);
        assert_eq!(report.configured, 3);
        assert_eq!(cfg_octet(&hart, 1) & PmpFlags::A, PmpFlags::empty());
        assert_eq!(cfg_octet(&hart, 2) & PmpFlags::A, PmpFlags::A_TOR);
        assert_eq!(cfg_octet(&hart, 3) & PmpFlags::A, PmpFlags::A_NAPOT);
        assert_eq!(hart.value(Csr::pmpaddr(3)), (0x1000_0000 >> 2) | 0x1ff);
    }

    #[test]
    fn no_pmp_programs_nothing() {
        let mut hart = hart();
        let regions = [
            MemRegion::napot(0x8000_0000, 12, rwx()),
            MemRegion::tor(0x9000_0000, 0x3000, rw()),
        ];

        let report = configure(&mut hart, &features(0), &Domain::new("root", 0, &regions));

        assert_eq!(
            report,
            PmpReport {
                slots: 0,
                configured: 0,
                skipped: 2
            }
        );
        assert!(hart.writes_to(Csr::PMPCFG0).is_empty());
        assert!(hart.writes_to(Csr::PMPADDR0).is_empty());
    }

    #[test]
    fn unfit_regions_are_skipped() {
        let mut hart = hart();
        let regions = [
            // Smaller than the granularity
            MemRegion::napot(0x8000_0000, 10, rwx()),
            // Beyond 34 address bits
            MemRegion::napot(0x4_0000_0000_0000 >> 8, 12, rwx()),
            MemRegion::napot(0x8000_0000, 20, rw()),
        ];

        let report = configure(&mut hart, &features(16), &Domain::new("root", 0, &regions));

        assert_eq!(report.configured, 1);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.slots, 1);
        assert_eq!(hart.value(Csr::PMPADDR0), (0x8000_0000 >> 2) | 0x1_ffff);
    }

    #[test]
    fn stops_when_slots_run_out() {
        let mut hart = hart();
        let regions = [
            MemRegion::napot(0x8000_0000, 12, rw()),
            MemRegion::napot(0x8001_0000, 12, rw()),
            MemRegion::napot(0x8002_0000, 12, rw()),
        ];

        let report = configure(&mut hart, &features(2), &Domain::new("root", 0, &regions));

        assert_eq!(report.configured, 2);
        assert_eq!(report.skipped, 1);
        assert!(hart.writes_to(Csr::pmpaddr(2)).is_empty());
    }

    #[test]
    fn bounded_region_needs_two_free_slots() {
        let mut hart = hart();
        let regions = [
            MemRegion::napot(0x8000_0000, 12, rw()),
            MemRegion::tor(0x9000_0000, 0x3000, rw()),
        ];

        let report = configure(&mut hart, &features(2), &Domain::new("root", 0, &regions));

        assert_eq!(report.slots, 1);
        assert_eq!(report.skipped, 1);
        assert!(hart.writes_to(Csr::pmpaddr(1)).is_empty());
    }

    #[test]
    fn last_slot_goes_to_next_fitting_region() {
        let mut hart = hart();
        let regions = [
            MemRegion::napot(0x8000_0000, 12, rw()),
            MemRegion::tor(0x9000_0000, 0x3000, rw()),
            MemRegion::napot(0x8001_0000, 12, rwx()),
        ];

        let report = configure(&mut hart, &features(2), &Domain::new("root", 0, &regions));

        assert_eq!(
            report,
            PmpReport {
                slots: 2,
                configured: 2,
                skipped: 1
            }
        );
        assert_eq!(hart.value(Csr::pmpaddr(1)), (0x8001_0000 >> 2) | 0x1ff);
        assert_eq!(cfg_octet(&hart, 1) & PmpFlags::A, PmpFlags::A_NAPOT);
    }

    #[test]
    fn special_orders() {
        let mut hart = hart();

        pmp_set(&mut hart, 0, PmpFlags::R, 0x8000_0004, 2).unwrap();
        assert_eq!(cfg_octet(&hart, 0), PmpFlags::A_NA4 | PmpFlags::R);
        assert_eq!(hart.value(Csr::PMPADDR0), 0x2000_0001);

        pmp_set(&mut hart, 1, PmpFlags::R | PmpFlags::W, 0, XLEN).unwrap();
        assert_eq!(cfg_octet(&hart, 1), PmpFlags::A_NAPOT | PmpFlags::R | PmpFlags::W);
        assert_eq!(hart.value(Csr::pmpaddr(1)), !0);

        assert_eq!(
            pmp_set(&mut hart, 2, PmpFlags::R, 0, 1),
            Err(PmpError::InvalidOrder(1))
        );
        assert_eq!(
            pmp_set(&mut hart, 2, PmpFlags::R, 0, XLEN + 1),
            Err(PmpError::InvalidOrder(XLEN + 1))
        );
        assert_eq!(
            pmp_set(&mut hart, PMP_MAX_ENTRIES, PmpFlags::R, 0, 12),
            Err(PmpError::InvalidEntry(PMP_MAX_ENTRIES))
        );
    }

    #[test]
    fn cfg_octets_are_preserved() {
        let mut hart = hart().with_csr(Csr::pmpcfg(0), 0x1122_3344, !0);

        pmp_set(&mut hart, 1, PmpFlags::X, 0x8000_0000, 12).unwrap();

        let pmpcfg = hart.value(Csr::PMPCFG0);
        assert_eq!(pmpcfg & 0xff, 0x44);
        assert_eq!(pmpcfg >> 16, 0x1122);
        assert_eq!((pmpcfg >> 8) & 0xff, (PmpFlags::A_NAPOT | PmpFlags::X).bits() as usize);
    }

    #[test]
    fn pmpcfg_layout() {
        if XLEN == 64 {
            assert_eq!(pmpcfg_location(9), (Csr::pmpcfg(2), 8));
            assert_eq!(pmpcfg_location(7), (Csr::pmpcfg(0), 56));
            assert_eq!(pmpcfg_location(63), (Csr::pmpcfg(14), 56));
        } else {
            assert_eq!(pmpcfg_location(9), (Csr::pmpcfg(2), 8));
            assert_eq!(pmpcfg_location(7), (Csr::pmpcfg(1), 24));
        }
    }

    #[test]
    fn machine_mode_regions_are_locked() {
        let mut hart = hart();
        let regions = [MemRegion::napot(
            0x8000_0000,
            16,
            RegionFlags::MMODE | RegionFlags::READABLE,
        )];

        configure(&mut hart, &features(16), &Domain::new("root", 0, &regions));

        assert_eq!(cfg_octet(&hart, 0), PmpFlags::A_NAPOT | PmpFlags::R | PmpFlags::L);
    }

    #[test]
    fn address_limits() {
        assert_eq!(pmp_addr_max(0), 0);
        assert_eq!(pmp_addr_max(32), 0xffff_ffff);
        assert_eq!(pmp_addr_max(usize::BITS), !0);
    }
}
