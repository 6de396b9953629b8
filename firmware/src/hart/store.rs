//! Per-hart storage of the detected features.
//!
//! The offset of the record inside scratch space is reserved once, by the first hart going
//! through a cold boot, and shared by all harts afterwards.

use core::fmt::{self, Write};

use spin::Once;

use super::{
    features::{FeatureFlags, HartFeatures},
    HartError,
};
use crate::scratch::{self, Scratch, ScratchOffset};

static HART_FEATURES_OFFSET: Once<ScratchOffset<HartFeatures>> = Once::new();

/// Reserves the scratch space of the feature record, if not done already.
pub(crate) fn init_offset() -> Result<ScratchOffset<HartFeatures>, HartError> {
    if let Some(offset) = HART_FEATURES_OFFSET.get() {
        return Ok(*offset);
    }

    let offset = scratch::alloc_offset::<HartFeatures>().ok_or(HartError::NoMemory)?;
    Ok(*HART_FEATURES_OFFSET.call_once(|| offset))
}

/// Returns the offset of the feature record, if a cold boot has reserved it.
pub(crate) fn offset() -> Option<ScratchOffset<HartFeatures>> {
    HART_FEATURES_OFFSET.get().copied()
}

/// Returns the features of the hart owning `scratch`.
///
/// # Panics
///
/// Panics if called before any hart went through a cold boot.
pub fn hart_features(scratch: &Scratch) -> &HartFeatures {
    match offset() {
        Some(offset) => scratch.get(offset),
        None => panic!("hart features read before cold boot"),
    }
}

/// Returns `true` if the hart owning `scratch` implements all of `features`.
pub fn has_feature(scratch: &Scratch, features: FeatureFlags) -> bool {
    hart_features(scratch).has(features)
}

/// Returns the number of PMP entries of the hart owning `scratch`.
pub fn pmp_count(scratch: &Scratch) -> u32 {
    hart_features(scratch).pmp_count
}

/// Returns the PMP granularity, in bytes, of the hart owning `scratch`.
pub fn pmp_granularity(scratch: &Scratch) -> usize {
    hart_features(scratch).pmp_gran
}

/// Returns the number of implemented `pmpaddr` bits of the hart owning `scratch`.
pub fn pmp_addr_bits(scratch: &Scratch) -> u32 {
    hart_features(scratch).pmp_addr_bits
}

/// Returns the number of programmable counters of the hart owning `scratch`.
pub fn mhpm_count(scratch: &Scratch) -> u32 {
    hart_features(scratch).mhpm_count
}

/// Returns the width of the programmable counters of the hart owning `scratch`.
pub fn mhpm_bits(scratch: &Scratch) -> u32 {
    hart_features(scratch).mhpm_bits
}

/// Writer filling a fixed buffer, silently dropping what does not fit.
struct Truncating<'a> {
    buf: &'a mut [u8],
    len: usize,
}

impl fmt::Write for Truncating<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let n = s.len().min(self.buf.len() - self.len);
        self.buf[self.len..self.len + n].copy_from_slice(&s.as_bytes()[..n]);
        self.len += n;
        Ok(())
    }
}

/// Renders `features` as a comma-separated list of names into `buf`, or `none` if empty.
///
/// Output that does not fit is cut off at a character boundary. Returns the rendered text.
pub fn features_str(features: FeatureFlags, buf: &mut [u8]) -> &str {
    let mut w = Truncating { buf, len: 0 };

    let mut names = FeatureFlags::NAMED
        .iter()
        .filter(|(flag, _)| features.contains(*flag))
        .map(|(_, name)| *name);

    match names.next() {
        None => {
            let _ = w.write_str("none");
        }
        Some(first) => {
            let _ = w.write_str(first);
            for name in names {
                let _ = write!(w, ",{}", name);
            }
        }
    }

    let Truncating { buf, len } = w;
    let buf: &[u8] = buf;
    match core::str::from_utf8(&buf[..len]) {
        Ok(s) => s,
        Err(e) => core::str::from_utf8(&buf[..e.valid_up_to()]).unwrap_or_default(),
    }
}
