//! Memory domains, as seen by the hart core.
//!
//! Building the domain catalog (parsing the device tree, merging regions) is the job of the
//! platform. The hart core only consumes the result: an ordered list of regions for the domain
//! the hart is about to enter.

use bitflags::bitflags;

bitflags! {
    /// Access permissions of a memory region.
    pub struct RegionFlags: usize {
        /// Lower modes may read from the region.
        const READABLE = 1 << 0;
        /// Lower modes may write to the region.
        const WRITEABLE = 1 << 1;
        /// Lower modes may execute from the region.
        const EXECUTABLE = 1 << 2;
        /// Permissions are also enforced on M-mode.
        const MMODE = 1 << 3;
    }
}

/// Extent of a memory region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionExtent {
    /// Naturally aligned region of `1 << order` bytes.
    Napot {
        /// Base-two logarithm of the size.
        order: u32,
    },
    /// Region of arbitrary size, `size` bytes long.
    Tor {
        /// Size in bytes.
        size: usize,
    },
}

/// A memory region of a domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemRegion {
    /// Physical base address.
    pub base: usize,
    /// Size of the region and how it is encoded.
    pub extent: RegionExtent,
    /// Access permissions.
    pub flags: RegionFlags,
}

impl MemRegion {
    /// Creates a naturally aligned region of `1 << order` bytes.
    pub const fn napot(base: usize, order: u32, flags: RegionFlags) -> Self {
        Self {
            base,
            extent: RegionExtent::Napot { order },
            flags,
        }
    }

    /// Creates a region spanning `[base, base + size)`.
    pub const fn tor(base: usize, size: usize, flags: RegionFlags) -> Self {
        Self {
            base,
            extent: RegionExtent::Tor { size },
            flags,
        }
    }

    /// Returns the first address past the end of the region, saturating at the top of the
    /// address space.
    pub fn end(&self) -> usize {
        match self.extent {
            RegionExtent::Napot { order } if order >= usize::BITS => usize::MAX,
            RegionExtent::Napot { order } => self.base.saturating_add(1 << order),
            RegionExtent::Tor { size } => self.base.saturating_add(size),
        }
    }
}

/// A domain: the set of regions one or more harts are confined to.
#[derive(Debug, Clone, Copy)]
pub struct Domain<'a> {
    /// Human-readable name, used in diagnostics.
    pub name: &'a str,
    /// Hart in charge of reporting on this domain.
    pub boot_hartid: usize,
    /// Regions, in priority order.
    pub regions: &'a [MemRegion],
}

impl<'a> Domain<'a> {
    /// Creates a new domain.
    pub const fn new(name: &'a str, boot_hartid: usize, regions: &'a [MemRegion]) -> Self {
        Self {
            name,
            boot_hartid,
            regions,
        }
    }
}
