//! Per-hart scratch storage.
//!
//! Every hart owns a [`Scratch`] area of [`SCRATCH_SIZE`] bytes. Subsystems that need per-hart
//! state reserve a slice of it once, through the global offset allocator, and get back a typed
//! [`ScratchOffset`] which is then valid in the scratch area of every hart.

use core::{fmt, marker::PhantomData, mem};

use spin::Mutex;
use static_assertions::const_assert_eq;

use crate::config::{MAX_HARTS, SCRATCH_ALIGN, SCRATCH_SIZE};

/// Allocator handing out the offsets shared by all harts.
pub static SCRATCH_OFFSETS: ScratchAllocator = ScratchAllocator::new();

/// Reserves space for a `T` in the scratch area of every hart.
///
/// Returns `None` if the scratch area is exhausted.
pub fn alloc_offset<T: ScratchItem>() -> Option<ScratchOffset<T>> {
    SCRATCH_OFFSETS.alloc()
}

/// Types that can live in scratch space.
///
/// # Safety
///
/// Any bit pattern, including all zeroes, must be a valid value of the implementing type, and
/// its alignment must not exceed [`SCRATCH_ALIGN`].
pub unsafe trait ScratchItem: Sized {}

macro_rules! impl_scratch_item {
    ($($t:ty),*) => {
        $(
            // SAFETY: all bit patterns are valid integers
            unsafe impl ScratchItem for $t {}
        )*
    };
}

impl_scratch_item!(u8, u16, u32, u64, usize);

/// The scratch area of a single hart.
#[repr(C, align(16))]
pub struct Scratch {
    data: [u8; SCRATCH_SIZE],
}

const_assert_eq!(mem::align_of::<Scratch>(), SCRATCH_ALIGN);

impl Scratch {
    /// Creates a zero-filled scratch area.
    pub const fn new() -> Self {
        Self {
            data: [0; SCRATCH_SIZE],
        }
    }

    /// Returns a reference to the item stored at `offset`.
    pub fn get<T: ScratchItem>(&self, offset: ScratchOffset<T>) -> &T {
        // SAFETY: offsets are only produced by `ScratchAllocator`, which keeps them in bounds and
        // aligned. `T: ScratchItem` makes any content a valid `T`.
        unsafe { &*(self.data.as_ptr().add(offset.offset) as *const T) }
    }

    /// Returns a mutable reference to the item stored at `offset`.
    pub fn get_mut<T: ScratchItem>(&mut self, offset: ScratchOffset<T>) -> &mut T {
        // SAFETY: see `get`
        unsafe { &mut *(self.data.as_mut_ptr().add(offset.offset) as *mut T) }
    }
}

impl Default for Scratch {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Scratch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scratch")
            .field("size", &SCRATCH_SIZE)
            .finish()
    }
}

/// Location of a `T` inside every hart's scratch area.
pub struct ScratchOffset<T> {
    offset: usize,
    _item: PhantomData<fn() -> T>,
}

impl<T> ScratchOffset<T> {
    /// Returns the offset in bytes from the start of the scratch area.
    pub const fn offset(self) -> usize {
        self.offset
    }
}

impl<T> Clone for ScratchOffset<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ScratchOffset<T> {}

impl<T> PartialEq for ScratchOffset<T> {
    fn eq(&self, other: &Self) -> bool {
        self.offset == other.offset
    }
}

impl<T> Eq for ScratchOffset<T> {}

impl<T> fmt::Debug for ScratchOffset<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScratchOffset({:#x})", self.offset)
    }
}

/// A bump allocator for scratch offsets.
///
/// Offsets are never given back: scratch space is reserved once during cold boot and stays
/// reserved for the lifetime of the firmware.
#[derive(Debug)]
pub struct ScratchAllocator {
    inner: Mutex<BumpImpl>,
}

#[derive(Debug)]
struct BumpImpl {
    ptr: usize,
    allocated: usize,
}

impl ScratchAllocator {
    /// Creates a new allocator covering a whole scratch area.
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(BumpImpl {
                ptr: 0,
                allocated: 0,
            }),
        }
    }

    /// Reserves space for a `T`, returning its offset.
    pub fn alloc<T: ScratchItem>(&self) -> Option<ScratchOffset<T>> {
        let align = mem::align_of::<T>();
        if align > SCRATCH_ALIGN {
            return None;
        }

        let mut bump = self.inner.lock();

        let offset = bump.ptr.checked_add(align - 1)? & !(align - 1);
        let next = offset.checked_add(mem::size_of::<T>())?;
        if next > SCRATCH_SIZE {
            return None;
        }

        bump.ptr = next;
        bump.allocated += 1;

        Some(ScratchOffset {
            offset,
            _item: PhantomData,
        })
    }

    /// Returns the number of bytes still available, ignoring alignment.
    pub fn remaining(&self) -> usize {
        SCRATCH_SIZE - self.inner.lock().ptr
    }

    /// Returns the number of offsets handed out so far.
    pub fn allocated(&self) -> usize {
        self.inner.lock().allocated
    }
}

impl Default for ScratchAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Scratch areas of all harts, indexed by hart index.
#[derive(Debug)]
pub struct ScratchArena<const N: usize = MAX_HARTS> {
    harts: [Scratch; N],
}

const EMPTY_SCRATCH: Scratch = Scratch::new();

impl<const N: usize> ScratchArena<N> {
    /// Creates an arena of `N` zero-filled scratch areas.
    pub const fn new() -> Self {
        Self {
            harts: [EMPTY_SCRATCH; N],
        }
    }

    /// Returns the scratch area of hart `index`.
    pub fn get(&self, index: usize) -> Option<&Scratch> {
        self.harts.get(index)
    }

    /// Returns the scratch area of hart `index` for modification.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Scratch> {
        self.harts.get_mut(index)
    }

    /// Returns the number of harts in the arena.
    pub const fn len(&self) -> usize {
        N
    }

    /// Returns `true` if the arena holds no hart at all.
    pub const fn is_empty(&self) -> bool {
        N == 0
    }
}

impl<const N: usize> Default for ScratchArena<N> {
    fn default() -> Self {
        Self::new()
    }
}
