//! Raw CSR accesses by number.
//!
//! CSR instructions encode the register number as an immediate, so accessing a register whose
//! number is only known at runtime requires dispatching over every register we may touch.

use core::arch::asm;

use riscv::TrapInfo;

/// Invokes `$callback!` with the numbers of all the CSRs reachable through this module.
macro_rules! with_csr_list {
    ($callback:ident ! ( $($args:tt)* )) => {
        $callback!(
            $($args)*;
            0x003 0x004 0x005 0x040 0x100 0x104 0x105 0x106
            0x140 0x180 0x300 0x301 0x302 0x303 0x304 0x305
            0x306 0x310 0x320 0x340 0x341 0x342 0x343 0x344
            0x34a 0x34b
            0x3a0 0x3a1 0x3a2 0x3a3 0x3a4 0x3a5 0x3a6 0x3a7
            0x3a8 0x3a9 0x3aa 0x3ab 0x3ac 0x3ad 0x3ae 0x3af
            0x3b0 0x3b1 0x3b2 0x3b3 0x3b4 0x3b5 0x3b6 0x3b7
            0x3b8 0x3b9 0x3ba 0x3bb 0x3bc 0x3bd 0x3be 0x3bf
            0x3c0 0x3c1 0x3c2 0x3c3 0x3c4 0x3c5 0x3c6 0x3c7
            0x3c8 0x3c9 0x3ca 0x3cb 0x3cc 0x3cd 0x3ce 0x3cf
            0x3d0 0x3d1 0x3d2 0x3d3 0x3d4 0x3d5 0x3d6 0x3d7
            0x3d8 0x3d9 0x3da 0x3db 0x3dc 0x3dd 0x3de 0x3df
            0x3e0 0x3e1 0x3e2 0x3e3 0x3e4 0x3e5 0x3e6 0x3e7
            0x3e8 0x3e9 0x3ea 0x3eb 0x3ec 0x3ed 0x3ee 0x3ef
            0xb00 0xb02 0xb03 0xb04 0xb05 0xb06 0xb07 0xb08
            0xb09 0xb0a 0xb0b 0xb0c 0xb0d 0xb0e 0xb0f 0xb10
            0xb11 0xb12 0xb13 0xb14 0xb15 0xb16 0xb17 0xb18
            0xb19 0xb1a 0xb1b 0xb1c 0xb1d 0xb1e 0xb1f
            0xb83 0xb84 0xb85 0xb86 0xb87 0xb88 0xb89 0xb8a
            0xb8b 0xb8c 0xb8d 0xb8e 0xb8f 0xb90 0xb91 0xb92
            0xb93 0xb94 0xb95 0xb96 0xb97 0xb98 0xb99 0xb9a
            0xb9b 0xb9c 0xb9d 0xb9e 0xb9f
            0xc01 0xda0 0xf14
        )
    };
}

macro_rules! dispatch {
    ($num:expr, $op:ident, ($($args:expr),*); $($csr:literal)*) => {
        match $num {
            $( $csr => Some($op!($csr $(, $args)*)), )*
            _ => None,
        }
    };
}

macro_rules! csr_read {
    ($csr:literal) => {{
        let value: usize;
        // SAFETY: the caller guarantees that the register exists
        unsafe {
            asm!(concat!("csrr {0}, ", stringify!($csr)), out(reg) value, options(nostack));
        }
        value
    }};
}

macro_rules! csr_write {
    ($csr:literal, $value:expr) => {{
        // SAFETY: the caller guarantees that the register exists and that writing it is sound
        unsafe {
            asm!(concat!("csrw ", stringify!($csr), ", {0}"), in(reg) $value, options(nostack));
        }
    }};
}

macro_rules! csr_swap {
    ($csr:literal, $value:expr) => {{
        let old: usize;
        // SAFETY: the caller guarantees that the register exists and that writing it is sound
        unsafe {
            asm!(
                concat!("csrrw {0}, ", stringify!($csr), ", {1}"),
                out(reg) old,
                in(reg) $value,
                options(nostack)
            );
        }
        old
    }};
}

macro_rules! csr_probe_read {
    ($csr:literal, $trap:expr, $handler:expr) => {{
        let value: usize;
        // SAFETY: `mtvec` points to an expected-trap handler for the duration of the access, so
        // a missing register results in the handler filling `$trap` and skipping the access.
        unsafe {
            asm!(
                "csrrw {mtvec}, mtvec, {mtvec}",
                concat!("csrr {value}, ", stringify!($csr)),
                "csrw mtvec, {mtvec}",
                mtvec = inout(reg) $handler => _,
                value = out(reg) value,
                in("a3") $trap,
                out("a4") _,
                options(nostack)
            );
        }
        value
    }};
}

macro_rules! csr_probe_write {
    ($csr:literal, $trap:expr, $handler:expr, $value:expr) => {{
        // SAFETY: see `csr_probe_read`
        unsafe {
            asm!(
                "csrrw {mtvec}, mtvec, {mtvec}",
                concat!("csrw ", stringify!($csr), ", {value}"),
                "csrw mtvec, {mtvec}",
                mtvec = inout(reg) $handler => _,
                value = in(reg) $value,
                in("a3") $trap,
                out("a4") _,
                options(nostack)
            );
        }
    }};
}

/// Reads CSR `num`. Returns `None` if `num` is not a known register.
///
/// # Safety
///
/// The register must be implemented, otherwise an unexpected trap is raised.
pub unsafe fn read(num: u16) -> Option<usize> {
    with_csr_list!(dispatch!(num, csr_read, ()))
}

/// Writes `value` to CSR `num`. Returns `None` if `num` is not a known register.
///
/// # Safety
///
/// The register must be implemented and the write must not break memory safety.
pub unsafe fn write(num: u16, value: usize) -> Option<()> {
    with_csr_list!(dispatch!(num, csr_write, (value)))
}

/// Swaps the content of CSR `num` with `value`. Returns `None` if `num` is not a known register.
///
/// # Safety
///
/// Same as [`write`].
pub unsafe fn swap(num: u16, value: usize) -> Option<usize> {
    with_csr_list!(dispatch!(num, csr_swap, (value)))
}

/// Reads CSR `num` with `handler` installed as trap vector, recording any trap in `trap`.
///
/// # Safety
///
/// `handler` must be the address of an expected-trap handler, and interrupts must be disabled.
pub unsafe fn read_allowed(num: u16, trap: &mut TrapInfo, handler: usize) -> Option<usize> {
    let trap = trap as *mut TrapInfo;
    with_csr_list!(dispatch!(num, csr_probe_read, (trap, handler)))
}

/// Writes `value` to CSR `num` with `handler` installed as trap vector, recording any trap in
/// `trap`.
///
/// # Safety
///
/// Same as [`read_allowed`]. A successful write must not break memory safety.
pub unsafe fn write_allowed(
    num: u16,
    trap: &mut TrapInfo,
    handler: usize,
    value: usize,
) -> Option<()> {
    let trap = trap as *mut TrapInfo;
    with_csr_list!(dispatch!(num, csr_probe_write, (trap, handler, value)))
}
