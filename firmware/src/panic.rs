//! Panic behavior of the firmware.

#[cfg(all(not(test), target_os = "none"))]
use core::panic::PanicInfo;

/// Reports the panic on the console and parks the hart.
#[cfg(all(not(test), target_os = "none"))]
#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    sbi_println!("Firmware panic: {}", info);

    sbi_println!("Halting!");

    #[cfg(any(target_arch = "riscv32", target_arch = "riscv64"))]
    loop {
        riscv::instructions::wfi();
    }

    #[cfg(not(any(target_arch = "riscv32", target_arch = "riscv64")))]
    loop {
        core::hint::spin_loop();
    }
}
