use std::env;

fn main() {
    let arch = env::var("CARGO_CFG_TARGET_ARCH").unwrap();
    let features = env::var("CARGO_CFG_TARGET_FEATURE").unwrap_or_default();
    let has = |f: &str| features.split(',').any(|feat| feat == f);

    let (xlen, prefix) = match arch.as_str() {
        "riscv64" => ("64", "lp64"),
        "riscv32" => ("32", "ilp32"),
        _ => {
            println!("cargo:rerun-if-changed=build.rs");
            return;
        }
    };

    // The handlers must follow the float ABI of the Rust code they are linked with
    let (march, mabi) = if has("d") {
        (format!("rv{}imafdc", xlen), format!("{}d", prefix))
    } else if has("f") {
        (format!("rv{}imafc", xlen), format!("{}f", prefix))
    } else {
        (format!("rv{}imac", xlen), prefix.to_string())
    };

    // Build the expected-trap handlers used by CSR probing
    cc::Build::new()
        .compiler("riscv64-elf-gcc")
        .flag(&format!("-march={}", march))
        .flag(&format!("-mabi={}", mabi))
        .file("src/arch/riscv/expected_trap.S")
        .compile("libprobe.a");

    println!("cargo:rerun-if-changed=src/arch/riscv/expected_trap.S");
    println!("cargo:rerun-if-changed=build.rs");
}
