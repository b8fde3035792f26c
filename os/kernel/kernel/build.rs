use kernel_info::memory;
use std::{env, path::PathBuf};

fn main() {
    // Only the bare-metal build links against the kernel layout.
    if env::var("CARGO_CFG_TARGET_OS").as_deref() != Ok("none") {
        return;
    }

    // Point to the linker script
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").expect("set by cargo"));
    let ld = manifest_dir.join("kernel.ld");

    // Sanity checks (fail fast during build)
    let kernlink = memory::KERNLINK;
    let extmem = memory::EXTMEM;
    assert_eq!(
        kernlink & (memory::PAGE_SIZE - 1),
        0,
        "KERNLINK must be 4 KiB aligned (got {kernlink:#x})"
    );
    assert_eq!(
        kernlink - extmem,
        memory::KERNBASE,
        "KERNLINK must sit at KERNBASE + EXTMEM"
    );

    // Rebuild when inputs change
    println!("cargo:rerun-if-changed={}", ld.display());

    // Linker script
    println!("cargo:rustc-link-arg-bins=-T{}", ld.display());

    // Provide symbols to the linker script
    println!("cargo:rustc-link-arg-bins=--defsym=KERNLINK={kernlink:#x}");
    println!("cargo:rustc-link-arg-bins=--defsym=EXTMEM={extmem:#x}");
}
