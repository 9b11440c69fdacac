use std::env;

fn link_pcsclite(target_os: &str) {
    if let Ok(lib_dir) = env::var("PCSC_LIB_DIR") {
        let lib_name = env::var("PCSC_LIB_NAME").unwrap_or_else(|_| "pcsclite".to_owned());
        println!("cargo:rustc-link-search=native={}", lib_dir);
        println!("cargo:rustc-link-lib={}", lib_name);
        return;
    }

    if let Err(err) = pkg_config::Config::new().atleast_version("1").probe("libpcsclite") {
        panic!(
            "no PC/SC library for target OS `{}`: pkg-config could not find libpcsclite ({}).\n\
             Install the pcsclite development package or set PCSC_LIB_DIR.",
            target_os, err
        );
    }
}

fn main() {
    println!("cargo:rerun-if-env-changed=PCSC_LIB_DIR");
    println!("cargo:rerun-if-env-changed=PCSC_LIB_NAME");

    let target_os = env::var("CARGO_CFG_TARGET_OS").expect("CARGO_CFG_TARGET_OS is not set");

    match target_os.as_str() {
        "windows" => println!("cargo:rustc-link-lib=dylib=winscard"),
        "macos" => println!("cargo:rustc-link-lib=framework=PCSC"),
        other => link_pcsclite(other),
    }
}
