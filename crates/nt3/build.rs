// Build provenance reported by `nt3 version --extended`.
fn main() {
    for (from, to) in [("TARGET", "NT3_BUILD_TARGET"), ("PROFILE", "NT3_BUILD_PROFILE")] {
        if let Ok(value) = std::env::var(from) {
            println!("cargo:rustc-env={to}={value}");
        }
        println!("cargo:rerun-if-env-changed={from}");
    }
}
