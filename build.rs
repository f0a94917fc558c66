//! Build script for portman
//!
//! Embeds build-time information (git commit, dirty status, build timestamp)
//! shown by `portman --version`.

fn main() {
    // Re-run build if the default rules path override changes
    println!("cargo:rerun-if-env-changed=PORTMAN_DEFAULT_RULES_FILE");

    shadow_rs::ShadowBuilder::builder()
        .build()
        .expect("Failed to generate build info");
}
