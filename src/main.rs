//! DiskWarden — disk cleanup and analysis from the command line.
//!
//! Thin binary entry point. All logic lives in the `diskwarden-core`
//! and `diskwarden-cli` crates.

fn main() -> anyhow::Result<()> {
    diskwarden_cli::run()
}
