use clap::Args;

#[derive(Debug, Clone, Args)]
pub struct VersionCommand {}

impl VersionCommand {
    pub fn execute(self) {
        println!("{}", version_string());
    }
}

/// Crate version baked in at build time, or "unknown" when unavailable.
fn version_string() -> &'static str {
    option_env!("CARGO_PKG_VERSION").unwrap_or("unknown")
}
