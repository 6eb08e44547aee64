//! Command-line parsing for the app.

use clap::Parser;
use std::sync::OnceLock;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    #[arg(long)]
    /// Path to the reference (clean) synthesized netlist.
    pub netlist: String,
    #[arg(long)]
    /// Path to the trojan-candidate synthesized netlist.
    pub trojan: String,
    #[arg(long, default_value = "results")]
    /// Directory where all report artifacts are written.
    pub output_dir: String,
    #[arg(short, long)]
    /// More verbose output.
    pub verbose: bool,
}

static CONFIG: OnceLock<Config> = OnceLock::new();

pub fn config() -> &'static Config {
    CONFIG.get_or_init(Config::parse)
}
