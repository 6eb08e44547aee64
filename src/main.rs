use anyhow::Result;

#[macro_use]
extern crate log;

use railcheck::config;
use railcheck::divergence;
use railcheck::paths;
use railcheck::report::ReportDirs;
use railcheck::{analyze_netlist, flatten_netlist_file, NetlistAnalysis};

fn run_one(reports: &ReportDirs, label: &str, path: &str) -> Result<NetlistAnalysis> {
    info!("flattening netlist '{path}'...");
    let flat = flatten_netlist_file(path)?;
    reports.write_stage1(label, &flat.intermediate, &flat.bench)?;
    info!("propagating probabilities for '{label}'...");
    let analysis = analyze_netlist(&flat.bench)?;
    let listing = paths::render_output_paths(&analysis.elements, &analysis.output_paths);
    reports.write_paths(label, &listing)?;
    reports.write_transitions(label, &analysis.elements)?;
    Ok(analysis)
}

fn main() -> Result<()> {
    let config = config::config();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(
        if config.verbose { "debug" } else { "info" },
    ))
    .init();

    let reports = ReportDirs::new(&config.output_dir);
    let clean = run_one(&reports, "clean", &config.netlist)?;
    let trojan = run_one(&reports, "trojan", &config.trojan)?;

    let divergences = divergence::compare(&clean.elements, &trojan.elements);
    let report = divergence::render_report(&divergences);
    reports.write_divergences(&report)?;
    if divergences.is_empty() {
        info!("no divergences found");
    } else {
        warn!("{} divergent/unmatched outputs reported", divergences.len());
    }
    info!("reports written under '{}'", reports.root().display());
    Ok(())
}
