//! Hierarchical dual-rail netlist flattening and probabilistic divergence
//! analysis, the core of a hardware-trojan detection workflow.
//!
//! Stage 1 resolves a synthesized hierarchical netlist down to primitive
//! gates and serializes it as a flat canonical graph; stage 2 reloads that
//! graph, propagates 0/1 signal probabilities, enumerates source paths and
//! compares two netlists output by output.

use anyhow::Result;
use std::path::Path;

#[macro_use]
extern crate log;

pub mod config;
pub mod divergence;
pub mod elements;
pub mod errors;
pub mod flatten;
pub mod grammar;
pub mod graph;
pub mod paths;
pub mod propagate;
pub mod report;
pub mod signal;
#[macro_use]
pub mod type_utils;

use elements::ElementTable;
use std::collections::BTreeMap;

/// Stage-1 products for one netlist.
#[derive(Debug, Clone)]
pub struct FlattenedNetlist {
    /// Canonical intermediate text (format A).
    pub intermediate: String,
    /// Bench-style canonical netlist (format B).
    pub bench: String,
}

/// Flatten one hierarchical netlist file down to the canonical forms.
pub fn flatten_netlist_file(path: impl AsRef<Path>) -> Result<FlattenedNetlist> {
    let src = grammar::NetlistSource::read(path)?;
    let intermediate = flatten::flatten_netlist(&src)?;
    let circuit = graph::Circuit::from_intermediate(&intermediate)?;
    let bench = circuit.to_bench();
    Ok(FlattenedNetlist {
        intermediate,
        bench,
    })
}

/// Stage-2 products for one netlist: the resolved element table and every
/// output's source paths.
#[derive(Debug, Clone)]
pub struct NetlistAnalysis {
    pub elements: ElementTable,
    pub output_paths: BTreeMap<u32, Vec<Vec<elements::ConnRef>>>,
}

/// Reload a canonical netlist, propagate probabilities and enumerate the
/// output paths.
pub fn analyze_netlist(bench: &str) -> Result<NetlistAnalysis> {
    let mut elements = elements::parse_elements(bench)?;
    propagate::propagate(&mut elements)?;
    let output_paths = paths::find_paths_for_outputs(&elements);
    Ok(NetlistAnalysis {
        elements,
        output_paths,
    })
}
