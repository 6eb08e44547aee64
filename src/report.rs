//! Report artifacts written under the configured output directory.

use crate::elements::ElementTable;
use anyhow::{Context, Result};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// Root of the artifact tree; subdirectories are created on demand.
#[derive(Debug, Clone)]
pub struct ReportDirs {
    root: PathBuf,
}

impl ReportDirs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn write(&self, sub: &str, file: String, contents: &str) -> Result<PathBuf> {
        let dir = if sub.is_empty() {
            self.root.clone()
        } else {
            self.root.join(sub)
        };
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("creating report directory {}", dir.display()))?;
        let path = dir.join(file);
        std::fs::write(&path, contents)
            .with_context(|| format!("writing report file {}", path.display()))?;
        Ok(path)
    }

    /// Stage-1 products: the resolved intermediate text and the bench
    /// netlist, kept for inspection.
    pub fn write_stage1(&self, label: &str, intermediate: &str, bench: &str) -> Result<()> {
        self.write("", format!("{label}_resolved.txt"), intermediate)?;
        self.write("", format!("{label}_netlist.txt"), bench)?;
        Ok(())
    }

    pub fn write_paths(&self, label: &str, listing: &str) -> Result<PathBuf> {
        self.write("Outputs", format!("Output_{label}.txt"), listing)
    }

    pub fn write_divergences(&self, report: &str) -> Result<PathBuf> {
        self.write("Divergences", "Output_Divergences.txt".to_owned(), report)
    }

    /// Per-element transition probability table: `prob_0 * prob_1`.
    pub fn write_transitions(&self, label: &str, table: &ElementTable) -> Result<PathBuf> {
        let mut out = String::from("Element\tTransition Probability\n");
        for (id, elem) in table {
            let _ = writeln!(out, "   {id}\t\t      {}", elem.prob_0 * elem.prob_1);
        }
        self.write("Table_Transitions", format!("Prob_{label}.txt"), &out)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
