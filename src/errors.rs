//! Error kinds a caller may want to handle differently.
//!
//! Fatal I/O and grammar failures abort the pipeline; a cyclic dependency is
//! its own kind so it can be told apart from ordinary file errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("could not read '{path}'")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("unrecognized netlist structure: {0}")]
    Grammar(String),
    #[error("cyclic dependency detected in netlist")]
    CyclicDependency,
}
