// error.rs — Driver-level error type
//
// Diagnostics describe problems in the input; `Error` is what the fallible
// driver APIs return when a run cannot produce its artifact at all.

use std::path::PathBuf;

use crate::pipeline::PipelineError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Syntax errors, already rendered with their locations.
    #[error("{} syntax error(s); first: {}", .0.len(), .0.first().map(String::as_str).unwrap_or(""))]
    Parse(Vec<String>),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("malformed option blob: {0}")]
    MalformedOptions(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
