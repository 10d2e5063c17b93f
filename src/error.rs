use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors raised while building circuits, decoding result files or running the simulator.
#[derive(Debug, Error)]
pub enum Error {
    /// A value literal such as `4.7kx` could not be parsed.
    #[error("invalid value literal '{literal}': {reason}")]
    Parse { literal: String, reason: String },

    #[error("duplicate id '{id}': already used by '{existing}'")]
    DuplicateId { id: String, existing: String },

    #[error("invalid {field} for '{id}': {reason}")]
    InvalidValue {
        id: String,
        field: &'static str,
        reason: String,
    },

    #[error("invalid .{analysis} analysis: {reason}")]
    InvalidAnalysis {
        analysis: &'static str,
        reason: String,
    },

    /// The text header of a result file is missing a key or holds a bad value.
    #[error("malformed result header at line {line}: {reason}")]
    MalformedHeader { line: usize, reason: String },

    /// An ASCII data section contains a token that is not a number where one is required.
    #[error("malformed result data at line {line}: {reason} (token '{token}')")]
    MalformedData {
        line: usize,
        token: String,
        reason: String,
    },

    #[error("truncated result file: expected {expected} {unit} after offset {offset}, found {found}")]
    TruncatedFile {
        expected: usize,
        found: usize,
        unit: &'static str,
        offset: usize,
    },

    #[error("unsupported result flags '{flags}': {reason}")]
    UnsupportedFlag { flags: String, reason: String },

    #[error("unknown variable '{name}', available: {}", .available.join(", "))]
    UnknownVariable { name: String, available: Vec<String> },

    #[error("variable '{name}' holds real samples, no phase available")]
    NotComplex { name: String },

    #[error("simulator {} exited with {}: {stderr}", .executable.display(), exit_text(.status))]
    SimulationFailed {
        executable: PathBuf,
        status: Option<i32>,
        stderr: String,
    },

    #[error("simulation of {} timed out after {:.1}s", .netlist.display(), .timeout.as_secs_f64())]
    SimulationTimeout { netlist: PathBuf, timeout: Duration },

    /// The simulator exited cleanly but left no result file behind.
    #[error("no result file at {}{}", .path.display(), log_suffix(.log))]
    MissingResult { path: PathBuf, log: String },

    #[error("failed to write {format} output: {reason}")]
    Export { format: &'static str, reason: String },

    #[error("simulator not found: {0}")]
    SimulatorNotFound(String),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

fn exit_text(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("status {code}"),
        None => "a signal".to_string(),
    }
}

fn log_suffix(log: &str) -> String {
    if log.is_empty() {
        String::new()
    } else {
        format!("\nlog:\n{log}")
    }
}

pub type Result<T> = std::result::Result<T, Error>;
