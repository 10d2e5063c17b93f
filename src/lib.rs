pub mod circuit;
pub mod cli;
pub mod error;
pub mod netlist;
pub mod raw;
pub mod results;
pub mod simulator;
pub mod value;

// Re-export commonly used types
pub use circuit::{Analysis, Circuit, Component, ComponentKind, Node, Source, SourceKind, SourceSpec, SweepKind, Waveform};
pub use error::Error;
pub use raw::{parse_raw, Column, DataEncoding, RawResult, Variable};
pub use results::{AnalysisKind, AnalysisResult, ExportFormat};
pub use simulator::{
    Dialect, ExecutableLocator, ExplicitPath, ProcessBackend, SearchPath, Simulator, SimulatorBackend, SimulatorConfig,
};
pub use value::{format_value, parse_value, IntoOptionalValue, IntoValue};

// Error types
pub type Result<T> = error::Result<T>;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
