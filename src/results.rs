use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use log::info;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::raw::{parse_raw, Column, RawResult};

/// Analysis that produced a result file, derived from its `Plotname`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    OperatingPoint,
    DcSweep,
    Ac,
    Transient,
    Noise,
    Unknown,
}

impl AnalysisKind {
    pub fn from_plot_name(plot_name: &str) -> Self {
        let lowered = plot_name.to_lowercase();
        let words: Vec<&str> = lowered
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        let has = |word: &str| words.contains(&word);

        if lowered.contains("operating point") {
            AnalysisKind::OperatingPoint
        } else if has("transient") || has("tran") {
            AnalysisKind::Transient
        } else if has("noise") {
            AnalysisKind::Noise
        } else if has("dc") {
            AnalysisKind::DcSweep
        } else if has("ac") {
            AnalysisKind::Ac
        } else {
            AnalysisKind::Unknown
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AnalysisKind::OperatingPoint => "Operating Point",
            AnalysisKind::DcSweep => "DC Sweep",
            AnalysisKind::Ac => "AC Analysis",
            AnalysisKind::Transient => "Transient Analysis",
            AnalysisKind::Noise => "Noise Analysis",
            AnalysisKind::Unknown => "Unknown",
        }
    }
}

/// Export formats for decoded results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            _ => Err(format!("Invalid output format: {}", s)),
        }
    }
}

/// Read-only queries over a decoded result file.
///
/// Variable names are matched case-insensitively. Voltages and currents are
/// returned as real values, or as moduli when the file is complex.
#[derive(Debug, Clone)]
pub struct AnalysisResult {
    raw: RawResult,
    index: HashMap<String, usize>,
    kind: AnalysisKind,
}

#[derive(Serialize)]
struct JsonExport<'a> {
    analysis: AnalysisKind,
    #[serde(flatten)]
    raw: &'a RawResult,
}

impl From<RawResult> for AnalysisResult {
    fn from(raw: RawResult) -> Self {
        AnalysisResult::new(raw)
    }
}

impl AnalysisResult {
    pub fn new(raw: RawResult) -> Self {
        let mut index = HashMap::new();
        for (i, var) in raw.variables().iter().enumerate() {
            index.entry(var.name.to_lowercase()).or_insert(i);
        }
        let kind = AnalysisKind::from_plot_name(raw.plot_name());
        AnalysisResult { raw, index, kind }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(Self::new(parse_raw(bytes)?))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(RawResult::from_file(path)?))
    }

    pub fn raw(&self) -> &RawResult {
        &self.raw
    }

    pub fn analysis_kind(&self) -> AnalysisKind {
        self.kind
    }

    /// Values of the sweep variable.
    pub fn sweep(&self) -> &[f64] {
        self.raw.sweep()
    }

    pub fn get_frequency(&self) -> &[f64] {
        self.sweep()
    }

    pub fn get_time(&self) -> &[f64] {
        self.sweep()
    }

    pub fn variable_names(&self) -> Vec<&str> {
        self.raw.variables().iter().map(|v| v.name.as_str()).collect()
    }

    pub fn point_count(&self) -> usize {
        self.raw.point_count()
    }

    /// Column stored under exactly `name`, ignoring case.
    pub fn variable(&self, name: &str) -> Result<&Column> {
        self.lookup(&[name.to_string()], name)
    }

    /// Node voltage, accepting `out`, `V(out)` or the raw variable name.
    pub fn get_voltage(&self, node: &str) -> Result<Vec<f64>> {
        let column = self.lookup(&[format!("V({node})"), node.to_string()], node)?;
        Ok(column.magnitudes())
    }

    /// Element current, accepting `R1`, `I(R1)` or LTspice's `Ix(R1:+)`.
    pub fn get_current(&self, element: &str) -> Result<Vec<f64>> {
        let candidates = [
            format!("I({element})"),
            element.to_string(),
            format!("Ix({element}:+)"),
        ];
        Ok(self.lookup(&candidates, element)?.magnitudes())
    }

    /// Phase of a node voltage in degrees, each in `(-180, 180]` without unwrapping.
    pub fn get_phase(&self, node: &str) -> Result<Vec<f64>> {
        let column = self.lookup(&[format!("V({node})"), node.to_string()], node)?;
        match column.as_complex() {
            Some(values) => Ok(values.iter().map(|c| c.arg().to_degrees()).collect()),
            None => Err(Error::NotComplex {
                name: node.to_string(),
            }),
        }
    }

    fn lookup(&self, candidates: &[String], requested: &str) -> Result<&Column> {
        candidates
            .iter()
            .find_map(|name| self.index.get(&name.to_lowercase()))
            .and_then(|&i| self.raw.column(i))
            .ok_or_else(|| Error::UnknownVariable {
                name: requested.to_string(),
                available: self.variable_names().into_iter().map(String::from).collect(),
            })
    }

    /// One row per point; complex columns are split into `.re` and `.im` fields.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let csv_error = |e: csv::Error| Error::Export {
            format: "csv",
            reason: e.to_string(),
        };
        let mut writer = csv::Writer::from_writer(writer);

        let mut header = Vec::new();
        for (var, column) in self.raw.variables().iter().zip(self.raw.columns()) {
            if column.is_complex() {
                header.push(format!("{}.re", var.name));
                header.push(format!("{}.im", var.name));
            } else {
                header.push(var.name.clone());
            }
        }
        writer.write_record(&header).map_err(csv_error)?;

        for point in 0..self.point_count() {
            let mut record = Vec::with_capacity(header.len());
            for column in self.raw.columns() {
                match column {
                    Column::Real(values) => record.push(values[point].to_string()),
                    Column::Complex(values) => {
                        record.push(values[point].re.to_string());
                        record.push(values[point].im.to_string());
                    }
                }
            }
            writer.write_record(&record).map_err(csv_error)?;
        }

        writer.flush().map_err(|e| Error::Export {
            format: "csv",
            reason: e.to_string(),
        })
    }

    pub fn write_json<W: Write>(&self, writer: W) -> Result<()> {
        let export = JsonExport {
            analysis: self.kind,
            raw: &self.raw,
        };
        serde_json::to_writer_pretty(writer, &export).map_err(|e| Error::Export {
            format: "json",
            reason: e.to_string(),
        })
    }

    /// Export to a file in the given format
    pub fn export(&self, path: impl AsRef<Path>, format: ExportFormat) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| Error::io(path, e))?;
        let mut writer = BufWriter::new(file);

        match format {
            ExportFormat::Csv => self.write_csv(&mut writer)?,
            ExportFormat::Json => self.write_json(&mut writer)?,
        }
        writer.flush().map_err(|e| Error::io(path, e))?;

        info!("Results exported to {:?}: {}", format, path.display());
        Ok(())
    }

    /// Print a short summary of the result to stdout
    pub fn print_summary(&self) {
        let sweep = self.sweep();
        println!("\n=== Result Summary ===");
        println!("Title: {}", self.raw.title());
        println!("Date: {}", self.raw.date());
        println!("Analysis type: {}", self.kind.label());
        println!("Flags: {}", self.raw.flags());
        println!("Number of points: {}", self.point_count());
        if let (Some(first), Some(last)) = (sweep.first(), sweep.last()) {
            println!("Sweep range: {:.6e} .. {:.6e}", first, last);
        }

        println!("\nVariables:");
        for (var, column) in self.raw.variables().iter().zip(self.raw.columns()) {
            let kind = if column.is_complex() { "complex" } else { "real" };
            println!("  {:>3} {:<24} {:<16} {}", var.index, var.name, var.unit, kind);
        }
    }
}
