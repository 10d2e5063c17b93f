use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::{debug, info};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::netlist;
use crate::value::{IntoOptionalValue, IntoValue};

/// A named connection point. `0` and `gnd` both denote ground.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct Node {
    name: String,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Node { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_ground(&self) -> bool {
        self.name == "0" || self.name.eq_ignore_ascii_case("gnd")
    }

    /// Name as written to a netlist: ground always becomes `0`.
    pub fn netlist_name(&self) -> &str {
        if self.is_ground() {
            "0"
        } else {
            &self.name
        }
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        if self.is_ground() || other.is_ground() {
            return self.is_ground() && other.is_ground();
        }
        self.name.to_lowercase() == other.name.to_lowercase()
    }
}

impl Eq for Node {}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.netlist_name())
    }
}

/// Kinds of passive two-terminal components
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    Resistor,
    Capacitor,
    Inductor,
}

impl ComponentKind {
    /// SPICE element letter every id of this kind starts with
    pub fn prefix(&self) -> char {
        match self {
            ComponentKind::Resistor => 'R',
            ComponentKind::Capacitor => 'C',
            ComponentKind::Inductor => 'L',
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ComponentKind::Resistor => "resistor",
            ComponentKind::Capacitor => "capacitor",
            ComponentKind::Inductor => "inductor",
        }
    }
}

/// Passive circuit component
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Component {
    pub id: String,
    pub kind: ComponentKind,
    pub node1: Node,
    pub node2: Node,
    pub value: f64,
    /// Initial voltage (capacitor) or current (inductor) for transient runs.
    pub initial_condition: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Voltage,
    Current,
}

impl SourceKind {
    pub fn prefix(&self) -> char {
        match self {
            SourceKind::Voltage => 'V',
            SourceKind::Current => 'I',
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SourceKind::Voltage => "voltage source",
            SourceKind::Current => "current source",
        }
    }
}

/// Time-domain stimulus attached to a source.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "shape", rename_all = "lowercase")]
pub enum Waveform {
    Pulse {
        initial: f64,
        pulsed: f64,
        delay: f64,
        rise: f64,
        fall: f64,
        width: f64,
        period: f64,
    },
    Sine {
        offset: f64,
        amplitude: f64,
        frequency: f64,
        delay: f64,
        damping: f64,
    },
}

impl Waveform {
    fn parameters(&self) -> Vec<(&'static str, f64)> {
        match *self {
            Waveform::Pulse {
                initial,
                pulsed,
                delay,
                rise,
                fall,
                width,
                period,
            } => vec![
                ("initial", initial),
                ("pulsed", pulsed),
                ("delay", delay),
                ("rise", rise),
                ("fall", fall),
                ("width", width),
                ("period", period),
            ],
            Waveform::Sine {
                offset,
                amplitude,
                frequency,
                delay,
                damping,
            } => vec![
                ("offset", offset),
                ("amplitude", amplitude),
                ("frequency", frequency),
                ("delay", delay),
                ("damping", damping),
            ],
        }
    }

    fn validate(&self, id: &str) -> Result<()> {
        for (name, value) in self.parameters() {
            if !value.is_finite() {
                return Err(invalid_value(id, "waveform", format!("{name} must be finite, got {value}")));
            }
            let is_time = matches!(name, "delay" | "rise" | "fall" | "width" | "period" | "frequency");
            if is_time && value < 0.0 {
                return Err(invalid_value(id, "waveform", format!("{name} must not be negative, got {value}")));
            }
        }
        Ok(())
    }
}

/// DC, AC and transient settings of an independent source.
///
/// ```
/// use ohmspice::SourceSpec;
/// let spec = SourceSpec::dc(0.0).with_ac(1.0).with_phase(90.0);
/// assert_eq!(spec.ac, Some(1.0));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceSpec {
    pub dc: Option<f64>,
    pub ac: Option<f64>,
    pub phase: Option<f64>,
    pub waveform: Option<Waveform>,
}

impl SourceSpec {
    pub fn dc(value: f64) -> Self {
        SourceSpec {
            dc: Some(value),
            ..Default::default()
        }
    }

    pub fn ac(magnitude: f64) -> Self {
        SourceSpec {
            ac: Some(magnitude),
            ..Default::default()
        }
    }

    pub fn waveform(waveform: Waveform) -> Self {
        SourceSpec {
            waveform: Some(waveform),
            ..Default::default()
        }
    }

    pub fn with_dc(mut self, value: f64) -> Self {
        self.dc = Some(value);
        self
    }

    pub fn with_ac(mut self, magnitude: f64) -> Self {
        self.ac = Some(magnitude);
        self
    }

    /// AC phase in degrees
    pub fn with_phase(mut self, degrees: f64) -> Self {
        self.phase = Some(degrees);
        self
    }

    pub fn with_waveform(mut self, waveform: Waveform) -> Self {
        self.waveform = Some(waveform);
        self
    }
}

/// Independent voltage or current source
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Source {
    pub id: String,
    pub kind: SourceKind,
    pub node1: Node,
    pub node2: Node,
    pub dc: Option<f64>,
    pub ac_magnitude: Option<f64>,
    pub ac_phase: Option<f64>,
    pub waveform: Option<Waveform>,
}

/// Point spacing of an AC sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SweepKind {
    Lin,
    Dec,
    Oct,
}

impl SweepKind {
    pub fn keyword(&self) -> &'static str {
        match self {
            SweepKind::Lin => "lin",
            SweepKind::Dec => "dec",
            SweepKind::Oct => "oct",
        }
    }
}

impl FromStr for SweepKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "lin" => Ok(SweepKind::Lin),
            "dec" => Ok(SweepKind::Dec),
            "oct" => Ok(SweepKind::Oct),
            other => Err(Error::InvalidAnalysis {
                analysis: "ac",
                reason: format!("unknown sweep kind '{other}', expected lin, dec or oct"),
            }),
        }
    }
}

impl fmt::Display for SweepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Analysis directive
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Analysis {
    Operating,
    DcSweep {
        source: String,
        start: f64,
        stop: f64,
        step: f64,
    },
    Ac {
        sweep: SweepKind,
        points: usize,
        start: f64,
        stop: f64,
    },
    Transient {
        stop: f64,
        step: Option<f64>,
    },
}

/// Circuit under construction.
///
/// Element ids are unique across components and sources, ignoring case.
/// Every `add_*` method validates its arguments before anything is appended,
/// so a failed call leaves the circuit untouched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Circuit {
    name: String,
    components: Vec<Component>,
    sources: Vec<Source>,
    analyses: Vec<Analysis>,
}

impl Circuit {
    pub fn new(name: impl Into<String>) -> Self {
        Circuit {
            name: name.into(),
            components: Vec::new(),
            sources: Vec::new(),
            analyses: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    pub fn analyses(&self) -> &[Analysis] {
        &self.analyses
    }

    /// Number of components and sources
    pub fn len(&self) -> usize {
        self.components.len() + self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up the id an element was registered under, ignoring case.
    pub fn find_id(&self, id: &str) -> Option<&str> {
        let wanted = id.to_lowercase();
        self.components
            .iter()
            .map(|c| c.id.as_str())
            .chain(self.sources.iter().map(|s| s.id.as_str()))
            .find(|existing| existing.to_lowercase() == wanted)
    }

    pub fn add_resistor(&mut self, id: &str, node1: &str, node2: &str, value: impl IntoValue) -> Result<&mut Self> {
        self.add_passive(ComponentKind::Resistor, id, node1, node2, value.into_value()?, None)
    }

    pub fn add_capacitor(&mut self, id: &str, node1: &str, node2: &str, value: impl IntoValue) -> Result<&mut Self> {
        self.add_passive(ComponentKind::Capacitor, id, node1, node2, value.into_value()?, None)
    }

    pub fn add_inductor(&mut self, id: &str, node1: &str, node2: &str, value: impl IntoValue) -> Result<&mut Self> {
        self.add_passive(ComponentKind::Inductor, id, node1, node2, value.into_value()?, None)
    }

    /// Capacitor with an initial voltage, emitted as `IC=<v>`.
    pub fn add_capacitor_with_ic(
        &mut self,
        id: &str,
        node1: &str,
        node2: &str,
        value: impl IntoValue,
        initial_voltage: f64,
    ) -> Result<&mut Self> {
        let value = value.into_value()?;
        self.add_passive(ComponentKind::Capacitor, id, node1, node2, value, Some(initial_voltage))
    }

    /// Inductor with an initial current, emitted as `IC=<i>`.
    pub fn add_inductor_with_ic(
        &mut self,
        id: &str,
        node1: &str,
        node2: &str,
        value: impl IntoValue,
        initial_current: f64,
    ) -> Result<&mut Self> {
        let value = value.into_value()?;
        self.add_passive(ComponentKind::Inductor, id, node1, node2, value, Some(initial_current))
    }

    pub fn add_voltage_source(&mut self, id: &str, node1: &str, node2: &str, spec: SourceSpec) -> Result<&mut Self> {
        self.add_source(SourceKind::Voltage, id, node1, node2, spec)
    }

    pub fn add_current_source(&mut self, id: &str, node1: &str, node2: &str, spec: SourceSpec) -> Result<&mut Self> {
        self.add_source(SourceKind::Current, id, node1, node2, spec)
    }

    pub fn add_op_analysis(&mut self) -> &mut Self {
        self.analyses.push(Analysis::Operating);
        self
    }

    pub fn add_dc_analysis(
        &mut self,
        source: &str,
        start: impl IntoValue,
        stop: impl IntoValue,
        step: impl IntoValue,
    ) -> Result<&mut Self> {
        let (start, stop, step) = (start.into_value()?, stop.into_value()?, step.into_value()?);
        let fail = |reason: String| Error::InvalidAnalysis { analysis: "dc", reason };

        if source.is_empty() || source.contains(char::is_whitespace) {
            return Err(fail(format!("invalid sweep source '{source}'")));
        }
        for (name, value) in [("start", start), ("stop", stop), ("step", step)] {
            if !value.is_finite() {
                return Err(fail(format!("{name} must be finite, got {value}")));
            }
        }
        if step <= 0.0 {
            return Err(fail(format!("step must be positive, got {step}")));
        }
        if start >= stop {
            return Err(fail(format!("start {start} must be below stop {stop}")));
        }

        self.analyses.push(Analysis::DcSweep {
            source: source.to_string(),
            start,
            stop,
            step,
        });
        Ok(self)
    }

    pub fn add_ac_analysis(
        &mut self,
        sweep: &str,
        points: usize,
        start: impl IntoValue,
        stop: impl IntoValue,
    ) -> Result<&mut Self> {
        let sweep: SweepKind = sweep.parse()?;
        let (start, stop) = (start.into_value()?, stop.into_value()?);
        let fail = |reason: String| Error::InvalidAnalysis { analysis: "ac", reason };

        if points == 0 {
            return Err(fail("point count must be positive".to_string()));
        }
        for (name, value) in [("start", start), ("stop", stop)] {
            if !value.is_finite() || value <= 0.0 {
                return Err(fail(format!("{name} frequency must be positive, got {value}")));
            }
        }
        if start >= stop {
            return Err(fail(format!("start frequency {start} must be below stop frequency {stop}")));
        }

        self.analyses.push(Analysis::Ac {
            sweep,
            points,
            start,
            stop,
        });
        Ok(self)
    }

    /// `step` is `None`, a number, or a literal such as `"1u"`.
    pub fn add_tran_analysis(&mut self, stop: impl IntoValue, step: impl IntoOptionalValue) -> Result<&mut Self> {
        let stop = stop.into_value()?;
        let step = step.into_optional_value()?;
        let fail = |reason: String| Error::InvalidAnalysis { analysis: "tran", reason };

        if !stop.is_finite() || stop <= 0.0 {
            return Err(fail(format!("stop time must be positive, got {stop}")));
        }
        if let Some(step) = step {
            if !step.is_finite() || step <= 0.0 {
                return Err(fail(format!("step must be positive, got {step}")));
            }
            if step > stop {
                return Err(fail(format!("step {step} exceeds stop time {stop}")));
            }
        }

        self.analyses.push(Analysis::Transient { stop, step });
        Ok(self)
    }

    /// Render the circuit as netlist text.
    pub fn to_netlist(&self) -> String {
        netlist::render(self)
    }

    /// Write the netlist to `path`, adding a `.cir` extension when none is given.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let mut path = path.as_ref().to_path_buf();
        if path.extension().is_none() {
            path.set_extension("cir");
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }

        fs::write(&path, self.to_netlist()).map_err(|e| Error::io(&path, e))?;
        info!("Saved netlist for '{}' to {}", self.name, path.display());
        Ok(path)
    }

    fn add_passive(
        &mut self,
        kind: ComponentKind,
        id: &str,
        node1: &str,
        node2: &str,
        value: f64,
        initial_condition: Option<f64>,
    ) -> Result<&mut Self> {
        self.check_id(id, kind.prefix(), kind.name())?;
        let (node1, node2) = check_nodes(id, node1, node2)?;

        if !value.is_finite() || value <= 0.0 {
            return Err(invalid_value(
                id,
                "value",
                format!("{} value must be positive and finite, got {value}", kind.name()),
            ));
        }
        if let Some(ic) = initial_condition {
            if !ic.is_finite() {
                return Err(invalid_value(id, "initial_condition", format!("must be finite, got {ic}")));
            }
        }

        debug!("Adding {} {} between {} and {}", kind.name(), id, node1, node2);
        self.components.push(Component {
            id: id.to_string(),
            kind,
            node1,
            node2,
            value,
            initial_condition,
        });
        Ok(self)
    }

    fn add_source(&mut self, kind: SourceKind, id: &str, node1: &str, node2: &str, spec: SourceSpec) -> Result<&mut Self> {
        self.check_id(id, kind.prefix(), kind.name())?;
        let (node1, node2) = check_nodes(id, node1, node2)?;

        if spec.dc.is_none() && spec.ac.is_none() && spec.waveform.is_none() {
            return Err(invalid_value(id, "source", "at least one of dc, ac or waveform must be set".to_string()));
        }
        if spec.phase.is_some() && spec.ac.is_none() {
            return Err(invalid_value(id, "ac_phase", "a phase needs an AC magnitude".to_string()));
        }
        for (field, value) in [("dc", spec.dc), ("ac", spec.ac), ("ac_phase", spec.phase)] {
            if let Some(value) = value.filter(|v| !v.is_finite()) {
                return Err(invalid_value(id, field, format!("must be finite, got {value}")));
            }
        }
        if let Some(waveform) = &spec.waveform {
            waveform.validate(id)?;
        }

        debug!("Adding {} {} between {} and {}", kind.name(), id, node1, node2);
        self.sources.push(Source {
            id: id.to_string(),
            kind,
            node1,
            node2,
            dc: spec.dc,
            ac_magnitude: spec.ac,
            ac_phase: spec.phase,
            waveform: spec.waveform,
        });
        Ok(self)
    }

    fn check_id(&self, id: &str, prefix: char, kind: &str) -> Result<()> {
        if id.is_empty() || id.contains(char::is_whitespace) {
            return Err(invalid_value(id, "id", "must be non-empty without whitespace".to_string()));
        }
        if !id.to_uppercase().starts_with(prefix) {
            return Err(invalid_value(id, "id", format!("{kind} ids must start with '{prefix}'")));
        }
        if let Some(existing) = self.find_id(id) {
            return Err(Error::DuplicateId {
                id: id.to_string(),
                existing: existing.to_string(),
            });
        }
        Ok(())
    }
}

fn check_nodes(id: &str, node1: &str, node2: &str) -> Result<(Node, Node)> {
    for (field, node) in [("node1", node1), ("node2", node2)] {
        if node.is_empty() || node.contains(char::is_whitespace) {
            return Err(invalid_value(id, field, format!("invalid node name '{node}'")));
        }
    }
    Ok((Node::new(node1), Node::new(node2)))
}

fn invalid_value(id: &str, field: &'static str, reason: String) -> Error {
    Error::InvalidValue {
        id: id.to_string(),
        field,
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_equality() {
        assert_eq!(Node::new("OUT"), Node::new("out"));
        assert_eq!(Node::new("gnd"), Node::new("0"));
        assert_eq!(Node::new("GND"), Node::new("0"));
        assert_ne!(Node::new("in"), Node::new("out"));
        assert_ne!(Node::new("0"), Node::new("1"));
        assert_eq!(Node::new("Gnd").to_string(), "0");
        assert_eq!(Node::new("Out").to_string(), "Out");
    }

    #[test]
    fn test_circuit_building() {
        let mut circuit = Circuit::new("Divider");
        circuit
            .add_voltage_source("V1", "in", "gnd", SourceSpec::dc(5.0))
            .unwrap()
            .add_resistor("R1", "in", "out", "1k")
            .unwrap()
            .add_resistor("R2", "out", "0", 1000.0)
            .unwrap()
            .add_op_analysis();

        assert_eq!(circuit.len(), 3);
        assert_eq!(circuit.components()[0].value, 1000.0);
        assert_eq!(circuit.components()[1].kind, ComponentKind::Resistor);
        assert!(circuit.sources()[0].node2.is_ground());
        assert_eq!(circuit.analyses(), &[Analysis::Operating]);
    }

    #[test]
    fn test_duplicate_ids_ignore_case() {
        let mut circuit = Circuit::new("dup");
        circuit.add_resistor("R1", "a", "b", 10.0).unwrap();

        let err = circuit.add_resistor("r1", "b", "c", 10.0).unwrap_err();
        assert!(matches!(err, Error::DuplicateId { ref existing, .. } if existing == "R1"));
        assert_eq!(circuit.len(), 1);
    }

    #[test]
    fn test_ids_are_shared_between_components_and_sources() {
        let mut circuit = Circuit::new("shared");
        circuit.add_voltage_source("V1", "a", "0", SourceSpec::dc(1.0)).unwrap();
        assert!(circuit.add_voltage_source("v1", "b", "0", SourceSpec::dc(1.0)).is_err());
        assert_eq!(circuit.find_id("v1"), Some("V1"));
        assert_eq!(circuit.find_id("R9"), None);
    }

    #[test]
    fn test_rejects_invalid_values() {
        let mut circuit = Circuit::new("bad");
        for value in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let err = circuit.add_resistor("R1", "a", "b", value).unwrap_err();
            assert!(matches!(err, Error::InvalidValue { field: "value", .. }), "{value}");
        }
        assert!(matches!(
            circuit.add_capacitor("C1", "a", "b", "-1n").unwrap_err(),
            Error::InvalidValue { .. }
        ));
        assert!(matches!(
            circuit.add_inductor("L1", "a", "b", "1x").unwrap_err(),
            Error::Parse { .. }
        ));
        assert!(circuit.is_empty());
    }

    #[test]
    fn test_rejects_bad_ids_and_nodes() {
        let mut circuit = Circuit::new("bad");
        assert!(matches!(
            circuit.add_resistor("", "a", "b", 1.0).unwrap_err(),
            Error::InvalidValue { field: "id", .. }
        ));
        assert!(matches!(
            circuit.add_resistor("C1", "a", "b", 1.0).unwrap_err(),
            Error::InvalidValue { field: "id", .. }
        ));
        assert!(matches!(
            circuit.add_resistor("R1", "", "b", 1.0).unwrap_err(),
            Error::InvalidValue { field: "node1", .. }
        ));
        assert!(matches!(
            circuit.add_resistor("R1", "a", "b c", 1.0).unwrap_err(),
            Error::InvalidValue { field: "node2", .. }
        ));
        // Lower-case prefixes are fine
        assert!(circuit.add_resistor("rload", "a", "b", 1.0).is_ok());
    }

    #[test]
    fn test_source_validation() {
        let mut circuit = Circuit::new("src");
        assert!(matches!(
            circuit.add_voltage_source("V1", "a", "0", SourceSpec::default()).unwrap_err(),
            Error::InvalidValue { field: "source", .. }
        ));
        let phase_only = SourceSpec::dc(1.0).with_phase(45.0);
        assert!(matches!(
            circuit.add_voltage_source("V1", "a", "0", phase_only).unwrap_err(),
            Error::InvalidValue { field: "ac_phase", .. }
        ));
        assert!(matches!(
            circuit.add_current_source("I1", "a", "0", SourceSpec::dc(f64::NAN)).unwrap_err(),
            Error::InvalidValue { field: "dc", .. }
        ));
        let pulse = Waveform::Pulse {
            initial: 0.0,
            pulsed: 5.0,
            delay: -1.0,
            rise: 1e-9,
            fall: 1e-9,
            width: 1e-6,
            period: 2e-6,
        };
        assert!(circuit.add_voltage_source("V2", "a", "0", SourceSpec::waveform(pulse)).is_err());
        assert!(circuit.is_empty());
    }

    #[test]
    fn test_analysis_validation() {
        let mut circuit = Circuit::new("analyses");
        assert!(circuit.add_ac_analysis("dec", 10, 1.0, 1e6).is_ok());
        assert!(circuit.add_ac_analysis("LIN", 100, "1k", "10k").is_ok());

        for result in [
            circuit.add_ac_analysis("log", 10, 1.0, 1e6).map(|_| ()),
            circuit.add_ac_analysis("dec", 0, 1.0, 1e6).map(|_| ()),
            circuit.add_ac_analysis("dec", 10, 0.0, 1e6).map(|_| ()),
            circuit.add_ac_analysis("dec", 10, 1e6, 1.0).map(|_| ()),
            circuit.add_dc_analysis("V1", 0.0, 5.0, 0.0).map(|_| ()),
            circuit.add_dc_analysis("V1", 5.0, 0.0, 0.1).map(|_| ()),
            circuit.add_dc_analysis("", 0.0, 5.0, 0.1).map(|_| ()),
            circuit.add_tran_analysis(0.0, None).map(|_| ()),
            circuit.add_tran_analysis("1m", Some(2e-3)).map(|_| ()),
        ] {
            assert!(matches!(result, Err(Error::InvalidAnalysis { .. })), "{result:?}");
        }

        circuit.add_dc_analysis("V1", 0.0, 5.0, 0.1).unwrap();
        circuit.add_tran_analysis("1m", Some(1e-6)).unwrap();
        circuit.add_op_analysis();
        assert_eq!(circuit.analyses().len(), 5);
        assert!(matches!(circuit.analyses()[4], Analysis::Operating));
    }

    #[test]
    fn test_tran_step_literals() {
        let mut circuit = Circuit::new("tran");
        circuit
            .add_tran_analysis("1m", "1u")
            .unwrap()
            .add_tran_analysis("2m", 5e-6)
            .unwrap()
            .add_tran_analysis("3m", None)
            .unwrap();

        let steps: Vec<_> = circuit
            .analyses()
            .iter()
            .map(|analysis| match analysis {
                Analysis::Transient { step, .. } => *step,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(steps, [Some(1e-6), Some(5e-6), None]);

        assert!(matches!(
            circuit.add_tran_analysis("1m", "fast"),
            Err(Error::Parse { .. })
        ));
        assert!(matches!(
            circuit.add_tran_analysis("1m", "2m"),
            Err(Error::InvalidAnalysis { .. })
        ));
    }

    #[test]
    fn test_circuit_serializes_to_json() {
        let mut circuit = Circuit::new("json");
        circuit
            .add_voltage_source("V1", "in", "gnd", SourceSpec::ac(1.0))
            .unwrap()
            .add_capacitor("C1", "in", "0", "10n")
            .unwrap()
            .add_ac_analysis("dec", 10, 1.0, 1e3)
            .unwrap();

        let json = serde_json::to_value(&circuit).unwrap();
        assert_eq!(json["name"], "json");
        assert_eq!(json["components"][0]["kind"], "capacitor");
        assert_eq!(json["sources"][0]["kind"], "voltage");
        assert_eq!(json["sources"][0]["node2"], "gnd");
        assert_eq!(json["analyses"][0]["kind"], "ac");
        assert_eq!(json["analyses"][0]["sweep"], "dec");
    }

    #[test]
    fn test_sweep_kind_parsing() {
        assert_eq!("Dec".parse::<SweepKind>().unwrap(), SweepKind::Dec);
        assert_eq!("oct".parse::<SweepKind>().unwrap(), SweepKind::Oct);
        assert!("decade".parse::<SweepKind>().is_err());
        assert_eq!(SweepKind::Lin.to_string(), "lin");
    }
}
