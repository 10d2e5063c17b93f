//! SPICE netlist rendering.
//!
//! Output order is fixed: title, sources, passive components, analysis
//! directives, `.end`. Rendering never mutates the circuit and the same
//! circuit always yields the same text.

use crate::circuit::{Analysis, Circuit, Component, Source, Waveform};
use crate::value::format_value;

/// Render a circuit as netlist text, lines joined by `\n` without a trailing newline.
pub fn render(circuit: &Circuit) -> String {
    let mut lines = Vec::with_capacity(circuit.len() + circuit.analyses().len() + 2);

    lines.push(format!("* {}", title_line(circuit.name())));
    lines.extend(circuit.sources().iter().map(source_line));
    lines.extend(circuit.components().iter().map(component_line));
    lines.extend(circuit.analyses().iter().map(analysis_line));
    lines.push(".end".to_string());

    lines.join("\n")
}

pub fn source_line(source: &Source) -> String {
    let mut line = format!("{} {} {}", source.id, source.node1, source.node2);

    if let Some(dc) = source.dc {
        line.push_str(&format!(" DC {}", format_value(dc)));
    }
    if let Some(magnitude) = source.ac_magnitude {
        line.push_str(&format!(" AC {}", format_value(magnitude)));
        if let Some(phase) = source.ac_phase {
            line.push_str(&format!(" {}", format_value(phase)));
        }
    }
    if let Some(waveform) = &source.waveform {
        line.push(' ');
        line.push_str(&waveform_text(waveform));
    }
    line
}

pub fn component_line(component: &Component) -> String {
    let mut line = format!(
        "{} {} {} {}",
        component.id,
        component.node1,
        component.node2,
        format_value(component.value)
    );
    if let Some(ic) = component.initial_condition {
        line.push_str(&format!(" IC={}", format_value(ic)));
    }
    line
}

pub fn analysis_line(analysis: &Analysis) -> String {
    match analysis {
        Analysis::Operating => ".op".to_string(),
        Analysis::DcSweep {
            source,
            start,
            stop,
            step,
        } => format!(
            ".dc {} {} {} {}",
            source,
            format_value(*start),
            format_value(*stop),
            format_value(*step)
        ),
        Analysis::Ac {
            sweep,
            points,
            start,
            stop,
        } => format!(
            ".ac {} {} {} {}",
            sweep,
            points,
            format_value(*start),
            format_value(*stop)
        ),
        Analysis::Transient { stop, step: Some(step) } => {
            format!(".tran {} {}", format_value(*step), format_value(*stop))
        }
        Analysis::Transient { stop, step: None } => format!(".tran {}", format_value(*stop)),
    }
}

fn waveform_text(waveform: &Waveform) -> String {
    let (keyword, values) = match *waveform {
        Waveform::Pulse {
            initial,
            pulsed,
            delay,
            rise,
            fall,
            width,
            period,
        } => ("PULSE", vec![initial, pulsed, delay, rise, fall, width, period]),
        Waveform::Sine {
            offset,
            amplitude,
            frequency,
            delay,
            damping,
        } => {
            let mut values = vec![offset, amplitude, frequency];
            if delay != 0.0 || damping != 0.0 {
                values.extend([delay, damping]);
            }
            ("SINE", values)
        }
    };

    let args: Vec<String> = values.into_iter().map(format_value).collect();
    format!("{}({})", keyword, args.join(" "))
}

// The title must stay on a single comment line.
fn title_line(name: &str) -> String {
    name.replace(['\r', '\n'], " ")
}
