//! Decoder for SPICE raw result files as written by LTspice and ngspice.
//!
//! A raw file is a text header of `Key: Value` lines, a variable table and a
//! sentinel line (`Binary:` or `Values:`), followed by the samples. The header
//! is ASCII/UTF-8, or UTF-16LE for LTspice. Binary samples are little-endian
//! f64; the sweep variable is always a single real value while the other
//! variables are `(re, im)` pairs when the file is complex.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use log::{debug, info};
use nom::{
    bytes::complete::take_till1,
    character::complete::{char, digit1, space0, space1},
    combinator::{map_res, rest},
    sequence::{preceded, separated_pair, tuple},
    IResult,
};
use num_complex::Complex64;
use serde::Serialize;

use crate::error::{Error, Result};

const REQUIRED_KEYS: &[&str] = &["Title", "Date", "Plotname", "Flags", "No. Variables", "No. Points"];

/// Modifier flags that do not change the sample layout.
const IGNORED_FLAGS: &[&str] = &["forward", "log", "double", "stepped"];

/// One entry of the variable table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Variable {
    pub index: usize,
    pub name: String,
    pub unit: String,
}

/// Samples of a single variable across all points.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Column {
    Real(Vec<f64>),
    Complex(Vec<Complex64>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Real(values) => values.len(),
            Column::Complex(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_complex(&self) -> bool {
        matches!(self, Column::Complex(_))
    }

    pub fn as_real(&self) -> Option<&[f64]> {
        match self {
            Column::Real(values) => Some(values),
            Column::Complex(_) => None,
        }
    }

    pub fn as_complex(&self) -> Option<&[Complex64]> {
        match self {
            Column::Complex(values) => Some(values),
            Column::Real(_) => None,
        }
    }

    /// Real values as stored, or the modulus of each complex sample.
    pub fn magnitudes(&self) -> Vec<f64> {
        match self {
            Column::Real(values) => values.clone(),
            Column::Complex(values) => values.iter().map(|c| c.norm()).collect(),
        }
    }
}

/// How the samples after the header are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataEncoding {
    Binary,
    Ascii,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextEncoding {
    Utf8,
    Utf16Le,
}

/// A decoded raw file. Columns are stored variable-major, in variable table order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawResult {
    title: String,
    date: String,
    plot_name: String,
    flags: String,
    is_complex: bool,
    encoding: DataEncoding,
    variables: Vec<Variable>,
    columns: Vec<Column>,
}

impl RawResult {
    /// Read and decode a raw file from disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| Error::io(path, e))?;
        let result = parse_raw(&bytes)?;
        info!(
            "Loaded {} ({} variables, {} points)",
            path.display(),
            result.variables.len(),
            result.point_count()
        );
        Ok(result)
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn date(&self) -> &str {
        &self.date
    }

    pub fn plot_name(&self) -> &str {
        &self.plot_name
    }

    pub fn flags(&self) -> &str {
        &self.flags
    }

    pub fn is_complex(&self) -> bool {
        self.is_complex
    }

    pub fn encoding(&self) -> DataEncoding {
        self.encoding
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    /// The sweep axis (variable 0).
    pub fn sweep(&self) -> &[f64] {
        self.columns.first().and_then(Column::as_real).unwrap_or(&[])
    }

    pub fn point_count(&self) -> usize {
        self.columns.first().map_or(0, Column::len)
    }
}

/// Decode a raw file held in memory.
pub fn parse_raw(bytes: &[u8]) -> Result<RawResult> {
    let (start, text_encoding) = detect_text_encoding(bytes);
    let mut reader = LineReader {
        bytes,
        pos: start,
        line: 0,
        encoding: text_encoding,
    };
    let header = read_header(&mut reader)?;
    debug!(
        "Header: plot '{}', flags '{}', {} variables, {} points, {:?} data at byte {}",
        header.plot_name,
        header.flags,
        header.variables.len(),
        header.points,
        header.encoding,
        header.data_offset
    );

    let columns = match header.encoding {
        DataEncoding::Binary => decode_binary(bytes, &header)?,
        DataEncoding::Ascii => decode_ascii(bytes, &header, text_encoding)?,
    };

    Ok(RawResult {
        title: header.title,
        date: header.date,
        plot_name: header.plot_name,
        flags: header.flags,
        is_complex: header.is_complex,
        encoding: header.encoding,
        variables: header.variables,
        columns,
    })
}

fn detect_text_encoding(bytes: &[u8]) -> (usize, TextEncoding) {
    if bytes.starts_with(&[0xFF, 0xFE]) {
        (2, TextEncoding::Utf16Le)
    } else if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
        (3, TextEncoding::Utf8)
    } else if bytes.len() >= 2 && bytes[0] != 0 && bytes[1] == 0 {
        (0, TextEncoding::Utf16Le)
    } else {
        (0, TextEncoding::Utf8)
    }
}

fn decode_text(bytes: &[u8], encoding: TextEncoding) -> String {
    match encoding {
        TextEncoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
        TextEncoding::Utf16Le => {
            let units: Vec<u16> = bytes
                .chunks_exact(2)
                .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16_lossy(&units)
        }
    }
}

/// Walks header lines while tracking the byte offset where the payload starts.
struct LineReader<'a> {
    bytes: &'a [u8],
    pos: usize,
    line: usize,
    encoding: TextEncoding,
}

impl LineReader<'_> {
    fn next_line(&mut self) -> Option<String> {
        if self.pos >= self.bytes.len() {
            return None;
        }
        let remaining = &self.bytes[self.pos..];
        let (len, advance) = match self.encoding {
            TextEncoding::Utf8 => match remaining.iter().position(|&b| b == b'\n') {
                Some(end) => (end, end + 1),
                None => (remaining.len(), remaining.len()),
            },
            TextEncoding::Utf16Le => match remaining
                .chunks_exact(2)
                .position(|pair| pair[0] == b'\n' && pair[1] == 0)
            {
                Some(end) => (2 * end, 2 * end + 2),
                None => (remaining.len(), remaining.len()),
            },
        };

        self.pos += advance;
        self.line += 1;
        let text = decode_text(&remaining[..len], self.encoding);
        Some(text.trim_end_matches('\r').to_string())
    }
}

struct Header {
    title: String,
    date: String,
    plot_name: String,
    flags: String,
    is_complex: bool,
    encoding: DataEncoding,
    variables: Vec<Variable>,
    points: usize,
    /// 1-based line number of the sentinel.
    sentinel_line: usize,
    data_offset: usize,
}

// Header line parsers

fn key_value(input: &str) -> IResult<&str, (&str, &str)> {
    separated_pair(take_till1(|c| c == ':'), char(':'), preceded(space0, rest))(input)
}

fn variable_line(input: &str) -> IResult<&str, (usize, &str, &str)> {
    let (input, (_, index, _, name, _, unit)) = tuple((
        space0,
        map_res(digit1, str::parse::<usize>),
        space1,
        take_till1(char::is_whitespace),
        space1,
        take_till1(char::is_whitespace),
    ))(input)?;
    Ok((input, (index, name, unit)))
}

fn sentinel(line: &str) -> Option<DataEncoding> {
    if line.eq_ignore_ascii_case("Binary:") {
        Some(DataEncoding::Binary)
    } else if line.eq_ignore_ascii_case("Values:") {
        Some(DataEncoding::Ascii)
    } else {
        None
    }
}

fn malformed(line: usize, reason: impl Into<String>) -> Error {
    Error::MalformedHeader {
        line,
        reason: reason.into(),
    }
}

fn read_header(reader: &mut LineReader<'_>) -> Result<Header> {
    let mut fields: HashMap<&'static str, (usize, String)> = HashMap::new();
    let mut variables: Vec<(usize, Variable)> = Vec::new();
    let mut variables_line: Option<usize> = None;
    let mut in_variables = false;

    while let Some(line) = reader.next_line() {
        let line_no = reader.line;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if let Some(encoding) = sentinel(trimmed) {
            return build_header(fields, variables, variables_line, encoding, line_no, reader.pos);
        }

        if in_variables {
            if let Ok((_, (index, name, unit))) = variable_line(&line) {
                variables.push((line_no, variable(index, name, unit)));
                continue;
            }
            in_variables = false;
        }

        let (key, value) = match key_value(trimmed) {
            Ok((_, (key, value))) => (key.trim(), value.trim()),
            Err(_) => return Err(malformed(line_no, format!("expected 'Key: Value', found '{trimmed}'"))),
        };

        if key.eq_ignore_ascii_case("Variables") {
            if variables_line.replace(line_no).is_some() {
                return Err(malformed(line_no, "duplicate key 'Variables'"));
            }
            in_variables = true;
            if !value.is_empty() {
                let (_, (index, name, unit)) = variable_line(value)
                    .map_err(|_| malformed(line_no, format!("invalid variable entry '{value}'")))?;
                variables.push((line_no, variable(index, name, unit)));
            }
            continue;
        }

        match REQUIRED_KEYS.iter().find(|known| known.eq_ignore_ascii_case(key)) {
            Some(&known) => {
                if fields.insert(known, (line_no, value.to_string())).is_some() {
                    return Err(malformed(line_no, format!("duplicate key '{known}'")));
                }
            }
            None => debug!("Ignoring header key '{}' at line {}", key, line_no),
        }
    }

    Err(malformed(
        reader.line + 1,
        "reached end of file without a 'Binary:' or 'Values:' line",
    ))
}

fn variable(index: usize, name: &str, unit: &str) -> Variable {
    Variable {
        index,
        name: name.to_string(),
        unit: unit.to_string(),
    }
}

fn build_header(
    mut fields: HashMap<&'static str, (usize, String)>,
    variables: Vec<(usize, Variable)>,
    variables_line: Option<usize>,
    encoding: DataEncoding,
    sentinel_line: usize,
    data_offset: usize,
) -> Result<Header> {
    let mut take = |key: &str| {
        fields
            .remove(key)
            .ok_or_else(|| malformed(sentinel_line, format!("missing required key '{key}'")))
    };

    let (_, title) = take("Title")?;
    let (_, date) = take("Date")?;
    let (_, plot_name) = take("Plotname")?;
    let (_, flags) = take("Flags")?;
    let variable_count = count(take("No. Variables")?, "No. Variables")?;
    let points = count(take("No. Points")?, "No. Points")?;

    let table_line = variables_line.ok_or_else(|| malformed(sentinel_line, "missing required key 'Variables'"))?;
    if variables.len() != variable_count {
        return Err(malformed(
            table_line,
            format!(
                "variable table lists {} entries but No. Variables is {}",
                variables.len(),
                variable_count
            ),
        ));
    }
    for (expected, (line, var)) in variables.iter().enumerate() {
        if var.index != expected {
            return Err(malformed(
                *line,
                format!("variable index {} out of order, expected {}", var.index, expected),
            ));
        }
    }

    let is_complex = parse_flags(&flags, encoding)?;

    Ok(Header {
        title,
        date,
        plot_name,
        flags,
        is_complex,
        encoding,
        variables: variables.into_iter().map(|(_, var)| var).collect(),
        points,
        sentinel_line,
        data_offset,
    })
}

fn count((line, text): (usize, String), key: &str) -> Result<usize> {
    let value: usize = text
        .parse()
        .map_err(|_| malformed(line, format!("{key} must be a positive integer, found '{text}'")))?;
    if value == 0 {
        return Err(malformed(line, format!("{key} must be positive")));
    }
    Ok(value)
}

/// Validate the `Flags` value against the sentinel, returning whether samples are complex.
fn parse_flags(flags: &str, sentinel: DataEncoding) -> Result<bool> {
    let unsupported = |reason: String| Error::UnsupportedFlag {
        flags: flags.to_string(),
        reason,
    };

    let mut kind: Option<bool> = None;
    let mut declared: Option<DataEncoding> = None;

    for token in flags.split_whitespace().map(str::to_lowercase) {
        match token.as_str() {
            "real" | "complex" => {
                if kind.is_some() {
                    return Err(unsupported("more than one of 'real' and 'complex'".to_string()));
                }
                kind = Some(token == "complex");
            }
            "binary" | "values" | "ascii" => {
                if declared.is_some() {
                    return Err(unsupported("more than one encoding flag".to_string()));
                }
                declared = Some(if token == "binary" {
                    DataEncoding::Binary
                } else {
                    DataEncoding::Ascii
                });
            }
            other if IGNORED_FLAGS.contains(&other) => {}
            other => return Err(unsupported(format!("unknown flag '{other}'"))),
        }
    }

    if let Some(declared) = declared.filter(|d| *d != sentinel) {
        return Err(unsupported(format!(
            "flags declare {declared:?} data but the header ends with a {sentinel:?} section"
        )));
    }
    kind.ok_or_else(|| unsupported("neither 'real' nor 'complex' is set".to_string()))
}

fn read_f64(record: &[u8], slot: usize) -> f64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&record[8 * slot..8 * slot + 8]);
    f64::from_le_bytes(buf)
}

fn decode_binary(bytes: &[u8], header: &Header) -> Result<Vec<Column>> {
    let traces = header.variables.len() - 1;
    let width = if header.is_complex { 2 } else { 1 };
    let overflow = || malformed(header.sentinel_line, "declared data size overflows");

    let record_size = traces
        .checked_mul(width)
        .and_then(|slots| slots.checked_add(1))
        .and_then(|slots| slots.checked_mul(8))
        .ok_or_else(overflow)?;
    let expected = header.points.checked_mul(record_size).ok_or_else(overflow)?;

    let payload = &bytes[header.data_offset.min(bytes.len())..];
    if payload.len() < expected {
        return Err(Error::TruncatedFile {
            expected,
            found: payload.len(),
            unit: "bytes",
            offset: header.data_offset,
        });
    }

    let records = payload[..expected].chunks_exact(record_size);
    let sweep: Vec<f64> = records.clone().map(|record| read_f64(record, 0)).collect();

    let columns = if header.is_complex {
        (0..traces)
            .map(|trace| {
                let slot = 1 + 2 * trace;
                let values = records
                    .clone()
                    .map(|record| Complex64::new(read_f64(record, slot), read_f64(record, slot + 1)))
                    .collect();
                Column::Complex(values)
            })
            .collect::<Vec<_>>()
    } else {
        (0..traces)
            .map(|trace| Column::Real(records.clone().map(|record| read_f64(record, 1 + trace)).collect()))
            .collect()
    };

    Ok(std::iter::once(Column::Real(sweep)).chain(columns).collect())
}

/// Whitespace-separated tokens of an ASCII payload, tagged with their line numbers.
struct Tokens<'a> {
    items: Vec<(usize, &'a str)>,
    cursor: usize,
    expected_points: usize,
    point: usize,
    offset: usize,
}

impl<'a> Tokens<'a> {
    fn new(text: &'a str, first_line: usize, expected_points: usize, offset: usize) -> Self {
        let items = text
            .lines()
            .enumerate()
            .flat_map(|(i, line)| line.split_whitespace().map(move |token| (first_line + i, token)))
            .collect();
        Tokens {
            items,
            cursor: 0,
            expected_points,
            point: 0,
            offset,
        }
    }

    fn next_token(&mut self) -> Result<(usize, &'a str)> {
        let item = self.items.get(self.cursor).copied().ok_or(Error::TruncatedFile {
            expected: self.expected_points,
            found: self.point,
            unit: "points",
            offset: self.offset,
        })?;
        self.cursor += 1;
        Ok(item)
    }

    fn point_index(&mut self, point: usize) -> Result<()> {
        self.point = point;
        let (line, token) = self.next_token()?;
        match token.parse::<usize>() {
            Ok(index) if index == point => Ok(()),
            _ => Err(Error::MalformedData {
                line,
                token: token.to_string(),
                reason: format!("expected point index {point}"),
            }),
        }
    }

    /// Sweep value; a `,im` part is dropped.
    fn sweep_value(&mut self, complex: bool) -> Result<f64> {
        let (line, token) = self.next_token()?;
        match token.split_once(',') {
            Some((re, im)) => {
                if im.is_empty() && complex {
                    self.next_token()?;
                }
                number(line, re)
            }
            None => number(line, token),
        }
    }

    fn real_value(&mut self) -> Result<f64> {
        let (line, token) = self.next_token()?;
        number(line, token)
    }

    /// Accepts `re,im`, `re, im` and `re im`.
    fn complex_value(&mut self) -> Result<Complex64> {
        let (line, token) = self.next_token()?;
        let (re, im) = match token.split_once(',') {
            Some((re, "")) => {
                let re = number(line, re)?;
                let (im_line, im) = self.next_token()?;
                (re, number(im_line, im)?)
            }
            Some((re, im)) => (number(line, re)?, number(line, im)?),
            None => {
                let re = number(line, token)?;
                let (mut im_line, mut im) = self.next_token()?;
                if im == "," {
                    (im_line, im) = self.next_token()?;
                }
                (re, number(im_line, im.strip_prefix(',').unwrap_or(im))?)
            }
        };
        Ok(Complex64::new(re, im))
    }
}

fn number(line: usize, token: &str) -> Result<f64> {
    token.parse::<f64>().map_err(|_| Error::MalformedData {
        line,
        token: token.to_string(),
        reason: "not a number".to_string(),
    })
}

fn decode_ascii(bytes: &[u8], header: &Header, text_encoding: TextEncoding) -> Result<Vec<Column>> {
    let text = decode_text(&bytes[header.data_offset.min(bytes.len())..], text_encoding);
    let mut tokens = Tokens::new(&text, header.sentinel_line + 1, header.points, header.data_offset);
    let traces = header.variables.len() - 1;

    let mut sweep = Vec::new();
    let mut real: Vec<Vec<f64>> = vec![Vec::new(); if header.is_complex { 0 } else { traces }];
    let mut complex: Vec<Vec<Complex64>> = vec![Vec::new(); if header.is_complex { traces } else { 0 }];

    for point in 0..header.points {
        tokens.point_index(point)?;
        sweep.push(tokens.sweep_value(header.is_complex)?);
        for column in real.iter_mut() {
            column.push(tokens.real_value()?);
        }
        for column in complex.iter_mut() {
            column.push(tokens.complex_value()?);
        }
    }

    Ok(std::iter::once(Column::Real(sweep))
        .chain(real.into_iter().map(Column::Real))
        .chain(complex.into_iter().map(Column::Complex))
        .collect())
}
