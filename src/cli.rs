use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};

use crate::results::ExportFormat;
use crate::simulator::Dialect;

#[derive(Debug, Clone)]
pub struct CliArgs {
    pub command: CliCommand,
    pub verbose_level: u8,
}

#[derive(Debug, Clone)]
pub enum CliCommand {
    /// Print a summary of a raw result file
    Inspect { raw_file: PathBuf },
    /// Convert a raw result file to CSV or JSON
    Export {
        raw_file: PathBuf,
        output_file: PathBuf,
        format: ExportFormat,
    },
    /// Simulate a netlist and summarise or export the result
    Run {
        netlist: PathBuf,
        simulator: Option<PathBuf>,
        dialect: Dialect,
        timeout: Duration,
        output_file: Option<PathBuf>,
        format: ExportFormat,
    },
}

pub fn build_cli() -> Command {
    let format_arg = Arg::new("format")
        .short('f')
        .long("format")
        .value_name("FORMAT")
        .default_value("csv")
        .value_parser(["csv", "json"])
        .help("Output format");

    Command::new("ohmspice")
        .version(crate::VERSION)
        .about("Run SPICE simulations and decode their raw result files")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::Count)
                .global(true)
                .help("Increase verbosity level"),
        )
        .subcommand(
            Command::new("inspect")
                .about("Summarise a raw result file")
                .arg(Arg::new("raw").help("Raw result file").required(true).index(1)),
        )
        .subcommand(
            Command::new("export")
                .about("Export a raw result file as CSV or JSON")
                .arg(Arg::new("raw").help("Raw result file").required(true).index(1))
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .value_name("FILE")
                        .required(true)
                        .help("Destination file"),
                )
                .arg(format_arg.clone()),
        )
        .subcommand(
            Command::new("run")
                .about("Simulate a netlist with an external simulator")
                .arg(Arg::new("netlist").help("Netlist file (.cir)").required(true).index(1))
                .arg(
                    Arg::new("simulator")
                        .short('s')
                        .long("simulator")
                        .value_name("EXE")
                        .help("Simulator executable; searched on PATH when omitted"),
                )
                .arg(
                    Arg::new("dialect")
                        .short('d')
                        .long("dialect")
                        .value_name("DIALECT")
                        .default_value("ngspice")
                        .value_parser(["ltspice", "ngspice"])
                        .help("Command-line conventions of the simulator"),
                )
                .arg(
                    Arg::new("timeout")
                        .short('t')
                        .long("timeout")
                        .value_name("DURATION")
                        .default_value("60s")
                        .help("Give up after this long (e.g. 30s, 500ms)"),
                )
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .value_name("FILE")
                        .help("Export the result instead of printing a summary"),
                )
                .arg(format_arg),
        )
}

impl CliArgs {
    pub fn from_matches(matches: &ArgMatches) -> Result<Self> {
        let verbose_level = matches.get_count("verbose");

        let command = match matches.subcommand() {
            Some(("inspect", sub)) => CliCommand::Inspect {
                raw_file: required_path(sub, "raw")?,
            },
            Some(("export", sub)) => CliCommand::Export {
                raw_file: required_path(sub, "raw")?,
                output_file: required_path(sub, "output")?,
                format: output_format(sub)?,
            },
            Some(("run", sub)) => {
                let dialect = sub
                    .get_one::<String>("dialect")
                    .map(|d| d.parse::<Dialect>())
                    .transpose()
                    .map_err(|e| anyhow!(e))?
                    .unwrap_or(Dialect::Ngspice);
                let timeout = match sub.get_one::<String>("timeout") {
                    Some(value) => parse_duration(value)?,
                    None => crate::simulator::DEFAULT_TIMEOUT,
                };

                CliCommand::Run {
                    netlist: required_path(sub, "netlist")?,
                    simulator: sub.get_one::<String>("simulator").map(PathBuf::from),
                    dialect,
                    timeout,
                    output_file: sub.get_one::<String>("output").map(PathBuf::from),
                    format: output_format(sub)?,
                }
            }
            _ => bail!("A subcommand is required: inspect, export or run"),
        };

        Ok(CliArgs { command, verbose_level })
    }

    /// Default `env_logger` filter for the requested verbosity.
    pub fn log_level(&self) -> &'static str {
        match self.verbose_level {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

fn required_path(matches: &ArgMatches, name: &str) -> Result<PathBuf> {
    matches
        .get_one::<String>(name)
        .map(PathBuf::from)
        .ok_or_else(|| anyhow!("Argument '{}' is required", name))
}

fn output_format(matches: &ArgMatches) -> Result<ExportFormat> {
    match matches.get_one::<String>("format") {
        Some(format) => format.parse().map_err(|e: String| anyhow!(e)),
        None => Ok(ExportFormat::Csv),
    }
}

/// Parse a duration with unit (e.g. "30s", "500ms", "250us"); bare numbers are seconds.
pub fn parse_duration(value: &str) -> Result<Duration> {
    let value = value.trim().to_lowercase();

    let seconds = if let Some(num_str) = value.strip_suffix("ms") {
        num_str.parse::<f64>()? * 1e-3
    } else if let Some(num_str) = value.strip_suffix("us") {
        num_str.parse::<f64>()? * 1e-6
    } else if let Some(num_str) = value.strip_suffix('s') {
        num_str.parse::<f64>()?
    } else {
        value.parse::<f64>()?
    };

    if !seconds.is_finite() || seconds <= 0.0 {
        bail!("Duration must be positive: {}", value);
    }
    match Duration::try_from_secs_f64(seconds) {
        Ok(duration) => Ok(duration),
        Err(_) => bail!("Duration out of range: {}", value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<CliArgs> {
        let matches = build_cli().try_get_matches_from(args)?;
        CliArgs::from_matches(&matches)
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("250us").unwrap(), Duration::from_micros(250));
        assert_eq!(parse_duration("2").unwrap(), Duration::from_secs(2));
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("-1").is_err());
        assert!(parse_duration("soon").is_err());
        assert!(parse_duration("1e30s").is_err());
        assert!(parse_duration("1e300ms").is_err());
    }

    #[test]
    fn test_run_defaults() {
        let args = parse(&["ohmspice", "run", "rc.cir"]).unwrap();
        match args.command {
            CliCommand::Run {
                netlist,
                simulator,
                dialect,
                timeout,
                output_file,
                format,
            } => {
                assert_eq!(netlist, PathBuf::from("rc.cir"));
                assert!(simulator.is_none());
                assert_eq!(dialect, Dialect::Ngspice);
                assert_eq!(timeout, Duration::from_secs(60));
                assert!(output_file.is_none());
                assert_eq!(format, ExportFormat::Csv);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_run_options() {
        let args = parse(&[
            "ohmspice", "-vv", "run", "rc.cir", "--simulator", "/opt/ltspice", "--dialect", "ltspice",
            "--timeout", "5s", "-o", "out.json", "-f", "json",
        ])
        .unwrap();
        assert_eq!(args.verbose_level, 2);
        assert_eq!(args.log_level(), "debug");
        match args.command {
            CliCommand::Run {
                simulator,
                dialect,
                timeout,
                output_file,
                format,
                ..
            } => {
                assert_eq!(simulator, Some(PathBuf::from("/opt/ltspice")));
                assert_eq!(dialect, Dialect::LtSpice);
                assert_eq!(timeout, Duration::from_secs(5));
                assert_eq!(output_file, Some(PathBuf::from("out.json")));
                assert_eq!(format, ExportFormat::Json);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_log_level_follows_verbosity() {
        let quiet = parse(&["ohmspice", "inspect", "rc.raw"]).unwrap();
        assert_eq!(quiet.verbose_level, 0);
        assert_eq!(quiet.log_level(), "warn");

        let loud = parse(&["ohmspice", "-vvvv", "inspect", "rc.raw"]).unwrap();
        assert_eq!(loud.log_level(), "trace");
    }

    #[test]
    fn test_export_requires_output() {
        assert!(parse(&["ohmspice", "export", "rc.raw"]).is_err());
        let args = parse(&["ohmspice", "export", "rc.raw", "-o", "rc.csv"]).unwrap();
        assert!(matches!(
            args.command,
            CliCommand::Export { format: ExportFormat::Csv, .. }
        ));
    }

    #[test]
    fn test_rejects_unknown_values() {
        assert!(parse(&["ohmspice", "run", "rc.cir", "--dialect", "spectre"]).is_err());
        assert!(parse(&["ohmspice", "run", "rc.cir", "--timeout", "forever"]).is_err());
        assert!(parse(&["ohmspice", "inspect"]).is_err());
    }
}
