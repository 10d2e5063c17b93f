use colored::*;
use env_logger::Env;
use log::{error, info};

use ohmspice::cli::{build_cli, CliArgs, CliCommand};
use ohmspice::{AnalysisResult, Dialect, ExplicitPath, ProcessBackend, SearchPath, Simulator, SimulatorConfig};

fn main() {
    let matches = build_cli().get_matches();
    let args = match CliArgs::from_matches(&matches) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}", format!("Error: {:#}", e).red());
            std::process::exit(2);
        }
    };

    env_logger::Builder::from_env(Env::default().default_filter_or(args.log_level())).init();

    if let Err(e) = run_application(args) {
        error!("{}", format!("Error: {:#}", e).red());
        std::process::exit(1);
    }
}

fn run_application(args: CliArgs) -> anyhow::Result<()> {
    info!("{}", format!("ohmspice {}", ohmspice::VERSION).green().bold());

    match args.command {
        CliCommand::Inspect { raw_file } => {
            info!("Input file: {}", raw_file.display().to_string().bright_blue());
            AnalysisResult::from_file(&raw_file)?.print_summary();
        }
        CliCommand::Export {
            raw_file,
            output_file,
            format,
        } => {
            let result = AnalysisResult::from_file(&raw_file)?;
            result.export(&output_file, format)?;
            println!("{} {}", "Results exported to:".green(), output_file.display().to_string().bright_green());
        }
        CliCommand::Run {
            netlist,
            simulator,
            dialect,
            timeout,
            output_file,
            format,
        } => {
            let backend = match simulator {
                Some(path) => ProcessBackend::new(ExplicitPath(path), dialect),
                None if dialect == Dialect::LtSpice => ProcessBackend::new(SearchPath::ltspice(), dialect),
                None => ProcessBackend::new(SearchPath::ngspice(), dialect),
            };
            let config = SimulatorConfig {
                timeout,
                ..Default::default()
            };

            info!("Simulating {}", netlist.display().to_string().bright_blue());
            let result = Simulator::with_config(backend, config).run_netlist(&netlist)?;

            match output_file {
                Some(output_file) => {
                    result.export(&output_file, format)?;
                    println!("{} {}", "Results exported to:".green(), output_file.display().to_string().bright_green());
                }
                None => result.print_summary(),
            }
            println!("{}", "Simulation completed successfully!".green().bold());
        }
    }

    Ok(())
}
