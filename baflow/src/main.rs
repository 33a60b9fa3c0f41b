mod cli;
mod commands;

use baflow_lib::DecoderConfig;
use clap::Parser;
use cli::{Cli, Commands};
use commands::{run_analyze, run_check, run_flows};
use serde_json::json;
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = TermLogger::init(
        cli.loglevel,
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    ) {
        eprintln!("Couldn't initialize logger: {}", e);
    }

    let config = DecoderConfig {
        ba_tid_layout: cli.ba_tid_layout,
    };
    log::debug!("BA control TID layout: {}", config.ba_tid_layout);

    let json = cli.command.json();
    let result = match cli.command {
        Commands::Flows(args) => run_flows(args, &config),
        Commands::Analyze(args) => run_analyze(args, &config),
        Commands::Check(args) => run_check(args, &config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if json {
                println!(
                    "{}",
                    json!({ "status": "error", "message": format!("{:#}", e) })
                );
            }
            log::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
