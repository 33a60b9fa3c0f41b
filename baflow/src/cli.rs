use baflow_lib::{FileType, MacAddress, TidLayout};
use clap::{Parser, Subcommand};
use simplelog::LevelFilter;
use std::path::PathBuf;

#[derive(Parser)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Log level for output (error, warn, info, debug, trace)
    #[arg(global = true, long, default_value = "info")]
    pub loglevel: LevelFilter,

    /// Position of the TID in the BlockAck control field (ieee, legacy)
    #[arg(global = true, long, default_value = "ieee")]
    pub ba_tid_layout: TidLayout,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the QoS flows found in a capture
    Flows(FlowsArgs),

    /// Show the packet timeline and BlockAck anomalies of one flow
    Analyze(AnalyzeArgs),

    /// Check BlockAck consistency across a whole capture
    Check(CheckArgs),
}

impl Commands {
    pub fn json(&self) -> bool {
        match self {
            Commands::Flows(args) => args.json,
            Commands::Analyze(args) => args.json,
            Commands::Check(args) => args.json,
        }
    }
}

#[derive(Parser)]
pub struct FlowsArgs {
    /// Read frames from existing pcap file
    #[arg(long)]
    pub pcap_in: PathBuf,

    /// Print JSON instead of a table
    #[arg(long, default_value = "false")]
    pub json: bool,

    /// Also run the BlockAck consistency check on every flow
    #[arg(long, default_value = "false")]
    pub check: bool,

    /// Number of threads analyzing flows in parallel (with --check)
    #[arg(long, default_value = "1", requires = "check")]
    pub workers: usize,
}

#[derive(Parser)]
pub struct AnalyzeArgs {
    /// Read frames from existing pcap file
    #[arg(long)]
    pub pcap_in: PathBuf,

    /// Transmitter of the QoS data
    #[arg(long)]
    pub sender: MacAddress,

    /// Receiver of the QoS data
    #[arg(long)]
    pub receiver: MacAddress,

    /// Traffic identifier of the flow
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..8))]
    pub tid: u8,

    /// Print JSON instead of a table
    #[arg(long, default_value = "false")]
    pub json: bool,
}

#[derive(Parser)]
pub struct CheckArgs {
    /// Read frames from existing pcap file
    #[arg(long)]
    pub pcap_in: PathBuf,

    /// Only include frames sent or received by this station (repeatable)
    #[arg(long)]
    pub mac: Vec<MacAddress>,

    /// Only check BlockAcks of this traffic identifier
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..8))]
    pub tid: Option<u8>,

    /// Output file for detected anomalies
    #[arg(long)]
    pub anomalies_out: Option<PathBuf>,

    /// Specify output format, e.g., 'csv' or 'parquet'
    #[arg(long, default_value = "csv", requires = "anomalies_out")]
    pub format: FileType,

    /// Print JSON instead of a table
    #[arg(long, default_value = "false")]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tid_is_limited_to_user_priorities() {
        let check = |tid: &str| {
            Cli::try_parse_from(["baflow", "check", "--pcap-in", "a.pcap", "--tid", tid])
        };
        assert!(check("7").is_ok());
        assert!(check("8").is_err());

        let analyze = Cli::try_parse_from([
            "baflow",
            "analyze",
            "--pcap-in",
            "a.pcap",
            "--sender",
            "00:11:22:33:44:55",
            "--receiver",
            "aa:bb:cc:dd:ee:ff",
            "--tid",
            "15",
        ]);
        assert!(analyze.is_err());
    }
}
