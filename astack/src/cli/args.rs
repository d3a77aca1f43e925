//! CLI argument definitions

use clap::Parser;
use std::path::PathBuf;

use crate::filter::parse_state_pattern;

#[derive(Parser, Debug)]
#[command(
    name = "astack",
    version,
    about = "Fetch a thread dump from a JVM running the AStack agent",
    after_help = "\
EXAMPLES:
    astack --port 9999                              Print every tracked thread
    astack --port 9999 --thread pool-               Threads whose name contains \"pool-\"
    astack --port 9999 --state WAITING              WAITING, WAITING (parking), ...
    astack --port 9999 --json > dump.json           Structured output
    astack --host db1 --port 9999 --export d.json   Save as JSON, print as text"
)]
pub struct Args {
    /// Host the agent listens on
    #[arg(long, env = "ASTACK_HOST", default_value = "localhost")]
    pub host: String,

    /// Agent port (the `port=` agent option)
    #[arg(short, long, env = "ASTACK_PORT")]
    pub port: u16,

    /// Only threads whose name contains this text
    #[arg(short, long, value_name = "SUBSTR")]
    pub thread: Option<String>,

    /// Only threads in this state: a full label or its leading word
    #[arg(short, long, value_name = "LABEL", value_parser = parse_state_pattern)]
    pub state: Option<String>,

    /// Print JSON instead of the text dump
    #[arg(long)]
    pub json: bool,

    /// Also write the (filtered) dump to a JSON file
    #[arg(long, value_name = "FILE")]
    pub export: Option<PathBuf>,

    /// Give up after N seconds
    #[arg(long, value_name = "SECS", default_value = "10", value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: u64,

    /// Suppress non-essential output
    #[arg(short, long)]
    pub quiet: bool,
}
