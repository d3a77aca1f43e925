//! # astack - Main Entry Point
//!
//! Fetch, parse, filter, print. Text by default, JSON with `--json`,
//! and optionally a JSON copy on disk with `--export`.

use std::io::{self, BufWriter, Write};
use std::time::Duration;

use anyhow::{Context, Result};
use astack::cli::Args;
use astack::client::fetch_dump;
use astack::export::{write_text, DumpExport};
use astack::filter::ThreadFilter;
use astack_common::parse_dump;
use clap::Parser;
use log::{info, warn};

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_USAGE: i32 = 2;

fn main() {
    env_logger::init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            // --help and --version land here too
            let _ = e.print();
            std::process::exit(if e.use_stderr() { EXIT_USAGE } else { EXIT_SUCCESS });
        }
    };

    std::process::exit(match run(args) {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            EXIT_ERROR
        }
    });
}

#[tokio::main]
async fn run(args: Args) -> Result<()> {
    let source = format!("{}:{}", args.host, args.port);
    let text = fetch_dump(&args.host, args.port, Duration::from_secs(args.timeout)).await?;

    let records = parse_dump(&text);
    if records.is_empty() && !text.trim().is_empty() {
        warn!("{source} answered, but nothing in the reply looks like a thread dump");
    }
    let total = records.len();

    let filter = ThreadFilter { name: args.thread, state: args.state };
    let records = filter.apply(records);
    info!("{} of {total} threads selected", records.len());

    let export = DumpExport::new(source, records);

    if let Some(path) = &args.export {
        export.export_to_file(path)?;
        if !args.quiet {
            eprintln!("Exported {} threads to {}", export.thread_count, path.display());
        }
    }

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    if args.json {
        export.write_json(&mut out)?;
        writeln!(out).and_then(|()| out.flush()).context("Failed to write dump")?;
    } else {
        write_text(&export.threads, &mut out).context("Failed to write dump")?;
    }

    if !args.quiet {
        eprintln!("{} of {total} threads from {}", export.thread_count, export.source);
    }
    Ok(())
}
