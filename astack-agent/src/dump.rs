//! One full thread dump: enumerate, sample, resolve, write

use std::fmt;
use std::io::{self, Write};

use astack_common::{ThreadDumpRecord, ThreadStatus};
use log::{debug, info, warn};

use crate::runtime::{HostRuntime, ThreadInfo};
use crate::sampling::{SampleOutcome, Sampler, SignalSender};
use crate::symbolization::SymbolResolver;

/// Per-dump counters, logged when the dump finishes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DumpSummary {
    /// Threads the VM reported
    pub threads: usize,
    /// Threads written with their frames
    pub dumped: usize,
    /// Threads written without frames because the walker gave up
    pub walk_failed: usize,
    /// Threads written without frames because the capture did not finish
    pub timed_out: usize,
    /// Threads left out because they have no registry entry
    pub untracked: usize,
    /// Threads written without frames because the signal was not delivered
    pub signal_failed: usize,
}

impl fmt::Display for DumpSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} threads: {} dumped, {} unwalkable, {} timed out, {} untracked, {} undeliverable",
            self.threads,
            self.dumped,
            self.walk_failed,
            self.timed_out,
            self.untracked,
            self.signal_failed
        )
    }
}

/// Write a dump of every live thread to `out`, in VM enumeration order
///
/// Per-thread problems degrade that thread's entry. Only a failing `out`
/// ends the dump early.
///
/// # Errors
/// Returns the first write error on `out`
pub fn write_dump<R, S, W>(vm: &R, sampler: &Sampler<S>, out: &mut W) -> io::Result<DumpSummary>
where
    R: HostRuntime,
    S: SignalSender,
    W: Write + ?Sized,
{
    let mut summary = DumpSummary::default();

    let threads = match vm.all_threads() {
        Ok(threads) => threads,
        Err(e) => {
            warn!("{e}");
            return Ok(summary);
        }
    };
    summary.threads = threads.len();

    let resolver = SymbolResolver::new(vm);

    for thread in &threads {
        let frames = match sampler.sample(vm, thread) {
            SampleOutcome::Completed(frames) => {
                summary.dumped += 1;
                frames.into_iter().map(|frame| resolver.resolve(frame)).collect()
            }
            SampleOutcome::WalkFailed(e) => {
                debug!("Dumping without frames: {e}");
                summary.walk_failed += 1;
                Vec::new()
            }
            SampleOutcome::TimedOut | SampleOutcome::Busy => {
                summary.timed_out += 1;
                Vec::new()
            }
            SampleOutcome::SignalFailed => {
                summary.signal_failed += 1;
                Vec::new()
            }
            SampleOutcome::Untracked => {
                summary.untracked += 1;
                let name = vm.thread_info(thread).map_or_else(|_| "Unknown".to_string(), |info| info.name);
                warn!("Skipping untracked thread {name:?}");
                continue;
            }
        };

        let record = describe(vm, thread, frames);
        record.write_to(out)?;
    }

    out.flush()?;
    info!("Dump complete, {summary}");
    Ok(summary)
}

fn describe<R: HostRuntime>(
    vm: &R,
    thread: &R::Thread,
    frames: Vec<astack_common::ResolvedFrame>,
) -> ThreadDumpRecord {
    let info = vm.thread_info(thread).unwrap_or_else(|e| {
        warn!("{e}");
        ThreadInfo { name: "Unknown".to_string(), priority: 0, daemon: false }
    });
    let status = vm.thread_state(thread).map_or_else(
        |e| {
            warn!("{e}");
            ThreadStatus::Unknown
        },
        ThreadStatus::from_flags,
    );

    ThreadDumpRecord { name: info.name, daemon: info.daemon, priority: info.priority, status, frames }
}
