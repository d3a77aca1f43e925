//! Reading a dump back into records
//!
//! The parser is lenient: lines it does not recognise are skipped, a
//! missing state line leaves the thread as `UNKNOWN`, and a block that is
//! cut off (connection dropped mid-dump) is still returned.

use crate::frame::{FrameLine, ResolvedFrame};
use crate::record::{ThreadDumpRecord, STATE_PREFIX};
use crate::state::ThreadStatus;

/// Parse a full dump as served by the agent
#[must_use]
pub fn parse_dump(text: &str) -> Vec<ThreadDumpRecord> {
    let mut records = Vec::new();
    let mut current: Option<ThreadDumpRecord> = None;

    for line in text.lines() {
        if line.trim().is_empty() {
            records.extend(current.take());
            continue;
        }

        if let Some(record) = parse_header(line) {
            records.extend(current.replace(record));
            continue;
        }

        let Some(record) = current.as_mut() else {
            continue;
        };

        if let Some(label) = line.strip_prefix(STATE_PREFIX) {
            record.status = label.parse().unwrap_or(ThreadStatus::Unknown);
        } else if let Some(frame) = parse_frame(line) {
            record.frames.push(frame);
        }
    }

    records.extend(current);
    records
}

/// `"name"[ daemon] prio=N`
fn parse_header(line: &str) -> Option<ThreadDumpRecord> {
    let rest = line.strip_prefix('"')?;
    let close = rest.rfind('"')?;
    let name = &rest[..close];
    let tail = &rest[close + 1..];

    let (daemon, tail) = match tail.strip_prefix(" daemon") {
        Some(after) => (true, after),
        None => (false, tail),
    };
    let priority = tail.strip_prefix(" prio=")?.trim().parse().ok()?;

    Some(ThreadDumpRecord {
        name: name.to_string(),
        daemon,
        priority,
        status: ThreadStatus::Unknown,
        frames: Vec::new(),
    })
}

/// `\tat Class.method(Location)`
fn parse_frame(line: &str) -> Option<ResolvedFrame> {
    let body = line.trim_start().strip_prefix("at ")?;
    let open = body.find('(')?;
    let location = body[open + 1..].strip_suffix(')')?;
    let qualified = &body[..open];

    let (class_name, method_name) = qualified.rsplit_once('.')?;

    let (source_file, line) = match location {
        "Native Method" => (None, FrameLine::Native),
        "Unknown Source" => (None, FrameLine::Unknown),
        _ => match location.rsplit_once(':') {
            Some((file, line)) => match line.parse() {
                Ok(line) => (Some(file.to_string()), FrameLine::Line(line)),
                Err(_) => (Some(location.to_string()), FrameLine::Unknown),
            },
            None => (Some(location.to_string()), FrameLine::Unknown),
        },
    };

    Some(ResolvedFrame {
        class_name: class_name.to_string(),
        method_name: method_name.to_string(),
        source_file,
        line,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const DUMP: &str = "\"main\" prio=5\n\
        \x20  java.lang.Thread.State: TIMED_WAITING (sleeping)\n\
        \tat java.lang.Thread.sleep(Native Method)\n\
        \tat Sleeper.main(Sleeper.java:3)\n\
        \n\
        \"Reference Handler\" daemon prio=10\n\
        \x20  java.lang.Thread.State: RUNNABLE\n\
        \tat java.lang.ref.Reference.waitForReferencePendingList(Unknown Source)\n\
        \tat java.lang.ref.Reference$ReferenceHandler.run(Reference.java)\n\
        \n";

    #[test]
    fn test_parse_two_blocks() {
        let records = parse_dump(DUMP);
        assert_eq!(records.len(), 2);

        let main = &records[0];
        assert_eq!(main.name, "main");
        assert!(!main.daemon);
        assert_eq!(main.priority, 5);
        assert_eq!(main.status, ThreadStatus::Sleeping);
        assert_eq!(main.frames.len(), 2);
        assert_eq!(main.frames[0].line, FrameLine::Native);
        assert_eq!(main.frames[1].source_file.as_deref(), Some("Sleeper.java"));
        assert_eq!(main.frames[1].line, FrameLine::Line(3));

        let handler = &records[1];
        assert!(handler.daemon);
        assert_eq!(handler.priority, 10);
        assert_eq!(handler.frames[0].source_file, None);
        assert_eq!(handler.frames[1].class_name, "java.lang.ref.Reference$ReferenceHandler");
        assert_eq!(handler.frames[1].line, FrameLine::Unknown);
    }

    #[test]
    fn test_rendered_records_parse_back() {
        let records = parse_dump(DUMP);
        let rendered: String = records.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, DUMP);
    }

    #[test]
    fn test_truncated_dump_keeps_partial_block() {
        let records = parse_dump("\"worker-1\" prio=5\n   java.lang.Thread.State: RUNNABLE\n\tat A.b(A.java:");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, ThreadStatus::Runnable);
        assert!(records[0].frames.is_empty());
    }

    #[test]
    fn test_thread_name_with_quotes() {
        let header = parse_header("\"pool \"a\" 1\" daemon prio=1").unwrap();
        assert_eq!(header.name, "pool \"a\" 1");
        assert!(header.daemon);
    }
}
