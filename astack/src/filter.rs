//! Thread selection for fetched dumps
//!
//! A state pattern matches a label exactly, or by its leading word:
//! `WAITING` selects `WAITING`, `WAITING (parking)` and
//! `WAITING (on object monitor)` but not `TIMED_WAITING`. Matching ignores
//! case.

use astack_common::{ThreadDumpRecord, ThreadStatus};

/// Which threads to keep; an empty filter keeps everything
#[derive(Debug, Clone, Default)]
pub struct ThreadFilter {
    pub name: Option<String>,
    pub state: Option<String>,
}

impl ThreadFilter {
    #[must_use]
    pub fn matches(&self, record: &ThreadDumpRecord) -> bool {
        let name_ok = self.name.as_deref().map_or(true, |needle| record.name.contains(needle));
        let state_ok = self.state.as_deref().map_or(true, |pattern| state_matches(record.status, pattern));
        name_ok && state_ok
    }

    #[must_use]
    pub fn apply(&self, records: Vec<ThreadDumpRecord>) -> Vec<ThreadDumpRecord> {
        records.into_iter().filter(|r| self.matches(r)).collect()
    }
}

fn leading_word(label: &str) -> &str {
    label.split_whitespace().next().unwrap_or(label)
}

fn state_matches(status: ThreadStatus, pattern: &str) -> bool {
    let label = status.label();
    label.eq_ignore_ascii_case(pattern) || leading_word(label).eq_ignore_ascii_case(pattern)
}

/// Validate a `--state` argument against the known labels
///
/// # Errors
/// Returns a message listing the accepted words when nothing could match
pub fn parse_state_pattern(s: &str) -> Result<String, String> {
    let pattern = s.trim();
    if ThreadStatus::ALL.into_iter().any(|status| state_matches(status, pattern)) {
        return Ok(pattern.to_string());
    }
    let mut words: Vec<&str> = ThreadStatus::ALL.into_iter().map(|st| leading_word(st.label())).collect();
    words.dedup();
    Err(format!("no thread state matches {pattern:?} (expected one of {})", words.join(", ")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, status: ThreadStatus) -> ThreadDumpRecord {
        ThreadDumpRecord { name: name.to_string(), daemon: false, priority: 5, status, frames: Vec::new() }
    }

    fn sample() -> Vec<ThreadDumpRecord> {
        vec![
            record("main", ThreadStatus::Sleeping),
            record("pool-1-thread-1", ThreadStatus::Parked),
            record("pool-1-thread-2", ThreadStatus::TimedParked),
            record("Finalizer", ThreadStatus::WaitingOnMonitor),
            record("worker", ThreadStatus::Runnable),
        ]
    }

    fn names(records: &[ThreadDumpRecord]) -> Vec<&str> {
        records.iter().map(|r| r.name.as_str()).collect()
    }

    #[test]
    fn test_empty_filter_keeps_all() {
        assert_eq!(ThreadFilter::default().apply(sample()).len(), 5);
    }

    #[test]
    fn test_by_name() {
        let filter = ThreadFilter { name: Some("pool-".into()), state: None };
        assert_eq!(names(&filter.apply(sample())), ["pool-1-thread-1", "pool-1-thread-2"]);
    }

    #[test]
    fn test_by_leading_word() {
        let filter = ThreadFilter { name: None, state: Some("waiting".into()) };
        assert_eq!(names(&filter.apply(sample())), ["pool-1-thread-1", "Finalizer"]);
    }

    #[test]
    fn test_by_full_label() {
        let filter = ThreadFilter { name: None, state: Some("TIMED_WAITING (sleeping)".into()) };
        assert_eq!(names(&filter.apply(sample())), ["main"]);
    }

    #[test]
    fn test_name_and_state_combine() {
        let filter = ThreadFilter { name: Some("pool".into()), state: Some("TIMED_WAITING".into()) };
        assert_eq!(names(&filter.apply(sample())), ["pool-1-thread-2"]);
    }

    #[test]
    fn test_state_pattern_validation() {
        assert_eq!(parse_state_pattern(" runnable ").unwrap(), "runnable");
        assert!(parse_state_pattern("WAITING (parking)").is_ok());
        let err = parse_state_pattern("parking").unwrap_err();
        assert!(err.contains("RUNNABLE"), "{err}");
    }
}
