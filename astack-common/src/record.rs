//! Thread dump blocks
//!
//! One [`ThreadDumpRecord`] renders as:
//!
//! ```text
//! "main" prio=5
//!    java.lang.Thread.State: TIMED_WAITING (sleeping)
//! 	at java.lang.Thread.sleep(Native Method)
//! 	at Sleeper.main(Sleeper.java:3)
//!
//! ```

use std::fmt;
use std::io::{self, Write};

use crate::frame::ResolvedFrame;
use crate::state::ThreadStatus;

/// Prefix of the line carrying the thread state label
pub const STATE_PREFIX: &str = "   java.lang.Thread.State: ";

/// Everything shown for one thread
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ThreadDumpRecord {
    pub name: String,
    pub daemon: bool,
    pub priority: i32,
    pub status: ThreadStatus,
    pub frames: Vec<ResolvedFrame>,
}

impl ThreadDumpRecord {
    /// Write the block, including its blank terminator line
    ///
    /// # Errors
    /// Returns any error from the underlying writer
    pub fn write_to<W: Write + ?Sized>(&self, out: &mut W) -> io::Result<()> {
        write!(out, "{self}")
    }
}

impl fmt::Display for ThreadDumpRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let daemon = if self.daemon { " daemon" } else { "" };
        writeln!(f, "\"{}\"{daemon} prio={}", self.name, self.priority)?;
        writeln!(f, "{STATE_PREFIX}{}", self.status)?;
        for frame in &self.frames {
            writeln!(f, "{frame}")?;
        }
        writeln!(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameLine;

    #[test]
    fn test_render_block() {
        let record = ThreadDumpRecord {
            name: "main".to_string(),
            daemon: false,
            priority: 5,
            status: ThreadStatus::Sleeping,
            frames: vec![
                ResolvedFrame {
                    class_name: "java.lang.Thread".to_string(),
                    method_name: "sleep".to_string(),
                    source_file: Some("Thread.java".to_string()),
                    line: FrameLine::Native,
                },
                ResolvedFrame {
                    class_name: "Sleeper".to_string(),
                    method_name: "main".to_string(),
                    source_file: Some("Sleeper.java".to_string()),
                    line: FrameLine::Line(3),
                },
            ],
        };

        assert_eq!(
            record.to_string(),
            "\"main\" prio=5\n\
             \x20  java.lang.Thread.State: TIMED_WAITING (sleeping)\n\
             \tat java.lang.Thread.sleep(Native Method)\n\
             \tat Sleeper.main(Sleeper.java:3)\n\
             \n"
        );
    }

    #[test]
    fn test_daemon_without_frames() {
        let record = ThreadDumpRecord {
            name: "Signal Dispatcher".to_string(),
            daemon: true,
            priority: 9,
            status: ThreadStatus::Runnable,
            frames: Vec::new(),
        };

        let mut out = Vec::new();
        record.write_to(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("\"Signal Dispatcher\" daemon prio=9\n"));
        assert!(text.ends_with("RUNNABLE\n\n"));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_json_shape() {
        let record = ThreadDumpRecord {
            name: "main".to_string(),
            daemon: false,
            priority: 5,
            status: ThreadStatus::Runnable,
            frames: vec![ResolvedFrame {
                class_name: "Main".to_string(),
                method_name: "spin".to_string(),
                source_file: None,
                line: FrameLine::Line(7),
            }],
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["name"], "main");
        assert_eq!(json["status"], "Runnable");
        assert_eq!(json["frames"][0]["line"]["Line"], 7);
        assert!(json["frames"][0]["source_file"].is_null());
    }
}
