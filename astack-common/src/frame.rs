//! Resolved stack frames and their one-line rendering

use std::fmt;

/// Source line of a resolved frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FrameLine {
    /// Synthetic frame (negative location), rendered as `Native Method`
    Native,
    Line(u32),
    /// No line table, or no entry covering the location
    Unknown,
}

/// A single frame with its symbols looked up
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ResolvedFrame {
    pub class_name: String,
    pub method_name: String,
    pub source_file: Option<String>,
    pub line: FrameLine,
}

impl ResolvedFrame {
    /// Text between the parentheses of an `at` line
    #[must_use]
    pub fn location_text(&self) -> String {
        match (&self.line, &self.source_file) {
            (FrameLine::Native, _) => "Native Method".to_string(),
            (_, None) => "Unknown Source".to_string(),
            (FrameLine::Line(line), Some(file)) if *line > 0 => format!("{file}:{line}"),
            (_, Some(file)) => file.clone(),
        }
    }
}

impl fmt::Display for ResolvedFrame {
    /// Renders `\tat Class.method(Location)` without the trailing newline
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\tat {}.{}({})", self.class_name, self.method_name, self.location_text())
    }
}
