//! # astack - Thread Dump Client
//!
//! Connects to a JVM running the AStack agent, reads the text dump the agent
//! writes on every connection, and prints it back filtered or as JSON.
//!
//! ```text
//!   astack ──connect──▶ agent listener (in the JVM)
//!          ◀──text────  "main" prio=5 ...
//!     │
//!     ├─ parse_dump()       astack-common
//!     ├─ ThreadFilter       --thread / --state
//!     └─ write_text / DumpExport::write_json
//! ```
//!
//! ## Modules
//!
//! - [`cli`]: argument parsing
//! - [`client`]: async fetch with a single deadline
//! - [`filter`]: name and state selection
//! - [`export`]: text and JSON output

pub mod cli;
pub mod client;
pub mod export;
pub mod filter;
