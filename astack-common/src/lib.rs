//! # Thread Dump Data Model
//!
//! Types and text format shared between the in-process agent, which renders
//! dumps, and the `astack` client, which reads them back.
//!
//! ## Key Types
//!
//! - [`ThreadDumpRecord`] - one thread block (header, state line, frames)
//! - [`ResolvedFrame`] - one `at Class.method(File:Line)` line
//! - [`ThreadStatus`] - the state label chosen from the VM's state bitmask
//!
//! The `serde` feature adds `Serialize`/`Deserialize` to all of them.

pub mod frame;
pub mod parse;
pub mod record;
pub mod state;

pub use frame::{FrameLine, ResolvedFrame};
pub use parse::parse_dump;
pub use record::{ThreadDumpRecord, STATE_PREFIX};
pub use state::{ThreadStateFlags, ThreadStatus, UnknownStateLabel};
