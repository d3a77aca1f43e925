//! Identities and errors shared by every layer of the agent
//!
//! Raw VM and OS handles are wrapped in newtypes so a `jmethodID` cannot be
//! passed where a `pthread_t` is expected.

pub mod errors;
pub mod types;

pub use types::{EnvHandle, MethodId, OsThread, RawFrame, ThreadKey};

pub use errors::{AgentError, ConfigError, SignalError, VmError};
