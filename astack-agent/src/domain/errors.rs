//! Agent error types
//!
//! Only [`AgentError`] is fatal; the others surface from per-thread work and
//! degrade a single dump entry.

use std::fmt;

use thiserror::Error;

/// Fatal startup failures. Any of these leaves the agent uninstalled.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("GetEnv failed: {0}")]
    EnvUnavailable(i32),

    #[error(transparent)]
    Vm(#[from] VmError),

    #[error("AsyncGetCallTrace is not exported by this VM")]
    WalkerUnavailable,

    #[error(transparent)]
    Signal(#[from] SignalError),

    #[error("Failed to bind listener on port {port}: {source}")]
    Bind { port: u16, source: std::io::Error },

    #[error("Failed to create listener thread: {0}")]
    ListenerThread(String),
}

/// Malformed agent options (`-agentpath:libastack_agent.so=port=7000`)
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required option: port")]
    MissingPort,

    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },

    #[error("Unknown option: {0:?}")]
    UnknownKey(String),
}

/// A JVMTI call that returned something other than `JVMTI_ERROR_NONE`
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub struct VmError {
    pub call: &'static str,
    pub code: u32,
}

impl VmError {
    #[must_use]
    pub fn new(call: &'static str, code: u32) -> Self {
        Self { call, code }
    }
}

impl fmt::Display for VmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {} ({})", self.call, jvmti_error_name(self.code), self.code)
    }
}

#[derive(Error, Debug)]
pub enum SignalError {
    #[error("Failed to install handler for signal {signal}: {source}")]
    Install { signal: i32, source: std::io::Error },

    #[error("Failed to deliver signal {signal}: {source}")]
    Deliver { signal: i32, source: std::io::Error },
}

/// Symbolic name of a JVMTI error code
#[must_use]
pub fn jvmti_error_name(code: u32) -> &'static str {
    match code {
        0 => "JVMTI_ERROR_NONE",
        10 => "JVMTI_ERROR_INVALID_THREAD",
        15 => "JVMTI_ERROR_THREAD_NOT_ALIVE",
        20 => "JVMTI_ERROR_INVALID_OBJECT",
        21 => "JVMTI_ERROR_INVALID_CLASS",
        22 => "JVMTI_ERROR_CLASS_NOT_PREPARED",
        23 => "JVMTI_ERROR_INVALID_METHODID",
        98 => "JVMTI_ERROR_NOT_AVAILABLE",
        99 => "JVMTI_ERROR_MUST_POSSESS_CAPABILITY",
        100 => "JVMTI_ERROR_NULL_POINTER",
        101 => "JVMTI_ERROR_ABSENT_INFORMATION",
        103 => "JVMTI_ERROR_ILLEGAL_ARGUMENT",
        104 => "JVMTI_ERROR_NATIVE_METHOD",
        110 => "JVMTI_ERROR_OUT_OF_MEMORY",
        112 => "JVMTI_ERROR_WRONG_PHASE",
        113 => "JVMTI_ERROR_INTERNAL",
        115 => "JVMTI_ERROR_UNATTACHED_THREAD",
        116 => "JVMTI_ERROR_INVALID_ENVIRONMENT",
        _ => "unrecognized JVMTI error",
    }
}
