//! Agent options
//!
//! Passed by the JVM after the `=` of the agent flag, comma separated:
//!
//! ```text
//! java -agentpath:/path/to/libastack_agent.so=port=7000,timeout_ms=500 ...
//! ```
//!
//! - `port` (required): TCP port the dump listener binds on all interfaces
//! - `timeout_ms`: how long to wait for one thread to answer (default 1000)
//! - `signal`: signal number used to request a capture (default `SIGPWR`)
//! - `write_timeout_ms`: how long one socket write may block on a client that
//!   stopped reading before the dump is abandoned (default 5000)

use std::str::FromStr;
use std::time::Duration;

use crate::domain::ConfigError;

/// Default wait for a single thread's capture
pub const DEFAULT_CAPTURE_TIMEOUT: Duration = Duration::from_millis(1000);

/// Default bound on a single blocked socket write
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_millis(5000);

/// Arbitrary signal that the JVM does not use itself
pub const DEFAULT_SAMPLE_SIGNAL: libc::c_int = libc::SIGPWR;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentOptions {
    pub port: u16,
    pub capture_timeout: Duration,
    pub signal: libc::c_int,
    pub write_timeout: Duration,
}

impl FromStr for AgentOptions {
    type Err = ConfigError;

    fn from_str(options: &str) -> Result<Self, Self::Err> {
        let mut port = None;
        let mut capture_timeout = DEFAULT_CAPTURE_TIMEOUT;
        let mut signal = DEFAULT_SAMPLE_SIGNAL;
        let mut write_timeout = DEFAULT_WRITE_TIMEOUT;

        for pair in options.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').ok_or_else(|| ConfigError::InvalidValue {
                key: pair.to_string(),
                value: String::new(),
            })?;

            match key.trim() {
                "port" => port = Some(parse_value::<u16>(key, value)?),
                "timeout_ms" => {
                    capture_timeout = Duration::from_millis(parse_value(key, value)?);
                }
                "signal" => signal = parse_signal(value)?,
                "write_timeout_ms" => {
                    let millis: u64 = parse_value(key, value)?;
                    // Zero would mean "block forever" to the socket layer
                    if millis == 0 {
                        return Err(ConfigError::InvalidValue { key: key.trim().to_string(), value: value.to_string() });
                    }
                    write_timeout = Duration::from_millis(millis);
                }
                other => return Err(ConfigError::UnknownKey(other.to_string())),
            }
        }

        let port = port.filter(|p| *p != 0).ok_or(ConfigError::MissingPort)?;
        Ok(Self { port, capture_timeout, signal, write_timeout })
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.trim().to_string(),
        value: value.to_string(),
    })
}

/// Accepts a number or one of the few names that make sense here
fn parse_signal(value: &str) -> Result<libc::c_int, ConfigError> {
    let signal = match value.trim() {
        "SIGPWR" => libc::SIGPWR,
        "SIGUSR1" => libc::SIGUSR1,
        "SIGUSR2" => libc::SIGUSR2,
        "SIGPROF" => libc::SIGPROF,
        other => parse_value::<libc::c_int>("signal", other)?,
    };

    if signal <= 0 || matches!(signal, libc::SIGKILL | libc::SIGSTOP | libc::SIGSEGV | libc::SIGBUS) {
        return Err(ConfigError::InvalidValue { key: "signal".to_string(), value: value.to_string() });
    }
    Ok(signal)
}
