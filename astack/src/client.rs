//! Fetching a dump from the agent
//!
//! The agent writes the whole dump and closes the connection, so a fetch is
//! connect, read to EOF, decode. The deadline covers all three steps.

use std::time::Duration;

use log::debug;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("cannot connect to {addr}: {source}")]
    Connect { addr: String, source: std::io::Error },

    #[error("connection to {addr} failed mid-dump: {source}")]
    Read { addr: String, source: std::io::Error },

    #[error("no complete dump from {addr} within {timeout:?}")]
    Timeout { addr: String, timeout: Duration },

    #[error("dump from {addr} is not valid UTF-8")]
    NotUtf8 { addr: String },
}

/// Read one complete dump from `host:port`
///
/// # Errors
/// Returns [`FetchError`] when the agent is unreachable, the connection
/// breaks, the text is not UTF-8 or the whole exchange exceeds `timeout`
pub async fn fetch_dump(host: &str, port: u16, timeout: Duration) -> Result<String, FetchError> {
    let addr = format!("{host}:{port}");
    match tokio::time::timeout(timeout, read_all(&addr)).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::Timeout { addr, timeout }),
    }
}

async fn read_all(addr: &str) -> Result<String, FetchError> {
    let mut stream = TcpStream::connect(addr)
        .await
        .map_err(|source| FetchError::Connect { addr: addr.to_string(), source })?;
    debug!("Connected to {addr}");

    let mut bytes = Vec::new();
    stream
        .read_to_end(&mut bytes)
        .await
        .map_err(|source| FetchError::Read { addr: addr.to_string(), source })?;
    debug!("Read {} bytes from {addr}", bytes.len());

    String::from_utf8(bytes).map_err(|_| FetchError::NotUtf8 { addr: addr.to_string() })
}
