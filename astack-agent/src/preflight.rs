//! Pre-flight checks for the agent
//!
//! Run from `Agent_OnLoad`, before anything is installed into the VM, so a
//! missing prerequisite fails the load with one clear message instead of a
//! half-initialized agent.

#![allow(unsafe_code)] // dlsym() requires unsafe

use std::ffi::{c_void, CStr};
use std::ptr::NonNull;

use log::{debug, warn};

use crate::domain::AgentError;
use crate::sampling::{has_foreign_handler, CallTraceFn};

const CALL_TRACE_SYMBOL: &CStr = c"AsyncGetCallTrace";

/// Find the VM's async stack walker and check the sampling signal is free
///
/// # Errors
/// Returns [`AgentError::WalkerUnavailable`] if the walker is not exported
pub fn run_preflight_checks(signal: libc::c_int) -> Result<CallTraceFn, AgentError> {
    let walker = resolve_call_trace()?;
    check_signal_unclaimed(signal);
    Ok(walker)
}

/// Look the walker up among the symbols already loaded into the process
///
/// # Errors
/// Returns [`AgentError::WalkerUnavailable`] if no loaded library exports it
pub fn resolve_call_trace() -> Result<CallTraceFn, AgentError> {
    let symbol = lookup_symbol(CALL_TRACE_SYMBOL).ok_or(AgentError::WalkerUnavailable)?;
    debug!("AsyncGetCallTrace at {symbol:p}");

    // SAFETY: HotSpot exports AsyncGetCallTrace with exactly this signature
    Ok(unsafe { std::mem::transmute::<*mut c_void, CallTraceFn>(symbol.as_ptr()) })
}

/// Sampling on a signal somebody else handles would steal their signals
fn check_signal_unclaimed(signal: libc::c_int) {
    match has_foreign_handler(signal) {
        Ok(false) => {}
        Ok(true) => warn!(
            "Signal {signal} already has a handler; it will be replaced. \
             Choose another one with the signal= option if the application relies on it"
        ),
        Err(e) => warn!("{e}"),
    }
}

fn lookup_symbol(name: &CStr) -> Option<NonNull<c_void>> {
    // SAFETY: `name` is NUL terminated; RTLD_DEFAULT searches the global scope
    NonNull::new(unsafe { libc::dlsym(libc::RTLD_DEFAULT, name.as_ptr()) })
}
