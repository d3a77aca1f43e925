//! Stack sampling without a safepoint
//!
//! - `capture`: the single shared buffer and the signal-side capture logic
//! - `signal`: handler installation and signal delivery
//! - `sampler`: the lock + flag protocol that makes one capture synchronous

pub mod capture;
pub mod sampler;
pub mod signal;

pub use capture::{AsyncCallFrame, AsyncCallTrace, CallTraceError, CallTraceFn, CaptureBuffer, MAX_FRAMES};
pub use sampler::{SampleOutcome, Sampler};
pub use signal::{has_foreign_handler, install_handler, PthreadKill, SignalSender};
