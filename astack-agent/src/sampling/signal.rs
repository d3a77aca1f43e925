//! Signal plumbing: handler installation and per-thread delivery

#![allow(unsafe_code)] // sigaction / pthread_kill / errno are FFI

use std::ffi::c_void;
use std::io;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

use crate::domain::{OsThread, SignalError};

use super::capture::CaptureBuffer;

/// Buffer the handler writes into. Set once, before the handler can run.
static ACTIVE_BUFFER: AtomicPtr<CaptureBuffer> = AtomicPtr::new(ptr::null_mut());

/// Delivers the capture request to one thread
///
/// Production uses [`PthreadKill`]; tests substitute their own to control
/// timing or to observe the request order.
pub trait SignalSender: Send + Sync {
    /// # Errors
    /// Returns an error if the signal could not be queued for `target`
    fn send(&self, target: OsThread) -> Result<(), SignalError>;
}

impl<T: SignalSender + ?Sized> SignalSender for &T {
    fn send(&self, target: OsThread) -> Result<(), SignalError> {
        (**self).send(target)
    }
}

/// `pthread_kill(target, signal)`
#[derive(Debug, Clone, Copy)]
pub struct PthreadKill {
    signal: libc::c_int,
}

impl PthreadKill {
    #[must_use]
    pub fn new(signal: libc::c_int) -> Self {
        Self { signal }
    }
}

impl SignalSender for PthreadKill {
    fn send(&self, target: OsThread) -> Result<(), SignalError> {
        // SAFETY: `target` comes from the registry, whose entries are removed
        // (under the sampler lock) before their thread is gone
        let rc = unsafe { libc::pthread_kill(target.0, self.signal) };
        if rc == 0 {
            Ok(())
        } else {
            Err(SignalError::Deliver { signal: self.signal, source: io::Error::from_raw_os_error(rc) })
        }
    }
}

/// Route `signal` to [`CaptureBuffer::capture_current_thread`] on `buffer`
///
/// # Errors
/// Returns an error if `sigaction` rejects the signal
pub fn install_handler(signal: libc::c_int, buffer: &'static CaptureBuffer) -> Result<(), SignalError> {
    ACTIVE_BUFFER.store(ptr::from_ref(buffer).cast_mut(), Ordering::Release);

    // SAFETY: `sa` is fully initialized before use; the handler only touches
    // the leaked buffer and errno
    unsafe {
        let mut sa: libc::sigaction = std::mem::zeroed();
        sa.sa_sigaction = handle_capture_signal as *const () as libc::sighandler_t;
        // SA_RESTART keeps the interrupted thread's blocking calls transparent
        sa.sa_flags = libc::SA_SIGINFO | libc::SA_RESTART;
        libc::sigemptyset(&mut sa.sa_mask);

        if libc::sigaction(signal, &sa, ptr::null_mut()) != 0 {
            return Err(SignalError::Install { signal, source: io::Error::last_os_error() });
        }
    }
    Ok(())
}

/// Whether something other than the default action is installed for `signal`
///
/// # Errors
/// Returns an error if `sigaction` cannot be queried for `signal`
pub fn has_foreign_handler(signal: libc::c_int) -> Result<bool, SignalError> {
    // SAFETY: query-only sigaction call into a zeroed struct
    unsafe {
        let mut current: libc::sigaction = std::mem::zeroed();
        if libc::sigaction(signal, ptr::null(), &mut current) != 0 {
            return Err(SignalError::Install { signal, source: io::Error::last_os_error() });
        }
        let ours = handle_capture_signal as *const () as libc::sighandler_t;
        Ok(!matches!(current.sa_sigaction, libc::SIG_DFL | libc::SIG_IGN) && current.sa_sigaction != ours)
    }
}

extern "C" fn handle_capture_signal(_signal: libc::c_int, _info: *mut libc::siginfo_t, ucontext: *mut c_void) {
    // SAFETY: errno is thread-local; restored so the interrupted code never
    // observes the walker's side effects on it
    let errno = unsafe { *libc::__errno_location() };

    let buffer = ACTIVE_BUFFER.load(Ordering::Acquire);
    if !buffer.is_null() {
        // SAFETY: the pointer was published from a `&'static CaptureBuffer`
        unsafe { &*buffer }.capture_current_thread(ucontext);
    }

    unsafe { *libc::__errno_location() = errno };
}
