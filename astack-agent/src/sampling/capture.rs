//! The process-wide capture buffer
//!
//! One buffer, reused for every capture. The requester (holding the sampler
//! lock) arms it for exactly one OS thread; that thread's signal handler
//! claims it, lets the stack walker fill it and raises the completion flag.
//!
//! ```text
//!   requester                               target thread (signal handler)
//!   ---------                               ------------------------------
//!   write env, clear `completed`
//!   armed_for = target        (release) ──▶ CAS armed_for: self -> 0 (acquire)
//!   pthread_kill(target)                     walker(trace, MAX_FRAMES, ucontext)
//!   spin on `completed`       (acquire) ◀── completed = true         (release)
//!   copy frames out
//! ```
//!
//! On timeout the requester tries the same CAS (`target -> 0`). Whoever wins
//! the CAS owns the buffer; a handler that lost simply returns, so a late
//! signal can never write into a later capture.

#![allow(unsafe_code)] // shared with a signal handler through raw pointers

use std::cell::UnsafeCell;
use std::ffi::c_void;
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use thiserror::Error;

use crate::domain::{EnvHandle, MethodId, OsThread, RawFrame};

/// Deepest stack captured per thread
pub const MAX_FRAMES: usize = 128;

/// One walker output slot (`ASGCT_CallFrame`)
///
/// `lineno` is really a bytecode index; negative values mark frames
/// without bytecode.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct AsyncCallFrame {
    pub lineno: i32,
    pub method_id: *mut c_void,
}

/// Walker request/result header (`ASGCT_CallTrace`)
#[repr(C)]
#[derive(Debug)]
pub struct AsyncCallTrace {
    pub env: *mut c_void,
    pub num_frames: i32,
    pub frames: *mut AsyncCallFrame,
}

/// Signature of `AsyncGetCallTrace`
pub type CallTraceFn = unsafe extern "C" fn(trace: *mut AsyncCallTrace, depth: i32, ucontext: *mut c_void);

/// Why the walker returned no frames (non-positive `num_frames`)
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallTraceError {
    #[error("no Java frame on the stack")]
    NoJavaFrame,
    #[error("class loading events not enabled")]
    NoClassLoad,
    #[error("GC active")]
    GcActive,
    #[error("thread not in Java, state unknown")]
    UnknownNotJava,
    #[error("thread not in Java, stack not walkable")]
    NotWalkableNotJava,
    #[error("thread in Java, state unknown")]
    UnknownJava,
    #[error("thread in Java, stack not walkable")]
    NotWalkableJava,
    #[error("unknown thread state")]
    UnknownState,
    #[error("thread exiting")]
    ThreadExit,
    #[error("deoptimization in progress")]
    Deopt,
    #[error("at safepoint")]
    Safepoint,
    #[error("walker error code {0}")]
    Other(i32),
}

impl CallTraceError {
    #[must_use]
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => Self::NoJavaFrame,
            -1 => Self::NoClassLoad,
            -2 => Self::GcActive,
            -3 => Self::UnknownNotJava,
            -4 => Self::NotWalkableNotJava,
            -5 => Self::UnknownJava,
            -6 => Self::NotWalkableJava,
            -7 => Self::UnknownState,
            -8 => Self::ThreadExit,
            -9 => Self::Deopt,
            -10 => Self::Safepoint,
            other => Self::Other(other),
        }
    }
}

pub struct CaptureBuffer {
    walker: CallTraceFn,
    /// Raw `pthread_t` the buffer is armed for, `0` when idle
    armed_for: AtomicUsize,
    completed: AtomicBool,
    trace: UnsafeCell<AsyncCallTrace>,
    frames: UnsafeCell<[AsyncCallFrame; MAX_FRAMES]>,
}

// SAFETY: the cells are only touched by the requester while it holds the
// sampler lock and the buffer is not claimed, or by the single handler that
// won the `armed_for` CAS. `completed` orders the handoff between them.
unsafe impl Sync for CaptureBuffer {}

impl CaptureBuffer {
    #[must_use]
    pub fn new(walker: CallTraceFn) -> Self {
        Self {
            walker,
            armed_for: AtomicUsize::new(0),
            completed: AtomicBool::new(true),
            trace: UnsafeCell::new(AsyncCallTrace {
                env: ptr::null_mut(),
                num_frames: 0,
                frames: ptr::null_mut(),
            }),
            frames: UnsafeCell::new(
                [AsyncCallFrame { lineno: 0, method_id: ptr::null_mut() }; MAX_FRAMES],
            ),
        }
    }

    /// Give the buffer process lifetime; the signal handler may reach it at
    /// any point after installation.
    #[must_use]
    pub fn leak(self) -> &'static Self {
        Box::leak(Box::new(self))
    }

    /// Prepare a capture of `target`'s stack
    ///
    /// # Safety
    /// The caller must hold the sampler lock, and no handler may currently
    /// own the buffer (the previous capture completed or was withdrawn).
    pub(crate) unsafe fn arm(&self, target: OsThread, env: EnvHandle) {
        let trace = self.trace.get();
        (*trace).env = env.as_ptr();
        (*trace).num_frames = 0;
        self.completed.store(false, Ordering::Relaxed);
        // Publishes the writes above to the handler that claims the buffer
        self.armed_for.store(target.as_raw(), Ordering::Release);
    }

    /// Withdraw an armed capture. `false` means a handler already claimed it.
    pub(crate) fn disarm(&self, target: OsThread) -> bool {
        self.armed_for
            .compare_exchange(target.as_raw(), 0, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn is_complete(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }

    /// Copy the captured frames out
    ///
    /// # Safety
    /// The caller must hold the sampler lock and must have observed
    /// [`Self::is_complete`] for the current capture.
    pub(crate) unsafe fn read_frames(&self) -> Result<Vec<RawFrame>, CallTraceError> {
        let trace = &*self.trace.get();
        if trace.num_frames <= 0 {
            return Err(CallTraceError::from_code(trace.num_frames));
        }

        #[allow(clippy::cast_sign_loss)]
        let count = (trace.num_frames as usize).min(MAX_FRAMES);
        let frames = &*self.frames.get();
        Ok(frames[..count]
            .iter()
            .map(|f| RawFrame { method: MethodId(f.method_id as usize), location: f.lineno })
            .collect())
    }

    /// Signal-handler side: capture the calling thread's stack if the buffer
    /// is armed for it.
    ///
    /// Async-signal-safe: one CAS, the walker call, one store.
    pub fn capture_current_thread(&self, ucontext: *mut c_void) {
        let me = OsThread::current().as_raw();
        if self
            .armed_for
            .compare_exchange(me, 0, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return;
        }

        #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
        let depth = MAX_FRAMES as i32;
        let trace = self.trace.get();
        // SAFETY: winning the CAS makes this thread the only writer until
        // `completed` is raised
        unsafe {
            (*trace).frames = self.frames.get().cast::<AsyncCallFrame>();
            (*trace).num_frames = 0;
            (self.walker)(trace, depth, ucontext);
        }

        self.completed.store(true, Ordering::Release);
    }
}
