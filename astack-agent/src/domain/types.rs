//! Newtypes for the identities that cross the VM / OS boundary

#![allow(unsafe_code)] // pthread_self() / pthread_equal() are FFI calls

use std::fmt;
use std::num::NonZeroU64;

/// OS-level thread identity, the target of signal delivery
///
/// Can only be observed from the thread itself via [`OsThread::current`];
/// there is no way to recover it later from the VM's thread object.
#[derive(Clone, Copy)]
pub struct OsThread(pub libc::pthread_t);

impl OsThread {
    /// Identity of the calling thread
    #[must_use]
    pub fn current() -> Self {
        // SAFETY: pthread_self has no preconditions and is async-signal-safe
        Self(unsafe { libc::pthread_self() })
    }

    /// Raw value, used as the arming word of the capture buffer
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::useless_conversion)]
    pub fn as_raw(self) -> usize {
        self.0 as usize
    }
}

impl PartialEq for OsThread {
    fn eq(&self, other: &Self) -> bool {
        // SAFETY: pthread_equal only compares the two handles
        unsafe { libc::pthread_equal(self.0, other.0) != 0 }
    }
}

impl Eq for OsThread {}

impl fmt::Debug for OsThread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OsThread({:#x})", self.as_raw())
    }
}

/// Registry key, stored on the VM thread object as its tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThreadKey(pub NonZeroU64);

impl ThreadKey {
    /// Interpret a VM tag; `0` means "no tag"
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub fn from_tag(tag: i64) -> Option<Self> {
        NonZeroU64::new(tag as u64).map(Self)
    }

    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub fn as_tag(self) -> i64 {
        self.0.get() as i64
    }
}

impl fmt::Display for ThreadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "thread#{}", self.0)
    }
}

/// Address of a thread's `JNIEnv`, handed to the stack walker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EnvHandle(pub usize);

impl EnvHandle {
    #[must_use]
    pub fn as_ptr(self) -> *mut std::ffi::c_void {
        self.0 as *mut std::ffi::c_void
    }
}

/// Opaque VM method identity (`jmethodID`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodId(pub usize);

/// One captured frame before symbol resolution
///
/// `location` is a bytecode index; negative values are walker sentinels
/// for frames without bytecode (native methods).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawFrame {
    pub method: MethodId,
    pub location: i32,
}
