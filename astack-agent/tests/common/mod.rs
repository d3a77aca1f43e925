//! In-process stand-ins for the JVM: a scripted VM, a scripted stack walker
//! and signal senders that deliver (or lose) capture requests on demand.

#![allow(dead_code, unsafe_code, clippy::missing_panics_doc)]

use std::ffi::c_void;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use astack_agent::domain::{MethodId, OsThread, SignalError, VmError};
use astack_agent::runtime::{ClassDescriptor, HostRuntime, LineNumberEntry, ThreadInfo};
use astack_agent::sampling::{AsyncCallFrame, AsyncCallTrace, CaptureBuffer, SignalSender};
use astack_common::ThreadStateFlags;

pub const RUNNABLE: u32 = ThreadStateFlags::ALIVE | ThreadStateFlags::RUNNABLE;
pub const SLEEPING: u32 = ThreadStateFlags::ALIVE
    | ThreadStateFlags::WAITING
    | ThreadStateFlags::WAITING_WITH_TIMEOUT
    | ThreadStateFlags::SLEEPING;
pub const PARKED: u32 = ThreadStateFlags::ALIVE
    | ThreadStateFlags::WAITING
    | ThreadStateFlags::WAITING_INDEFINITELY
    | ThreadStateFlags::PARKED;

/// `java.lang.Thread.sleep`, native
pub const METHOD_SLEEP: usize = 0x10;
/// `Sleeper.main` in `Sleeper.java`
pub const METHOD_MAIN: usize = 0x20;
/// `jdk.internal.misc.Unsafe.park`, no source file
pub const METHOD_PARK: usize = 0x30;

/// Walker scripts, selected by the `JNIEnv` the buffer was armed with
pub const ENV_SLEEPER: usize = 0x1000;
pub const ENV_PARKED: usize = 0x2000;
pub const ENV_GC_ACTIVE: usize = 0x3000;
pub const ENV_DEEP: usize = 0x4000;

const SLEEPER_STACK: &[(usize, i32)] = &[(METHOD_SLEEP, -3), (METHOD_MAIN, 9)];
const PARKED_STACK: &[(usize, i32)] = &[(METHOD_PARK, -3), (METHOD_MAIN, 2)];

/// Deterministic replacement for `AsyncGetCallTrace`
///
/// Does not allocate, so it is safe to run from a real signal handler.
///
/// # Safety
/// `trace` must point at an armed capture buffer header
pub unsafe extern "C" fn scripted_walker(trace: *mut AsyncCallTrace, depth: i32, _ucontext: *mut c_void) {
    let depth = usize::try_from(depth).unwrap_or(0);
    let frames = (*trace).frames;

    let written = match (*trace).env as usize {
        ENV_SLEEPER | ENV_PARKED => {
            let stack = if (*trace).env as usize == ENV_SLEEPER { SLEEPER_STACK } else { PARKED_STACK };
            for (i, &(method, location)) in stack.iter().enumerate() {
                *frames.add(i) = AsyncCallFrame { lineno: location, method_id: method as *mut c_void };
            }
            stack.len()
        }
        // Deeper than any buffer: the walker stops at `depth`
        ENV_DEEP => {
            for i in 0..depth {
                *frames.add(i) = AsyncCallFrame { lineno: 0, method_id: METHOD_MAIN as *mut c_void };
            }
            depth
        }
        ENV_GC_ACTIVE => {
            (*trace).num_frames = -2;
            return;
        }
        _ => 0,
    };
    (*trace).num_frames = i32::try_from(written).unwrap_or(i32::MAX);
}

#[derive(Debug, Clone)]
pub struct FakeThread {
    pub name: String,
    pub priority: i32,
    pub daemon: bool,
    pub state: u32,
    pub tag: i64,
    /// `GetThreadInfo` fails for this thread
    pub info_unavailable: bool,
}

/// Threads are indices into the thread table
#[derive(Debug, Default)]
pub struct FakeVm {
    threads: Mutex<Vec<FakeThread>>,
}

impl FakeVm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_thread(&self, name: &str, daemon: bool, state: u32) -> usize {
        let mut threads = self.threads.lock().unwrap();
        threads.push(FakeThread {
            name: name.to_string(),
            priority: if daemon { 9 } else { 5 },
            daemon,
            state,
            tag: 0,
            info_unavailable: false,
        });
        threads.len() - 1
    }

    pub fn update(&self, thread: usize, f: impl FnOnce(&mut FakeThread)) {
        f(&mut self.threads.lock().unwrap()[thread]);
    }

    pub fn tag(&self, thread: usize) -> i64 {
        self.threads.lock().unwrap()[thread].tag
    }

    fn with<T>(&self, thread: usize, call: &'static str, f: impl FnOnce(&mut FakeThread) -> T) -> Result<T, VmError> {
        let mut threads = self.threads.lock().unwrap();
        threads.get_mut(thread).map(f).ok_or(VmError::new(call, 10))
    }
}

impl HostRuntime for FakeVm {
    type Thread = usize;

    fn all_threads(&self) -> Result<Vec<usize>, VmError> {
        Ok((0..self.threads.lock().unwrap().len()).collect())
    }

    fn thread_state(&self, thread: &usize) -> Result<ThreadStateFlags, VmError> {
        self.with(*thread, "GetThreadState", |t| ThreadStateFlags(t.state))
    }

    fn thread_info(&self, thread: &usize) -> Result<ThreadInfo, VmError> {
        let info = self.with(*thread, "GetThreadInfo", |t| {
            (!t.info_unavailable).then(|| ThreadInfo { name: t.name.clone(), priority: t.priority, daemon: t.daemon })
        })?;
        info.ok_or(VmError::new("GetThreadInfo", 15))
    }

    fn thread_tag(&self, thread: &usize) -> Result<i64, VmError> {
        self.with(*thread, "GetTag", |t| t.tag)
    }

    fn set_thread_tag(&self, thread: &usize, tag: i64) -> Result<(), VmError> {
        self.with(*thread, "SetTag", |t| t.tag = tag)
    }

    fn method_name(&self, method: MethodId) -> Result<String, VmError> {
        match method.0 {
            METHOD_SLEEP => Ok("sleep".to_string()),
            METHOD_MAIN => Ok("main".to_string()),
            METHOD_PARK => Ok("park".to_string()),
            _ => Err(VmError::new("GetMethodName", 23)),
        }
    }

    fn declaring_class(&self, method: MethodId) -> Result<ClassDescriptor, VmError> {
        let (signature, source_file) = match method.0 {
            METHOD_SLEEP => ("Ljava/lang/Thread;", Some("Thread.java")),
            METHOD_MAIN => ("LSleeper;", Some("Sleeper.java")),
            METHOD_PARK => ("Ljdk/internal/misc/Unsafe;", None),
            _ => return Err(VmError::new("GetMethodDeclaringClass", 23)),
        };
        Ok(ClassDescriptor { signature: Some(signature.to_string()), source_file: source_file.map(str::to_string) })
    }

    fn line_number_table(&self, method: MethodId) -> Result<Vec<LineNumberEntry>, VmError> {
        match method.0 {
            METHOD_MAIN => Ok(vec![
                LineNumberEntry { start_location: 0, line_number: 3 },
                LineNumberEntry { start_location: 8, line_number: 4 },
            ]),
            METHOD_SLEEP | METHOD_PARK => Err(VmError::new("GetLineNumberTable", 104)),
            _ => Err(VmError::new("GetLineNumberTable", 23)),
        }
    }
}

/// Runs the capture synchronously on the requesting thread, which is what
/// a real signal sent to oneself does
pub struct InlineSender {
    buffer: &'static CaptureBuffer,
    hold: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    pub sent: AtomicUsize,
}

impl InlineSender {
    pub fn new(buffer: &'static CaptureBuffer) -> Self {
        Self::holding(buffer, Duration::ZERO)
    }

    /// Keeps every request "in flight" for `hold` before capturing
    pub fn holding(buffer: &'static CaptureBuffer, hold: Duration) -> Self {
        Self {
            buffer,
            hold,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            sent: AtomicUsize::new(0),
        }
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl SignalSender for InlineSender {
    fn send(&self, target: OsThread) -> Result<(), SignalError> {
        assert_eq!(target, OsThread::current(), "inline delivery only reaches the calling thread");
        self.sent.fetch_add(1, Ordering::SeqCst);

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(self.hold);
        self.buffer.capture_current_thread(std::ptr::null_mut());
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Accepts every request and delivers none
#[derive(Debug, Default)]
pub struct LostSignals;

impl SignalSender for LostSignals {
    fn send(&self, _target: OsThread) -> Result<(), SignalError> {
        Ok(())
    }
}

/// Rejects every request, as `pthread_kill` does for a dead thread
#[derive(Debug, Default)]
pub struct DeadThreads;

impl SignalSender for DeadThreads {
    fn send(&self, _target: OsThread) -> Result<(), SignalError> {
        Err(SignalError::Deliver { signal: libc::SIGPWR, source: io::Error::from_raw_os_error(libc::ESRCH) })
    }
}

pub fn leaked_buffer() -> &'static CaptureBuffer {
    CaptureBuffer::new(scripted_walker).leak()
}
