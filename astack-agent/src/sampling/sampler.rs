//! Signal-synchronous sampler
//!
//! Turns "send a signal and hope" into a bounded synchronous call:
//!
//! 1. take the sampler lock (one capture in flight, process wide)
//! 2. find the target's OS identity in the registry, or give up (`Untracked`)
//! 3. arm the shared buffer for that thread, completion flag cleared first
//! 4. send the signal
//! 5. spin on the completion flag until the deadline
//! 6. release the lock on every path
//!
//! There are no retries: each dump samples each thread at most once.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::domain::{EnvHandle, OsThread, RawFrame};
use crate::registry::{ThreadRegistry, TrackedThread};
use crate::runtime::HostRuntime;

use super::capture::{CallTraceError, CaptureBuffer};
use super::signal::SignalSender;

/// How often (in spin iterations) the wall clock is consulted
const CLOCK_CHECK_INTERVAL: u32 = 1024;

/// Terminal state of one sample request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SampleOutcome {
    /// The handler ran and the walker produced frames
    Completed(Vec<RawFrame>),
    /// The handler ran but the walker could not produce frames
    WalkFailed(CallTraceError),
    /// The thread did not answer in time
    TimedOut,
    /// The thread has no registry entry (never tagged, or already ended)
    Untracked,
    /// The signal could not be delivered
    SignalFailed,
    /// A handler from an earlier capture still owns the buffer
    Busy,
}

/// Everything guarded by the sampler lock
#[derive(Debug, Default)]
struct SamplerState {
    registry: ThreadRegistry,
    /// An earlier handler claimed the buffer but had not finished when its
    /// requester gave up
    handler_outstanding: bool,
}

enum Wait {
    Completed,
    Withdrawn,
    StillWriting,
}

pub struct Sampler<S> {
    state: Mutex<SamplerState>,
    buffer: &'static CaptureBuffer,
    sender: S,
    timeout: Duration,
}

impl<S: SignalSender> Sampler<S> {
    #[must_use]
    pub fn new(buffer: &'static CaptureBuffer, sender: S, timeout: Duration) -> Self {
        Self { state: Mutex::new(SamplerState::default()), buffer, sender, timeout }
    }

    /// Thread-start notification; must run on the starting thread itself
    pub fn on_thread_start<R: HostRuntime>(&self, vm: &R, thread: &R::Thread, env: EnvHandle) {
        let tracked = TrackedThread { os_thread: OsThread::current(), env };
        if let Err(e) = self.lock().registry.register(vm, thread, tracked) {
            warn!("Thread will be missing from dumps: {e}");
        }
    }

    /// Thread-end notification
    pub fn on_thread_end<R: HostRuntime>(&self, vm: &R, thread: &R::Thread) {
        self.lock().registry.unregister(vm, thread);
    }

    #[must_use]
    pub fn tracked_threads(&self) -> usize {
        self.lock().registry.len()
    }

    /// Capture the current Java stack of `thread`
    pub fn sample<R: HostRuntime>(&self, vm: &R, thread: &R::Thread) -> SampleOutcome {
        let mut state = self.lock();

        let Some(target) = state.registry.lookup(vm, thread) else {
            return SampleOutcome::Untracked;
        };

        if state.handler_outstanding {
            if !self.buffer.is_complete() {
                warn!("Skipping capture: previous capture is still being written");
                return SampleOutcome::Busy;
            }
            state.handler_outstanding = false;
        }

        // SAFETY: lock held, and the previous capture either completed or was
        // withdrawn before anyone claimed it
        unsafe { self.buffer.arm(target.os_thread, target.env) };

        if let Err(e) = self.sender.send(target.os_thread) {
            warn!("{e}");
            if !self.buffer.disarm(target.os_thread) {
                state.handler_outstanding = true;
            }
            return SampleOutcome::SignalFailed;
        }

        match self.wait_for_completion(target.os_thread) {
            // SAFETY: lock held and completion observed
            Wait::Completed => match unsafe { self.buffer.read_frames() } {
                Ok(frames) => SampleOutcome::Completed(frames),
                Err(e) => {
                    debug!("No frames for {:?}: {e}", target.os_thread);
                    SampleOutcome::WalkFailed(e)
                }
            },
            Wait::Withdrawn => {
                warn!("Stack capture did not complete within {:?}", self.timeout);
                SampleOutcome::TimedOut
            }
            Wait::StillWriting => {
                warn!("Stack capture started but did not finish within {:?}", self.timeout * 2);
                state.handler_outstanding = true;
                SampleOutcome::TimedOut
            }
        }
    }

    fn wait_for_completion(&self, target: OsThread) -> Wait {
        if spin_until(|| self.buffer.is_complete(), Instant::now() + self.timeout) {
            return Wait::Completed;
        }
        if self.buffer.disarm(target) {
            return Wait::Withdrawn;
        }
        // Lost the race: the handler is walking the stack right now
        if spin_until(|| self.buffer.is_complete(), Instant::now() + self.timeout) {
            Wait::Completed
        } else {
            Wait::StillWriting
        }
    }

    fn lock(&self) -> MutexGuard<'_, SamplerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Busy-wait for `done`, bounded by `deadline`
fn spin_until(done: impl Fn() -> bool, deadline: Instant) -> bool {
    let mut spins: u32 = 0;
    loop {
        if done() {
            return true;
        }
        spins = spins.wrapping_add(1);
        if spins % CLOCK_CHECK_INTERVAL == 0 && Instant::now() >= deadline {
            return done();
        }
        std::hint::spin_loop();
    }
}
