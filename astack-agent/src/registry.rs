//! Thread registry
//!
//! Side table from VM thread objects to the OS identity needed for signal
//! delivery. The VM thread object only carries a [`ThreadKey`] as its tag;
//! the record itself lives here.
//!
//! The registry has no lock of its own. It lives inside the sampler's
//! mutex so that a record cannot be dropped while a capture that uses it is
//! in flight (see [`crate::sampling::Sampler`]).

use std::collections::HashMap;
use std::num::NonZeroU64;

use log::{debug, warn};

use crate::domain::{EnvHandle, OsThread, ThreadKey, VmError};
use crate::runtime::HostRuntime;

/// What the sampler needs to reach one live thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackedThread {
    pub os_thread: OsThread,
    pub env: EnvHandle,
}

#[derive(Debug, Default)]
pub struct ThreadRegistry {
    threads: HashMap<ThreadKey, TrackedThread>,
    last_key: u64,
}

impl ThreadRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `tracked` and tag `thread` with its key
    ///
    /// The entry is rolled back if the tag cannot be stored, so a thread is
    /// either fully registered or not at all.
    ///
    /// # Errors
    /// Returns the VM error from setting the tag
    pub fn register<R: HostRuntime>(
        &mut self,
        vm: &R,
        thread: &R::Thread,
        tracked: TrackedThread,
    ) -> Result<ThreadKey, VmError> {
        let key = self.insert(tracked);
        if let Err(e) = vm.set_thread_tag(thread, key.as_tag()) {
            self.threads.remove(&key);
            return Err(e);
        }
        debug!("Registered {key} -> {:?}", tracked.os_thread);
        Ok(key)
    }

    /// Drop the record for `thread` and clear its tag
    ///
    /// Untagged threads are fine: nothing happens.
    pub fn unregister<R: HostRuntime>(&mut self, vm: &R, thread: &R::Thread) -> Option<TrackedThread> {
        let key = self.key_of(vm, thread)?;
        let removed = self.threads.remove(&key);

        if let Err(e) = vm.set_thread_tag(thread, 0) {
            warn!("Failed to clear tag of {key}: {e}");
        }
        removed
    }

    /// Find the record for a VM thread, via its tag
    pub fn lookup<R: HostRuntime>(&self, vm: &R, thread: &R::Thread) -> Option<TrackedThread> {
        let key = self.key_of(vm, thread)?;
        self.get(key)
    }

    #[must_use]
    pub fn get(&self, key: ThreadKey) -> Option<TrackedThread> {
        self.threads.get(&key).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.threads.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }

    fn insert(&mut self, tracked: TrackedThread) -> ThreadKey {
        self.last_key += 1;
        // Keys start at 1; 0 is the VM's "untagged" value
        let key = ThreadKey(NonZeroU64::new(self.last_key).unwrap_or(NonZeroU64::MIN));
        self.threads.insert(key, tracked);
        key
    }

    fn key_of<R: HostRuntime>(&self, vm: &R, thread: &R::Thread) -> Option<ThreadKey> {
        match vm.thread_tag(thread) {
            Ok(tag) => ThreadKey::from_tag(tag),
            Err(e) => {
                debug!("Cannot read thread tag: {e}");
                None
            }
        }
    }
}
