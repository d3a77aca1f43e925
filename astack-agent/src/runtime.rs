//! The services the agent needs from the host VM
//!
//! Production code implements [`HostRuntime`] on top of JVMTI
//! ([`crate::jvmti::JvmRuntime`]); tests implement it with plain maps.

use crate::domain::{MethodId, VmError};
use astack_common::ThreadStateFlags;

/// Descriptive thread metadata (`GetThreadInfo`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadInfo {
    pub name: String,
    pub priority: i32,
    pub daemon: bool,
}

/// What the VM knows about a method's declaring class
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassDescriptor {
    /// Internal signature, e.g. `Ljava/lang/Thread;`
    pub signature: Option<String>,
    pub source_file: Option<String>,
}

/// One row of a method's line number table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineNumberEntry {
    pub start_location: i64,
    pub line_number: i32,
}

/// Host VM instrumentation surface
///
/// `Thread` is whatever handle the VM gives out for a live thread; the agent
/// never keeps one beyond the call that produced it.
pub trait HostRuntime {
    type Thread;

    /// Snapshot of all live threads, in VM order
    ///
    /// # Errors
    /// Returns the VM error if enumeration fails
    fn all_threads(&self) -> Result<Vec<Self::Thread>, VmError>;

    /// # Errors
    /// Returns the VM error if the state cannot be queried
    fn thread_state(&self, thread: &Self::Thread) -> Result<ThreadStateFlags, VmError>;

    /// # Errors
    /// Returns the VM error if the info cannot be queried
    fn thread_info(&self, thread: &Self::Thread) -> Result<ThreadInfo, VmError>;

    /// Opaque per-thread tag, `0` when untagged
    ///
    /// # Errors
    /// Returns the VM error if the tag cannot be read
    fn thread_tag(&self, thread: &Self::Thread) -> Result<i64, VmError>;

    /// # Errors
    /// Returns the VM error if the tag cannot be stored
    fn set_thread_tag(&self, thread: &Self::Thread, tag: i64) -> Result<(), VmError>;

    /// # Errors
    /// Returns the VM error if the method is unknown
    fn method_name(&self, method: MethodId) -> Result<String, VmError>;

    /// Declaring class of a method; missing parts are `None`
    ///
    /// # Errors
    /// Returns the VM error if the declaring class itself cannot be found
    fn declaring_class(&self, method: MethodId) -> Result<ClassDescriptor, VmError>;

    /// # Errors
    /// Returns the VM error if the table is absent (native or no debug info)
    fn line_number_table(&self, method: MethodId) -> Result<Vec<LineNumberEntry>, VmError>;
}
