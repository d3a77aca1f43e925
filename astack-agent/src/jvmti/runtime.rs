//! [`HostRuntime`] on top of a live JVM

use astack_common::ThreadStateFlags;
use log::debug;

use crate::domain::{MethodId, VmError};
use crate::runtime::{ClassDescriptor, HostRuntime, LineNumberEntry, ThreadInfo};

use super::env::{Jni, Jvmti, LocalRef};
use super::sys::jmethodID;

const JVMTI_ERROR_NULL_POINTER: u32 = 100;

/// The VM as seen from one thread
///
/// Holds that thread's `JNIEnv`, so it must not leave the thread (or the
/// callback) it was built for.
#[derive(Debug, Clone, Copy)]
pub struct JvmRuntime {
    jvmti: Jvmti,
    jni: Jni,
}

impl JvmRuntime {
    #[must_use]
    pub fn new(jvmti: Jvmti, jni: Jni) -> Self {
        Self { jvmti, jni }
    }

    fn string(
        call: &'static str,
        value: Result<super::env::JvmtiString, VmError>,
    ) -> Result<String, VmError> {
        value?.to_owned_string().ok_or(VmError::new(call, JVMTI_ERROR_NULL_POINTER))
    }
}

fn method_ptr(method: MethodId) -> jmethodID {
    method.0 as jmethodID
}

impl HostRuntime for JvmRuntime {
    type Thread = LocalRef;

    fn all_threads(&self) -> Result<Vec<LocalRef>, VmError> {
        let threads = self.jvmti.all_threads()?;
        Ok(threads.iter().map(|&thread| self.jni.local(thread)).collect())
    }

    fn thread_state(&self, thread: &LocalRef) -> Result<ThreadStateFlags, VmError> {
        #[allow(clippy::cast_sign_loss)]
        let bits = self.jvmti.thread_state(thread.raw())? as u32;
        Ok(ThreadStateFlags(bits))
    }

    fn thread_info(&self, thread: &LocalRef) -> Result<ThreadInfo, VmError> {
        let (name, raw) = self.jvmti.thread_info(thread.raw())?;
        self.jni.delete_local_ref(raw.thread_group);
        self.jni.delete_local_ref(raw.context_class_loader);

        Ok(ThreadInfo {
            name: name.to_owned_string().unwrap_or_else(|| "Unknown".to_string()),
            priority: raw.priority,
            daemon: raw.is_daemon != 0,
        })
    }

    fn thread_tag(&self, thread: &LocalRef) -> Result<i64, VmError> {
        self.jvmti.tag(thread.raw())
    }

    fn set_thread_tag(&self, thread: &LocalRef, tag: i64) -> Result<(), VmError> {
        self.jvmti.set_tag(thread.raw(), tag)
    }

    fn method_name(&self, method: MethodId) -> Result<String, VmError> {
        Self::string("GetMethodName", self.jvmti.method_name(method_ptr(method)))
    }

    fn declaring_class(&self, method: MethodId) -> Result<ClassDescriptor, VmError> {
        let class = self.jni.local(self.jvmti.method_declaring_class(method_ptr(method))?);

        let signature = Self::string("GetClassSignature", self.jvmti.class_signature(class.raw()))
            .map_err(|e| debug!("{e}"))
            .ok();
        // Absent for classes compiled without debug info
        let source_file = Self::string("GetSourceFileName", self.jvmti.source_file_name(class.raw()))
            .map_err(|e| debug!("{e}"))
            .ok();

        Ok(ClassDescriptor { signature, source_file })
    }

    fn line_number_table(&self, method: MethodId) -> Result<Vec<LineNumberEntry>, VmError> {
        let table = self.jvmti.line_number_table(method_ptr(method))?;
        Ok(table
            .iter()
            .map(|entry| LineNumberEntry { start_location: entry.start_location, line_number: entry.line_number })
            .collect())
    }
}
