//! Safe(r) handles over the raw environments
//!
//! [`Jvmti`] and [`Jni`] wrap the environment pointers and turn every call
//! into a `Result`. Memory the VM hands out is owned by [`JvmtiArray`] /
//! [`JvmtiString`] and local references by [`LocalRef`], all of which give
//! it back on drop.

#![allow(unsafe_code)] // every method is a call through a C function table

use std::ffi::{c_char, c_void, CStr};
use std::ops::Deref;
use std::ptr;

use crate::domain::VmError;

use super::sys::{self, jni_slot, slot, jclass, jint, jmethodID, jobject, jthread, jvalue, JNIEnv};

#[inline]
fn check(call: &'static str, code: sys::jvmtiError) -> Result<(), VmError> {
    if code == sys::JVMTI_ERROR_NONE {
        Ok(())
    } else {
        Err(VmError::new(call, code))
    }
}

/// A `jvmtiEnv*`, valid for the life of the VM and on any thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Jvmti(*mut sys::jvmtiEnv);

// SAFETY: JVMTI environments are explicitly usable from any thread
unsafe impl Send for Jvmti {}
unsafe impl Sync for Jvmti {}

impl Jvmti {
    /// # Safety
    /// `env` must be a JVMTI environment obtained from `GetEnv`
    pub unsafe fn from_raw(env: *mut sys::jvmtiEnv) -> Self {
        Self(env)
    }

    pub fn as_raw(self) -> *mut sys::jvmtiEnv {
        self.0
    }

    pub fn add_capabilities(self, capabilities: &sys::jvmtiCapabilities) -> Result<(), VmError> {
        // SAFETY: slot type matches jvmti.h
        unsafe {
            let f: sys::AddCapabilitiesFn = sys::jvmti_fn(self.0, slot::ADD_CAPABILITIES);
            check("AddCapabilities", f(self.0, capabilities))
        }
    }

    pub fn set_event_callbacks(self, callbacks: &sys::jvmtiEventCallbacks) -> Result<(), VmError> {
        #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
        let size = std::mem::size_of::<sys::jvmtiEventCallbacks>() as jint;
        // SAFETY: slot type matches jvmti.h; the VM copies the table
        unsafe {
            let f: sys::SetEventCallbacksFn = sys::jvmti_fn(self.0, slot::SET_EVENT_CALLBACKS);
            check("SetEventCallbacks", f(self.0, callbacks, size))
        }
    }

    /// Enable `event` for all threads
    pub fn enable_event(self, event: i32) -> Result<(), VmError> {
        // SAFETY: slot type matches jvmti.h; a null thread means "all threads"
        unsafe {
            let f: sys::SetEventNotificationModeFn = sys::jvmti_fn(self.0, slot::SET_EVENT_NOTIFICATION_MODE);
            check("SetEventNotificationMode", f(self.0, sys::JVMTI_ENABLE, event, ptr::null_mut()))
        }
    }

    pub fn local_storage(self) -> Result<*mut c_void, VmError> {
        let mut data = ptr::null_mut();
        // SAFETY: slot type matches jvmti.h
        unsafe {
            let f: sys::GetEnvironmentLocalStorageFn = sys::jvmti_fn(self.0, slot::GET_ENVIRONMENT_LOCAL_STORAGE);
            check("GetEnvironmentLocalStorage", f(self.0, &mut data))?;
        }
        Ok(data)
    }

    pub fn set_local_storage(self, data: *const c_void) -> Result<(), VmError> {
        // SAFETY: slot type matches jvmti.h
        unsafe {
            let f: sys::SetEnvironmentLocalStorageFn = sys::jvmti_fn(self.0, slot::SET_ENVIRONMENT_LOCAL_STORAGE);
            check("SetEnvironmentLocalStorage", f(self.0, data))
        }
    }

    /// Local references to every live thread
    pub fn all_threads(self) -> Result<JvmtiArray<jthread>, VmError> {
        let mut count = 0;
        let mut threads = ptr::null_mut();
        // SAFETY: slot type matches jvmti.h; the array is ours to deallocate
        unsafe {
            let f: sys::GetAllThreadsFn = sys::jvmti_fn(self.0, slot::GET_ALL_THREADS);
            check("GetAllThreads", f(self.0, &mut count, &mut threads))?;
            Ok(JvmtiArray::new(self, threads, count))
        }
    }

    /// Raw thread info; the caller owns the two local references in it
    pub fn thread_info(self, thread: jthread) -> Result<(JvmtiString, sys::jvmtiThreadInfo), VmError> {
        let mut info = sys::jvmtiThreadInfo {
            name: ptr::null_mut(),
            priority: 0,
            is_daemon: 0,
            thread_group: ptr::null_mut(),
            context_class_loader: ptr::null_mut(),
        };
        // SAFETY: slot type matches jvmti.h
        unsafe {
            let f: sys::GetThreadInfoFn = sys::jvmti_fn(self.0, slot::GET_THREAD_INFO);
            check("GetThreadInfo", f(self.0, thread, &mut info))?;
            Ok((JvmtiString::new(self, info.name), info))
        }
    }

    pub fn thread_state(self, thread: jthread) -> Result<jint, VmError> {
        let mut state = 0;
        // SAFETY: slot type matches jvmti.h
        unsafe {
            let f: sys::GetThreadStateFn = sys::jvmti_fn(self.0, slot::GET_THREAD_STATE);
            check("GetThreadState", f(self.0, thread, &mut state))?;
        }
        Ok(state)
    }

    pub fn tag(self, object: jobject) -> Result<i64, VmError> {
        let mut tag = 0;
        // SAFETY: slot type matches jvmti.h
        unsafe {
            let f: sys::GetTagFn = sys::jvmti_fn(self.0, slot::GET_TAG);
            check("GetTag", f(self.0, object, &mut tag))?;
        }
        Ok(tag)
    }

    pub fn set_tag(self, object: jobject, tag: i64) -> Result<(), VmError> {
        // SAFETY: slot type matches jvmti.h
        unsafe {
            let f: sys::SetTagFn = sys::jvmti_fn(self.0, slot::SET_TAG);
            check("SetTag", f(self.0, object, tag))
        }
    }

    /// Start `proc_` on `thread` as a JVMTI agent thread
    pub fn run_agent_thread(self, thread: jthread, proc_: sys::AgentThreadFn, priority: jint) -> Result<(), VmError> {
        // SAFETY: slot type matches jvmti.h
        unsafe {
            let f: sys::RunAgentThreadFn = sys::jvmti_fn(self.0, slot::RUN_AGENT_THREAD);
            check("RunAgentThread", f(self.0, thread, proc_, ptr::null(), priority))
        }
    }

    /// Local references to every loaded class
    pub fn loaded_classes(self) -> Result<JvmtiArray<jclass>, VmError> {
        let mut count = 0;
        let mut classes = ptr::null_mut();
        // SAFETY: slot type matches jvmti.h
        unsafe {
            let f: sys::GetLoadedClassesFn = sys::jvmti_fn(self.0, slot::GET_LOADED_CLASSES);
            check("GetLoadedClasses", f(self.0, &mut count, &mut classes))?;
            Ok(JvmtiArray::new(self, classes, count))
        }
    }

    pub fn class_methods(self, class: jclass) -> Result<JvmtiArray<jmethodID>, VmError> {
        let mut count = 0;
        let mut methods = ptr::null_mut();
        // SAFETY: slot type matches jvmti.h
        unsafe {
            let f: sys::GetClassMethodsFn = sys::jvmti_fn(self.0, slot::GET_CLASS_METHODS);
            check("GetClassMethods", f(self.0, class, &mut count, &mut methods))?;
            Ok(JvmtiArray::new(self, methods, count))
        }
    }

    pub fn class_signature(self, class: jclass) -> Result<JvmtiString, VmError> {
        let mut signature = ptr::null_mut();
        // SAFETY: slot type matches jvmti.h; the generic signature is not requested
        unsafe {
            let f: sys::GetClassSignatureFn = sys::jvmti_fn(self.0, slot::GET_CLASS_SIGNATURE);
            check("GetClassSignature", f(self.0, class, &mut signature, ptr::null_mut()))?;
            Ok(JvmtiString::new(self, signature))
        }
    }

    pub fn source_file_name(self, class: jclass) -> Result<JvmtiString, VmError> {
        let mut name = ptr::null_mut();
        // SAFETY: slot type matches jvmti.h
        unsafe {
            let f: sys::GetSourceFileNameFn = sys::jvmti_fn(self.0, slot::GET_SOURCE_FILE_NAME);
            check("GetSourceFileName", f(self.0, class, &mut name))?;
            Ok(JvmtiString::new(self, name))
        }
    }

    pub fn method_name(self, method: jmethodID) -> Result<JvmtiString, VmError> {
        let mut name = ptr::null_mut();
        // SAFETY: slot type matches jvmti.h; signatures are not requested
        unsafe {
            let f: sys::GetMethodNameFn = sys::jvmti_fn(self.0, slot::GET_METHOD_NAME);
            check("GetMethodName", f(self.0, method, &mut name, ptr::null_mut(), ptr::null_mut()))?;
            Ok(JvmtiString::new(self, name))
        }
    }

    /// Local reference to the declaring class
    pub fn method_declaring_class(self, method: jmethodID) -> Result<jclass, VmError> {
        let mut class = ptr::null_mut();
        // SAFETY: slot type matches jvmti.h
        unsafe {
            let f: sys::GetMethodDeclaringClassFn = sys::jvmti_fn(self.0, slot::GET_METHOD_DECLARING_CLASS);
            check("GetMethodDeclaringClass", f(self.0, method, &mut class))?;
        }
        Ok(class)
    }

    pub fn line_number_table(self, method: jmethodID) -> Result<JvmtiArray<sys::jvmtiLineNumberEntry>, VmError> {
        let mut count = 0;
        let mut table = ptr::null_mut();
        // SAFETY: slot type matches jvmti.h
        unsafe {
            let f: sys::GetLineNumberTableFn = sys::jvmti_fn(self.0, slot::GET_LINE_NUMBER_TABLE);
            check("GetLineNumberTable", f(self.0, method, &mut count, &mut table))?;
            Ok(JvmtiArray::new(self, table, count))
        }
    }

    fn deallocate(self, mem: *mut c_void) {
        if mem.is_null() {
            return;
        }
        // SAFETY: `mem` was allocated by this environment
        unsafe {
            let f: sys::DeallocateFn = sys::jvmti_fn(self.0, slot::DEALLOCATE);
            f(self.0, mem.cast());
        }
    }
}

/// Array allocated by the VM, released with `Deallocate`
pub struct JvmtiArray<T> {
    env: Jvmti,
    ptr: *mut T,
    len: usize,
}

impl<T> JvmtiArray<T> {
    /// # Safety
    /// `ptr` must be null or hold `count` initialized elements allocated by `env`
    unsafe fn new(env: Jvmti, ptr: *mut T, count: jint) -> Self {
        let len = if ptr.is_null() { 0 } else { usize::try_from(count).unwrap_or(0) };
        Self { env, ptr, len }
    }
}

impl<T> Deref for JvmtiArray<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        if self.len == 0 {
            return &[];
        }
        // SAFETY: see `new`
        unsafe { std::slice::from_raw_parts(self.ptr, self.len) }
    }
}

impl<T> Drop for JvmtiArray<T> {
    fn drop(&mut self) {
        self.env.deallocate(self.ptr.cast());
    }
}

/// Modified-UTF-8 string allocated by the VM
pub struct JvmtiString {
    env: Jvmti,
    ptr: *mut c_char,
}

impl JvmtiString {
    /// # Safety
    /// `ptr` must be null or a NUL-terminated string allocated by `env`
    unsafe fn new(env: Jvmti, ptr: *mut c_char) -> Self {
        Self { env, ptr }
    }

    /// `None` when the VM returned no string
    pub fn to_owned_string(&self) -> Option<String> {
        if self.ptr.is_null() {
            return None;
        }
        // SAFETY: see `new`
        Some(unsafe { CStr::from_ptr(self.ptr) }.to_string_lossy().into_owned())
    }
}

impl Drop for JvmtiString {
    fn drop(&mut self) {
        self.env.deallocate(self.ptr.cast());
    }
}

/// A `JNIEnv*`; only valid on the thread it was handed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Jni(*mut JNIEnv);

impl Jni {
    /// # Safety
    /// `env` must be the JNI environment of the calling thread
    pub unsafe fn from_raw(env: *mut JNIEnv) -> Self {
        Self(env)
    }

    pub fn as_raw(self) -> *mut JNIEnv {
        self.0
    }

    pub fn delete_local_ref(self, object: jobject) {
        if object.is_null() {
            return;
        }
        // SAFETY: table entry type matches jni.h
        unsafe {
            let f: sys::DeleteLocalRefFn = sys::jni_fn(self.0, jni_slot::DELETE_LOCAL_REF);
            f(self.0, object);
        }
    }

    /// Take ownership of a local reference
    pub fn local(self, object: jobject) -> LocalRef {
        LocalRef { jni: Some(self), raw: object }
    }

    /// `new java.lang.Thread(name)`, pending exceptions cleared on failure
    pub fn new_thread(self, name: &CStr) -> Option<LocalRef> {
        // SAFETY: table entry types match jni.h, arguments are valid C strings
        unsafe {
            let find_class: sys::FindClassFn = sys::jni_fn(self.0, jni_slot::FIND_CLASS);
            let get_method_id: sys::GetMethodIdFn = sys::jni_fn(self.0, jni_slot::GET_METHOD_ID);
            let new_string: sys::NewStringUtfFn = sys::jni_fn(self.0, jni_slot::NEW_STRING_UTF);
            let new_object: sys::NewObjectAFn = sys::jni_fn(self.0, jni_slot::NEW_OBJECT_A);

            let class = self.local(find_class(self.0, c"java/lang/Thread".as_ptr()));
            if class.is_null() {
                self.clear_exception();
                return None;
            }
            let init = get_method_id(self.0, class.raw, c"<init>".as_ptr(), c"(Ljava/lang/String;)V".as_ptr());
            if init.is_null() {
                self.clear_exception();
                return None;
            }
            let name = self.local(new_string(self.0, name.as_ptr()));
            if name.is_null() {
                self.clear_exception();
                return None;
            }

            let args = [jvalue { l: name.raw }];
            let thread = self.local(new_object(self.0, class.raw, init, args.as_ptr()));
            if thread.is_null() {
                self.clear_exception();
                return None;
            }
            Some(thread)
        }
    }

    fn clear_exception(self) {
        // SAFETY: table entry type matches jni.h
        unsafe {
            let f: sys::ExceptionClearFn = sys::jni_fn(self.0, jni_slot::EXCEPTION_CLEAR);
            f(self.0);
        }
    }
}

/// A JNI object reference, deleted on drop when owned
///
/// Borrowed references (the `jthread` argument of an event callback) belong
/// to the VM and are never deleted.
pub struct LocalRef {
    jni: Option<Jni>,
    raw: jobject,
}

impl LocalRef {
    /// Wrap a reference owned by the caller's caller
    pub fn borrowed(raw: jobject) -> Self {
        Self { jni: None, raw }
    }

    pub fn raw(&self) -> jobject {
        self.raw
    }

    pub fn is_null(&self) -> bool {
        self.raw.is_null()
    }
}

impl Drop for LocalRef {
    fn drop(&mut self) {
        if let Some(jni) = self.jni {
            jni.delete_local_ref(self.raw);
        }
    }
}

/// Get the JVMTI environment of `vm`
///
/// # Safety
/// `vm` must be the `JavaVM*` passed to `Agent_OnLoad`
pub unsafe fn jvmti_from_vm(vm: *mut sys::JavaVM) -> Result<Jvmti, jint> {
    let get_env: sys::GetEnvFn = sys::jni_fn(vm, sys::JAVA_VM_GET_ENV);
    let mut env: *mut c_void = ptr::null_mut();
    let rc = get_env(vm, &mut env, sys::JVMTI_VERSION_1_2);
    if rc != sys::JNI_OK || env.is_null() {
        return Err(rc);
    }
    Ok(Jvmti(env.cast()))
}
