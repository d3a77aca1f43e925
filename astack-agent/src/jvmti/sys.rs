//! Raw JNI / JVMTI declarations
//!
//! Only the entries the agent calls are declared. Function tables are
//! treated as arrays of pointers and indexed by position, so the layouts
//! below only have to agree with `jni.h` / `jvmti.h` on slot numbers.

#![allow(unsafe_code)] // reading C function tables
#![allow(non_camel_case_types)]

use std::ffi::{c_char, c_int, c_uchar, c_void};

pub type jint = i32;
pub type jlong = i64;
pub type jboolean = u8;
pub type jlocation = i64;
pub type jobject = *mut c_void;
pub type jclass = jobject;
pub type jthread = jobject;
pub type jstring = jobject;
pub type jmethodID = *mut c_void;
pub type jvmtiError = u32;

/// A `JNIEnv*` / `jvmtiEnv*` / `JavaVM*` all point at a pointer to a table
pub type FunctionTable = *const *const c_void;
pub type JNIEnv = FunctionTable;
pub type jvmtiEnv = FunctionTable;
pub type JavaVM = FunctionTable;

pub const JNI_OK: jint = 0;
pub const JNI_ERR: jint = -1;

pub const JVMTI_VERSION_1_2: jint = 0x3001_0200;
pub const JVMTI_ERROR_NONE: jvmtiError = 0;
pub const JVMTI_ERROR_CLASS_NOT_PREPARED: jvmtiError = 22;
pub const JVMTI_ENABLE: c_int = 1;
pub const JVMTI_THREAD_MAX_PRIORITY: jint = 10;

/// Event numbers (`jvmtiEvent`)
pub mod event {
    pub const VM_INIT: i32 = 50;
    pub const THREAD_START: i32 = 52;
    pub const THREAD_END: i32 = 53;
    pub const CLASS_LOAD: i32 = 55;
    pub const CLASS_PREPARE: i32 = 56;
}

/// 1-based slot numbers in `jvmtiInterface_1`, as numbered in `jvmti.h`
pub mod slot {
    pub const SET_EVENT_NOTIFICATION_MODE: usize = 2;
    pub const GET_ALL_THREADS: usize = 4;
    pub const GET_THREAD_INFO: usize = 9;
    pub const RUN_AGENT_THREAD: usize = 12;
    pub const GET_THREAD_STATE: usize = 17;
    pub const DEALLOCATE: usize = 47;
    pub const GET_CLASS_SIGNATURE: usize = 48;
    pub const GET_SOURCE_FILE_NAME: usize = 50;
    pub const GET_CLASS_METHODS: usize = 52;
    pub const GET_METHOD_NAME: usize = 64;
    pub const GET_METHOD_DECLARING_CLASS: usize = 65;
    pub const GET_LINE_NUMBER_TABLE: usize = 70;
    pub const GET_LOADED_CLASSES: usize = 78;
    pub const GET_TAG: usize = 106;
    pub const SET_TAG: usize = 107;
    pub const SET_EVENT_CALLBACKS: usize = 122;
    pub const ADD_CAPABILITIES: usize = 142;
    pub const GET_ENVIRONMENT_LOCAL_STORAGE: usize = 147;
    pub const SET_ENVIRONMENT_LOCAL_STORAGE: usize = 148;
}

/// 0-based indices into `JNINativeInterface_`
pub mod jni_slot {
    pub const FIND_CLASS: usize = 6;
    pub const EXCEPTION_CLEAR: usize = 17;
    pub const DELETE_LOCAL_REF: usize = 23;
    pub const NEW_OBJECT_A: usize = 30;
    pub const GET_METHOD_ID: usize = 33;
    pub const NEW_STRING_UTF: usize = 167;
}

/// 0-based index of `GetEnv` in `JNIInvokeInterface_`
pub const JAVA_VM_GET_ENV: usize = 6;

#[repr(C)]
#[derive(Debug)]
pub struct jvmtiThreadInfo {
    pub name: *mut c_char,
    pub priority: jint,
    pub is_daemon: jboolean,
    pub thread_group: jobject,
    pub context_class_loader: jobject,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct jvmtiLineNumberEntry {
    pub start_location: jlocation,
    pub line_number: jint,
}

/// `jvmtiCapabilities`: 128 one-bit fields, allocated from the low bit
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct jvmtiCapabilities {
    pub words: [u32; 4],
}

impl jvmtiCapabilities {
    pub const CAN_TAG_OBJECTS: u32 = 1 << 0;
    pub const CAN_GET_SOURCE_FILE_NAME: u32 = 1 << 11;
    pub const CAN_GET_LINE_NUMBERS: u32 = 1 << 12;
}

#[repr(C)]
#[derive(Clone, Copy)]
pub union jvalue {
    pub l: jobject,
    pub j: jlong,
}

/// Number of callback slots from `VMInit` (50) through `VMObjectAlloc` (84)
pub const CALLBACK_SLOTS: usize = 35;

/// `jvmtiEventCallbacks`, indexed by `event - 50`
#[repr(C)]
#[derive(Debug)]
pub struct jvmtiEventCallbacks {
    pub slots: [*const c_void; CALLBACK_SLOTS],
}

impl Default for jvmtiEventCallbacks {
    fn default() -> Self {
        Self { slots: [std::ptr::null(); CALLBACK_SLOTS] }
    }
}

impl jvmtiEventCallbacks {
    pub fn set(&mut self, event: i32, callback: *const c_void) {
        #[allow(clippy::cast_sign_loss)]
        let index = (event - event::VM_INIT) as usize;
        self.slots[index] = callback;
    }
}

pub type ThreadEventFn = unsafe extern "system" fn(jvmti: *mut jvmtiEnv, jni: *mut JNIEnv, thread: jthread);
pub type ClassEventFn =
    unsafe extern "system" fn(jvmti: *mut jvmtiEnv, jni: *mut JNIEnv, thread: jthread, class: jclass);
pub type AgentThreadFn = unsafe extern "system" fn(jvmti: *mut jvmtiEnv, jni: *mut JNIEnv, arg: *mut c_void);

// jvmtiInterface_1 entries
pub type SetEventNotificationModeFn =
    unsafe extern "C" fn(env: *mut jvmtiEnv, mode: c_int, event: c_int, thread: jthread, ...) -> jvmtiError;
pub type GetAllThreadsFn =
    unsafe extern "system" fn(env: *mut jvmtiEnv, count: *mut jint, threads: *mut *mut jthread) -> jvmtiError;
pub type GetThreadInfoFn =
    unsafe extern "system" fn(env: *mut jvmtiEnv, thread: jthread, info: *mut jvmtiThreadInfo) -> jvmtiError;
pub type RunAgentThreadFn = unsafe extern "system" fn(
    env: *mut jvmtiEnv,
    thread: jthread,
    proc_: AgentThreadFn,
    arg: *const c_void,
    priority: jint,
) -> jvmtiError;
pub type GetThreadStateFn =
    unsafe extern "system" fn(env: *mut jvmtiEnv, thread: jthread, state: *mut jint) -> jvmtiError;
pub type DeallocateFn = unsafe extern "system" fn(env: *mut jvmtiEnv, mem: *mut c_uchar) -> jvmtiError;
pub type GetClassSignatureFn = unsafe extern "system" fn(
    env: *mut jvmtiEnv,
    class: jclass,
    signature: *mut *mut c_char,
    generic: *mut *mut c_char,
) -> jvmtiError;
pub type GetSourceFileNameFn =
    unsafe extern "system" fn(env: *mut jvmtiEnv, class: jclass, name: *mut *mut c_char) -> jvmtiError;
pub type GetClassMethodsFn = unsafe extern "system" fn(
    env: *mut jvmtiEnv,
    class: jclass,
    count: *mut jint,
    methods: *mut *mut jmethodID,
) -> jvmtiError;
pub type GetMethodNameFn = unsafe extern "system" fn(
    env: *mut jvmtiEnv,
    method: jmethodID,
    name: *mut *mut c_char,
    signature: *mut *mut c_char,
    generic: *mut *mut c_char,
) -> jvmtiError;
pub type GetMethodDeclaringClassFn =
    unsafe extern "system" fn(env: *mut jvmtiEnv, method: jmethodID, class: *mut jclass) -> jvmtiError;
pub type GetLineNumberTableFn = unsafe extern "system" fn(
    env: *mut jvmtiEnv,
    method: jmethodID,
    count: *mut jint,
    table: *mut *mut jvmtiLineNumberEntry,
) -> jvmtiError;
pub type GetLoadedClassesFn =
    unsafe extern "system" fn(env: *mut jvmtiEnv, count: *mut jint, classes: *mut *mut jclass) -> jvmtiError;
pub type GetTagFn = unsafe extern "system" fn(env: *mut jvmtiEnv, object: jobject, tag: *mut jlong) -> jvmtiError;
pub type SetTagFn = unsafe extern "system" fn(env: *mut jvmtiEnv, object: jobject, tag: jlong) -> jvmtiError;
pub type SetEventCallbacksFn =
    unsafe extern "system" fn(env: *mut jvmtiEnv, callbacks: *const jvmtiEventCallbacks, size: jint) -> jvmtiError;
pub type AddCapabilitiesFn =
    unsafe extern "system" fn(env: *mut jvmtiEnv, capabilities: *const jvmtiCapabilities) -> jvmtiError;
pub type GetEnvironmentLocalStorageFn =
    unsafe extern "system" fn(env: *mut jvmtiEnv, data: *mut *mut c_void) -> jvmtiError;
pub type SetEnvironmentLocalStorageFn =
    unsafe extern "system" fn(env: *mut jvmtiEnv, data: *const c_void) -> jvmtiError;

// JNINativeInterface_ entries
pub type FindClassFn = unsafe extern "system" fn(env: *mut JNIEnv, name: *const c_char) -> jclass;
pub type ExceptionClearFn = unsafe extern "system" fn(env: *mut JNIEnv);
pub type DeleteLocalRefFn = unsafe extern "system" fn(env: *mut JNIEnv, object: jobject);
pub type NewObjectAFn =
    unsafe extern "system" fn(env: *mut JNIEnv, class: jclass, method: jmethodID, args: *const jvalue) -> jobject;
pub type GetMethodIdFn = unsafe extern "system" fn(
    env: *mut JNIEnv,
    class: jclass,
    name: *const c_char,
    signature: *const c_char,
) -> jmethodID;
pub type NewStringUtfFn = unsafe extern "system" fn(env: *mut JNIEnv, utf: *const c_char) -> jstring;

// JNIInvokeInterface_ entries
pub type GetEnvFn = unsafe extern "system" fn(vm: *mut JavaVM, env: *mut *mut c_void, version: jint) -> jint;

/// Entry `index` (0-based) of the table behind `env`
///
/// # Safety
/// `env` must be a live JNI/JVMTI/JavaVM pointer and `index` must be within
/// its table.
pub unsafe fn table_entry(env: *mut FunctionTable, index: usize) -> *const c_void {
    *(*env).add(index)
}

/// Function `slot` (1-based, as numbered in `jvmti.h`) of a JVMTI env
///
/// # Safety
/// Same as [`table_entry`]; `F` must be the function type of that slot.
pub unsafe fn jvmti_fn<F: Copy>(env: *mut jvmtiEnv, slot: usize) -> F {
    let entry = table_entry(env, slot - 1);
    std::mem::transmute_copy::<*const c_void, F>(&entry)
}

/// Function at 0-based `index` of a JNI or invocation table
///
/// # Safety
/// Same as [`table_entry`]; `F` must be the function type of that entry.
pub unsafe fn jni_fn<F: Copy>(env: *mut FunctionTable, index: usize) -> F {
    let entry = table_entry(env, index);
    std::mem::transmute_copy::<*const c_void, F>(&entry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_struct_layouts() {
        assert_eq!(std::mem::size_of::<jvmtiCapabilities>(), 16);
        assert_eq!(std::mem::size_of::<jvmtiLineNumberEntry>(), 16);
        assert_eq!(std::mem::size_of::<jvmtiThreadInfo>(), 32);
        assert_eq!(std::mem::size_of::<jvalue>(), 8);
        assert_eq!(std::mem::size_of::<jvmtiEventCallbacks>(), CALLBACK_SLOTS * 8);
    }

    #[test]
    fn test_callback_index() {
        let mut callbacks = jvmtiEventCallbacks::default();
        let marker = 0x10 as *const c_void;
        callbacks.set(event::VM_INIT, marker);
        callbacks.set(event::CLASS_PREPARE, marker);
        assert_eq!(callbacks.slots[0], marker);
        assert_eq!(callbacks.slots[6], marker);
        assert!(callbacks.slots[1].is_null());
    }

    #[test]
    fn test_table_slots() {
        // A fake table whose entries are their own 0-based positions
        let entries: Vec<*const c_void> = (0..200).map(|i| i as *const c_void).collect();
        let mut table: FunctionTable = entries.as_ptr();
        let env: *mut jvmtiEnv = &mut table;

        unsafe {
            assert_eq!(table_entry(env, jni_slot::DELETE_LOCAL_REF) as usize, 23);
            let get_tag: *const c_void = jvmti_fn(env, slot::GET_TAG);
            assert_eq!(get_tag as usize, 105);
        }
    }
}
