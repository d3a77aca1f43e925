//! Agent entry point and event callbacks
//!
//! ```text
//! Agent_OnLoad  options, capabilities, walker lookup, context, callbacks
//! VMInit        method IDs for loaded classes, signal handler, listener
//! ClassLoad     nothing (the walker only needs the event to be enabled)
//! ClassPrepare  method IDs for the new class
//! ThreadStart   register the thread (runs on the thread itself)
//! ThreadEnd     unregister the thread
//! ```
//!
//! The agent context is leaked once and reached through JVMTI
//! environment-local storage; the signal handler is the only code that uses
//! a process global.

#![allow(unsafe_code)] // C entry points called by the VM

use std::ffi::{c_char, c_void, CStr};
use std::sync::OnceLock;

use log::{error, info, warn};

use crate::config::AgentOptions;
use crate::domain::{AgentError, EnvHandle};
use crate::dump::write_dump;
use crate::preflight::run_preflight_checks;
use crate::sampling::{install_handler, CaptureBuffer, PthreadKill, Sampler};
use crate::server::DumpServer;

use super::env::{jvmti_from_vm, Jni, Jvmti, LocalRef};
use super::runtime::JvmRuntime;
use super::sys::{self, event, jclass, jint, jthread, JNIEnv, JavaVM};

const LISTENER_THREAD_NAME: &CStr = c"AStack Listener";

/// Everything the callbacks share, alive for the rest of the process
struct AgentContext {
    options: AgentOptions,
    buffer: &'static CaptureBuffer,
    sampler: Sampler<PthreadKill>,
    server: OnceLock<DumpServer>,
}

/// # Safety
/// Called by the VM with a valid `JavaVM*` and an optional option string.
#[no_mangle]
pub unsafe extern "system" fn Agent_OnLoad(vm: *mut JavaVM, options: *mut c_char, _reserved: *mut c_void) -> jint {
    init_logging();

    match load(vm, options) {
        Ok(()) => sys::JNI_OK,
        Err(e) => {
            error!("AStack failed to load: {e}");
            sys::JNI_ERR
        }
    }
}

fn init_logging() {
    // The host may have loaded another agent that already set a logger
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).try_init();
}

unsafe fn load(vm: *mut JavaVM, options: *mut c_char) -> Result<(), AgentError> {
    let options: AgentOptions = if options.is_null() {
        "".parse()?
    } else {
        CStr::from_ptr(options).to_string_lossy().parse()?
    };

    let jvmti = jvmti_from_vm(vm).map_err(AgentError::EnvUnavailable)?;

    let mut capabilities = sys::jvmtiCapabilities::default();
    capabilities.words[0] = sys::jvmtiCapabilities::CAN_TAG_OBJECTS
        | sys::jvmtiCapabilities::CAN_GET_SOURCE_FILE_NAME
        | sys::jvmtiCapabilities::CAN_GET_LINE_NUMBERS;
    jvmti.add_capabilities(&capabilities)?;

    let walker = run_preflight_checks(options.signal)?;
    let buffer = CaptureBuffer::new(walker).leak();
    let sampler = Sampler::new(buffer, PthreadKill::new(options.signal), options.capture_timeout);

    let context = Box::leak(Box::new(AgentContext { options, buffer, sampler, server: OnceLock::new() }));
    jvmti.set_local_storage(std::ptr::from_ref(context).cast())?;

    let mut callbacks = sys::jvmtiEventCallbacks::default();
    callbacks.set(event::VM_INIT, on_vm_init as sys::ThreadEventFn as *const c_void);
    callbacks.set(event::THREAD_START, on_thread_start as sys::ThreadEventFn as *const c_void);
    callbacks.set(event::THREAD_END, on_thread_end as sys::ThreadEventFn as *const c_void);
    callbacks.set(event::CLASS_LOAD, on_class_load as sys::ClassEventFn as *const c_void);
    callbacks.set(event::CLASS_PREPARE, on_class_prepare as sys::ClassEventFn as *const c_void);
    jvmti.set_event_callbacks(&callbacks)?;

    for event in [event::VM_INIT, event::CLASS_LOAD, event::CLASS_PREPARE, event::THREAD_START, event::THREAD_END] {
        jvmti.enable_event(event)?;
    }

    info!("AStack loaded (port {}, timeout {:?})", context.options.port, context.options.capture_timeout);
    Ok(())
}

fn agent_context(jvmti: Jvmti) -> Option<&'static AgentContext> {
    match jvmti.local_storage() {
        // SAFETY: the only value ever stored is the leaked context
        Ok(ptr) => unsafe { ptr.cast::<AgentContext>().as_ref() },
        Err(e) => {
            warn!("{e}");
            None
        }
    }
}

unsafe extern "system" fn on_vm_init(jvmti: *mut sys::jvmtiEnv, jni: *mut JNIEnv, _thread: jthread) {
    let jvmti = Jvmti::from_raw(jvmti);
    let jni = Jni::from_raw(jni);

    if let Err(e) = start(jvmti, jni) {
        error!("AStack failed to start: {e}");
        std::process::exit(1);
    }
}

fn start(jvmti: Jvmti, jni: Jni) -> Result<(), AgentError> {
    let context = agent_context(jvmti).ok_or_else(|| AgentError::ListenerThread("agent context missing".to_string()))?;

    // The walker can only name methods whose IDs already exist
    for &class in jvmti.loaded_classes()?.iter() {
        let class = jni.local(class);
        create_method_ids(jvmti, class.raw());
    }

    install_handler(context.options.signal, context.buffer)?;

    let server = DumpServer::bind(context.options.port)?.with_write_timeout(context.options.write_timeout);
    if context.server.set(server).is_err() {
        return Err(AgentError::ListenerThread("listener already started".to_string()));
    }

    let thread = jni
        .new_thread(LISTENER_THREAD_NAME)
        .ok_or_else(|| AgentError::ListenerThread("cannot construct java.lang.Thread".to_string()))?;
    jvmti.run_agent_thread(thread.raw(), run_listener, sys::JVMTI_THREAD_MAX_PRIORITY)?;
    Ok(())
}

unsafe extern "system" fn run_listener(jvmti: *mut sys::jvmtiEnv, jni: *mut JNIEnv, _arg: *mut c_void) {
    let jvmti = Jvmti::from_raw(jvmti);
    let Some(context) = agent_context(jvmti) else {
        return;
    };
    let Some(server) = context.server.get() else {
        return;
    };

    let vm = JvmRuntime::new(jvmti, Jni::from_raw(jni));
    server.serve(|out| write_dump(&vm, &context.sampler, out).map(drop));
}

unsafe extern "system" fn on_class_load(_jvmti: *mut sys::jvmtiEnv, _jni: *mut JNIEnv, _thread: jthread, _class: jclass) {}

unsafe extern "system" fn on_class_prepare(jvmti: *mut sys::jvmtiEnv, _jni: *mut JNIEnv, _thread: jthread, class: jclass) {
    create_method_ids(Jvmti::from_raw(jvmti), class);
}

/// Asking for a class's methods makes the VM allocate their IDs
fn create_method_ids(jvmti: Jvmti, class: jclass) {
    match jvmti.class_methods(class) {
        Ok(_methods) => {}
        Err(e) if e.code == sys::JVMTI_ERROR_CLASS_NOT_PREPARED => {}
        Err(e) => warn!("{e}"),
    }
}

unsafe extern "system" fn on_thread_start(jvmti: *mut sys::jvmtiEnv, jni: *mut JNIEnv, thread: jthread) {
    let jvmti = Jvmti::from_raw(jvmti);
    let Some(context) = agent_context(jvmti) else {
        return;
    };

    let vm = JvmRuntime::new(jvmti, Jni::from_raw(jni));
    context.sampler.on_thread_start(&vm, &LocalRef::borrowed(thread), EnvHandle(jni as usize));
}

unsafe extern "system" fn on_thread_end(jvmti: *mut sys::jvmtiEnv, jni: *mut JNIEnv, thread: jthread) {
    let jvmti = Jvmti::from_raw(jvmti);
    let Some(context) = agent_context(jvmti) else {
        return;
    };

    let vm = JvmRuntime::new(jvmti, Jni::from_raw(jni));
    context.sampler.on_thread_end(&vm, &LocalRef::borrowed(thread));
}
