//! JVMTI / JNI binding
//!
//! - `sys`: hand-written table layouts and constants
//! - `env`: `Result`-returning wrappers with RAII for VM memory and local refs
//! - `runtime`: [`JvmRuntime`], the production [`crate::runtime::HostRuntime`]
//! - `agent`: `Agent_OnLoad` and the event callbacks

pub mod agent;
pub mod env;
pub mod runtime;
pub mod sys;

pub use agent::Agent_OnLoad;
pub use runtime::JvmRuntime;
