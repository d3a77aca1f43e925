//! # AStack - Safepoint-Free Thread Dumps for the JVM
//!
//! AStack is a JVMTI agent that serves a full thread dump over TCP without
//! stopping the world. `jstack` and friends bring every thread to a global
//! safepoint first; on a large, busy VM that pause is itself the incident.
//! AStack instead asks each thread, one at a time, to walk its own stack
//! from inside a signal handler.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                      Client  (nc / astack CLI)                    │
//! └────────────────────────────────┬──────────────────────────────────┘
//!                                  │ connect, read to EOF
//!                                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  server            "AStack Listener" agent thread, one dump per   │
//! │                    connection                                     │
//! │     │                                                             │
//! │     ▼                                                             │
//! │  dump              for each thread: sample → resolve → format     │
//! │     │                                                             │
//! │     ├──▶ sampling  lock, arm buffer, pthread_kill, bounded spin   │
//! │     │       │                                                     │
//! │     │       ▼          (target thread, signal handler)            │
//! │     │    AsyncGetCallTrace ──▶ CaptureBuffer ──▶ completed flag   │
//! │     │                                                             │
//! │     └──▶ symbolization   method / class / source / line lookup    │
//! └───────────────────────────────────────────────────────────────────┘
//!                                  ▲
//!                                  │ ThreadStart / ThreadEnd
//! ┌────────────────────────────────┴──────────────────────────────────┐
//! │  registry          VM thread tag → (pthread_t, JNIEnv*)           │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - [`jvmti`]: `Agent_OnLoad`, event callbacks and the raw VM bindings
//! - [`runtime`]: the [`runtime::HostRuntime`] trait the core is written
//!   against, so everything below it runs in tests without a JVM
//! - [`registry`]: per-thread OS identity, keyed by the VM thread tag
//! - [`sampling`]: the signal-synchronous capture protocol
//! - [`symbolization`]: raw frames to `Class.method(File:Line)`
//! - [`dump`]: one full dump, thread by thread
//! - [`server`]: the TCP listener
//! - [`config`]: agent option parsing
//! - [`preflight`]: startup checks (walker present, signal free)
//! - [`domain`]: identities and errors
//!
//! ## Usage
//!
//! ```text
//! java -agentpath:/path/to/libastack_agent.so=port=7000 -jar app.jar
//! nc localhost 7000
//! ```

pub mod config;
pub mod domain;
pub mod dump;
pub mod jvmti;
pub mod preflight;
pub mod registry;
pub mod runtime;
pub mod sampling;
pub mod server;
pub mod symbolization;
