//! # Symbol Resolution for Java Frames
//!
//! The stack walker records each frame as a raw pair: an opaque method
//! identifier and a bytecode index. This module turns that pair into what a
//! thread dump shows:
//!
//! ```text
//! (0x7f3a2c01b2a8, 14)  →  at java.lang.Thread.sleep(Thread.java:340)
//! ```
//!
//! ## Lookup Flow
//!
//! ```text
//! 1. method name          GetMethodName            → "sleep"
//! 2. declaring class      GetMethodDeclaringClass
//!    class signature      GetClassSignature        → "Ljava/lang/Thread;"
//!    normalised                                    → "java.lang.Thread"
//! 3. source file          GetSourceFileName        → "Thread.java"
//! 4. line number table    GetLineNumberTable       → [(0, 338), (9, 339), (14, 340)]
//!    greatest start ≤ 14                           → 340
//! ```
//!
//! ## Gaps
//!
//! Every step may fail (no debug info, native method, class being
//! unloaded). Failures never stop a dump; they degrade the frame:
//!
//! | missing         | rendered as        |
//! |-----------------|--------------------|
//! | method / class  | `Unknown`          |
//! | source file     | `(Unknown Source)` |
//! | line            | `(File.java)`      |
//! | negative index  | `(Native Method)`  |
//!
//! ## Caching
//!
//! A resolver lives for one dump. Method metadata is cached per method so
//! deep, repetitive stacks (thread pools) cost one lookup per distinct
//! method rather than one per frame.

pub mod resolver;

pub use resolver::{line_for_location, normalize_class_signature, SymbolResolver};
