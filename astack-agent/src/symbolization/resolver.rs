use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use astack_common::{FrameLine, ResolvedFrame};
use log::debug;

use crate::domain::{MethodId, RawFrame};
use crate::runtime::{HostRuntime, LineNumberEntry};

const UNKNOWN: &str = "Unknown";

/// Per-method metadata, looked up once per dump
#[derive(Debug)]
struct MethodSymbols {
    method_name: String,
    class_name: String,
    source_file: Option<String>,
    line_table: Vec<LineNumberEntry>,
}

/// Resolves raw frames against the VM's metadata
///
/// Includes a cache so each distinct method is looked up only once.
pub struct SymbolResolver<'a, R> {
    vm: &'a R,
    cache: RefCell<HashMap<MethodId, Rc<MethodSymbols>>>,
}

impl<'a, R: HostRuntime> SymbolResolver<'a, R> {
    pub fn new(vm: &'a R) -> Self {
        Self { vm, cache: RefCell::new(HashMap::new()) }
    }

    /// Resolve one frame; never fails, gaps become sentinels
    pub fn resolve(&self, frame: RawFrame) -> ResolvedFrame {
        let symbols = self.symbols(frame.method);

        ResolvedFrame {
            class_name: symbols.class_name.clone(),
            method_name: symbols.method_name.clone(),
            source_file: symbols.source_file.clone(),
            line: line_for_location(&symbols.line_table, i64::from(frame.location)),
        }
    }

    fn symbols(&self, method: MethodId) -> Rc<MethodSymbols> {
        if let Some(cached) = self.cache.borrow().get(&method) {
            return Rc::clone(cached);
        }

        let symbols = Rc::new(self.lookup(method));
        self.cache.borrow_mut().insert(method, Rc::clone(&symbols));
        symbols
    }

    fn lookup(&self, method: MethodId) -> MethodSymbols {
        let method_name = self.vm.method_name(method).unwrap_or_else(|e| {
            debug!("{e}");
            UNKNOWN.to_string()
        });

        let class = self.vm.declaring_class(method).unwrap_or_else(|e| {
            debug!("{e}");
            crate::runtime::ClassDescriptor::default()
        });
        let class_name = class
            .signature
            .as_deref()
            .map_or_else(|| UNKNOWN.to_string(), normalize_class_signature);

        let line_table = self.vm.line_number_table(method).unwrap_or_else(|e| {
            debug!("{e}");
            Vec::new()
        });

        MethodSymbols { method_name, class_name, source_file: class.source_file, line_table }
    }
}

/// `Ljava/lang/Thread;` → `java.lang.Thread`
///
/// Anything not in the wrapped `L...;` form (primitives, arrays) is
/// returned unchanged.
#[must_use]
pub fn normalize_class_signature(signature: &str) -> String {
    match signature.strip_prefix('L').and_then(|s| s.strip_suffix(';')) {
        Some(inner) if !inner.is_empty() => inner.replace('/', "."),
        _ => signature.to_string(),
    }
}

/// Source line for a bytecode location
///
/// Picks the entry with the greatest start not past `location`; a location
/// beyond the last entry therefore maps to the last line. Negative
/// locations are walker sentinels for frames without bytecode.
///
/// Deliberately strict: a location before the first entry is `Unknown`,
/// even when the table has a single entry, rather than borrowing that line.
#[must_use]
pub fn line_for_location(table: &[LineNumberEntry], location: i64) -> FrameLine {
    if location < 0 {
        return FrameLine::Native;
    }

    table
        .iter()
        .filter(|entry| entry.start_location <= location)
        .max_by_key(|entry| entry.start_location)
        .and_then(|entry| u32::try_from(entry.line_number).ok())
        .filter(|line| *line > 0)
        .map_or(FrameLine::Unknown, FrameLine::Line)
}
