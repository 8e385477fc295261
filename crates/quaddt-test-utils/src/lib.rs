//! Test utilities for quaddt development.
//!
//! Provides raw allocators that make buffer lifetimes observable
//! ([`QuarantineAllocator`], [`LoggingAllocator`]), a [`DropProbe`]
//! element that records its destruction, and runtime fixtures in
//! [`fixtures`].

#![deny(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

use std::sync::{Arc, Mutex, PoisonError};

use quaddt_mem::{LibcAllocator, RawAllocator};

/// Route `log` output through the test harness. Safe to call from
/// every test.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ── Allocators ─────────────────────────────────────────────────────

/// Defers every release until the allocator itself is dropped.
///
/// Addresses are never reused while it lives, so a registry lookup that
/// finds a stale record cannot be confused with a fresh allocation.
#[derive(Default)]
pub struct QuarantineAllocator {
    held: Mutex<Vec<(usize, usize)>>,
}

impl QuarantineAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of buffers released so far.
    pub fn quarantined(&self) -> usize {
        self.held.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl RawAllocator for QuarantineAllocator {
    fn alloc(&self, size: usize) -> *mut u8 {
        LibcAllocator.alloc(size)
    }

    #[allow(unsafe_code)]
    unsafe fn dealloc(&self, ptr: *mut u8, size: usize) {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((ptr as usize, size));
    }
}

impl Drop for QuarantineAllocator {
    #[allow(unsafe_code)]
    fn drop(&mut self) {
        let held = std::mem::take(self.held.get_mut().unwrap_or_else(PoisonError::into_inner));
        for (addr, size) in held {
            // SAFETY: every held block came from `LibcAllocator::alloc`
            // and was handed back exactly once.
            unsafe { LibcAllocator.dealloc(addr as *mut u8, size) };
        }
    }
}

/// Something observable that happened to a buffer or element.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Event {
    Alloc { addr: usize, size: usize },
    Drop { id: u32 },
    Release { addr: usize },
}

/// Shared, ordered event record.
#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<Event>>>);

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, e: Event) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).push(e);
    }

    /// Snapshot of every event so far.
    pub fn events(&self) -> Vec<Event> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

/// Records raw allocations and releases into an [`EventLog`].
pub struct LoggingAllocator {
    log: EventLog,
}

impl LoggingAllocator {
    pub fn new(log: EventLog) -> Self {
        Self { log }
    }
}

impl RawAllocator for LoggingAllocator {
    fn alloc(&self, size: usize) -> *mut u8 {
        let p = LibcAllocator.alloc(size);
        if !p.is_null() {
            self.log.push(Event::Alloc { addr: p as usize, size });
        }
        p
    }

    #[allow(unsafe_code)]
    unsafe fn dealloc(&self, ptr: *mut u8, size: usize) {
        self.log.push(Event::Release { addr: ptr as usize });
        LibcAllocator.dealloc(ptr, size)
    }
}

// ── Elements ───────────────────────────────────────────────────────

/// An element that logs [`Event::Drop`] with its id when destroyed.
pub struct DropProbe {
    pub id: u32,
    log: EventLog,
}

impl DropProbe {
    pub fn new(id: u32, log: &EventLog) -> Self {
        Self { id, log: log.clone() }
    }
}

impl Drop for DropProbe {
    fn drop(&mut self) {
        self.log.push(Event::Drop { id: self.id });
    }
}
