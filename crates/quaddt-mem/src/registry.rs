//! Address-ordered registry of live buffers.
//!
//! Every buffer the allocator hooks hand out is recorded here by start
//! address. The first in-place construction into a buffer installs
//! per-slot construction flags; freeing the buffer destroys every slot
//! still flagged, in ascending order, before the memory is released.
//!
//! A single mutex guards the map. Every critical section is a bounded
//! map operation; destructors run after the record is unlinked and the
//! lock dropped.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::element::ElementVTable;

struct Tracking {
    elem: ElementVTable,
    constructed: Box<[bool]>,
}

struct BufferRecord {
    size: usize,
    tracking: Option<Tracking>,
}

impl BufferRecord {
    fn install(&mut self, elem: ElementVTable) -> &mut Tracking {
        let size = self.size;
        let tracking = self.tracking.get_or_insert_with(|| {
            debug_assert!(elem.size() > 0, "zero-sized element type {}", elem.type_name());
            debug_assert!(
                size % elem.size() == 0,
                "buffer of {size} bytes cannot hold whole {} elements",
                elem.type_name()
            );
            Tracking {
                elem,
                constructed: vec![false; size / elem.size().max(1)].into_boxed_slice(),
            }
        });
        debug_assert!(
            tracking.elem == elem,
            "buffer holds {} elements, not {}",
            tracking.elem.type_name(),
            elem.type_name()
        );
        tracking
    }
}

/// Index of the element starting `offset` bytes into a buffer, if
/// `offset` lies on an element boundary.
fn slot_index(offset: usize, elem_size: usize) -> Option<usize> {
    (offset.checked_rem(elem_size)? == 0).then(|| offset / elem_size)
}

/// Snapshot of one live buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BufferInfo {
    /// Start address.
    pub start: usize,
    /// Size in bytes.
    pub size: usize,
    /// Element size; zero while the buffer is untracked.
    pub elem_size: usize,
    /// Number of construction flags; zero while untracked.
    pub slots: usize,
    /// Number of slots currently flagged constructed.
    pub constructed: usize,
}

impl BufferInfo {
    fn of(start: usize, rec: &BufferRecord) -> Self {
        let (elem_size, slots, constructed) = match &rec.tracking {
            Some(t) => (
                t.elem.size(),
                t.constructed.len(),
                t.constructed.iter().filter(|&&c| c).count(),
            ),
            None => (0, 0, 0),
        };
        Self { start, size: rec.size, elem_size, slots, constructed }
    }

    /// Whether construction tracking is installed.
    pub fn is_tracked(&self) -> bool {
        self.elem_size != 0
    }
}

/// Registry-wide counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Live buffers.
    pub buffers: usize,
    /// Live buffers with tracking installed.
    pub tracked: usize,
    /// Bytes in live buffers.
    pub bytes: usize,
}

/// The buffer registry.
///
/// The process-wide instance, [`MemoryRegistry::global`], backs the
/// installed allocator hooks and outlives every buffer they allocate.
/// Private instances serve tests and custom adapters.
pub struct MemoryRegistry {
    buffers: Mutex<BTreeMap<usize, BufferRecord>>,
}

pub(crate) static GLOBAL_REGISTRY: MemoryRegistry = MemoryRegistry::new();

impl Default for MemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRegistry {
    /// An empty registry.
    pub const fn new() -> Self {
        Self {
            buffers: Mutex::new(BTreeMap::new()),
        }
    }

    /// The process-wide registry.
    pub fn global() -> &'static MemoryRegistry {
        &GLOBAL_REGISTRY
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<usize, BufferRecord>> {
        // Critical sections never leave the map half-updated, so a
        // poisoned lock still guards a consistent map.
        self.buffers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a new, untracked buffer of `size` bytes at `addr`.
    pub fn register(&self, addr: *const u8, size: usize) {
        debug_assert!(size > 0, "registering an empty buffer");
        let start = addr as usize;
        let mut map = self.lock();
        debug_assert!(
            map.range(..start)
                .next_back()
                .is_none_or(|(s, r)| s + r.size <= start),
            "buffer at {start:#x} overlaps its predecessor"
        );
        let prev = map.insert(start, BufferRecord { size, tracking: None });
        debug_assert!(prev.is_none(), "buffer at {start:#x} registered twice");
        log::trace!("registered buffer {start:#x} ({size} bytes)");
    }

    fn owner_key(map: &BTreeMap<usize, BufferRecord>, p: usize) -> Option<usize> {
        let (&start, rec) = map.range(..=p).next_back()?;
        (p < start + rec.size).then_some(start)
    }

    /// The live buffer containing `ptr`.
    pub fn find_owner(&self, ptr: *const u8) -> Option<BufferInfo> {
        let map = self.lock();
        let start = Self::owner_key(&map, ptr as usize)?;
        map.get(&start).map(|rec| BufferInfo::of(start, rec))
    }

    /// Install construction tracking on the buffer starting at `start`.
    ///
    /// Idempotent: later calls must name the same element type. Returns
    /// `false` if no buffer starts at `start`.
    pub fn ensure_tracking(&self, start: *const u8, elem: ElementVTable) -> bool {
        let mut map = self.lock();
        match map.get_mut(&(start as usize)) {
            Some(rec) => {
                rec.install(elem);
                true
            }
            None => false,
        }
    }

    /// Flag the slot starting at `ptr` as constructed, installing tracking
    /// first if needed.
    ///
    /// Returns whether the slot was already constructed, or `None` if
    /// `ptr` lies in no live buffer, is not on an element boundary, or
    /// `elem` is zero-sized.
    pub fn mark_constructed(&self, ptr: *const u8, elem: ElementVTable) -> Option<bool> {
        let p = ptr as usize;
        let mut map = self.lock();
        let start = Self::owner_key(&map, p)?;
        let index = slot_index(p - start, elem.size())?;
        let tracking = map.get_mut(&start)?.install(elem);
        let slot = tracking.constructed.get_mut(index)?;
        Some(std::mem::replace(slot, true))
    }

    /// Flag `count` slots, `stride` bytes apart from `first`, as
    /// constructed under a single lock. Slots outside every live buffer
    /// are skipped.
    ///
    /// Plain stores never drop what they overwrite, so only element types
    /// without drop glue may be marked this way. Returns the number of
    /// slots newly flagged.
    pub fn mark_run_constructed(
        &self,
        first: *const u8,
        stride: isize,
        count: usize,
        elem: ElementVTable,
    ) -> usize {
        let mut map = self.lock();
        let mut newly = 0;
        let mut p = first;
        for _ in 0..count {
            let addr = p as usize;
            let hit = Self::owner_key(&map, addr).and_then(|start| {
                let index = slot_index(addr - start, elem.size())?;
                let tracking = map.get_mut(&start)?.install(elem);
                tracking.constructed.get_mut(index).map(|slot| !std::mem::replace(slot, true))
            });
            if hit == Some(true) {
                newly += 1;
            }
            p = p.wrapping_offset(stride);
        }
        newly
    }

    /// Whether the slot containing `ptr` is flagged constructed.
    pub fn is_constructed(&self, ptr: *const u8) -> Option<bool> {
        let p = ptr as usize;
        let map = self.lock();
        let start = Self::owner_key(&map, p)?;
        let rec = map.get(&start)?;
        Some(rec.tracking.as_ref().is_some_and(|t| {
            (p - start)
                .checked_div(t.elem.size())
                .and_then(|i| t.constructed.get(i).copied())
                .unwrap_or(false)
        }))
    }

    /// Unlink the buffer starting at `addr` and destroy every slot still
    /// flagged constructed, in ascending order.
    ///
    /// Returns the number of destructors run.
    pub fn release(&self, addr: *mut u8) -> usize {
        let start = addr as usize;
        let removed = self.lock().remove(&start);
        debug_assert!(removed.is_some(), "releasing unknown buffer {start:#x}");
        let Some(tracking) = removed.and_then(|rec| rec.tracking) else {
            return 0;
        };
        let size = tracking.elem.size();
        let mut ran = 0;
        for (i, _) in tracking.constructed.iter().enumerate().filter(|&(_, &c)| c) {
            // SAFETY: a flagged slot holds a live element of the recorded
            // type, and the buffer is no longer reachable through the
            // registry.
            #[allow(unsafe_code)]
            unsafe {
                tracking.elem.drop_slot(addr.add(i * size));
            }
            ran += 1;
        }
        log::trace!("released buffer {start:#x}, {ran} destructors run");
        ran
    }

    /// Registry-wide counters.
    pub fn stats(&self) -> RegistryStats {
        let map = self.lock();
        RegistryStats {
            buffers: map.len(),
            tracked: map.values().filter(|r| r.tracking.is_some()).count(),
            bytes: map.values().map(|r| r.size).sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake(addr: usize) -> *mut u8 {
        addr as *mut u8
    }

    #[test]
    fn owner_lookup_respects_bounds() {
        let reg = MemoryRegistry::new();
        reg.register(fake(0x1000), 64);
        reg.register(fake(0x2000), 16);
        assert_eq!(reg.find_owner(fake(0x1000)).map(|b| b.start), Some(0x1000));
        assert_eq!(reg.find_owner(fake(0x103f)).map(|b| b.start), Some(0x1000));
        assert_eq!(reg.find_owner(fake(0x1040)), None);
        assert_eq!(reg.find_owner(fake(0x0fff)), None);
        assert_eq!(reg.find_owner(fake(0x200f)).map(|b| b.size), Some(16));
        assert_eq!(reg.stats(), RegistryStats { buffers: 2, tracked: 0, bytes: 80 });
    }

    #[test]
    fn tracking_is_installed_once() {
        let reg = MemoryRegistry::new();
        reg.register(fake(0x4000), 160);
        assert!(reg.ensure_tracking(fake(0x4000), ElementVTable::of::<u128>()));
        assert!(reg.ensure_tracking(fake(0x4000), ElementVTable::of::<u128>()));
        let info = reg.find_owner(fake(0x4000)).unwrap();
        assert_eq!((info.elem_size, info.slots, info.constructed), (16, 10, 0));
        assert!(!reg.ensure_tracking(fake(0x4010), ElementVTable::of::<u128>()));
    }

    #[test]
    fn marking_reports_previous_state() {
        let reg = MemoryRegistry::new();
        reg.register(fake(0x8000), 64);
        let vt = ElementVTable::of::<u64>();
        assert_eq!(reg.mark_constructed(fake(0x8010), vt), Some(false));
        assert_eq!(reg.mark_constructed(fake(0x8010), vt), Some(true));
        assert_eq!(reg.is_constructed(fake(0x8010)), Some(true));
        assert_eq!(reg.is_constructed(fake(0x8008)), Some(false));
        assert_eq!(reg.mark_constructed(fake(0x9000), vt), None);
        assert_eq!(reg.find_owner(fake(0x8000)).unwrap().constructed, 1);
    }

    #[test]
    fn off_boundary_and_zero_sized_marks_are_refused() {
        let reg = MemoryRegistry::new();
        reg.register(fake(0x8000), 64);
        let vt = ElementVTable::of::<u64>();
        assert_eq!(reg.mark_constructed(fake(0x8003), vt), None);
        assert_eq!(reg.mark_constructed(fake(0x8000), ElementVTable::of::<()>()), None);
        assert_eq!(reg.is_constructed(fake(0x8003)), Some(false));
        assert_eq!(reg.find_owner(fake(0x8000)).unwrap().constructed, 0);
        assert_eq!(reg.mark_constructed(fake(0x8008), vt), Some(false));
        // An interior pointer reads the slot that contains it.
        assert_eq!(reg.is_constructed(fake(0x800b)), Some(true));
    }

    #[test]
    fn runs_are_marked_under_one_lock() {
        let reg = MemoryRegistry::new();
        reg.register(fake(0x8000), 64);
        let vt = ElementVTable::of::<u64>();
        assert_eq!(reg.mark_constructed(fake(0x8010), vt), Some(false));
        // Every other slot, running past the end of the buffer.
        assert_eq!(reg.mark_run_constructed(fake(0x8000), 16, 6, vt), 3);
        let info = reg.find_owner(fake(0x8000)).unwrap();
        assert_eq!((info.slots, info.constructed), (8, 4));
        assert_eq!(reg.is_constructed(fake(0x8030)), Some(true));
        assert_eq!(reg.is_constructed(fake(0x8038)), Some(false));
        assert_eq!(reg.mark_run_constructed(fake(0x9000), 8, 4, vt), 0);
        assert_eq!(reg.mark_run_constructed(fake(0x8004), 8, 2, vt), 0);
    }

    #[test]
    fn releasing_untracked_buffers_runs_nothing() {
        let reg = MemoryRegistry::new();
        reg.register(fake(0x1000), 8);
        assert_eq!(reg.release(fake(0x1000)), 0);
        assert_eq!(reg.find_owner(fake(0x1000)), None);
        assert_eq!(reg.stats(), RegistryStats::default());
    }
}
