//! Process-level memory accounting.
//!
//! A counting allocator wraps the system allocator and tracks call and byte
//! totals; residency comes from `/proc/self/status` and fault counts from
//! `getrusage(2)`. The probe only requests and reports these numbers, it
//! never interprets them.

use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicU64, Ordering};

use once_cell::sync::OnceCell;
use serde::Serialize;

static ALLOC_CALLS: AtomicU64 = AtomicU64::new(0);
static DEALLOC_CALLS: AtomicU64 = AtomicU64::new(0);
static ALLOC_BYTES: AtomicU64 = AtomicU64::new(0);
static DEALLOC_BYTES: AtomicU64 = AtomicU64::new(0);

static BASELINE: OnceCell<Snapshot> = OnceCell::new();

/// System allocator wrapper counting every call that crosses it.
pub struct CountingAllocator;

unsafe impl GlobalAlloc for CountingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        ALLOC_CALLS.fetch_add(1, Ordering::Relaxed);
        ALLOC_BYTES.fetch_add(layout.size() as u64, Ordering::Relaxed);
        unsafe { System.alloc(layout) }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        DEALLOC_CALLS.fetch_add(1, Ordering::Relaxed);
        DEALLOC_BYTES.fetch_add(layout.size() as u64, Ordering::Relaxed);
        unsafe { System.dealloc(ptr, layout) }
    }
}

#[global_allocator]
static GLOBAL: CountingAllocator = CountingAllocator;

/// Point-in-time view of the allocator counters.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Snapshot {
    pub alloc_calls: u64,
    pub dealloc_calls: u64,
    pub alloc_bytes: u64,
    pub dealloc_bytes: u64,
}

pub fn snapshot() -> Snapshot {
    Snapshot {
        alloc_calls: ALLOC_CALLS.load(Ordering::Relaxed),
        dealloc_calls: DEALLOC_CALLS.load(Ordering::Relaxed),
        alloc_bytes: ALLOC_BYTES.load(Ordering::Relaxed),
        dealloc_bytes: DEALLOC_BYTES.load(Ordering::Relaxed),
    }
}

/// Remembers the counter values at run start; `stats` reports deltas against
/// this. Only the first call takes effect.
pub fn mark_baseline() {
    let _ = BASELINE.set(snapshot());
}

/// Allocator activity since the baseline plus kernel-side memory numbers.
///
/// Residency and fault counts degrade to `None` when the kernel interfaces
/// are unavailable; they never abort the run.
#[derive(Debug, Clone, Serialize)]
pub struct HeapStats {
    pub alloc_calls: u64,
    pub dealloc_calls: u64,
    pub alloc_bytes: u64,
    pub dealloc_bytes: u64,
    pub resident_bytes: Option<u64>,
    pub minor_faults: Option<u64>,
    pub major_faults: Option<u64>,
}

pub fn stats() -> HeapStats {
    let now = snapshot();
    let base = BASELINE.get().copied().unwrap_or_default();
    let faults = fault_counts();

    HeapStats {
        alloc_calls: now.alloc_calls.saturating_sub(base.alloc_calls),
        dealloc_calls: now.dealloc_calls.saturating_sub(base.dealloc_calls),
        alloc_bytes: now.alloc_bytes.saturating_sub(base.alloc_bytes),
        dealloc_bytes: now.dealloc_bytes.saturating_sub(base.dealloc_bytes),
        resident_bytes: resident_bytes(),
        minor_faults: faults.map(|(minor, _)| minor),
        major_faults: faults.map(|(_, major)| major),
    }
}

fn resident_bytes() -> Option<u64> {
    let me = procfs::process::Process::myself().ok()?;
    let status = me.status().ok()?;
    // VmRSS is reported in kibibytes.
    status.vmrss.map(|kib| kib * 1024)
}

fn fault_counts() -> Option<(u64, u64)> {
    let mut usage = std::mem::MaybeUninit::<libc::rusage>::uninit();
    let ret = unsafe { libc::getrusage(libc::RUSAGE_SELF, usage.as_mut_ptr()) };
    if ret != 0 {
        return None;
    }

    let usage = unsafe { usage.assume_init() };
    Some((usage.ru_minflt as u64, usage.ru_majflt as u64))
}
