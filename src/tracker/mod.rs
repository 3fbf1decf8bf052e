/*!
 * Debug Tracker
 *
 * Process-lifetime registry of live allocations, debug builds only.
 * An intrusive doubly-linked list threaded through allocation headers,
 * guarded by the one lock in the layer. Entries are maintained purely by
 * explicit link/unlink/swap from the front end - never by scanning
 * allocator memory.
 */

use std::ptr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use log::warn;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::header::{check_header, AllocationHeader};

/// Tracker statistics snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerStats {
    pub live_allocations: usize,
    pub total_allocations: u64,
}

/// Registry of live allocation headers.
///
/// The global instance backs the front end; standalone instances can be
/// constructed for isolated tests of the list mechanics.
pub struct Tracker {
    /// Head of the intrusive list. Every access holds the mutex; each
    /// link/unlink/swap critical section is O(1).
    head: Mutex<*mut AllocationHeader>,
    live: AtomicUsize,
    next_id: AtomicU64,
    total: AtomicU64,
}

// SAFETY: the raw header pointers are only ever dereferenced while the
// mutex is held, and headers are unlinked before their memory is freed.
unsafe impl Send for Tracker {}
unsafe impl Sync for Tracker {}

static GLOBAL: Tracker = Tracker::new();

/// The process-wide tracker used by the front-end entry points.
pub fn global() -> &'static Tracker {
    &GLOBAL
}

impl Tracker {
    pub const fn new() -> Self {
        Self {
            head: Mutex::new(ptr::null_mut()),
            live: AtomicUsize::new(0),
            next_id: AtomicU64::new(0),
            total: AtomicU64::new(0),
        }
    }

    /// Number of currently linked (live) allocations.
    pub fn live_count(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> TrackerStats {
        TrackerStats {
            live_allocations: self.live.load(Ordering::SeqCst),
            total_allocations: self.total.load(Ordering::SeqCst),
        }
    }

    /// Links a freshly encoded header at the front of the list and stamps
    /// its allocation ID.
    ///
    /// # Safety
    ///
    /// `header` must point at a live, unlinked allocation header.
    pub(crate) unsafe fn link(&self, header: *mut AllocationHeader) {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.total.fetch_add(1, Ordering::SeqCst);

        let mut head = self.head.lock();
        (*header).id = id;
        (*header).next = *head;
        (*header).prev = ptr::null_mut();
        if !head.is_null() {
            (**head).prev = header;
        }
        *head = header;
        self.live.fetch_add(1, Ordering::SeqCst);
    }

    /// Removes a header from the list.
    ///
    /// # Safety
    ///
    /// `header` must point at a live header previously linked here.
    pub(crate) unsafe fn unlink(&self, header: *mut AllocationHeader) {
        let mut head = self.head.lock();
        assert!(!head.is_null(), "unlink from an empty tracker");

        if *head == header {
            *head = (*header).next;
        }
        if !(*header).next.is_null() {
            (*(*header).next).prev = (*header).prev;
        }
        if !(*header).prev.is_null() {
            (*(*header).prev).next = (*header).next;
        }
        self.live.fetch_sub(1, Ordering::SeqCst);
    }

    /// Replaces `old` with `new` in place, in one critical section, so a
    /// concurrent walk never observes a gap between unlink and link.
    ///
    /// # Safety
    ///
    /// `old` must be linked here; `new` must be live and unlinked.
    pub(crate) unsafe fn swap(&self, old: *mut AllocationHeader, new: *mut AllocationHeader) {
        let mut head = self.head.lock();
        assert!(!head.is_null(), "swap on an empty tracker");

        let prev = (*old).prev;
        let next = (*old).next;

        (*new).prev = prev;
        (*new).next = next;
        if !prev.is_null() {
            (*prev).next = new;
        } else {
            *head = new;
        }
        if !next.is_null() {
            (*next).prev = new;
        }
    }

    /// Detaches every header owned by the given allocator, identified by
    /// its data pointer. Called by the front end right before a bulk
    /// free, while the headers are still readable.
    pub(crate) fn unlink_all_for(&self, allocator_data: *const ()) -> usize {
        let mut head = self.head.lock();
        let mut removed = 0;
        let mut it = *head;
        // SAFETY: every node in the list is a live header; we hold the lock.
        unsafe {
            while !it.is_null() {
                let next = (*it).next;
                if (*it).allocator as *const () == allocator_data {
                    if *head == it {
                        *head = (*it).next;
                    }
                    if !(*it).next.is_null() {
                        (*(*it).next).prev = (*it).prev;
                    }
                    if !(*it).prev.is_null() {
                        (*(*it).prev).next = (*it).next;
                    }
                    removed += 1;
                }
                it = next;
            }
        }
        self.live.fetch_sub(removed, Ordering::SeqCst);
        removed
    }

    /// Verifies a single header under the lock (another thread could be
    /// freeing it concurrently).
    ///
    /// # Safety
    ///
    /// `header` must point at memory that held an allocation header.
    pub(crate) unsafe fn verify_one(&self, header: *const AllocationHeader) {
        let _guard = self.head.lock();
        check_header(header);
    }

    /// Walks the whole list verifying every header. A failed assertion
    /// here can also mean the list links themselves were overwritten.
    pub fn verify(&self) {
        let head = self.head.lock();
        let mut it: *const AllocationHeader = *head;
        // SAFETY: list nodes are live headers; we hold the lock.
        unsafe {
            while !it.is_null() {
                check_header(it);
                it = (*it).next;
            }
        }
    }

    /// Logs every still-live, non-exempt allocation. Advisory only: the
    /// report never aborts the process. Returns the number of leaks.
    pub fn report_leaks(&self) -> usize {
        self.verify();

        struct Leak {
            size: usize,
            id: u64,
            rid: u64,
            file: &'static str,
            line: u32,
        }

        let mut leaks = Vec::new();
        {
            let head = self.head.lock();
            let mut it: *const AllocationHeader = *head;
            // SAFETY: list nodes are live headers; we hold the lock.
            unsafe {
                while !it.is_null() {
                    if !(*it).leaked {
                        leaks.push(Leak {
                            size: (*it).size,
                            id: (*it).id,
                            rid: (*it).rid,
                            file: (*it).location.file(),
                            line: (*it).location.line(),
                        });
                    }
                    it = (*it).next;
                }
            }
        }

        if !leaks.is_empty() {
            warn!(
                "{} allocation(s) still live at shutdown:",
                leaks.len()
            );
            for leak in &leaks {
                warn!(
                    "  {}:{} requested {} bytes (id {}, rid {})",
                    leak.file, leak.line, leak.size, leak.id, leak.rid
                );
            }
        }
        leaks.len()
    }
}

impl Default for Tracker {
    fn default() -> Self {
        Self::new()
    }
}
