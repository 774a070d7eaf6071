//! Bounded reentrancy counters.
//!
//! Every delivery path (message router, trace router, log sink, trace sink,
//! trace writer) has its own counter. A call that would push the counter past
//! the path's threshold is dropped. Depth is tracked per thread: only a
//! thread re-entering a path it is already inside is bounded, and concurrent
//! callers on other threads are never turned away.

use ahash::AHashMap;
use std::cell::RefCell;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_GUARD_ID: AtomicU64 = AtomicU64::new(0);

thread_local! {
    // Depth of the current thread inside each guard, keyed by guard id.
    static DEPTHS: RefCell<AHashMap<u64, usize>> = RefCell::new(AHashMap::new());
}

/// Per-thread depth counter for one delivery path.
#[derive(Debug)]
pub struct ReentrancyGuard {
    id: u64,
    threshold: usize,
}

impl ReentrancyGuard {
    /// Create a guard admitting at most `threshold` nested entries per thread.
    pub fn new(threshold: usize) -> Self {
        Self {
            id: NEXT_GUARD_ID.fetch_add(1, Ordering::Relaxed),
            threshold,
        }
    }

    /// Enter the path. Returns `None` when this thread already reached the threshold.
    ///
    /// The returned token decrements the counter when dropped, including
    /// during unwinding.
    pub fn enter(&self) -> Option<Entered<'_>> {
        let admitted = DEPTHS
            .try_with(|depths| {
                let mut depths = depths.borrow_mut();
                let depth = depths.entry(self.id).or_insert(0);
                if *depth >= self.threshold {
                    false
                } else {
                    *depth += 1;
                    true
                }
            })
            .unwrap_or(false);
        admitted.then(|| Entered {
            guard: self,
            _not_send: PhantomData,
        })
    }

    /// Depth of the calling thread inside this path.
    pub fn depth(&self) -> usize {
        DEPTHS
            .try_with(|depths| depths.borrow().get(&self.id).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    fn leave(&self) {
        let _ = DEPTHS.try_with(|depths| {
            let mut depths = depths.borrow_mut();
            if let Some(depth) = depths.get_mut(&self.id) {
                *depth = depth.saturating_sub(1);
                if *depth == 0 {
                    depths.remove(&self.id);
                }
            }
        });
    }
}

/// Token held while inside a guarded path. Bound to the thread that entered.
#[derive(Debug)]
pub struct Entered<'a> {
    guard: &'a ReentrancyGuard,
    _not_send: PhantomData<*const ()>,
}

impl Drop for Entered<'_> {
    fn drop(&mut self) {
        self.guard.leave();
    }
}

/// The set of guards used by the routing core.
#[derive(Debug)]
pub struct PathGuards {
    pub message_router: ReentrancyGuard,
    pub trace_router: ReentrancyGuard,
    pub log_sink: ReentrancyGuard,
    pub trace_sink: ReentrancyGuard,
    pub trace_writer: ReentrancyGuard,
}

impl Default for PathGuards {
    fn default() -> Self {
        Self {
            message_router: ReentrancyGuard::new(2),
            trace_router: ReentrancyGuard::new(2),
            log_sink: ReentrancyGuard::new(1),
            trace_sink: ReentrancyGuard::new(1),
            trace_writer: ReentrancyGuard::new(2),
        }
    }
}
