//! Guards against applying stale load results
//!
//! A [`Mount`] is shared between a view and whoever drives its lifecycle.
//! Each load takes a [`Ticket`]; its result may only be applied while the
//! view is still mounted and no newer load has started.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

#[derive(Debug)]
struct MountState {
    mounted: AtomicBool,
    generation: AtomicU64,
}

#[derive(Debug, Clone)]
pub struct Mount {
    state: Arc<MountState>,
}

/// Identifies one load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

impl Mount {
    pub fn new() -> Self {
        Self {
            state: Arc::new(MountState {
                mounted: AtomicBool::new(true),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Start a load, superseding every earlier ticket
    pub fn begin(&self) -> Ticket {
        Ticket(self.state.generation.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.is_mounted() && self.state.generation.load(Ordering::SeqCst) == ticket.0
    }

    pub fn is_mounted(&self) -> bool {
        self.state.mounted.load(Ordering::SeqCst)
    }

    pub fn unmount(&self) {
        self.state.mounted.store(false, Ordering::SeqCst);
    }
}

impl Default for Mount {
    fn default() -> Self {
        Self::new()
    }
}
