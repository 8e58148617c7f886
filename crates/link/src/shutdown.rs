//! Cooperative shutdown flags
//!
//! Two layers: the global flag set by `Link::stop`, and a per-attachment
//! flag either sibling task trips on a fatal transfer error so the other
//! one winds down at its next poll point.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct Shutdown {
    global: Arc<AtomicBool>,
    local: Arc<AtomicBool>,
}

impl Shutdown {
    /// New per-attachment shutdown bound to the link-wide exit flag
    pub fn new(global: Arc<AtomicBool>) -> Self {
        Self {
            global,
            local: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether this task should wind down, for any reason
    pub fn is_set(&self) -> bool {
        self.global.load(Ordering::Relaxed) || self.local.load(Ordering::Relaxed)
    }

    /// End the current attachment without stopping the link
    pub fn trip(&self) {
        self.local.store(true, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trip_is_local() {
        let global = Arc::new(AtomicBool::new(false));
        let first = Shutdown::new(Arc::clone(&global));
        let second = Shutdown::new(Arc::clone(&global));

        first.trip();
        assert!(first.is_set());
        assert!(!second.is_set());

        global.store(true, Ordering::Relaxed);
        assert!(second.is_set());
    }

    #[test]
    fn test_clones_share_local_flag() {
        let shutdown = Shutdown::new(Arc::new(AtomicBool::new(false)));
        let sibling = shutdown.clone();
        sibling.trip();
        assert!(shutdown.is_set());
    }
}
