//! Common type definitions and newtype wrappers.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

/// Handle identifying a change listener registered on a variable.
///
/// Ids come from a single process-wide counter, so they are unique across
/// every variable and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(pub u64);

impl ListenerId {
    /// Allocates the next unused listener id.
    pub fn next() -> Self {
        Self(NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listener_ids_are_monotonic() {
        let first = ListenerId::next();
        let second = ListenerId::next();
        assert!(second > first);
        assert_ne!(first, second);
    }

    #[test]
    fn test_listener_id_display() {
        assert_eq!(ListenerId(42).to_string(), "42");
        assert_eq!(format!("{:?}", ListenerId(7)), "ListenerId(7)");
    }
}
