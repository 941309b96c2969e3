//! In-memory stores
//!
//! Each store guards its state with a `parking_lot::RwLock`; no lock is held
//! across an `.await`, so the async trait methods complete without yielding.
//! Compound operations (single-active insert, capacity claim, dedup append)
//! run under one write guard, which makes them atomic with respect to every
//! other caller of the same store.

mod access_log;
mod admin_audit;
mod credentials;
mod facilities;

pub use access_log::MemoryAccessLog;
pub use admin_audit::MemoryAdminAuditLog;
pub use credentials::MemoryCredentialStore;
pub use facilities::MemoryFacilityStore;

use gate_core::Page;

/// Slice `items` into a page, clamping the window to what exists
pub(crate) fn paginate<T: Clone>(items: &[T], offset: usize, limit: usize) -> Page<T> {
    let total = items.len();
    let start = offset.min(total);
    let end = start.saturating_add(limit).min(total);
    Page {
        items: items[start..end].to_vec(),
        total,
        offset,
        limit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paginate_clamps_past_the_end() {
        let items = vec![1, 2, 3];
        assert_eq!(paginate(&items, 1, 10).items, vec![2, 3]);
        assert!(paginate(&items, 5, 10).items.is_empty());
        assert_eq!(paginate(&items, 5, 10).total, 3);
    }
}
