//! Pending request correlation.
//!
//! Every outgoing `AuthnRequest` leaves one entry keyed by its ID. The
//! response validator consumes the entry with [`PendingRequestStore::try_remove`];
//! that single atomic removal both proves the request was issued here and
//! stops the same response from being accepted twice.

use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::debug;
use url::Url;

use crate::error::{SamlError, SamlResult};

/// What the service provider remembers about an outgoing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCorrelation {
    /// Where to send the browser after sign-in.
    pub return_url: Url,
    /// Identity provider the request was sent to.
    pub issuer: String,
    /// When the request was created.
    pub created_at: DateTime<Utc>,
}

impl PendingCorrelation {
    /// Creates a correlation record.
    #[must_use]
    pub fn new(return_url: Url, issuer: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            return_url,
            issuer: issuer.into(),
            created_at,
        }
    }
}

/// Storage for pending requests.
///
/// Implementations must make `try_remove` atomic: of any number of concurrent
/// calls for one ID, at most one returns the entry.
pub trait PendingRequestStore: Send + Sync {
    /// Records a pending request.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::DuplicateRequestId`] if the ID is already present.
    fn insert(&self, id: &str, correlation: PendingCorrelation) -> SamlResult<()>;

    /// Removes and returns the entry for `id` unless it is absent, already
    /// consumed, or expired at `now`.
    fn try_remove(&self, id: &str, now: DateTime<Utc>) -> Option<PendingCorrelation>;

    /// Drops every entry expired at `now` and returns how many were dropped.
    fn evict_expired(&self, now: DateTime<Utc>) -> usize;

    /// Returns the number of stored entries, expired or not.
    fn len(&self) -> usize;

    /// Returns true if nothing is stored.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-process store on a concurrent hash map.
///
/// Expired entries are swept on insert, at most once per quarter TTL.
#[derive(Debug)]
pub struct InMemoryPendingRequestStore {
    entries: DashMap<String, PendingCorrelation>,
    ttl: Duration,
    last_sweep: Mutex<Option<DateTime<Utc>>>,
}

impl InMemoryPendingRequestStore {
    /// Creates a store whose entries live for `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            last_sweep: Mutex::new(None),
        }
    }

    /// Returns the entry lifetime.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    fn is_expired(&self, correlation: &PendingCorrelation, now: DateTime<Utc>) -> bool {
        correlation
            .created_at
            .checked_add_signed(self.ttl)
            .is_some_and(|expiry| now >= expiry)
    }

    fn maybe_sweep(&self, now: DateTime<Utc>) {
        {
            let mut last = self.last_sweep.lock();
            match *last {
                Some(at) if at.checked_add_signed(self.ttl / 4).map_or(true, |due| now < due) => {
                    return
                }
                _ => *last = Some(now),
            }
        }
        let evicted = self.evict_expired(now);
        if evicted > 0 {
            debug!(evicted, "evicted expired pending requests");
        }
    }
}

impl PendingRequestStore for InMemoryPendingRequestStore {
    fn insert(&self, id: &str, correlation: PendingCorrelation) -> SamlResult<()> {
        self.maybe_sweep(correlation.created_at);
        match self.entries.entry(id.to_string()) {
            Entry::Occupied(_) => Err(SamlError::DuplicateRequestId(id.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(correlation);
                Ok(())
            }
        }
    }

    fn try_remove(&self, id: &str, now: DateTime<Utc>) -> Option<PendingCorrelation> {
        let (_, correlation) = self.entries.remove(id)?;
        if self.is_expired(&correlation, now) {
            debug!(request_id = %id, "pending request expired");
            return None;
        }
        Some(correlation)
    }

    fn evict_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, c| !self.is_expired(c, now));
        before.saturating_sub(self.entries.len())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn correlation(now: DateTime<Utc>) -> PendingCorrelation {
        PendingCorrelation::new(
            Url::parse("https://app.example.com/after").unwrap(),
            "https://idp.example.com",
            now,
        )
    }

    #[test]
    fn remove_is_single_use() {
        let now = Utc::now();
        let store = InMemoryPendingRequestStore::new(Duration::minutes(10));
        store.insert("_a", correlation(now)).unwrap();

        assert_eq!(store.try_remove("_a", now), Some(correlation(now)));
        assert_eq!(store.try_remove("_a", now), None);
        assert!(store.is_empty());
    }

    #[test]
    fn duplicate_insert_fails() {
        let now = Utc::now();
        let store = InMemoryPendingRequestStore::new(Duration::minutes(10));
        store.insert("_a", correlation(now)).unwrap();
        assert_eq!(
            store.insert("_a", correlation(now)),
            Err(SamlError::DuplicateRequestId("_a".to_string()))
        );
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn expired_entries_are_never_returned() {
        let now = Utc::now();
        let store = InMemoryPendingRequestStore::new(Duration::minutes(10));
        store.insert("_a", correlation(now)).unwrap();

        assert_eq!(store.try_remove("_a", now + Duration::minutes(10)), None);
        assert!(store.is_empty());
    }

    #[test]
    fn insert_sweeps_expired_entries() {
        let start = Utc::now();
        let store = InMemoryPendingRequestStore::new(Duration::minutes(10));
        store.insert("_old", correlation(start)).unwrap();

        // Within a quarter TTL of the last sweep: nothing is swept yet.
        store
            .insert("_b", correlation(start + Duration::minutes(1)))
            .unwrap();
        assert_eq!(store.len(), 2);

        store
            .insert("_c", correlation(start + Duration::minutes(11)))
            .unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.try_remove("_c", start + Duration::minutes(11)).is_some());
    }

    #[test]
    fn evict_expired_counts_dropped_entries() {
        let now = Utc::now();
        let store = InMemoryPendingRequestStore::new(Duration::minutes(10));
        store.insert("_b", correlation(now)).unwrap();
        store.insert("_a", correlation(now - Duration::minutes(20))).unwrap();
        assert_eq!(store.evict_expired(now), 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn concurrent_removal_succeeds_once() {
        let now = Utc::now();
        let store = Arc::new(InMemoryPendingRequestStore::new(Duration::minutes(10)));
        store.insert("_a", correlation(now)).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || store.try_remove("_a", now).is_some())
            })
            .collect();
        let successes = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(successes, 1);
    }

    #[test]
    fn lifetime_past_the_calendar_never_expires() {
        let store = InMemoryPendingRequestStore::new(Duration::days(1_000_000_000));
        assert_eq!(store.ttl(), Duration::days(1_000_000_000));
        let now = Utc::now();

        store.insert("_a", correlation(now)).unwrap();
        store.insert("_b", correlation(now + Duration::hours(1))).unwrap();
        assert_eq!(store.evict_expired(now + Duration::days(365)), 0);
        assert!(store.try_remove("_a", now + Duration::days(365)).is_some());
    }
}
