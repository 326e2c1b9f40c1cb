//! In-flight request deduplication
//!
//! Tracks requests currently executing, keyed by cache key. A caller whose
//! key already has a live flight joins it and observes the same settled
//! result instead of issuing a duplicate network call, guaranteeing at most
//! one concurrent call per key. Entries are removed unconditionally when the
//! flight settles, on both the success and failure paths.

use std::future::Future;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use serde_json::Value;

use crate::Result;

/// The shared handle every coalesced caller awaits
pub(crate) type FlightHandle = Shared<BoxFuture<'static, Result<Value>>>;

/// Outcome of registering interest in a key
pub(crate) enum Flight {
    /// This caller started the flight and must remove it after settlement
    Owner(FlightHandle),
    /// An identical request was already in flight; await its result
    Joined(FlightHandle),
}

/// Table of in-flight requests keyed by cache key
#[derive(Default)]
pub(crate) struct InflightTable {
    pending: DashMap<String, FlightHandle>,
}

impl InflightTable {
    pub(crate) fn new() -> Self {
        Self {
            pending: DashMap::new(),
        }
    }

    /// Join the existing flight for `key`, or register the future produced
    /// by `make` as the new one.
    ///
    /// `make` is only invoked when no flight exists; it must not await
    /// (the future it returns does the work once polled).
    pub(crate) fn join_or_register<F, Fut>(&self, key: &str, make: F) -> Flight
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        match self.pending.entry(key.to_string()) {
            Entry::Occupied(existing) => Flight::Joined(existing.get().clone()),
            Entry::Vacant(slot) => {
                let handle = make().boxed().shared();
                slot.insert(handle.clone());
                Flight::Owner(handle)
            }
        }
    }

    /// Remove the entry for `key` once its flight has settled.
    ///
    /// Guarded by pointer identity so a newer flight that reused the key
    /// after this one settled is never evicted by a stale owner.
    pub(crate) fn complete(&self, key: &str, handle: &FlightHandle) {
        self.pending.remove_if(key, |_, current| current.ptr_eq(handle));
    }

    /// Number of requests currently in flight
    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }
}
