//! Coalescing of identical concurrent GET requests.
//!
//! When several callers issue the same GET before the first one settles, only
//! one network call happens: the first caller's execution is shared, and every
//! waiter receives a clone of the same settled result. Mutating methods never
//! coalesce.
//!
//! The shared execution runs on a detached task, so a waiter dropping its own
//! future does not cancel the call for the others. The in-flight entry is
//! removed before the result is published, success or failure, so the next
//! call with the same key always hits the network again.

use http::Method;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::watch;
use url::Url;

use crate::util::lock_unpoisoned;
use crate::{Error, HttpResponse, Result};

/// The settled outcome of a shared in-flight request. `None` until it
/// completes.
pub(crate) type Settled = Option<Result<HttpResponse>>;

/// Builds the canonical deduplication key for a request.
///
/// Two requests coalesce iff their keys are equal, so the key must not depend
/// on incidental ordering: query pairs are sorted (by key, then value) and
/// joined with fixed separators, and the fragment is ignored.
pub(crate) fn canonical_key(method: &Method, url: &Url) -> String {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    pairs.sort();

    let mut base = url.clone();
    base.set_query(None);
    base.set_fragment(None);

    let mut key = format!("{} {}", method, base);
    for (name, value) in &pairs {
        key.push('\n');
        key.push_str(name);
        key.push('=');
        key.push_str(value);
    }
    key
}

/// The caller's role in a coalesced request.
pub(crate) enum Flight {
    /// First caller for this key: executes the request and publishes the
    /// result through the sender. Holds its own receiver so it can wait on
    /// the detached execution like everyone else.
    Lead(watch::Sender<Settled>, watch::Receiver<Settled>),
    /// A matching request is already in flight; wait for its result.
    Follow(watch::Receiver<Settled>),
}

/// Pending results for requests currently on the wire, keyed canonically.
#[derive(Debug, Default)]
pub(crate) struct InflightMap {
    entries: Mutex<HashMap<String, watch::Receiver<Settled>>>,
}

impl InflightMap {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Joins an existing flight for `key`, or opens a new one.
    pub(crate) fn join_or_lead(&self, key: &str) -> Flight {
        let mut entries = lock_unpoisoned(&self.entries);
        if let Some(rx) = entries.get(key) {
            return Flight::Follow(rx.clone());
        }
        let (tx, rx) = watch::channel(None);
        entries.insert(key.to_string(), rx.clone());
        Flight::Lead(tx, rx)
    }

    /// Publishes the settled result for `key` and retires the entry.
    ///
    /// The entry is removed first: once a result exists, an equal request
    /// arriving later must start a fresh flight rather than observe this one.
    pub(crate) fn settle(&self, key: &str, tx: &watch::Sender<Settled>, result: Result<HttpResponse>) {
        lock_unpoisoned(&self.entries).remove(key);
        // No receivers left is fine; the flight may have been abandoned.
        let _ = tx.send(Some(result));
    }

    /// Waits for a flight to settle and clones out its result.
    ///
    /// If the executing side disappears without settling, the flight was
    /// aborted and every waiter sees [`Error::Aborted`].
    pub(crate) async fn wait(mut rx: watch::Receiver<Settled>) -> Result<HttpResponse> {
        let settled = rx
            .wait_for(|outcome| outcome.is_some())
            .await
            .map_err(|_| Error::Aborted)?;
        match (*settled).clone() {
            Some(result) => result,
            None => Err(Error::Aborted),
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        lock_unpoisoned(&self.entries).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;
    use std::time::Duration;

    #[test]
    fn key_is_insensitive_to_query_order() {
        let a = Url::parse("https://api.test/feed?page=1&limit=10").unwrap();
        let b = Url::parse("https://api.test/feed?limit=10&page=1").unwrap();
        assert_eq!(
            canonical_key(&Method::GET, &a),
            canonical_key(&Method::GET, &b)
        );
    }

    #[test]
    fn key_distinguishes_method_path_and_params() {
        let url = Url::parse("https://api.test/feed?page=1").unwrap();
        let other_page = Url::parse("https://api.test/feed?page=2").unwrap();
        let other_path = Url::parse("https://api.test/inbox?page=1").unwrap();

        let get = canonical_key(&Method::GET, &url);
        assert_ne!(get, canonical_key(&Method::POST, &url));
        assert_ne!(get, canonical_key(&Method::GET, &other_page));
        assert_ne!(get, canonical_key(&Method::GET, &other_path));
    }

    #[test]
    fn key_ignores_fragment() {
        let a = Url::parse("https://api.test/feed#top").unwrap();
        let b = Url::parse("https://api.test/feed").unwrap();
        assert_eq!(
            canonical_key(&Method::GET, &a),
            canonical_key(&Method::GET, &b)
        );
    }

    fn ok_response() -> HttpResponse {
        HttpResponse {
            status: StatusCode::OK,
            headers: http::HeaderMap::new(),
            body: "{}".to_string(),
            latency: Duration::from_millis(1),
            attempts: 1,
        }
    }

    #[tokio::test]
    async fn followers_receive_the_leaders_result() {
        let map = InflightMap::new();

        let Flight::Lead(tx, lead_rx) = map.join_or_lead("k") else {
            panic!("first caller must lead");
        };
        let Flight::Follow(follow_rx) = map.join_or_lead("k") else {
            panic!("second caller must follow");
        };

        map.settle("k", &tx, Ok(ok_response()));
        assert_eq!(map.len(), 0);

        let lead = InflightMap::wait(lead_rx).await.unwrap();
        let follow = InflightMap::wait(follow_rx).await.unwrap();
        assert_eq!(lead.status, follow.status);
        assert_eq!(lead.body, follow.body);
    }

    #[tokio::test]
    async fn settling_retires_the_key() {
        let map = InflightMap::new();
        let Flight::Lead(tx, rx) = map.join_or_lead("k") else {
            panic!("first caller must lead");
        };
        map.settle("k", &tx, Ok(ok_response()));
        let _ = InflightMap::wait(rx).await;

        // A later identical request starts a fresh flight.
        assert!(matches!(map.join_or_lead("k"), Flight::Lead(..)));
    }

    #[tokio::test]
    async fn abandoned_flights_surface_as_aborted() {
        let map = InflightMap::new();
        let Flight::Lead(tx, _lead_rx) = map.join_or_lead("k") else {
            panic!("first caller must lead");
        };
        let Flight::Follow(rx) = map.join_or_lead("k") else {
            panic!("second caller must follow");
        };

        drop(tx);
        drop(_lead_rx);
        let err = InflightMap::wait(rx).await.unwrap_err();
        assert!(matches!(err, Error::Aborted));
    }
}
