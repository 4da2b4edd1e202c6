//! CouchDB `_changes` source.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use super::Source;
use crate::error::{FetchError, Phase};
use crate::registry::RegistryClient;

/// The npm replication endpoint.
pub const REPLICATE_ENDPOINT: &str = "https://replicate.npmjs.com/registry/";

/// One document revision marker.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Revision {
    pub rev: String,
}

/// A document mutation reported by `_changes`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChangeEvent {
    pub seq: u64,
    /// Document id, i.e. the package name.
    pub id: String,
    /// Leaf revisions; CouchDB may report several for one event.
    pub changes: Vec<Revision>,
    #[serde(default)]
    pub deleted: bool,
}

impl ChangeEvent {
    /// Whether `rev` is among the revisions this event reports.
    pub fn has_revision(&self, rev: &str) -> bool {
        self.changes.iter().any(|change| change.rev == rev)
    }
}

#[derive(Debug, Deserialize)]
struct ChangesBatch {
    results: Vec<ChangeEvent>,
    last_seq: u64,
}

#[derive(Debug, Deserialize)]
struct DatabaseInfo {
    update_seq: u64,
}

/// Follows `_changes` by sequence number.
///
/// A sequence of `0` means "not yet known"; [`prepare`](Source::prepare)
/// then asks the database for its current `update_seq`.
#[derive(Debug)]
pub struct ChangesSource {
    client: RegistryClient,
    endpoint: Url,
    sequence: AtomicU64,
}

impl ChangesSource {
    pub fn new(client: RegistryClient, endpoint: Url, since: u64) -> Self {
        Self {
            client,
            endpoint,
            sequence: AtomicU64::new(since),
        }
    }

    /// Last sequence fully consumed from the feed.
    pub fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::Acquire)
    }

    pub fn client(&self) -> &RegistryClient {
        &self.client
    }
}

#[async_trait]
impl Source for ChangesSource {
    type Item = ChangeEvent;
    const PHASE: Phase = Phase::Changes;
    const FEED: &'static str = "changes";

    fn position(&self) -> String {
        format!("sequence {}", self.sequence())
    }

    async fn prepare(&self) -> Result<(), FetchError> {
        if self.sequence() != 0 {
            return Ok(());
        }
        let body = self.client.get_ok(self.endpoint.clone()).await?;
        let info: DatabaseInfo = serde_json::from_slice(&body)?;
        if info.update_seq == 0 {
            return Err(FetchError::InvalidSequence);
        }
        self.sequence.store(info.update_seq, Ordering::Release);
        info!(sequence = info.update_seq, "cold start: set sequence");
        Ok(())
    }

    async fn fetch(&self) -> Result<Vec<ChangeEvent>, FetchError> {
        let since = self.sequence();
        let mut url = self.endpoint.join("_changes")?;
        url.query_pairs_mut().append_pair("since", &since.to_string());

        let body = self.client.get_ok(url).await?;
        let batch: ChangesBatch = serde_json::from_slice(&body)?;

        // housekeeping documents can move last_seq without any results
        self.sequence.store(batch.last_seq, Ordering::Release);
        debug!(
            since,
            last_seq = batch.last_seq,
            results = batch.results.len(),
            "fetched changes"
        );
        Ok(batch.results)
    }
}
