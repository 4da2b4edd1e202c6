//! RSS window source.
//!
//! The registry's RSS feed has no resumable position: every request returns
//! the most recent `limit` items, newest first. To emit each item once the
//! source remembers the newest item it has seen and, on the next poll, keeps
//! only what sits above it in the new window.
//!
//! If the remembered item has scrolled out of the window (more than `limit`
//! releases between polls), there is no way to know how much was missed, so
//! the whole window is treated as new. That case is logged and counted as a
//! window overrun rather than guessed at.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use metrics::counter;
use parking_lot::Mutex;
use tracing::{debug, warn};
use url::Url;

use super::{FeedItem, Source};
use crate::error::{FetchError, Phase};
use crate::registry::RegistryClient;

/// The npm registry RSS feed.
pub const RSS_ENDPOINT: &str = "https://registry.npmjs.org/-/rss";

/// Where the previously seen newest item sits in a fresh window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overlap {
    /// Nothing seen yet; the whole window is new.
    Fresh,
    /// The remembered item is at this index; everything before it is new.
    At(usize),
    /// The remembered item is not in the window; the whole window is
    /// treated as new.
    Overrun,
}

impl Overlap {
    /// Locate `latest` in a newest-first `window`.
    pub fn find(window: &[FeedItem], latest: Option<&FeedItem>) -> Self {
        let Some(latest) = latest else {
            return Overlap::Fresh;
        };
        match window.iter().position(|item| item.is(latest)) {
            Some(idx) => Overlap::At(idx),
            None => Overlap::Overrun,
        }
    }

    /// How many items at the head of the window are new.
    pub fn new_items(self, window_len: usize) -> usize {
        match self {
            Overlap::At(idx) => idx,
            Overlap::Fresh | Overlap::Overrun => window_len,
        }
    }
}

/// Reduce a newest-first window to the unseen items, oldest first.
///
/// Returns the new items together with the window head, which becomes the
/// next cursor when anything is new.
fn reconcile(mut window: Vec<FeedItem>, overlap: Overlap) -> Option<(FeedItem, Vec<FeedItem>)> {
    let keep = overlap.new_items(window.len());
    if keep == 0 {
        return None;
    }
    let head = window.first()?.clone();
    window.truncate(keep);
    window.reverse();
    Some((head, window))
}

/// Follows the RSS window, emitting each release once.
#[derive(Debug)]
pub struct RssSource {
    client: RegistryClient,
    endpoint: Url,
    limit: usize,
    latest: Mutex<Option<Arc<FeedItem>>>,
    overruns: AtomicU64,
}

impl RssSource {
    pub fn new(client: RegistryClient, endpoint: Url, limit: usize) -> Self {
        Self {
            client,
            endpoint,
            limit,
            latest: Mutex::new(None),
            overruns: AtomicU64::new(0),
        }
    }

    /// The newest item seen so far, if any.
    pub fn latest(&self) -> Option<Arc<FeedItem>> {
        self.latest.lock().clone()
    }

    /// How many polls found the remembered item gone from the window.
    pub fn overruns(&self) -> u64 {
        self.overruns.load(Ordering::Relaxed)
    }

    fn window_url(&self) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("descending", "true")
            .append_pair("limit", &self.limit.to_string());
        url
    }
}

#[async_trait]
impl Source for RssSource {
    type Item = FeedItem;
    const PHASE: Phase = Phase::Window;
    const FEED: &'static str = "rss";

    fn position(&self) -> String {
        match self.latest() {
            Some(item) => format!("latest {:?} by {:?} at {:?}", item.title, item.creator, item.pub_date),
            None => "no latest item".to_string(),
        }
    }

    async fn fetch(&self) -> Result<Vec<FeedItem>, FetchError> {
        let body = self.client.get_ok(self.window_url()).await?;
        let channel = rss::Channel::read_from(body.as_slice())?;
        let window: Vec<FeedItem> = channel.items().iter().map(FeedItem::from_rss).collect();
        if window.is_empty() {
            return Err(FetchError::EmptyFeed);
        }

        let latest = self.latest();
        let overlap = Overlap::find(&window, latest.as_deref());
        if overlap == Overlap::Overrun {
            warn!(
                window = window.len(),
                "latest item not found in rss window, treating whole window as new"
            );
            self.overruns.fetch_add(1, Ordering::Relaxed);
            counter!("npm_follower_rss_window_overruns_total").increment(1);
        }

        let received = window.len();
        let Some((head, fresh)) = reconcile(window, overlap) else {
            debug!(received, "no new rss items");
            return Ok(Vec::new());
        };
        *self.latest.lock() = Some(Arc::new(head));
        debug!(received, new = fresh.len(), "fetched rss window");
        Ok(fresh)
    }
}
