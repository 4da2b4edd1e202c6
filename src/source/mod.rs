//! Feed sources.
//!
//! A [`Source`] knows how to make one round trip to an upstream feed and
//! turn the response into a batch of new items, advancing its own cursor as
//! it goes. The poll loop in [`crate::poll`] drives any source the same way.
//!
//! Two sources ship with the crate:
//!
//! * [`ChangesSource`] follows CouchDB's `_changes` endpoint by sequence
//!   number.
//! * [`RssSource`] follows the registry's RSS window and works out which
//!   items it has not seen yet.

mod changes;
mod feed_item;
mod window;

pub use changes::{ChangeEvent, ChangesSource, Revision, REPLICATE_ENDPOINT};
pub use feed_item::FeedItem;
pub use window::{Overlap, RssSource, RSS_ENDPOINT};

use async_trait::async_trait;

use crate::error::{FetchError, Phase};

/// One upstream feed with a resumable cursor.
///
/// Implementations keep their cursor behind interior mutability so that a
/// follower can hand an `Arc` of the source to its poll task while callers
/// keep reading the cursor.
#[async_trait]
pub trait Source: Send + Sync + 'static {
    type Item: Send + 'static;

    /// Phase reported on errors from [`fetch`](Source::fetch).
    const PHASE: Phase;

    /// Short label used for metrics.
    const FEED: &'static str;

    /// Human-readable cursor, included in every error.
    fn position(&self) -> String;

    /// Resolve the starting cursor before polling begins. Errors here end
    /// the connection.
    async fn prepare(&self) -> Result<(), FetchError> {
        Ok(())
    }

    /// Fetch the next batch, oldest first. The cursor only moves when the
    /// batch decodes successfully.
    async fn fetch(&self) -> Result<Vec<Self::Item>, FetchError>;
}
