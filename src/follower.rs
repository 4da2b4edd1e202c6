//! The two public followers.
//!
//! A follower owns a source (and therefore the cursor) and a schedule.
//! Every call to `connect` spawns a poll task that shares the follower's
//! cursor, so reconnecting after a cancellation resumes where the previous
//! connection stopped instead of cold-starting again. Only one connection
//! runs at a time: connecting again before the previous receiver has closed
//! yields a single `AlreadyConnected` error.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::{ChangesConfig, RssConfig};
use crate::error::ConfigError;
use crate::poll::{Exclusive, FollowReceiver, Schedule};
use crate::registry::RegistryClient;
use crate::source::{ChangeEvent, ChangesSource, FeedItem, RssSource};
use crate::transport::{HttpTransport, Transport};

/// Follows the registry's CouchDB `_changes` feed.
#[derive(Debug)]
pub struct ChangesFollower {
    source: Arc<ChangesSource>,
    schedule: Schedule,
    connection: Exclusive,
}

impl ChangesFollower {
    /// Create a follower that talks to the network through `reqwest`.
    pub fn new(config: ChangesConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let transport = HttpTransport::new(config.poll.request_timeout)?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Create a follower on top of an existing transport.
    pub fn with_transport(config: ChangesConfig, transport: Arc<dyn Transport>) -> Result<Self, ConfigError> {
        config.validate()?;
        let client = RegistryClient::new(transport, config.poll.user_agent());
        let endpoint = config.endpoint_url()?;
        Ok(Self {
            source: Arc::new(ChangesSource::new(client, endpoint, config.since.unwrap_or(0))),
            schedule: config.poll.schedule(),
            connection: Exclusive::default(),
        })
    }

    /// Start polling. Returns at once; results arrive on the receiver until
    /// `cancel` fires or the receiver is dropped, after which the channel
    /// closes. While a connection is running, another `connect` gets one
    /// `AlreadyConnected` error instead of a second writer on the cursor.
    pub fn connect(&self, cancel: CancellationToken) -> FollowReceiver<ChangeEvent> {
        self.connection.follow(self.source.clone(), self.schedule, cancel)
    }

    /// Last sequence fully consumed; `0` until the cold start completes.
    pub fn sequence(&self) -> u64 {
        self.source.sequence()
    }

    /// The registry client this follower uses, for fetching the documents
    /// behind change events.
    pub fn client(&self) -> &RegistryClient {
        self.source.client()
    }
}

/// Follows the registry's RSS feed of recent releases.
#[derive(Debug)]
pub struct RssFollower {
    source: Arc<RssSource>,
    schedule: Schedule,
    connection: Exclusive,
}

impl RssFollower {
    pub fn new(config: RssConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let transport = HttpTransport::new(config.poll.request_timeout)?;
        Self::with_transport(config, Arc::new(transport))
    }

    pub fn with_transport(config: RssConfig, transport: Arc<dyn Transport>) -> Result<Self, ConfigError> {
        config.validate()?;
        let client = RegistryClient::new(transport, config.poll.user_agent());
        let endpoint = config.endpoint_url()?;
        Ok(Self {
            source: Arc::new(RssSource::new(client, endpoint, config.limit)),
            schedule: config.poll.schedule(),
            connection: Exclusive::default(),
        })
    }

    pub fn connect(&self, cancel: CancellationToken) -> FollowReceiver<FeedItem> {
        self.connection.follow(self.source.clone(), self.schedule, cancel)
    }

    /// The newest item emitted so far.
    pub fn latest(&self) -> Option<FeedItem> {
        self.source.latest().map(|item| (*item).clone())
    }

    /// Polls whose window no longer contained the newest emitted item, so
    /// releases may have been missed.
    pub fn overruns(&self) -> u64 {
        self.source.overruns()
    }
}
