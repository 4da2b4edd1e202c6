//! Error types for followers and the registry client.
//!
//! A [`FetchError`] describes one failed round trip to the registry. The
//! poller wraps it in a [`FollowError`] that records which phase failed and
//! where the cursor stood, which is what consumers see on the channel.

use std::fmt;
use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;
use url::Url;

/// Boxed error used for transport failures so that any HTTP stack can
/// report through the same variant.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Why a single request/decode round trip failed.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("creating request: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("doing request: {0}")]
    Transport(#[source] BoxError),

    #[error("no response within {0:?}")]
    TimedOut(Duration),

    #[error("unexpected status {status} from {url}")]
    Status { status: StatusCode, url: Url },

    #[error("decoding body: {0}")]
    Json(#[from] serde_json::Error),

    #[error("decoding body: {0}")]
    Rss(#[from] rss::Error),

    /// The registry reported `update_seq == 0`, which is the unset sentinel.
    #[error("invalid update sequence")]
    InvalidSequence,

    /// The RSS feed answered with zero items, which looks the same as an
    /// outage.
    #[error("feed responded with 0 items")]
    EmptyFeed,

    /// Another connection on the same follower is still running.
    #[error("follower already has a running connection")]
    AlreadyConnected,
}

/// The stage of a follower's life in which an error happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Starting a connection.
    Connect,
    /// Resolving the starting sequence before the poll loop begins.
    ColdStart,
    /// Polling `_changes`.
    Changes,
    /// Polling the RSS window.
    Window,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Connect => f.write_str("connect"),
            Phase::ColdStart => f.write_str("cold start failed"),
            Phase::Changes => f.write_str("changes"),
            Phase::Window => f.write_str("rss"),
        }
    }
}

/// An error delivered to the consumer in place of an item.
#[derive(Debug, Error)]
#[error("{phase}: {position}: {source}")]
pub struct FollowError {
    phase: Phase,
    position: String,
    #[source]
    source: FetchError,
}

impl FollowError {
    pub(crate) fn new(phase: Phase, position: String, source: FetchError) -> Self {
        Self {
            phase,
            position,
            source,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The cursor as it stood when the attempt failed, e.g. `sequence 1000`.
    pub fn position(&self) -> &str {
        &self.position
    }

    pub fn kind(&self) -> &FetchError {
        &self.source
    }

    pub fn is_invalid_sequence(&self) -> bool {
        matches!(self.source, FetchError::InvalidSequence)
    }

    pub fn is_empty_feed(&self) -> bool {
        matches!(self.source, FetchError::EmptyFeed)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.source, FetchError::TimedOut(_))
    }

    pub fn is_already_connected(&self) -> bool {
        matches!(self.source, FetchError::AlreadyConnected)
    }
}

/// Rejected follower configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid endpoint {endpoint:?}: {source}")]
    Endpoint {
        endpoint: String,
        #[source]
        source: url::ParseError,
    },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("building http client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Failure of a registry document request.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("{0}: not found")]
    NotFound(String),

    #[error("{0:?}: invalid package or user name")]
    InvalidName(String),

    #[error("{id}: {source}")]
    Fetch {
        id: String,
        #[source]
        source: FetchError,
    },
}
