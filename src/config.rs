//! Follower configuration.
//!
//! Configs are plain structs with sensible [`Default`]s; override the fields
//! you care about with struct update syntax and hand the result to a
//! follower constructor, which validates it.
//!
//! ```
//! use std::time::Duration;
//! use npm_follower::ChangesConfig;
//!
//! let config = ChangesConfig {
//!     since: Some(1_000),
//!     ..Default::default()
//! };
//! assert_eq!(config.poll.polling_interval, Duration::from_secs(2));
//! ```

use std::time::Duration;

use url::Url;

use crate::error::ConfigError;
use crate::poll::Schedule;
use crate::source::{REPLICATE_ENDPOINT, RSS_ENDPOINT};
use crate::transport::DEFAULT_USER_AGENT;

/// Settings shared by both followers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollConfig {
    /// Time between fetches. Two seconds is frequent enough to see every
    /// change on `_changes`.
    pub polling_interval: Duration,
    /// HTTP client timeout for a single request.
    pub request_timeout: Duration,
    /// Hard upper bound on one fetch attempt, enforced by the poll loop.
    pub fetch_timeout: Duration,
    /// Capacity of the result channel.
    pub channel_size: usize,
    /// `user-agent` header; `None` sends [`DEFAULT_USER_AGENT`].
    pub user_agent: Option<String>,
}

impl Default for PollConfig {
    fn default() -> Self {
        PollConfig {
            polling_interval: Duration::from_secs(2),
            request_timeout: Duration::from_secs(5),
            fetch_timeout: Duration::from_secs(10),
            channel_size: 10,
            user_agent: None,
        }
    }
}

impl PollConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.polling_interval.is_zero() {
            return Err(ConfigError::Zero("polling_interval"));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::Zero("request_timeout"));
        }
        if self.fetch_timeout.is_zero() {
            return Err(ConfigError::Zero("fetch_timeout"));
        }
        if self.channel_size == 0 {
            return Err(ConfigError::Zero("channel_size"));
        }
        Ok(())
    }

    pub fn user_agent(&self) -> &str {
        self.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT)
    }

    pub(crate) fn schedule(&self) -> Schedule {
        Schedule {
            polling_interval: self.polling_interval,
            fetch_timeout: self.fetch_timeout,
            channel_size: self.channel_size,
        }
    }
}

/// Configuration for [`ChangesFollower`](crate::ChangesFollower).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangesConfig {
    /// CouchDB database URL; `_changes` is resolved relative to it.
    pub endpoint: String,
    /// Sequence to start after. `None` (or `Some(0)`) starts from the
    /// database's current `update_seq`.
    pub since: Option<u64>,
    pub poll: PollConfig,
}

impl Default for ChangesConfig {
    fn default() -> Self {
        ChangesConfig {
            endpoint: REPLICATE_ENDPOINT.to_string(),
            since: None,
            poll: PollConfig::default(),
        }
    }
}

impl ChangesConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.poll.validate()?;
        self.endpoint_url()?;
        Ok(())
    }

    /// The database URL with a trailing slash, so that `_changes` joins
    /// underneath it.
    pub(crate) fn endpoint_url(&self) -> Result<Url, ConfigError> {
        let mut url = parse_endpoint(&self.endpoint)?;
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(url)
    }
}

/// Configuration for [`RssFollower`](crate::RssFollower).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RssConfig {
    /// RSS feed URL.
    pub endpoint: String,
    /// Number of items requested per poll. Larger windows survive longer
    /// gaps between polls at the cost of slower responses.
    pub limit: usize,
    pub poll: PollConfig,
}

impl Default for RssConfig {
    fn default() -> Self {
        RssConfig {
            endpoint: RSS_ENDPOINT.to_string(),
            limit: 50,
            poll: PollConfig::default(),
        }
    }
}

impl RssConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.poll.validate()?;
        if self.limit == 0 {
            return Err(ConfigError::Zero("limit"));
        }
        self.endpoint_url()?;
        Ok(())
    }

    pub(crate) fn endpoint_url(&self) -> Result<Url, ConfigError> {
        parse_endpoint(&self.endpoint)
    }
}

fn parse_endpoint(endpoint: &str) -> Result<Url, ConfigError> {
    Url::parse(endpoint).map_err(|source| ConfigError::Endpoint {
        endpoint: endpoint.to_string(),
        source,
    })
}
