//! The HTTP seam between followers and the network.
//!
//! Everything that talks to the registry goes through [`Transport`], so the
//! polling logic never touches `reqwest` directly. The default
//! implementation is [`HttpTransport`]; tests plug in a scripted one.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::USER_AGENT;
use reqwest::StatusCode;
use url::Url;

use crate::error::BoxError;

/// User agent sent with every request unless the config overrides it.
pub const DEFAULT_USER_AGENT: &str = concat!("npm-follower/", env!("CARGO_PKG_VERSION"));

/// An outbound `GET`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub url: Url,
    pub user_agent: String,
}

/// A fully-read response.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    /// Final URL after redirects, used in error messages.
    pub url: Url,
    pub body: Vec<u8>,
}

/// Performs one HTTP round trip.
///
/// Implementations must be safe to share between every follower and the
/// registry client; the transport holds no per-request state.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, request: Request) -> Result<Response, BoxError>;
}

/// [`Transport`] backed by a shared [`reqwest::Client`].
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build a client whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, request: Request) -> Result<Response, BoxError> {
        let res = self
            .client
            .get(request.url)
            .header(USER_AGENT, request.user_agent)
            .send()
            .await?;
        let status = res.status();
        let url = res.url().clone();
        let body = res.bytes().await?.to_vec();
        Ok(Response { status, url, body })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! A transport that replays canned replies in order.

    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use reqwest::StatusCode;

    use super::{Request, Response, Transport};
    use crate::error::BoxError;

    pub(crate) enum Reply {
        Body(StatusCode, String),
        Fail(&'static str),
        /// Sleep before failing; used to trip the fetch timeout.
        Stall(Duration),
    }

    impl Reply {
        pub(crate) fn ok(body: impl Into<String>) -> Self {
            Reply::Body(StatusCode::OK, body.into())
        }

        pub(crate) fn json(value: serde_json::Value) -> Self {
            Reply::ok(value.to_string())
        }
    }

    pub(crate) struct ScriptedTransport {
        script: Mutex<VecDeque<Reply>>,
        seen: Mutex<Vec<Request>>,
    }

    impl ScriptedTransport {
        pub(crate) fn new(replies: impl IntoIterator<Item = Reply>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(replies.into_iter().collect()),
                seen: Mutex::new(Vec::new()),
            })
        }

        pub(crate) fn requests(&self) -> Vec<Request> {
            self.seen.lock().clone()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn get(&self, request: Request) -> Result<Response, BoxError> {
            self.seen.lock().push(request.clone());
            let reply = self.script.lock().pop_front();
            match reply {
                Some(Reply::Body(status, body)) => Ok(Response {
                    status,
                    url: request.url,
                    body: body.into_bytes(),
                }),
                Some(Reply::Fail(msg)) => Err(msg.into()),
                Some(Reply::Stall(delay)) => {
                    tokio::time::sleep(delay).await;
                    Err("stalled".into())
                }
                None => Err("script exhausted".into()),
            }
        }
    }
}
