//! Registry client shared by the followers.
//!
//! [`RegistryClient`] owns the transport and the user agent. The followers
//! use it for their feed requests, and callers can use the same client to
//! look up full package documents for the changes they receive.
//!
//! Each lookup comes in two flavours: `get_*` decodes the JSON, `fetch_*`
//! hands back the raw body for callers that store or forward documents
//! without looking inside them.

mod packument;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use url::Url;

pub use packument::{Bugs, Contact, Dist, PackageVersion, Packument, Repository, Time, Unpublished};

use crate::error::{FetchError, RegistryError};
use crate::transport::{Request, Response, Transport};

/// Base URL for package documents.
pub const REGISTRY_ENDPOINT: &str = "https://registry.npmjs.com/";

/// Handle to the npm registry API. Cheap to clone.
#[derive(Clone)]
pub struct RegistryClient {
    transport: Arc<dyn Transport>,
    user_agent: String,
    base: Url,
}

impl fmt::Debug for RegistryClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryClient")
            .field("user_agent", &self.user_agent)
            .field("base", &self.base.as_str())
            .finish_non_exhaustive()
    }
}

impl RegistryClient {
    pub fn new(transport: Arc<dyn Transport>, user_agent: impl Into<String>) -> Self {
        Self {
            transport,
            user_agent: user_agent.into(),
            base: Url::parse(REGISTRY_ENDPOINT).expect("registry endpoint is a valid url"),
        }
    }

    /// Look up package documents somewhere other than the public registry.
    pub fn with_base(mut self, base: Url) -> Self {
        self.base = base;
        self
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub(crate) async fn get(&self, url: Url) -> Result<Response, FetchError> {
        let request = Request {
            url,
            user_agent: self.user_agent.clone(),
        };
        self.transport
            .get(request)
            .await
            .map_err(FetchError::Transport)
    }

    /// `GET` that only accepts `200 OK`, returning the body.
    pub(crate) async fn get_ok(&self, url: Url) -> Result<Vec<u8>, FetchError> {
        let res = self.get(url).await?;
        if res.status != reqwest::StatusCode::OK {
            return Err(FetchError::Status {
                status: res.status,
                url: res.url,
            });
        }
        Ok(res.body)
    }

    /// Fetch and decode the full document for a package, equivalent to
    /// `GET https://registry.npmjs.com/{package}`.
    pub async fn get_packument(&self, id: &str) -> Result<Packument, RegistryError> {
        let body = self.fetch_packument(id).await?;
        decode(id, &body)
    }

    /// Raw body of the package document.
    pub async fn fetch_packument(&self, id: &str) -> Result<Vec<u8>, RegistryError> {
        let url = self.document_url(&[id])?;
        self.fetch_document(id, url).await
    }

    /// Fetch the version manifest the `latest` dist-tag points at, equivalent
    /// to `GET https://registry.npmjs.com/{package}/latest`.
    pub async fn get_latest_manifest(&self, id: &str) -> Result<PackageVersion, RegistryError> {
        let body = self.fetch_latest_manifest(id).await?;
        decode(id, &body)
    }

    /// Raw body of the `latest` version manifest.
    pub async fn fetch_latest_manifest(&self, id: &str) -> Result<Vec<u8>, RegistryError> {
        let url = self.document_url(&[id, "latest"])?;
        self.fetch_document(id, url).await
    }

    /// Packages a user maintains, mapped to their access level (`"read"` or
    /// `"write"`). Equivalent to `GET https://registry.npmjs.com/-/user/{user}/package`.
    pub async fn get_packages_for_user(&self, user: &str) -> Result<HashMap<String, String>, RegistryError> {
        let url = self.document_url(&["-", "user", user, "package"])?;
        let body = self.fetch_document(user, url).await?;
        decode(user, &body)
    }

    /// `base` plus `segments`, each percent-encoded as a single segment so
    /// scoped names keep their slash escaped: `@scope%2Fname`.
    fn document_url(&self, segments: &[&str]) -> Result<Url, RegistryError> {
        if let Some(empty) = segments.iter().find(|s| s.is_empty()) {
            return Err(RegistryError::InvalidName(empty.to_string()));
        }
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| RegistryError::InvalidName(segments.join("/")))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// `GET` where `404` means the named thing does not exist.
    async fn fetch_document(&self, name: &str, url: Url) -> Result<Vec<u8>, RegistryError> {
        let res = self.get(url).await.map_err(|e| fetch_err(name, e))?;
        match res.status {
            reqwest::StatusCode::OK => Ok(res.body),
            reqwest::StatusCode::NOT_FOUND => Err(RegistryError::NotFound(name.to_string())),
            status => Err(fetch_err(
                name,
                FetchError::Status {
                    status,
                    url: res.url,
                },
            )),
        }
    }
}

fn fetch_err(name: &str, source: FetchError) -> RegistryError {
    RegistryError::Fetch {
        id: name.to_string(),
        source,
    }
}

fn decode<T: DeserializeOwned>(name: &str, body: &[u8]) -> Result<T, RegistryError> {
    serde_json::from_slice(body).map_err(|e| fetch_err(name, e.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::testing::{Reply, ScriptedTransport};
    use reqwest::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn scoped_names_are_escaped() {
        let transport = ScriptedTransport::new([Reply::json(json!({
            "name": "@scope/pkg",
            "_rev": "3-abc",
            "dist-tags": { "latest": "1.0.0" },
            "versions": { "1.0.0": { "name": "@scope/pkg", "version": "1.0.0" } }
        }))]);
        let client = RegistryClient::new(transport.clone(), "test-agent");

        let doc = client.get_packument("@scope/pkg").await.unwrap();
        assert_eq!(doc.rev, "3-abc");

        let requests = transport.requests();
        assert_eq!(requests[0].url.as_str(), "https://registry.npmjs.com/@scope%2Fpkg");
        assert_eq!(requests[0].user_agent, "test-agent");
    }

    #[tokio::test]
    async fn latest_manifest_path() {
        let transport = ScriptedTransport::new([Reply::json(json!({
            "name": "left-pad",
            "version": "1.3.0",
            "_npmUser": { "name": "stevemao", "email": "steve@example.com" }
        }))]);
        let client = RegistryClient::new(transport.clone(), "ua");

        let manifest = client.get_latest_manifest("left-pad").await.unwrap();
        assert_eq!(manifest.version, "1.3.0");
        assert_eq!(manifest.npm_user.unwrap().name, "stevemao");
        assert_eq!(
            transport.requests()[0].url.as_str(),
            "https://registry.npmjs.com/left-pad/latest"
        );
    }

    #[tokio::test]
    async fn missing_package_is_not_found() {
        let transport = ScriptedTransport::new([Reply::Body(StatusCode::NOT_FOUND, "{}".into())]);
        let client = RegistryClient::new(transport, "ua");

        let err = client.get_packument("no-such-package").await.unwrap_err();
        assert!(matches!(err, RegistryError::NotFound(ref id) if id == "no-such-package"));
    }

    #[tokio::test]
    async fn server_errors_keep_status() {
        let transport = ScriptedTransport::new([Reply::Body(StatusCode::BAD_GATEWAY, String::new())]);
        let client = RegistryClient::new(transport, "ua");

        let err = client.get_packument("left-pad").await.unwrap_err();
        match err {
            RegistryError::Fetch {
                source: FetchError::Status { status, .. },
                ..
            } => assert_eq!(status, StatusCode::BAD_GATEWAY),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn raw_fetch_returns_body_untouched() {
        let body = r#"{"name":"left-pad","_rev":"9-x","extra":[1,2,3]}"#;
        let transport = ScriptedTransport::new([Reply::ok(body)]);
        let client = RegistryClient::new(transport.clone(), "ua");

        assert_eq!(client.fetch_packument("left-pad").await.unwrap(), body.as_bytes());
        assert_eq!(transport.requests()[0].url.as_str(), "https://registry.npmjs.com/left-pad");
    }

    #[tokio::test]
    async fn raw_latest_manifest_not_found() {
        let transport = ScriptedTransport::new([Reply::Body(StatusCode::NOT_FOUND, String::new())]);
        let client = RegistryClient::new(transport.clone(), "ua");

        let err = client.fetch_latest_manifest("@acme/gone").await.unwrap_err();
        assert!(matches!(err, RegistryError::NotFound(ref id) if id == "@acme/gone"));
        assert_eq!(
            transport.requests()[0].url.as_str(),
            "https://registry.npmjs.com/@acme%2Fgone/latest"
        );
    }

    #[tokio::test]
    async fn packages_for_user() {
        let transport = ScriptedTransport::new([Reply::json(json!({
            "left-pad": "write",
            "@acme/widgets": "read"
        }))]);
        let client = RegistryClient::new(transport.clone(), "ua");

        let packages = client.get_packages_for_user("stevemao").await.unwrap();
        assert_eq!(packages.len(), 2);
        assert_eq!(packages["left-pad"], "write");
        assert_eq!(packages["@acme/widgets"], "read");
        assert_eq!(
            transport.requests()[0].url.as_str(),
            "https://registry.npmjs.com/-/user/stevemao/package"
        );
    }

    #[tokio::test]
    async fn user_names_are_escaped() {
        let transport = ScriptedTransport::new([Reply::json(json!({}))]);
        let client = RegistryClient::new(transport.clone(), "ua");

        assert!(client.get_packages_for_user("a b/c").await.unwrap().is_empty());
        assert_eq!(
            transport.requests()[0].url.as_str(),
            "https://registry.npmjs.com/-/user/a%20b%2Fc/package"
        );
    }

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let transport = ScriptedTransport::new([Reply::Body(StatusCode::NOT_FOUND, r#"{"error":"not found"}"#.into())]);
        let client = RegistryClient::new(transport, "ua");

        let err = client.get_packages_for_user("nobody-at-all").await.unwrap_err();
        assert!(matches!(err, RegistryError::NotFound(ref user) if user == "nobody-at-all"));
    }

    #[tokio::test]
    async fn custom_base_for_mirrors() {
        let transport = ScriptedTransport::new([
            Reply::json(json!({ "name": "left-pad", "version": "1.3.0" })),
            Reply::json(json!({ "left-pad": "write" })),
        ]);
        let base = Url::parse("http://localhost:4873/npm/").unwrap();
        let client = RegistryClient::new(transport.clone(), "ua").with_base(base);

        client.get_latest_manifest("left-pad").await.unwrap();
        client.get_packages_for_user("stevemao").await.unwrap();
        let urls: Vec<String> = transport.requests().iter().map(|r| r.url.to_string()).collect();
        assert_eq!(
            urls,
            [
                "http://localhost:4873/npm/left-pad/latest",
                "http://localhost:4873/npm/-/user/stevemao/package",
            ]
        );
    }

    #[tokio::test]
    async fn empty_name_is_rejected() {
        let client = RegistryClient::new(ScriptedTransport::new(Vec::<Reply>::new()), "ua");
        let err = client.get_packument("").await.unwrap_err();
        assert!(matches!(err, RegistryError::InvalidName(_)));
    }
}
