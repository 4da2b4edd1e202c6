//! npm-follower: follow the npm registry's change feeds.
//!
//! ## Architecture overview
//!
//! ```text
//! ┌───────────┐ fetch() ┌──────────┐  FollowResult  ┌──────────┐
//! │ source/   │ ◄────── │ poll.rs  │ ─────────────► │ consumer │
//! │ (cursor)  │         │  (task)  │   (channel)    │          │
//! └───────────┘         └──────────┘                └──────────┘
//!       │                    ▲
//!       ▼                    │ connect(cancel)
//! ┌───────────┐        ┌─────────────┐
//! │ registry/ │        │ follower.rs │
//! │ transport │        └─────────────┘
//! └───────────┘
//! ```
//!
//! * **`source`**: the [`Source`] trait and the two feeds, CouchDB
//!   `_changes` ([`ChangesSource`]) and the RSS window ([`RssSource`]).
//! * **`poll`**: the scheduling loop: cold start, fixed-interval fetches,
//!   per-fetch timeout, cancellation, bounded delivery.
//! * **`follower`**: [`ChangesFollower`] and [`RssFollower`], the entry
//!   points most callers want.
//! * **`registry`**: [`RegistryClient`], shared by the followers and usable
//!   for fetching package documents.
//! * **`transport`**: the [`Transport`] seam over `reqwest`.
//!
//! ## Example
//!
//! ```no_run
//! use npm_follower::{ChangesConfig, ChangesFollower};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let follower = ChangesFollower::new(ChangesConfig::default())?;
//! let mut rx = follower.connect(CancellationToken::new());
//! while let Some(result) = rx.recv().await {
//!     match result {
//!         Ok(change) => println!("{} changed", change.id),
//!         Err(e) => eprintln!("{e}"),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod follower;
pub mod poll;
pub mod registry;
pub mod source;
pub mod transport;

pub use config::{ChangesConfig, PollConfig, RssConfig};
pub use error::{ConfigError, FetchError, FollowError, Phase, RegistryError};
pub use follower::{ChangesFollower, RssFollower};
pub use poll::{Exclusive, FollowReceiver, FollowResult, Schedule};
pub use registry::{Packument, PackageVersion, RegistryClient};
pub use source::{ChangeEvent, ChangesSource, FeedItem, Revision, RssSource, Source};
pub use transport::{HttpTransport, Transport, DEFAULT_USER_AGENT};
