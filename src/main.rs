//! npm-follow: print what is being published to the npm registry.
//!
//! ```text
//! npm-follow changes [--since SEQ] [--packuments]
//! npm-follow rss [--limit N]
//! ```
//!
//! `changes` follows the CouchDB `_changes` feed and logs every change.
//! With `--packuments` it also waits a little, fetches the package document
//! behind each change, and checks that the document's `_rev` is one the feed
//! reported. `rss` follows the RSS feed of recent releases.
//!
//! Ctrl-C cancels the follower; in-flight document lookups are allowed to
//! finish before the process exits. Log verbosity follows `RUST_LOG`.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use npm_follower::{
    ChangeEvent, ChangesConfig, ChangesFollower, PollConfig, RegistryClient, RegistryError, RssConfig, RssFollower,
};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    feed: Feed,
}

#[derive(Subcommand, Debug)]
enum Feed {
    /// Follow the CouchDB `_changes` feed.
    Changes {
        /// Sequence to start after; defaults to the current head.
        #[arg(long)]
        since: Option<u64>,
        /// Database URL.
        #[arg(long, default_value = npm_follower::source::REPLICATE_ENDPOINT)]
        endpoint: String,
        /// Fetch each changed package's document and check its revision.
        #[arg(long)]
        packuments: bool,
        /// Seconds to wait before fetching a document, giving the registry
        /// time to catch up with the feed.
        #[arg(long, default_value_t = 10)]
        packument_delay_secs: u64,
        #[command(flatten)]
        poll: PollArgs,
    },
    /// Follow the RSS feed of recent releases.
    Rss {
        /// Items requested per poll.
        #[arg(long, default_value_t = 100)]
        limit: usize,
        /// Feed URL.
        #[arg(long, default_value = npm_follower::source::RSS_ENDPOINT)]
        endpoint: String,
        #[command(flatten)]
        poll: PollArgs,
    },
}

#[derive(Args, Debug)]
struct PollArgs {
    /// Seconds between polls. The RSS feed is regenerated roughly once a
    /// minute, so a little over 60 works well there.
    #[arg(long)]
    interval_secs: Option<u64>,
    /// HTTP request timeout in seconds.
    #[arg(long, default_value_t = 5)]
    request_timeout_secs: u64,
    /// Hard limit on one poll attempt in seconds.
    #[arg(long, default_value_t = 10)]
    fetch_timeout_secs: u64,
    /// Override the user-agent header.
    #[arg(long)]
    user_agent: Option<String>,
}

impl PollArgs {
    fn into_config(self, default_interval: Duration) -> PollConfig {
        PollConfig {
            polling_interval: self.interval_secs.map(Duration::from_secs).unwrap_or(default_interval),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            fetch_timeout: Duration::from_secs(self.fetch_timeout_secs),
            user_agent: self.user_agent,
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("npm_follower=info,npm_follow=info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();

    let cli = Cli::parse();

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("ok, shutting down...");
                cancel.cancel();
            }
        }
    });

    match cli.feed {
        Feed::Changes {
            since,
            endpoint,
            packuments,
            packument_delay_secs,
            poll,
        } => {
            let config = ChangesConfig {
                endpoint,
                since,
                poll: poll.into_config(Duration::from_secs(5)),
            };
            let delay = packuments.then(|| Duration::from_secs(packument_delay_secs));
            print_changes(config, delay, cancel).await
        }
        Feed::Rss { limit, endpoint, poll } => {
            let config = RssConfig {
                endpoint,
                limit,
                poll: poll.into_config(Duration::from_secs(62)),
            };
            print_releases(config, cancel).await
        }
    }
}

async fn print_changes(config: ChangesConfig, packument_delay: Option<Duration>, cancel: CancellationToken) -> Result<()> {
    let follower = ChangesFollower::new(config).context("configuring changes follower")?;
    let mut rx = follower.connect(cancel.clone());
    let mut lookups = JoinSet::new();

    while let Some(result) = rx.recv().await {
        let change = match result {
            Ok(change) => change,
            Err(e) => {
                warn!("error polling: {e}");
                continue;
            }
        };
        if change.deleted {
            info!("{}: deleted", change.id);
            continue;
        }
        match packument_delay {
            Some(delay) => {
                lookups.spawn(check_packument(follower.client().clone(), change, delay, cancel.clone()));
            }
            None => info!(seq = change.seq, "{}: updated", change.id),
        }
        // reap finished lookups so the set doesn't grow without bound
        while lookups.try_join_next().is_some() {}
    }

    info!(sequence = follower.sequence(), "follower closed, waiting for pending lookups...");
    while lookups.join_next().await.is_some() {}
    Ok(())
}

async fn check_packument(client: RegistryClient, change: ChangeEvent, delay: Duration, cancel: CancellationToken) {
    tokio::select! {
        _ = tokio::time::sleep(delay) => {}
        _ = cancel.cancelled() => return,
    }

    let doc = match client.get_packument(&change.id).await {
        Ok(doc) => doc,
        Err(RegistryError::NotFound(_)) => {
            info!("{}: document gone before it could be fetched", change.id);
            return;
        }
        Err(e) => {
            warn!("{}: error getting packument: {e}", change.id);
            return;
        }
    };

    if !change.has_revision(&doc.rev) {
        let reported = change.changes.first().map(|c| c.rev.as_str()).unwrap_or_default();
        warn!(
            "{}: packument revision {} not in _changes feed, which says {}",
            change.id, doc.rev, reported
        );
    }
    if doc.is_holding_package() {
        info!("{}: replaced by a security holding package", change.id);
        return;
    }
    match doc.latest() {
        Some(latest) => {
            let publisher = latest.npm_user.as_ref();
            info!(
                "{}: updated - latest version {} was published by npm user {} ({})",
                change.id,
                latest.version,
                publisher.map(|u| u.name.as_str()).unwrap_or("unknown"),
                publisher.and_then(|u| u.email.as_deref()).unwrap_or("no email"),
            );
        }
        None => info!("{}: updated, no `latest` dist-tag", change.id),
    }
}

async fn print_releases(config: RssConfig, cancel: CancellationToken) -> Result<()> {
    let follower = RssFollower::new(config).context("configuring rss follower")?;
    let mut rx = follower.connect(cancel);

    while let Some(result) = rx.recv().await {
        match result {
            Ok(item) => info!("{item}"),
            Err(e) => warn!("{e}"),
        }
    }
    Ok(())
}
