//! The item type published by the registry's RSS feed.
//!
//! ## Identity
//!
//! Two items are the same item when creator, title and the *raw* `pubDate`
//! string all match. The raw string is what survives the round trip through
//! the feed unchanged; two different strings that parse to the same instant
//! are still different items.

use std::fmt;

use chrono::{DateTime, FixedOffset};

/// One entry of the RSS window.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct FeedItem {
    /// Package name.
    pub title: String,

    /// Link to the package page.
    pub link: String,

    /// Publish date exactly as the feed wrote it (RFC 2822).
    pub pub_date: String,

    /// The `dc:creator` of the release.
    pub creator: String,
}

impl FeedItem {
    /// Build a [`FeedItem`] from a parsed [`rss::Item`]. Missing fields
    /// become empty strings.
    pub fn from_rss(item: &rss::Item) -> Self {
        let creator = item
            .dublin_core_ext()
            .and_then(|dc| dc.creators().first())
            .cloned()
            .unwrap_or_default();

        FeedItem {
            title: item.title().unwrap_or_default().to_string(),
            link: item.link().unwrap_or_default().to_string(),
            pub_date: item.pub_date().unwrap_or_default().to_string(),
            creator,
        }
    }

    /// Whether `other` is the same feed entry (creator, title, raw date).
    pub fn is(&self, other: &FeedItem) -> bool {
        self.creator == other.creator && self.title == other.title && self.pub_date == other.pub_date
    }

    /// Parse the publish date.
    pub fn date(&self) -> Result<DateTime<FixedOffset>, chrono::ParseError> {
        DateTime::parse_from_rfc2822(&self.pub_date)
    }
}

impl fmt::Display for FeedItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} updated by {} - the `latest` dist-tag was released on {}",
            self.title, self.creator, self.pub_date
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    /// Shorthand constructor for tests.
    pub fn make_item(title: &str, creator: &str, pub_date: &str) -> FeedItem {
        FeedItem {
            title: title.to_string(),
            link: format!("https://npmjs.com/package/{title}"),
            pub_date: pub_date.to_string(),
            creator: creator.to_string(),
        }
    }

    #[test]
    fn identity_uses_creator_title_and_raw_date() {
        let a = make_item("@opencode-ai/plugin", "GitHub Actions", "Sun, 21 Dec 2025 03:07:25 GMT");
        let b = make_item("@sdjkals/data-lib-kernel", "sdjkals", "Sun, 21 Dec 2025 10:08:22 GMT");

        assert!(!a.is(&b), "different items");
        assert!(b.is(&b), "an item is itself");

        let mut relinked = a.clone();
        relinked.link = "https://example.com/elsewhere".into();
        assert!(a.is(&relinked), "link is not part of identity");

        let mut other_creator = a.clone();
        other_creator.creator = "someone".into();
        assert!(!a.is(&other_creator));
    }

    #[test]
    fn same_instant_different_string_is_not_the_same_item() {
        let gmt = make_item("pkg", "me", "Sun, 21 Dec 2025 03:07:25 GMT");
        let offset = make_item("pkg", "me", "Sun, 21 Dec 2025 03:07:25 +0000");

        assert_eq!(gmt.date().unwrap(), offset.date().unwrap());
        assert!(!gmt.is(&offset));
    }

    #[test]
    fn parses_rfc2822_dates() {
        let item = make_item("pkg", "me", "Sun, 21 Dec 2025 10:08:22 GMT");
        let expected = Utc.with_ymd_and_hms(2025, 12, 21, 10, 8, 22).unwrap();
        assert_eq!(item.date().unwrap(), expected);

        assert!(make_item("pkg", "me", "not-a-real-date").date().is_err());
    }

    #[test]
    fn display_reads_like_a_log_line() {
        let item = make_item("left-pad", "stevemao", "Sun, 21 Dec 2025 10:08:22 GMT");
        assert_eq!(
            item.to_string(),
            "left-pad updated by stevemao - the `latest` dist-tag was released on Sun, 21 Dec 2025 10:08:22 GMT"
        );
    }

    #[test]
    fn reads_dublin_core_creator() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:dc="http://purl.org/dc/elements/1.1/">
  <channel>
    <title>npm recent updates</title>
    <item>
      <title><![CDATA[@opencode-ai/plugin]]></title>
      <link>https://npmjs.com/package/@opencode-ai/plugin</link>
      <guid isPermaLink="true">https://npmjs.com/package/@opencode-ai/plugin</guid>
      <dc:creator><![CDATA[GitHub Actions]]></dc:creator>
      <pubDate>Sun, 21 Dec 2025 03:07:25 GMT</pubDate>
    </item>
    <item>
      <title>no-creator</title>
    </item>
  </channel>
</rss>"#;

        let channel = rss::Channel::read_from(xml.as_bytes()).unwrap();
        let items: Vec<FeedItem> = channel.items().iter().map(FeedItem::from_rss).collect();

        assert_eq!(items[0].title, "@opencode-ai/plugin");
        assert_eq!(items[0].creator, "GitHub Actions");
        assert_eq!(items[0].pub_date, "Sun, 21 Dec 2025 03:07:25 GMT");
        assert_eq!(items[0].link, "https://npmjs.com/package/@opencode-ai/plugin");

        assert_eq!(items[1].title, "no-creator");
        assert_eq!(items[1].creator, "");
        assert_eq!(items[1].pub_date, "");
    }
}
