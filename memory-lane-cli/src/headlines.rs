//! Period headlines from the BBC News RSS feed.

use serde::Deserialize;
use thiserror::Error;
use time::OffsetDateTime;

pub const BBC_FEED_URL: &str = "https://feeds.bbci.co.uk/news/rss.xml";
pub const NO_HEADLINE: &str = "BBC News Unavailable";

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("feed request failed: {0}")]
    Http(surf::Error),
    #[error("could not parse feed")]
    Xml(#[from] quick_xml::de::DeError),
}

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
}

pub fn parse_feed(xml: &str) -> Result<Vec<String>, FeedError> {
    let rss: Rss = quick_xml::de::from_str(xml)?;

    Ok(rss
        .channel
        .items
        .into_iter()
        .filter_map(|item| item.title)
        .map(|title| title.trim().to_string())
        .filter(|title| !title.is_empty())
        .collect())
}

/// Same day of the year, same headline.
pub fn pick_headline(headlines: &[String], date: OffsetDateTime) -> Option<&str> {
    if headlines.is_empty() {
        return None;
    }

    let index = usize::from(date.ordinal()) % headlines.len();
    Some(headlines[index].as_str())
}

async fn fetch_feed(url: &str) -> Result<Vec<String>, FeedError> {
    let body = surf::get(url)
        .recv_string()
        .await
        .map_err(FeedError::Http)?;
    parse_feed(&body)
}

/// Feed contents, fetched at most once per sync run. A failed fetch is not
/// remembered, so the next photo tries again.
pub struct HeadlineCache {
    feed_url: String,
    headlines: Option<Vec<String>>,
}

impl HeadlineCache {
    pub fn new(feed_url: impl Into<String>) -> Self {
        HeadlineCache {
            feed_url: feed_url.into(),
            headlines: None,
        }
    }

    pub fn with_headlines(headlines: Vec<String>) -> Self {
        HeadlineCache {
            feed_url: String::new(),
            headlines: Some(headlines),
        }
    }

    async fn headlines(&mut self) -> &[String] {
        if self.headlines.is_none() {
            match fetch_feed(&self.feed_url).await {
                Ok(headlines) => {
                    log::debug!("Fetched {} headlines", headlines.len());
                    self.headlines = Some(headlines);
                },
                Err(err) => log::warn!("Could not fetch headlines: {}", err),
            }
        }

        self.headlines.as_deref().unwrap_or(&[])
    }

    pub async fn headline_for(&mut self, date: OffsetDateTime) -> String {
        pick_headline(self.headlines().await, date)
            .unwrap_or(NO_HEADLINE)
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title><![CDATA[BBC News]]></title>
    <link>https://www.bbc.co.uk/news</link>
    <item>
      <title><![CDATA[First story]]></title>
      <link>https://www.bbc.co.uk/news/1</link>
    </item>
    <item>
      <title><![CDATA[  Second story ]]></title>
    </item>
    <item>
      <description><![CDATA[No title here]]></description>
    </item>
    <item>
      <title><![CDATA[Third story]]></title>
    </item>
  </channel>
</rss>"#;

    fn headlines() -> Vec<String> {
        vec!["zero".to_string(), "one".to_string(), "two".to_string()]
    }

    #[test]
    fn feed_titles_are_collected_in_order() {
        assert_eq!(
            parse_feed(FEED).expect("parse"),
            vec!["First story", "Second story", "Third story"]
        );
    }

    #[test]
    fn headline_follows_day_of_year() {
        // 1 January is ordinal 1, 3 January ordinal 3.
        assert_eq!(pick_headline(&headlines(), datetime!(2020-01-01 0:00 UTC)), Some("one"));
        assert_eq!(pick_headline(&headlines(), datetime!(2020-01-03 0:00 UTC)), Some("zero"));
        assert_eq!(pick_headline(&[], datetime!(2020-01-03 0:00 UTC)), None);
    }

    #[async_std::test]
    async fn preloaded_cache_never_fetches() {
        let mut cache = HeadlineCache::with_headlines(headlines());
        assert_eq!(cache.headline_for(datetime!(2020-01-02 0:00 UTC)).await, "two");

        let mut empty = HeadlineCache::with_headlines(Vec::new());
        assert_eq!(empty.headline_for(datetime!(2020-01-02 0:00 UTC)).await, NO_HEADLINE);
    }
}
