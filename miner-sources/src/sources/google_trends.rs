//! Google Trends rising searches, read from the public RSS feed.
//!
//! The feed lists one `<item>` per rising search; the item `<title>` is the
//! search term. The channel's own `<title>` is ignored.

use std::collections::HashSet;

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::circuit_breaker::CircuitBreaker;
use crate::config::SourceConfig;
use crate::error::SourceError;
use crate::http;
use crate::source::TrendSource;

/// Trends RSS reader.
#[derive(Debug)]
pub struct GoogleTrends {
    client: reqwest::Client,
    endpoint: String,
    limit: usize,
    breaker: CircuitBreaker,
}

impl GoogleTrends {
    /// Build the adapter from shared source configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Config`] on invalid configuration.
    pub fn new(config: &SourceConfig) -> Result<Self, SourceError> {
        config.validate()?;
        Ok(Self {
            client: http::build_client(config, config.trends_timeout_secs)?,
            endpoint: config.trends_endpoint.clone(),
            limit: config.trend_limit,
            breaker: CircuitBreaker::new(
                config.breaker_failure_threshold,
                config.breaker_cooldown_secs,
            ),
        })
    }

    /// Extract item titles from an RSS document, deduplicated, in feed
    /// order, truncated to `limit` (0 = no limit).
    fn parse_feed(xml: &str, limit: usize) -> Result<Vec<String>, SourceError> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut terms = Vec::new();
        let mut seen = HashSet::new();
        let mut in_item = false;
        let mut in_title = false;

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => match e.local_name().as_ref() {
                    b"item" => in_item = true,
                    b"title" if in_item => in_title = true,
                    _ => {}
                },
                Ok(Event::End(e)) => match e.local_name().as_ref() {
                    b"item" => in_item = false,
                    b"title" => in_title = false,
                    _ => {}
                },
                Ok(Event::Text(e)) if in_title => {
                    let text = e
                        .unescape()
                        .map_err(|err| SourceError::Parse(format!("bad trends entity: {err}")))?;
                    push_term(&mut terms, &mut seen, &text);
                }
                Ok(Event::CData(e)) if in_title => {
                    let raw = e.into_inner();
                    push_term(&mut terms, &mut seen, &String::from_utf8_lossy(&raw));
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(SourceError::Parse(format!("trends feed is not valid XML: {e}")));
                }
                _ => {}
            }
            if limit > 0 && terms.len() >= limit {
                break;
            }
        }

        Ok(terms)
    }

    async fn fetch(&self, locale: &str) -> Result<Vec<String>, SourceError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("geo", locale)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(http::status_error("trends", status));
        }
        let body = response.text().await?;
        Self::parse_feed(&body, self.limit)
    }
}

fn push_term(terms: &mut Vec<String>, seen: &mut HashSet<String>, raw: &str) {
    let term = raw.trim();
    if !term.is_empty() && seen.insert(term.to_owned()) {
        terms.push(term.to_owned());
    }
}

impl TrendSource for GoogleTrends {
    async fn fetch_rising_terms(&self, locale: &str) -> Result<Vec<String>, SourceError> {
        if !self.breaker.should_attempt() {
            return Err(SourceError::Transient("trends circuit open".into()));
        }

        match self.fetch(locale).await {
            Ok(terms) => {
                self.breaker.record_success();
                tracing::info!(locale, count = terms.len(), "rising terms fetched");
                Ok(terms)
            }
            Err(err) => {
                self.breaker.record_failure();
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:ht="https://trends.google.com/trending/rss">
  <channel>
    <title>Daily Search Trends</title>
    <item>
      <title>大谷翔平</title>
      <ht:approx_traffic>200000+</ht:approx_traffic>
    </item>
    <item>
      <title><![CDATA[結婚発表]]></title>
    </item>
    <item>
      <title>大谷翔平</title>
    </item>
    <item>
      <title>Tom &amp; Jerry</title>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn parses_item_titles_only() {
        let terms = GoogleTrends::parse_feed(FEED, 0).expect("parse");
        assert_eq!(terms, vec!["大谷翔平", "結婚発表", "Tom & Jerry"]);
    }

    #[test]
    fn limit_truncates() {
        let terms = GoogleTrends::parse_feed(FEED, 1).expect("parse");
        assert_eq!(terms, vec!["大谷翔平"]);
    }

    #[test]
    fn empty_channel_yields_nothing() {
        let xml = "<rss><channel><title>x</title></channel></rss>";
        assert!(GoogleTrends::parse_feed(xml, 0).expect("parse").is_empty());
    }

    #[test]
    fn malformed_xml_is_parse_error() {
        let err = GoogleTrends::parse_feed("<rss><channel></rss>", 0).unwrap_err();
        assert!(matches!(err, SourceError::Parse(_)));
    }
}
