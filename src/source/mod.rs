// src/source/mod.rs
//! Feed sources: fetching a document and parsing it into a [`SourceFeed`].
//!
//! Parsing is format-sniffing: a document whose first non-whitespace byte is
//! `{` is a JSON Feed, anything else is XML and its root element decides
//! between RSS (`<rss>`, `<rdf:RDF>`) and Atom (`<feed>`).

pub mod atom;
pub mod http;
pub mod json_feed;
pub mod rss;

use std::borrow::Cow;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDateTime};
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{FetchError, ParseError};

pub use http::HttpFeedSource;

pub type Timestamp = DateTime<FixedOffset>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceAuthor {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceEnclosure {
    pub url: String,
    /// Byte length; `None` when absent or not a number.
    pub length: Option<u64>,
    pub mime_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceImage {
    pub url: String,
    pub title: String,
}

/// One entry as it came out of the parser. Missing text is `""`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceItem {
    pub title: String,
    pub description: String,
    pub link: String,
    pub guid: String,
    pub content: String,
    pub authors: Vec<SourceAuthor>,
    pub categories: Vec<String>,
    pub enclosures: Vec<SourceEnclosure>,
    pub updated: Option<Timestamp>,
    pub published: Option<Timestamp>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceFeed {
    pub title: String,
    pub description: String,
    pub copyright: String,
    pub link: String,
    pub authors: Vec<SourceAuthor>,
    pub image: Option<SourceImage>,
    pub updated: Option<Timestamp>,
    pub published: Option<Timestamp>,
    pub items: Vec<SourceItem>,
}

#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch and parse the feed at `url`, giving up after `timeout`.
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<SourceFeed, FetchError>;
    fn name(&self) -> &'static str;
}

/// Serves a document held in memory. Used by tests and for offline runs.
#[derive(Debug, Clone)]
pub struct FixtureFeedSource {
    body: String,
}

impl FixtureFeedSource {
    pub fn from_fixture(body: &str) -> Self {
        Self {
            body: body.to_string(),
        }
    }
}

#[async_trait]
impl FeedSource for FixtureFeedSource {
    async fn fetch(&self, url: &str, _timeout: Duration) -> Result<SourceFeed, FetchError> {
        parse_feed(&self.body).map_err(|source| FetchError::Parse {
            url: url.to_string(),
            source,
        })
    }

    fn name(&self) -> &'static str {
        "fixture"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedFormat {
    Rss,
    Atom,
    JsonFeed,
}

/// Decide which parser handles `body`.
pub fn detect_format(body: &str) -> Result<FeedFormat, ParseError> {
    let body = body.trim_start_matches('\u{feff}').trim_start();
    if body.is_empty() {
        return Err(ParseError::Empty);
    }
    if body.starts_with('{') {
        return Ok(FeedFormat::JsonFeed);
    }

    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                let root = local_name(e.name().as_ref());
                return match root.as_str() {
                    "rss" | "RDF" => Ok(FeedFormat::Rss),
                    "feed" => Ok(FeedFormat::Atom),
                    _ => Err(ParseError::Unrecognized(root)),
                };
            }
            Ok(Event::Eof) => return Err(ParseError::Empty),
            Err(e) => return Err(ParseError::xml(reader.buffer_position() as u64, e)),
            _ => {}
        }
        buf.clear();
    }
}

/// Parse a fetched document of any supported format.
pub fn parse_feed(body: &str) -> Result<SourceFeed, ParseError> {
    let body = body.trim_start_matches('\u{feff}');
    match detect_format(body)? {
        FeedFormat::Rss => rss::parse(body),
        FeedFormat::Atom => atom::parse(body),
        FeedFormat::JsonFeed => json_feed::parse(body),
    }
}

/// Element name without its namespace prefix (`dc:creator` → `creator`).
pub(crate) fn local_name(qname: &[u8]) -> String {
    let name = String::from_utf8_lossy(qname);
    name.rsplit(':').next().unwrap_or_default().to_string()
}

/// Parse the timestamp spellings found in the wild: RFC 3339, RFC 2822, and
/// a bare `YYYY-MM-DDTHH:MM:SS` taken as UTC.
pub(crate) fn parse_timestamp(raw: &str) -> Option<Timestamp> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_rfc2822(raw))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|naive| naive.and_utc().fixed_offset())
        })
}

/// HTML entities are common in feeds but undefined in XML. Rewrite the usual
/// suspects as numeric references before handing the text to quick-xml.
pub(crate) fn scrub_html_entities(s: &str) -> Cow<'_, str> {
    const ENTITIES: &[(&str, &str)] = &[
        ("&nbsp;", "&#160;"),
        ("&ndash;", "&#8211;"),
        ("&mdash;", "&#8212;"),
        ("&ldquo;", "&#8220;"),
        ("&rdquo;", "&#8221;"),
        ("&lsquo;", "&#8216;"),
        ("&rsquo;", "&#8217;"),
        ("&hellip;", "&#8230;"),
        ("&copy;", "&#169;"),
        ("&reg;", "&#174;"),
        ("&trade;", "&#8482;"),
    ];
    if !ENTITIES.iter().any(|(from, _)| s.contains(from)) {
        return Cow::Borrowed(s);
    }
    let mut out = s.to_string();
    for (from, to) in ENTITIES {
        out = out.replace(from, to);
    }
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_format_from_first_bytes_and_root() {
        assert_eq!(detect_format("  {\"items\": []}"), Ok(FeedFormat::JsonFeed));
        assert_eq!(
            detect_format("<?xml version=\"1.0\"?>\n<rss version=\"2.0\"/>"),
            Ok(FeedFormat::Rss)
        );
        assert_eq!(
            detect_format("<rdf:RDF xmlns:rdf=\"x\"></rdf:RDF>"),
            Ok(FeedFormat::Rss)
        );
        assert_eq!(
            detect_format("<feed xmlns=\"http://www.w3.org/2005/Atom\"></feed>"),
            Ok(FeedFormat::Atom)
        );
        assert_eq!(
            detect_format("<html><body/></html>"),
            Err(ParseError::Unrecognized("html".into()))
        );
        assert_eq!(detect_format("   \n"), Err(ParseError::Empty));
    }

    #[test]
    fn timestamps_keep_their_offset() {
        let ts = parse_timestamp("Tue, 10 Jun 2003 04:00:00 +0200").unwrap();
        assert_eq!(ts.offset().local_minus_utc(), 7200);
        let ts = parse_timestamp("2024-03-01T12:30:00-05:00").unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-03-01T12:30:00-05:00");
        assert!(parse_timestamp("2024-03-01T12:30:00").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn html_entities_become_numeric_references() {
        assert_eq!(scrub_html_entities("a&nbsp;b"), "a&#160;b");
        assert!(matches!(scrub_html_entities("plain &amp;"), Cow::Borrowed(_)));
    }
}
