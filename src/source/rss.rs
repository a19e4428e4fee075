// src/source/rss.rs
//! RSS 2.0 and RSS 1.0 (RDF) reader.
//!
//! Elements are matched by local name, so namespaced extensions that carry
//! item data (`content:encoded`, `dc:creator`, `dc:date`) land in the same
//! fields as their plain counterparts.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::{
    local_name, parse_timestamp, scrub_html_entities, SourceAuthor, SourceEnclosure, SourceFeed,
    SourceImage, SourceItem,
};
use crate::error::ParseError;

pub fn parse(xml: &str) -> Result<SourceFeed, ParseError> {
    let xml = scrub_html_entities(xml);
    let mut reader = Reader::from_str(&xml);
    reader.config_mut().trim_text(true);

    let mut feed = SourceFeed::default();
    let mut item: Option<SourceItem> = None;
    let mut image: Option<SourceImage> = None;
    let mut path: Vec<String> = Vec::new();
    let mut text = String::new();
    let mut buf = Vec::new();

    loop {
        let pos = reader.buffer_position() as u64;
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = local_name(e.name().as_ref());
                let parent = path.last().map(String::as_str).unwrap_or_default();
                match name.as_str() {
                    "item" => item = Some(SourceItem::default()),
                    // RSS 2.0 nests the image in <channel>, RSS 1.0 next to it.
                    "image" if item.is_none() && matches!(parent, "channel" | "RDF") => {
                        image = Some(SourceImage::default())
                    }
                    "enclosure" => {
                        if let Some(it) = item.as_mut() {
                            it.enclosures.push(enclosure(&e));
                        }
                    }
                    _ => {}
                }
                path.push(name);
                text.clear();
            }
            Ok(Event::Empty(e)) => {
                if local_name(e.name().as_ref()) == "enclosure" {
                    if let Some(it) = item.as_mut() {
                        it.enclosures.push(enclosure(&e));
                    }
                }
            }
            Ok(Event::Text(e)) => {
                let chunk = e.unescape().map_err(|err| ParseError::xml(pos, err))?;
                text.push_str(&chunk);
            }
            Ok(Event::CData(e)) => text.push_str(&String::from_utf8_lossy(&e)),
            Ok(Event::End(_)) => {
                let name = path.pop().unwrap_or_default();
                let value = std::mem::take(&mut text).trim().to_string();
                let parent = path.last().map(String::as_str).unwrap_or_default();

                if name == "item" {
                    if let Some(it) = item.take() {
                        feed.items.push(it);
                    }
                } else if let Some(it) = item.as_mut() {
                    if parent == "item" {
                        item_field(it, &name, value);
                    }
                } else if name == "image" && image.is_some() {
                    feed.image = image.take().filter(|img| !img.url.is_empty());
                } else if let Some(img) = image.as_mut() {
                    match (parent, name.as_str()) {
                        ("image", "url") => img.url = value,
                        ("image", "title") => img.title = value,
                        _ => {}
                    }
                } else if parent == "channel" {
                    channel_field(&mut feed, &name, value);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ParseError::xml(pos, e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(feed)
}

fn item_field(item: &mut SourceItem, name: &str, value: String) {
    match name {
        "title" => item.title = value,
        "link" if !value.is_empty() => item.link = value,
        "description" => item.description = value,
        "guid" => item.guid = value,
        "encoded" => item.content = value,
        "author" if !value.is_empty() => item.authors.push(rss_author(&value)),
        "creator" if !value.is_empty() => item.authors.push(SourceAuthor {
            name: value,
            email: String::new(),
        }),
        "category" | "subject" if !value.is_empty() => item.categories.push(value),
        "pubDate" | "date" => item.published = parse_timestamp(&value),
        "updated" | "modified" => item.updated = parse_timestamp(&value),
        _ => {}
    }
}

fn channel_field(feed: &mut SourceFeed, name: &str, value: String) {
    match name {
        "title" => feed.title = value,
        "link" if !value.is_empty() => feed.link = value,
        "description" => feed.description = value,
        "copyright" | "rights" => feed.copyright = value,
        "managingEditor" | "creator" if !value.is_empty() => feed.authors.push(rss_author(&value)),
        "pubDate" | "date" => feed.published = parse_timestamp(&value),
        "lastBuildDate" | "modified" => feed.updated = parse_timestamp(&value),
        _ => {}
    }
}

fn enclosure(e: &BytesStart<'_>) -> SourceEnclosure {
    let mut enc = SourceEnclosure::default();
    for attr in e.attributes().flatten() {
        let value = String::from_utf8_lossy(&attr.value).to_string();
        match attr.key.as_ref() {
            b"url" => enc.url = value,
            b"type" => enc.mime_type = value,
            b"length" => enc.length = value.trim().parse().ok(),
            _ => {}
        }
    }
    enc
}

/// RSS puts authors as `jane@example.com (Jane Doe)`, a bare address, or
/// (in practice) a bare name.
fn rss_author(raw: &str) -> SourceAuthor {
    let raw = raw.trim();
    if let Some((email, rest)) = raw.split_once('(') {
        if let Some(name) = rest.strip_suffix(')') {
            return SourceAuthor {
                name: name.trim().to_string(),
                email: email.trim().to_string(),
            };
        }
    }
    if raw.contains('@') && !raw.contains(' ') {
        SourceAuthor {
            name: String::new(),
            email: raw.to_string(),
        }
    } else {
        SourceAuthor {
            name: raw.to_string(),
            email: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rss2_channel_and_items() {
        let xml = r#"<?xml version="1.0"?>
            <rss version="2.0" xmlns:content="http://purl.org/rss/1.0/modules/content/">
              <channel>
                <title>Daily News</title>
                <link>https://news.example.com/</link>
                <description>All the news</description>
                <copyright>(c) Example</copyright>
                <image><url>https://news.example.com/logo.png</url><title>Logo</title></image>
                <item>
                  <title>First</title>
                  <link>https://news.example.com/1</link>
                  <description><![CDATA[<p>Breaking</p>]]></description>
                  <content:encoded>full body</content:encoded>
                  <author>ed@example.com (Ed Itor)</author>
                  <category>world</category>
                  <category>politics</category>
                  <enclosure url="https://news.example.com/1.mp3" length="1234" type="audio/mpeg"/>
                  <guid isPermaLink="false">id-1</guid>
                  <pubDate>Tue, 10 Jun 2003 04:00:00 GMT</pubDate>
                </item>
              </channel>
            </rss>"#;

        let feed = parse(xml).unwrap();
        assert_eq!(feed.title, "Daily News");
        assert_eq!(feed.copyright, "(c) Example");
        assert_eq!(
            feed.image,
            Some(SourceImage {
                url: "https://news.example.com/logo.png".into(),
                title: "Logo".into()
            })
        );
        assert_eq!(feed.items.len(), 1);

        let it = &feed.items[0];
        assert_eq!(it.description, "<p>Breaking</p>");
        assert_eq!(it.content, "full body");
        assert_eq!(it.guid, "id-1");
        assert_eq!(it.categories, vec!["world", "politics"]);
        assert_eq!(it.authors[0].name, "Ed Itor");
        assert_eq!(it.authors[0].email, "ed@example.com");
        assert_eq!(it.enclosures[0].length, Some(1234));
        assert!(it.published.is_some());
        // Channel title must not leak into the item and vice versa.
        assert_eq!(it.title, "First");
    }

    #[test]
    fn parses_rdf_items_outside_channel() {
        let xml = r#"<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
                              xmlns="http://purl.org/rss/1.0/"
                              xmlns:dc="http://purl.org/dc/elements/1.1/">
              <channel><title>RDF feed</title><link>https://rdf.example.com</link></channel>
              <item>
                <title>One</title><link>https://rdf.example.com/1</link>
                <dc:creator>Ann</dc:creator><dc:date>2024-01-02T03:04:05Z</dc:date>
              </item>
            </rdf:RDF>"#;

        let feed = parse(xml).unwrap();
        assert_eq!(feed.title, "RDF feed");
        assert_eq!(feed.items.len(), 1);
        assert_eq!(feed.items[0].authors[0].name, "Ann");
        assert!(feed.items[0].published.is_some());
    }

    #[test]
    fn html_entities_do_not_break_parsing() {
        let xml = "<rss><channel><title>A&nbsp;B &amp; C</title></channel></rss>";
        let feed = parse(xml).unwrap();
        assert_eq!(feed.title, "A\u{a0}B & C");
    }

    #[test]
    fn malformed_xml_is_a_parse_error() {
        let err = parse("<rss><channel><title>x</channel></rss>").unwrap_err();
        assert!(matches!(err, ParseError::Xml { .. }), "{err}");
    }
}
