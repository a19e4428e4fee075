// src/source/json_feed.rs
//! JSON Feed 1.0 / 1.1 reader.

use serde::Deserialize;

use super::{parse_timestamp, SourceAuthor, SourceEnclosure, SourceFeed, SourceImage, SourceItem};
use crate::error::ParseError;

#[derive(Debug, Deserialize)]
struct Document {
    #[serde(default)]
    title: String,
    #[serde(default)]
    home_page_url: String,
    #[serde(default)]
    description: String,
    icon: Option<String>,
    favicon: Option<String>,
    #[serde(default)]
    authors: Vec<Author>,
    /// JSON Feed 1.0 spelling.
    author: Option<Author>,
    #[serde(default)]
    items: Vec<Item>,
}

#[derive(Debug, Default, Deserialize)]
struct Author {
    #[serde(default)]
    name: String,
    #[serde(default)]
    url: String,
}

#[derive(Debug, Deserialize)]
struct Item {
    /// Strings per the format, but numbers show up in the wild.
    id: Option<serde_json::Value>,
    #[serde(default)]
    url: String,
    #[serde(default)]
    external_url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    summary: String,
    content_html: Option<String>,
    content_text: Option<String>,
    date_published: Option<String>,
    date_modified: Option<String>,
    #[serde(default)]
    authors: Vec<Author>,
    author: Option<Author>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    attachments: Vec<Attachment>,
}

#[derive(Debug, Deserialize)]
struct Attachment {
    url: String,
    #[serde(default)]
    mime_type: String,
    size_in_bytes: Option<u64>,
}

pub fn parse(body: &str) -> Result<SourceFeed, ParseError> {
    let doc: Document = serde_json::from_str(body).map_err(|e| ParseError::Json(e.to_string()))?;

    let image = doc
        .icon
        .or(doc.favicon)
        .filter(|url| !url.is_empty())
        .map(|url| SourceImage {
            url,
            title: doc.title.clone(),
        });

    Ok(SourceFeed {
        authors: authors(doc.authors, doc.author),
        items: doc.items.into_iter().map(item).collect(),
        title: doc.title,
        description: doc.description,
        link: doc.home_page_url,
        image,
        ..SourceFeed::default()
    })
}

fn item(it: Item) -> SourceItem {
    let link = if it.url.is_empty() {
        it.external_url
    } else {
        it.url
    };
    let guid = match it.id {
        Some(serde_json::Value::String(s)) => s,
        Some(serde_json::Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };
    SourceItem {
        guid,
        link,
        title: it.title,
        description: it.summary,
        content: it.content_html.or(it.content_text).unwrap_or_default(),
        authors: authors(it.authors, it.author),
        categories: it.tags.into_iter().filter(|t| !t.is_empty()).collect(),
        enclosures: it
            .attachments
            .into_iter()
            .map(|a| SourceEnclosure {
                url: a.url,
                length: a.size_in_bytes,
                mime_type: a.mime_type,
            })
            .collect(),
        published: it.date_published.as_deref().and_then(parse_timestamp),
        updated: it.date_modified.as_deref().and_then(parse_timestamp),
    }
}

/// JSON Feed authors have a url but no email; a `mailto:` url is the closest
/// thing to one.
fn authors(list: Vec<Author>, legacy: Option<Author>) -> Vec<SourceAuthor> {
    list.into_iter()
        .chain(legacy)
        .filter(|a| !a.name.is_empty() || !a.url.is_empty())
        .map(|a| SourceAuthor {
            name: a.name,
            email: a
                .url
                .strip_prefix("mailto:")
                .map(str::to_string)
                .unwrap_or_default(),
        })
        .collect()
}
