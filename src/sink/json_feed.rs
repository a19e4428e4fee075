// src/sink/json_feed.rs
use serde::Serialize;

use crate::error::SerializeError;
use crate::model::{Author, CanonicalFeed, CanonicalItem};

pub const VERSION: &str = "https://jsonfeed.org/version/1.1";

#[derive(Debug, Serialize)]
struct Document<'a> {
    version: &'static str,
    title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    home_page_url: Option<&'a str>,
    #[serde(skip_serializing_if = "str::is_empty")]
    description: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    icon: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    authors: Vec<JsonAuthor<'a>>,
    items: Vec<Item<'a>>,
}

#[derive(Debug, Serialize)]
struct JsonAuthor<'a> {
    #[serde(skip_serializing_if = "str::is_empty")]
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<String>,
}

#[derive(Debug, Serialize)]
struct Item<'a> {
    id: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    url: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    title: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    summary: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    content_html: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    date_published: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    date_modified: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    authors: Vec<JsonAuthor<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tags: Vec<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<Attachment<'a>>,
}

#[derive(Debug, Serialize)]
struct Attachment<'a> {
    url: &'a str,
    mime_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    size_in_bytes: Option<u64>,
}

/// JSON Feed 1.1, pretty-printed.
pub fn write(feed: &CanonicalFeed) -> Result<Vec<u8>, SerializeError> {
    let doc = Document {
        version: VERSION,
        title: &feed.title,
        home_page_url: feed.link.as_ref().map(|l| l.href.as_str()),
        description: &feed.description,
        icon: feed
            .image
            .as_ref()
            .map(|i| i.url.as_str())
            .filter(|u| !u.is_empty()),
        authors: feed.author.iter().filter_map(author).collect(),
        items: feed.items.iter().map(item).collect(),
    };
    let mut out =
        serde_json::to_vec_pretty(&doc).map_err(|e| SerializeError::Json(e.to_string()))?;
    out.push(b'\n');
    Ok(out)
}

fn item(it: &CanonicalItem) -> Item<'_> {
    Item {
        id: if it.id.is_empty() { &it.link.href } else { &it.id },
        url: &it.link.href,
        title: &it.title,
        summary: &it.description,
        content_html: &it.content,
        date_published: it.created.map(|t| t.to_rfc3339()),
        date_modified: it.updated.map(|t| t.to_rfc3339()),
        authors: it.author.iter().filter_map(author).collect(),
        tags: it.category.iter().map(String::as_str).collect(),
        attachments: it
            .enclosure
            .iter()
            .map(|e| Attachment {
                url: &e.url,
                mime_type: &e.mime_type,
                size_in_bytes: e.length,
            })
            .collect(),
    }
}

/// JSON Feed has no author email; carry it as a `mailto:` url.
fn author(a: &Author) -> Option<JsonAuthor<'_>> {
    if a.name.is_empty() && a.email.is_empty() {
        return None;
    }
    Some(JsonAuthor {
        name: &a.name,
        url: (!a.email.is_empty()).then(|| format!("mailto:{}", a.email)),
    })
}
