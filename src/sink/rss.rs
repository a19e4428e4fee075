// src/sink/rss.rs
use super::{rss_person, XmlWriter};
use crate::error::SerializeError;
use crate::model::{CanonicalFeed, CanonicalItem};

const CONTENT_NS: &str = "http://purl.org/rss/1.0/modules/content/";

/// RSS 2.0, with item bodies in `content:encoded`.
pub fn write(feed: &CanonicalFeed) -> Result<Vec<u8>, SerializeError> {
    let mut w = XmlWriter::new("RSS");
    w.decl()?;
    w.open("rss", &[("version", "2.0"), ("xmlns:content", CONTENT_NS)])?;
    w.open("channel", &[])?;

    w.text("title", &feed.title)?;
    let link = feed.link.as_ref().map(|l| l.href.as_str()).unwrap_or_default();
    w.text("link", link)?;
    w.text("description", &feed.description)?;
    w.text_opt("copyright", &feed.copyright)?;
    if let Some(editor) = feed.author.as_ref().and_then(rss_person) {
        w.text("managingEditor", &editor)?;
    }
    if let Some(ts) = feed.created {
        w.text("pubDate", &ts.to_rfc2822())?;
    }
    if let Some(ts) = feed.updated {
        w.text("lastBuildDate", &ts.to_rfc2822())?;
    }
    if let Some(image) = &feed.image {
        w.open("image", &[])?;
        w.text("url", &image.url)?;
        w.text("title", &image.title)?;
        w.text("link", link)?;
        w.close("image")?;
    }

    for item in &feed.items {
        write_item(&mut w, item)?;
    }

    w.close("channel")?;
    w.close("rss")?;
    Ok(w.finish())
}

fn write_item(w: &mut XmlWriter, item: &CanonicalItem) -> Result<(), SerializeError> {
    w.open("item", &[])?;
    w.text("title", &item.title)?;
    w.text_opt("link", &item.link.href)?;
    w.text("description", &item.description)?;
    if !item.content.is_empty() {
        w.cdata("content:encoded", &item.content)?;
    }
    if let Some(author) = item.author.as_ref().and_then(rss_person) {
        w.text("author", &author)?;
    }
    if let Some(category) = &item.category {
        w.text("category", category)?;
    }
    if let Some(enc) = &item.enclosure {
        let length = enc.length.unwrap_or(0).to_string();
        w.empty(
            "enclosure",
            &[
                ("url", enc.url.as_str()),
                ("length", length.as_str()),
                ("type", enc.mime_type.as_str()),
            ],
        )?;
    }
    if !item.id.is_empty() {
        let permalink = if item.id == item.link.href { "true" } else { "false" };
        w.text_with("guid", &[("isPermaLink", permalink)], &item.id)?;
    }
    if let Some(ts) = item.created.or(item.updated) {
        w.text("pubDate", &ts.to_rfc2822())?;
    }
    w.close("item")
}
