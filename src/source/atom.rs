// src/source/atom.rs
//! Atom 1.0 reader.

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
    let mut entry: Option<SourceItem> = None;
    let mut path: Vec<String> = Vec::new();
    let mut text = String::new();
    // Depth of an open `type="xhtml"` text construct; its markup is flattened
    // into plain text.
    let mut xhtml_at: Option<usize> = None;
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let pos = reader.buffer_position() as u64;
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = local_name(e.name().as_ref());
                if xhtml_at.is_none() {
                    text.clear();
                    match name.as_str() {
                        "entry" => entry = Some(SourceItem::default()),
                        "author" => authors_of(&mut feed, &mut entry).push(SourceAuthor::default()),
                        "link" | "category" => element_attrs(&mut feed, &mut entry, &name, &e),
                        "title" | "subtitle" | "summary" | "content" | "rights"
                            if attr(&e, b"type").as_deref() == Some("xhtml") =>
                        {
                            xhtml_at = Some(path.len());
                        }
                        _ => {}
                    }
                }
                path.push(name);
            }
            Ok(Event::Empty(e)) => {
                if xhtml_at.is_none() {
                    let name = local_name(e.name().as_ref());
                    element_attrs(&mut feed, &mut entry, &name, &e);
                }
            }
            Ok(Event::Text(e)) => {
                let chunk = e.unescape().map_err(|err| ParseError::xml(pos, err))?;
                if xhtml_at.is_some() && !text.is_empty() {
                    text.push(' ');
                }
                text.push_str(&chunk);
            }
            Ok(Event::CData(e)) => text.push_str(&String::from_utf8_lossy(&e)),
            Ok(Event::End(_)) => {
                let name = path.pop().unwrap_or_default();
                if let Some(depth) = xhtml_at {
                    if path.len() > depth {
                        continue;
                    }
                    xhtml_at = None;
                }
                let value = std::mem::take(&mut text).trim().to_string();
                let parent = path.last().map(String::as_str).unwrap_or_default();

                match (parent, name.as_str()) {
                    (_, "entry") => {
                        if let Some(it) = entry.take() {
                            feed.items.push(it);
                        }
                    }
                    ("author", "name") => {
                        if let Some(a) = authors_of(&mut feed, &mut entry).last_mut() {
                            a.name = value;
                        }
                    }
                    ("author", "email") => {
                        if let Some(a) = authors_of(&mut feed, &mut entry).last_mut() {
                            a.email = value;
                        }
                    }
                    ("entry", field) => {
                        if let Some(it) = entry.as_mut() {
                            entry_field(it, field, value);
                        }
                    }
                    ("feed", field) => feed_field(&mut feed, field, value),
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ParseError::xml(pos, e)),
            _ => {}
        }
    }

    // Drop authors that never got a name or address.
    feed.authors.retain(|a| !a.name.is_empty() || !a.email.is_empty());
    for it in &mut feed.items {
        it.authors.retain(|a| !a.name.is_empty() || !a.email.is_empty());
    }
    Ok(feed)
}

fn authors_of<'a>(feed: &'a mut SourceFeed, entry: &'a mut Option<SourceItem>) -> &'a mut Vec<SourceAuthor> {
    match entry {
        Some(it) => &mut it.authors,
        None => &mut feed.authors,
    }
}

fn entry_field(it: &mut SourceItem, name: &str, value: String) {
    match name {
        "title" => it.title = value,
        "id" => it.guid = value,
        "summary" => it.description = value,
        "content" => it.content = value,
        "published" | "issued" => it.published = parse_timestamp(&value),
        "updated" | "modified" => it.updated = parse_timestamp(&value),
        _ => {}
    }
}

fn feed_field(feed: &mut SourceFeed, name: &str, value: String) {
    match name {
        "title" => feed.title = value,
        "subtitle" | "tagline" => feed.description = value,
        "rights" | "copyright" => feed.copyright = value,
        "updated" | "modified" => feed.updated = parse_timestamp(&value),
        "published" => feed.published = parse_timestamp(&value),
        // Prefer the wide logo over the square icon.
        "logo" | "icon" if !value.is_empty() => {
            if name == "logo" || feed.image.is_none() {
                feed.image = Some(SourceImage {
                    url: value,
                    title: String::new(),
                });
            }
        }
        _ => {}
    }
}

/// `<link>` and `<category>` carry their data in attributes.
fn element_attrs(
    feed: &mut SourceFeed,
    entry: &mut Option<SourceItem>,
    name: &str,
    e: &BytesStart<'_>,
) {
    match name {
        "link" => {
            let href = attr(e, b"href").unwrap_or_default();
            if href.is_empty() {
                return;
            }
            match attr(e, b"rel").as_deref() {
                None | Some("alternate") => {
                    let link = match entry.as_mut() {
                        Some(it) => &mut it.link,
                        None => &mut feed.link,
                    };
                    if link.is_empty() {
                        *link = href;
                    }
                }
                Some("enclosure") => {
                    if let Some(it) = entry.as_mut() {
                        it.enclosures.push(SourceEnclosure {
                            url: href,
                            length: attr(e, b"length").and_then(|l| l.trim().parse().ok()),
                            mime_type: attr(e, b"type").unwrap_or_default(),
                        });
                    }
                }
                _ => {}
            }
        }
        "category" => {
            if let Some(it) = entry.as_mut() {
                if let Some(term) = attr(e, b"term").filter(|t| !t.is_empty()) {
                    it.categories.push(term);
                }
            }
        }
        _ => {}
    }
}

fn attr(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}
