// src/sink/atom.rs
use super::XmlWriter;
use crate::error::SerializeError;
use crate::model::{Author, CanonicalFeed, CanonicalItem};
use crate::source::Timestamp;

const ATOM_NS: &str = "http://www.w3.org/2005/Atom";

/// Prefix for ids minted when the feed carries neither an id nor a link.
const TAG_PREFIX: &str = "tag:feedfilter,2024:";

/// Atom 1.0. Text constructs are written as `type="html"` so markup in
/// descriptions survives as escaped text.
pub fn write(feed: &CanonicalFeed) -> Result<Vec<u8>, SerializeError> {
    let mut w = XmlWriter::new("Atom");
    w.decl()?;
    w.open("feed", &[("xmlns", ATOM_NS)])?;

    w.text("title", &feed.title)?;
    let link = feed.link.as_ref().map(|l| l.href.as_str()).unwrap_or_default();
    // Atom requires both <id> and <updated> on the feed and on every entry.
    let feed_id = if link.is_empty() {
        format!("{TAG_PREFIX}{}", slug(&feed.title))
    } else {
        link.to_string()
    };
    let updated = feed
        .updated
        .or(feed.created)
        .or_else(|| feed.latest_timestamp())
        .unwrap_or_else(|| chrono::Utc::now().fixed_offset());
    w.text("id", &feed_id)?;
    w.text("updated", &updated.to_rfc3339())?;
    w.text_opt("subtitle", &feed.description)?;
    if !link.is_empty() {
        w.empty("link", &[("href", link), ("rel", "alternate")])?;
    }
    w.text_opt("rights", &feed.copyright)?;
    if let Some(author) = &feed.author {
        write_author(&mut w, author)?;
    }
    if let Some(image) = &feed.image {
        w.text_opt("logo", &image.url)?;
    }

    for (index, item) in feed.items.iter().enumerate() {
        let fallback_id = format!("{feed_id}#entry-{index}");
        write_entry(&mut w, item, &fallback_id, updated)?;
    }

    w.close("feed")?;
    Ok(w.finish())
}

fn write_entry(
    w: &mut XmlWriter,
    item: &CanonicalItem,
    fallback_id: &str,
    feed_updated: Timestamp,
) -> Result<(), SerializeError> {
    w.open("entry", &[])?;
    w.text("title", &item.title)?;
    let id = [item.id.as_str(), item.link.href.as_str()]
        .into_iter()
        .find(|s| !s.is_empty())
        .unwrap_or(fallback_id);
    w.text("id", id)?;
    let updated = item.updated.or(item.created).unwrap_or(feed_updated);
    w.text("updated", &updated.to_rfc3339())?;
    if let Some(ts) = item.created {
        w.text("published", &ts.to_rfc3339())?;
    }
    if !item.link.href.is_empty() {
        w.empty("link", &[("href", item.link.href.as_str()), ("rel", "alternate")])?;
    }
    if let Some(enc) = &item.enclosure {
        let length = enc.length.map(|l| l.to_string());
        let mut attrs = vec![
            ("href", enc.url.as_str()),
            ("rel", "enclosure"),
            ("type", enc.mime_type.as_str()),
        ];
        if let Some(length) = &length {
            attrs.push(("length", length.as_str()));
        }
        w.empty("link", &attrs)?;
    }
    if !item.description.is_empty() {
        w.text_with("summary", &[("type", "html")], &item.description)?;
    }
    if !item.content.is_empty() {
        w.text_with("content", &[("type", "html")], &item.content)?;
    }
    if let Some(author) = &item.author {
        write_author(w, author)?;
    }
    if let Some(category) = &item.category {
        w.empty("category", &[("term", category.as_str())])?;
    }
    w.close("entry")
}

fn slug(title: &str) -> String {
    let slug: String = title
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "feed".to_string()
    } else {
        slug.to_string()
    }
}

fn write_author(w: &mut XmlWriter, author: &Author) -> Result<(), SerializeError> {
    if author.name.is_empty() && author.email.is_empty() {
        return Ok(());
    }
    w.open("author", &[])?;
    w.text("name", &author.name)?;
    w.text_opt("email", &author.email)?;
    w.close("author")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Link;
    use chrono::DateTime;

    #[test]
    fn writes_entries_that_read_back() {
        let ts = DateTime::parse_from_rfc3339("2024-05-01T09:00:00+02:00").unwrap();
        let feed = CanonicalFeed {
            title: "Atom out".into(),
            link: Some(Link {
                href: "https://example.com/".into(),
            }),
            items: vec![CanonicalItem {
                title: "Entry".into(),
                link: Link {
                    href: "https://example.com/e".into(),
                },
                description: "<b>bold</b>".into(),
                created: Some(ts),
                category: Some("news".into()),
                author: Some(Author {
                    name: "Writer".into(),
                    email: String::new(),
                }),
                ..Default::default()
            }],
            ..Default::default()
        };

        let xml = String::from_utf8(write(&feed).unwrap()).unwrap();
        assert!(xml.contains(r#"<feed xmlns="http://www.w3.org/2005/Atom">"#), "{xml}");
        assert!(xml.contains("<updated>2024-05-01T09:00:00+02:00</updated>"), "{xml}");
        assert!(xml.contains(r#"<summary type="html">&lt;b&gt;bold&lt;/b&gt;</summary>"#), "{xml}");

        let back = crate::source::atom::parse(&xml).unwrap();
        assert_eq!(back.title, "Atom out");
        let entry = &back.items[0];
        assert_eq!(entry.description, "<b>bold</b>");
        assert_eq!(entry.guid, "https://example.com/e");
        assert_eq!(entry.categories, vec!["news"]);
        assert_eq!(entry.published, Some(ts));
    }

    #[test]
    fn bare_items_still_get_id_and_updated() {
        let ts = DateTime::parse_from_rfc3339("2024-06-01T12:00:00Z").unwrap();
        let feed = CanonicalFeed {
            title: "No Links Here".into(),
            items: vec![
                CanonicalItem {
                    title: "first".into(),
                    ..Default::default()
                },
                CanonicalItem {
                    title: "second".into(),
                    updated: Some(ts),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };

        let xml = String::from_utf8(write(&feed).unwrap()).unwrap();
        assert!(xml.contains("<id>tag:feedfilter,2024:no-links-here</id>"), "{xml}");
        assert!(xml.contains("<id>tag:feedfilter,2024:no-links-here#entry-0</id>"), "{xml}");
        assert!(xml.contains("<id>tag:feedfilter,2024:no-links-here#entry-1</id>"), "{xml}");
        // Feed and both entries fall back to the newest item timestamp.
        assert_eq!(xml.matches("<updated>2024-06-01T12:00:00+00:00</updated>").count(), 3, "{xml}");

        // Same input, same ids.
        assert_eq!(write(&feed).unwrap(), write(&feed).unwrap());
    }

    #[test]
    fn feed_without_any_timestamp_still_has_updated() {
        let feed = CanonicalFeed {
            title: "Empty".into(),
            items: vec![CanonicalItem::default()],
            ..Default::default()
        };
        let xml = String::from_utf8(write(&feed).unwrap()).unwrap();
        assert_eq!(xml.matches("<updated>").count(), 2, "{xml}");
        assert_eq!(xml.matches("<id>").count(), 2, "{xml}");
    }
}
