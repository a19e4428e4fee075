// src/model.rs
//! Format-agnostic feed model shared by the mapper and every sink.
//!
//! Optional fields are explicit `Option`s; nested value objects are owned by
//! exactly one feed or item.

use crate::source::Timestamp;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Link {
    pub href: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Author {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Enclosure {
    pub url: String,
    pub length: Option<u64>,
    pub mime_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Image {
    pub url: String,
    pub title: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanonicalItem {
    pub title: String,
    /// Always present; `href` is empty when the source item had no link.
    pub link: Link,
    pub description: String,
    pub id: String,
    pub content: String,
    pub author: Option<Author>,
    pub created: Option<Timestamp>,
    pub updated: Option<Timestamp>,
    pub enclosure: Option<Enclosure>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanonicalFeed {
    pub title: String,
    pub description: String,
    pub copyright: String,
    pub link: Option<Link>,
    pub author: Option<Author>,
    pub image: Option<Image>,
    pub created: Option<Timestamp>,
    pub updated: Option<Timestamp>,
    pub items: Vec<CanonicalItem>,
}

impl CanonicalFeed {
    /// Append an item; source order is preserved.
    pub fn add(&mut self, item: CanonicalItem) {
        self.items.push(item);
    }

    /// Most recent timestamp on the feed or any item, used by sinks that
    /// require a feed-level `updated`.
    pub fn latest_timestamp(&self) -> Option<Timestamp> {
        self.items
            .iter()
            .flat_map(|it| [it.updated, it.created])
            .chain([self.updated, self.created])
            .flatten()
            .max()
    }
}
