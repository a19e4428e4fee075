// src/mapper.rs
//! Source → canonical mapping.
//!
//! Pure functions only: nothing here fails, fetches, or reorders. Title and
//! description of the feed go through [`render_template`]; singular
//! canonical fields fed from multi-valued source fields go through
//! [`first_wins`].

use serde::Deserialize;

use crate::model::{Author, CanonicalFeed, CanonicalItem, Enclosure, Image, Link};
use crate::source::{SourceAuthor, SourceEnclosure, SourceFeed, SourceItem};

/// Token replaced by the source value in meta templates.
pub const ORIG_PLACEHOLDER: &str = "$$ORIG$$";

/// Replace every `$$ORIG$$` in `template` with `original`.
pub fn render_template(template: &str, original: &str) -> String {
    template.replace(ORIG_PLACEHOLDER, original)
}

/// Collapse a multi-valued source field into a singular canonical one:
/// the first element if there is one, otherwise absent.
pub fn first_wins<T, U>(values: &[T], convert: impl FnOnce(&T) -> U) -> Option<U> {
    values.first().map(convert)
}

/// Feed metadata overrides from the `meta` config section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MetaTemplates {
    pub title: String,
    pub description: String,
    /// Replaces the source link when non-empty. No placeholder substitution.
    pub link: String,
}

impl Default for MetaTemplates {
    fn default() -> Self {
        Self {
            title: ORIG_PLACEHOLDER.to_string(),
            description: ORIG_PLACEHOLDER.to_string(),
            link: String::new(),
        }
    }
}

impl MetaTemplates {
    /// Empty templates mean "keep the source value".
    pub fn normalized(mut self) -> Self {
        if self.title.is_empty() {
            self.title = ORIG_PLACEHOLDER.to_string();
        }
        if self.description.is_empty() {
            self.description = ORIG_PLACEHOLDER.to_string();
        }
        self
    }
}

/// Feed-level metadata only; items are appended with [`CanonicalFeed::add`].
pub fn map_feed(source: &SourceFeed, meta: &MetaTemplates) -> CanonicalFeed {
    let title_tpl = non_empty_or_orig(&meta.title);
    let description_tpl = non_empty_or_orig(&meta.description);

    let link = if !meta.link.is_empty() {
        Some(meta.link.clone())
    } else if !source.link.is_empty() {
        Some(source.link.clone())
    } else {
        None
    };

    CanonicalFeed {
        title: render_template(title_tpl, &source.title),
        description: render_template(description_tpl, &source.description),
        copyright: source.copyright.clone(),
        link: link.map(|href| Link { href }),
        author: first_wins(&source.authors, author),
        image: source.image.as_ref().map(|img| Image {
            url: img.url.clone(),
            title: img.title.clone(),
        }),
        created: source.published,
        updated: source.updated,
        items: Vec::new(),
    }
}

pub fn map_item(source: &SourceItem) -> CanonicalItem {
    CanonicalItem {
        title: source.title.clone(),
        link: Link {
            href: source.link.clone(),
        },
        description: source.description.clone(),
        id: source.guid.clone(),
        content: source.content.clone(),
        author: first_wins(&source.authors, author),
        created: source.published,
        updated: source.updated,
        enclosure: first_wins(&source.enclosures, enclosure),
        category: first_wins(&source.categories, String::clone),
    }
}

fn non_empty_or_orig(template: &str) -> &str {
    if template.is_empty() {
        ORIG_PLACEHOLDER
    } else {
        template
    }
}

fn author(a: &SourceAuthor) -> Author {
    Author {
        name: a.name.clone(),
        email: a.email.clone(),
    }
}

fn enclosure(e: &SourceEnclosure) -> Enclosure {
    Enclosure {
        url: e.url.clone(),
        length: e.length,
        mime_type: e.mime_type.clone(),
    }
}
