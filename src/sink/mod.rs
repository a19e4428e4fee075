// src/sink/mod.rs
//! Serializers from the canonical model to concrete output formats.
//!
//! Every sink renders into memory; the caller decides where the bytes go.

pub mod atom;
pub mod json_feed;
pub mod rss;

use std::fmt;
use std::str::FromStr;

use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use serde::Deserialize;

use crate::error::SerializeError;
use crate::model::{Author, CanonicalFeed};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Json,
    Rss,
    Atom,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 3] = [OutputFormat::Json, OutputFormat::Rss, OutputFormat::Atom];

    pub fn as_str(self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Rss => "rss",
            OutputFormat::Atom => "atom",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown output format {0:?} (expected json, rss or atom)")]
pub struct UnknownFormat(pub String);

impl FromStr for OutputFormat {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OutputFormat::ALL
            .into_iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownFormat(s.to_string()))
    }
}

/// Render `feed` in `format`.
pub fn serialize(feed: &CanonicalFeed, format: OutputFormat) -> Result<Vec<u8>, SerializeError> {
    match format {
        OutputFormat::Json => json_feed::write(feed),
        OutputFormat::Rss => rss::write(feed),
        OutputFormat::Atom => atom::write(feed),
    }
}

/// Thin wrapper over quick-xml's writer that maps its errors once.
pub(crate) struct XmlWriter {
    inner: Writer<Vec<u8>>,
    format: &'static str,
}

impl XmlWriter {
    pub(crate) fn new(format: &'static str) -> Self {
        Self {
            inner: Writer::new_with_indent(Vec::new(), b' ', 2),
            format,
        }
    }

    fn write(&mut self, event: Event<'_>) -> Result<(), SerializeError> {
        let format = self.format;
        self.inner
            .write_event(event)
            .map_err(|e| xml_error(format, e))
    }

    pub(crate) fn decl(&mut self) -> Result<(), SerializeError> {
        self.write(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
    }

    pub(crate) fn open(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), SerializeError> {
        let mut start = BytesStart::new(name);
        for attr in attrs {
            start.push_attribute(*attr);
        }
        self.write(Event::Start(start))
    }

    pub(crate) fn close(&mut self, name: &str) -> Result<(), SerializeError> {
        self.write(Event::End(BytesEnd::new(name)))
    }

    pub(crate) fn empty(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), SerializeError> {
        let mut start = BytesStart::new(name);
        for attr in attrs {
            start.push_attribute(*attr);
        }
        self.write(Event::Empty(start))
    }

    /// `<name attrs>text</name>`, text escaped.
    pub(crate) fn text_with(
        &mut self,
        name: &str,
        attrs: &[(&str, &str)],
        text: &str,
    ) -> Result<(), SerializeError> {
        self.open(name, attrs)?;
        self.write(Event::Text(BytesText::new(text)))?;
        self.close(name)
    }

    pub(crate) fn text(&mut self, name: &str, text: &str) -> Result<(), SerializeError> {
        self.text_with(name, &[], text)
    }

    /// Like [`Self::text`] but skipped entirely for empty text.
    pub(crate) fn text_opt(&mut self, name: &str, text: &str) -> Result<(), SerializeError> {
        if text.is_empty() {
            return Ok(());
        }
        self.text(name, text)
    }

    /// Markup-heavy bodies go out as CDATA. A literal `]]>` cannot live in a
    /// CDATA section, so those fall back to escaped text.
    pub(crate) fn cdata(&mut self, name: &str, text: &str) -> Result<(), SerializeError> {
        if text.contains("]]>") {
            return self.text(name, text);
        }
        self.open(name, &[])?;
        self.write(Event::CData(BytesCData::new(text)))?;
        self.close(name)
    }

    pub(crate) fn finish(self) -> Vec<u8> {
        let mut out = self.inner.into_inner();
        out.push(b'\n');
        out
    }
}

fn xml_error(format: &'static str, err: impl fmt::Display) -> SerializeError {
    SerializeError::Xml {
        format,
        message: err.to_string(),
    }
}

/// RSS-style person: `email (name)`, or whichever half exists.
pub(crate) fn rss_person(author: &Author) -> Option<String> {
    match (author.email.is_empty(), author.name.is_empty()) {
        (false, false) => Some(format!("{} ({})", author.email, author.name)),
        (false, true) => Some(author.email.clone()),
        (true, false) => Some(author.name.clone()),
        (true, true) => None,
    }
}
