//! Tiddlers: immutable-per-version content records.

use crate::Title;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A uniquely titled record of text, content type and metadata fields
///
/// Records are values: editing one means building a new `Tiddler` and adding it
/// to the store under the same title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tiddler {
    title: Title,

    #[serde(default)]
    text: String,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    content_type: Option<String>,

    /// Kept ordered by field name, so iteration and serialized output do
    /// not depend on the order fields were set in
    #[serde(default)]
    fields: BTreeMap<String, String>,
}

impl Tiddler {
    pub fn new(title: impl Into<Title>, text: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            text: text.into(),
            content_type: None,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn with_tags<I, S>(self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tags = format_tags(tags);
        self.with_field("tags", tags)
    }

    pub fn with_modified(self, modified: DateTime<Utc>) -> Self {
        self.with_field("modified", TiddlerDate(modified).to_string())
    }

    pub fn title(&self) -> &Title {
        &self.title
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Look up a field by name
    ///
    /// `title`, `text` and `type` resolve to the record's core attributes so
    /// that field-referencing macros can treat every attribute uniformly.
    pub fn field(&self, name: &str) -> Option<&str> {
        match name {
            "title" => Some(self.title.as_str()),
            "text" => Some(&self.text),
            "type" => self.content_type.as_deref(),
            other => self.fields.get(other).map(String::as_str),
        }
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    pub fn tags(&self) -> Vec<String> {
        self.fields.get("tags").map(|s| parse_tags(s)).unwrap_or_default()
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags().iter().any(|t| t == tag)
    }

    pub fn modified(&self) -> Option<DateTime<Utc>> {
        self.fields
            .get("modified")
            .and_then(|s| s.parse::<TiddlerDate>().ok())
            .map(|d| d.0)
    }
}

/// Parse a tag list such as `[[multi word]] single other`
pub fn parse_tags(input: &str) -> Vec<String> {
    let mut tags = Vec::new();
    let mut rest = input.trim_start();

    while !rest.is_empty() {
        if let Some(bracketed) = rest.strip_prefix("[[") {
            match bracketed.find("]]") {
                Some(end) => {
                    tags.push(bracketed[..end].to_string());
                    rest = &bracketed[end + 2..];
                }
                None => {
                    tags.push(bracketed.to_string());
                    rest = "";
                }
            }
        } else {
            let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
            tags.push(rest[..end].to_string());
            rest = &rest[end..];
        }
        rest = rest.trim_start();
    }

    tags.retain(|t| !t.is_empty());
    tags
}

/// Inverse of [`parse_tags`]: bracket any tag containing whitespace
pub fn format_tags<I, S>(tags: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tags.into_iter()
        .map(|tag| {
            let tag = tag.as_ref();
            if tag.contains(char::is_whitespace) {
                format!("[[{}]]", tag)
            } else {
                tag.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Timestamp in the compact `YYYYMMDDHHmmssSSS` field format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TiddlerDate(pub DateTime<Utc>);

impl fmt::Display for TiddlerDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y%m%d%H%M%S%3f"))
    }
}

impl FromStr for TiddlerDate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() < 12 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(format!("invalid date field: {s:?}"));
        }

        let num = |range: std::ops::Range<usize>| -> u32 {
            s.get(range).and_then(|p| p.parse().ok()).unwrap_or(0)
        };

        let year = num(0..4) as i32;
        let date = NaiveDate::from_ymd_opt(year, num(4..6), num(6..8))
            .and_then(|d| d.and_hms_milli_opt(num(8..10), num(10..12), num(12..14), num(14..17)))
            .ok_or_else(|| format!("invalid date field: {s:?}"))?;

        Ok(TiddlerDate(date.and_utc()))
    }
}
