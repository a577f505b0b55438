//! Metadata codec: flat record keys vs. the structured metadata set.
//!
//! The document store keeps metadata as flat `(name, value)` records where
//! `name` follows the grammar `(?:{NAMESPACE})?KEYWORD(?:[SCHEME])?`. The
//! archive keeps the same data as a nested namespace → keyword → scheme →
//! values structure. This module converts between the two and injects the
//! required default values on export.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Dublin Core namespace used for the well-known bibliographic keywords.
pub const DC: &str = "http://purl.org/dc/elements/1.1/";

/// FLOSS Manuals extension namespace.
pub const FM: &str = "http://booki.cc/";

/// Timestamp format used for metadata date values.
pub const TIMESTAMP_FORMAT: &str = "%Y.%m.%d-%H.%M";

/// Values this long (in code points) are stored as text blobs rather than
/// strings. A storage-efficiency distinction only, not a semantic one.
const TEXT_KIND_THRESHOLD: usize = 2500;

/// Storage kind of a metadata value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    String,
    Text,
}

/// Classify a value by the storage policy.
pub fn value_kind(value: &str) -> ValueKind {
    if value.chars().count() >= TEXT_KIND_THRESHOLD {
        ValueKind::Text
    } else {
        ValueKind::String
    }
}

/// Split a flat record key into `(namespace, keyword, scheme)`.
///
/// Namespace and scheme are empty when absent. A key that does not match the
/// grammar at all is treated as a bare keyword.
pub fn parse_key(key: &str) -> (String, String, String) {
    let (namespace, rest) = match key.strip_prefix('{') {
        Some(stripped) => match stripped.find('}') {
            Some(i) => (&stripped[..i], &stripped[i + 1..]),
            None => ("", key),
        },
        None => ("", key),
    };

    let (keyword, scheme) = if rest.ends_with(']') {
        match rest.rfind('[') {
            // The keyword part is required, so "[x]" alone is a bare keyword.
            Some(i) if i > 0 => (&rest[..i], &rest[i + 1..rest.len() - 1]),
            _ => (rest, ""),
        }
    } else {
        (rest, "")
    };

    if keyword.is_empty() {
        return (String::new(), key.to_string(), String::new());
    }
    (namespace.to_string(), keyword.to_string(), scheme.to_string())
}

/// Build a flat record key from `(namespace, keyword, scheme)`, omitting the
/// delimiters for empty namespace/scheme.
pub fn format_key(namespace: &str, keyword: &str, scheme: &str) -> String {
    let mut key = String::with_capacity(namespace.len() + keyword.len() + scheme.len() + 4);
    if !namespace.is_empty() {
        key.push('{');
        key.push_str(namespace);
        key.push('}');
    }
    key.push_str(keyword);
    if !scheme.is_empty() {
        key.push('[');
        key.push_str(scheme);
        key.push(']');
    }
    key
}

/// Structured metadata: namespace → keyword → scheme → ordered values.
///
/// Serializes directly as the `metadata` object of `info.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetadataSet(BTreeMap<String, BTreeMap<String, BTreeMap<String, Vec<String>>>>);

impl MetadataSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `value` to the `(namespace, keyword, scheme)` bucket, creating
    /// intermediate maps as needed. Value order within a bucket is preserved.
    pub fn add(&mut self, keyword: &str, value: &str, namespace: &str, scheme: &str) {
        self.0
            .entry(namespace.to_string())
            .or_default()
            .entry(keyword.to_string())
            .or_default()
            .entry(scheme.to_string())
            .or_default()
            .push(value.to_string());
    }

    /// Values in the `(namespace, keyword, scheme)` bucket, or empty if the
    /// bucket is absent.
    pub fn get(&self, keyword: &str, namespace: &str, scheme: &str) -> &[String] {
        self.0
            .get(namespace)
            .and_then(|keywords| keywords.get(keyword))
            .and_then(|schemes| schemes.get(scheme))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Append `value` only if the bucket is currently empty.
    pub fn add_default(&mut self, keyword: &str, value: &str, namespace: &str, scheme: &str) {
        if self.get(keyword, namespace, scheme).is_empty() {
            self.add(keyword, value, namespace, scheme);
        }
    }

    /// Iterate every `(namespace, keyword, scheme, value)` tuple.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &str, &str)> {
        self.0.iter().flat_map(|(namespace, keywords)| {
            keywords.iter().flat_map(move |(keyword, schemes)| {
                schemes.iter().flat_map(move |(scheme, values)| {
                    values.iter().map(move |value| {
                        (
                            namespace.as_str(),
                            keyword.as_str(),
                            scheme.as_str(),
                            value.as_str(),
                        )
                    })
                })
            })
        })
    }

    /// Decode a sequence of flat `(name, value)` records into a set.
    pub fn from_records<'a>(records: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut set = Self::new();
        for (name, value) in records {
            let (namespace, keyword, scheme) = parse_key(name);
            set.add(&keyword, value, &namespace, &scheme);
        }
        set
    }
}

/// Inputs for export-time default injection.
pub struct DefaultContext<'a> {
    pub publisher: &'a str,
    pub server_host: &'a str,
    pub title: &'a str,
    pub slug: &'a str,
    pub created: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub now: DateTime<Utc>,
}

/// Inject the required default values, each only if its bucket is empty.
pub fn inject_defaults(set: &mut MetadataSet, ctx: &DefaultContext<'_>) {
    let created = ctx.created.format(TIMESTAMP_FORMAT).to_string();
    let last_modified = ctx.last_modified.format(TIMESTAMP_FORMAT).to_string();
    let now = ctx.now.format(TIMESTAMP_FORMAT).to_string();
    let origin = format!("http://{}/{}/{}", ctx.server_host, ctx.slug, now);

    let defaults: [(&str, &str, &str); 8] = [
        ("publisher", "", ctx.publisher),
        ("language", "", "en"),
        ("creator", "", "The Contributors"),
        ("title", "", ctx.title),
        ("date", "start", &created),
        ("date", "last-modified", &last_modified),
        ("date", "published", &now),
        ("identifier", "archive-origin", &origin),
    ];
    for (keyword, scheme, value) in defaults {
        set.add_default(keyword, value, DC, scheme);
    }
}
