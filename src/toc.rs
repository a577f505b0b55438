//! Table-of-contents conversion between the archive's nested tree and the
//! store's flat ordered sequence.
//!
//! The archive carries a nested TOC; the store keeps a single flat list of
//! weighted entries. Flattening is a lossy depth-first projection (only a
//! section flag survives, not depth); the tree written on export is a
//! reconstruction limited to one level of section containment.

use serde::{Deserialize, Serialize};

/// `type` value marking a section header node.
pub const SECTION_TYPE: &str = "booki-section";

/// `type` value marking an ordinary chapter node.
pub const CHAPTER_TYPE: &str = "chapter";

/// One node of the nested TOC tree as it appears in `info.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TocNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TocNode>,
}

impl TocNode {
    /// A chapter leaf pointing at a content entry.
    pub fn chapter(title: impl Into<String>, url: impl Into<String>) -> Self {
        TocNode {
            title: Some(title.into()),
            url: Some(url.into()),
            kind: Some(CHAPTER_TYPE.to_string()),
            role: Some("text".to_string()),
            children: Vec::new(),
        }
    }

    /// A section header with no content of its own.
    pub fn section(title: impl Into<String>) -> Self {
        TocNode {
            title: Some(title.into()),
            url: Some(String::new()),
            kind: Some(SECTION_TYPE.to_string()),
            role: None,
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<TocNode>) -> Self {
        self.children = children;
        self
    }
}

/// One entry of the flattened TOC, in reading order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatEntry {
    pub title: String,
    pub url: String,
    pub is_section: bool,
}

/// Flatten a nested TOC tree into reading order, depth-first pre-order.
///
/// A node is emitted before its children; siblings keep their given order.
/// Hierarchy depth beyond the section flag is discarded.
pub fn flatten_toc(nodes: &[TocNode]) -> Vec<FlatEntry> {
    let mut entries = Vec::new();
    walk(nodes, &mut entries);
    entries
}

fn walk(nodes: &[TocNode], entries: &mut Vec<FlatEntry>) {
    for node in nodes {
        entries.push(FlatEntry {
            title: node
                .title
                .clone()
                .unwrap_or_else(|| "Missing title".to_string()),
            url: node.url.clone().unwrap_or_else(|| "Missing URL".to_string()),
            is_section: node.kind.as_deref() == Some(SECTION_TYPE),
        });
        walk(&node.children, entries);
    }
}

/// Rebuilds the (two-level) TOC tree while the export walks the stored
/// entries in reading order.
///
/// A section header opens a new child list; every chapter after it lands in
/// that list until the next section. Sections have no content and thus no
/// URL of their own, so each one waits for the next chapter and borrows its
/// filename. Several consecutive empty sections all borrow the same one.
#[derive(Debug, Default)]
pub struct TocBuilder {
    top: Vec<TocNode>,
    /// Index into `top` of the section currently receiving chapters.
    current: Option<usize>,
    /// Indices into `top` of sections still waiting for a URL.
    awaiting_url: Vec<usize>,
}

impl TocBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chapter leaf and satisfy any sections waiting for a URL.
    pub fn push_chapter(&mut self, title: &str, filename: &str) {
        let node = TocNode::chapter(title, filename);
        match self.current {
            Some(i) => self.top[i].children.push(node),
            None => self.top.push(node),
        }
        while let Some(i) = self.awaiting_url.pop() {
            self.top[i].url = Some(filename.to_string());
        }
    }

    /// Open a new top-level section; subsequent chapters become its children.
    pub fn push_section(&mut self, title: &str) {
        self.top.push(TocNode::section(title));
        let index = self.top.len() - 1;
        self.current = Some(index);
        self.awaiting_url.push(index);
    }

    /// The reconstructed tree. Sections with no following chapter keep an
    /// empty URL.
    pub fn finish(self) -> Vec<TocNode> {
        self.top
    }
}
