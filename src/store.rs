//! Internal document model and the persistence collaborator.
//!
//! The pipeline never talks to a database directly; it drives a
//! [`DocumentStore`]. [`MemoryStore`] is the bundled implementation, enough
//! for the CLI, tests, and callers that keep documents in memory.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::metadata::{self, ValueKind};

/// A book: owns all chapters, TOC entries, attachments, and metadata records
/// for its current version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub id: u64,
    /// Unique human title.
    pub title: String,
    /// URL-safe slug derived from the title.
    pub slug: String,
    pub owner: String,
    pub status: String,
    pub created: DateTime<Utc>,
    /// Current version identifier.
    pub version: u64,
}

/// One chapter of a document version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    pub id: u64,
    pub version: u64,
    /// Slug unique within the version.
    pub slug: String,
    pub title: String,
    /// HTML content, store layout (attachments addressed as `../static/…`).
    pub content: String,
    pub status: String,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

/// One entry of the flat stored TOC.
///
/// Weights are unique within a version and totally order all entries;
/// larger weight means earlier in reading order. Entries referencing a
/// chapter carry its id; section headers carry none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocRecord {
    pub id: u64,
    pub version: u64,
    pub name: String,
    pub weight: i64,
    pub chapter: Option<u64>,
}

impl TocRecord {
    pub fn is_section(&self) -> bool {
        self.chapter.is_none()
    }
}

/// A stored binary payload, not tied to any specific chapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub id: u64,
    pub version: u64,
    /// Original filename (base name only).
    pub filename: String,
}

/// A flat metadata record; `name` follows the codec grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataRecord {
    pub id: u64,
    pub document: u64,
    pub name: String,
    pub value: String,
    pub kind: ValueKind,
}

/// Persistence collaborator consumed by the import and export orchestrators.
///
/// Ordered accessors return records in stable insertion order; the export
/// orchestrator applies its own weight ordering on top.
pub trait DocumentStore {
    fn create_document(
        &mut self,
        owner: &str,
        title: &str,
        slug: &str,
        status: &str,
    ) -> Result<Document>;

    fn title_exists(&self, title: &str) -> bool;

    fn save_chapter(
        &mut self,
        version: u64,
        slug: &str,
        title: &str,
        content: String,
        status: &str,
    ) -> Result<Chapter>;

    fn save_toc_entry(
        &mut self,
        version: u64,
        name: &str,
        weight: i64,
        chapter: Option<u64>,
    ) -> Result<TocRecord>;

    fn save_attachment(&mut self, version: u64, filename: &str, data: Vec<u8>)
    -> Result<Attachment>;

    fn save_metadata_record(
        &mut self,
        document: u64,
        name: &str,
        value: &str,
    ) -> Result<MetadataRecord>;

    fn chapter(&self, id: u64) -> Result<&Chapter>;
    fn chapters(&self, version: u64) -> Vec<&Chapter>;
    fn toc_entries(&self, version: u64) -> Vec<&TocRecord>;
    fn attachments(&self, version: u64) -> Vec<&Attachment>;
    fn metadata_records(&self, document: u64) -> Vec<&MetadataRecord>;

    /// Payload of an attachment. May fail per attachment; the export
    /// orchestrator treats such failures as non-fatal.
    fn read_attachment(&self, id: u64) -> Result<Vec<u8>>;

    /// Timestamp of the most recent recorded change to the document, if any.
    fn most_recent_modification(&self, document: &Document) -> Option<DateTime<Utc>>;
}

/// In-memory [`DocumentStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    next_id: u64,
    documents: Vec<Document>,
    chapters: Vec<Chapter>,
    toc: Vec<TocRecord>,
    attachments: Vec<Attachment>,
    blobs: Vec<(u64, Vec<u8>)>,
    metadata: Vec<MetadataRecord>,
    unreadable: HashSet<u64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// Make future reads of an attachment fail, for exercising the
    /// partial-success export path.
    pub fn poison_attachment(&mut self, id: u64) {
        self.unreadable.insert(id);
    }
}

impl DocumentStore for MemoryStore {
    fn create_document(
        &mut self,
        owner: &str,
        title: &str,
        slug: &str,
        status: &str,
    ) -> Result<Document> {
        let id = self.allocate_id();
        let document = Document {
            id,
            title: title.to_string(),
            slug: slug.to_string(),
            owner: owner.to_string(),
            status: status.to_string(),
            created: Utc::now(),
            version: id,
        };
        self.documents.push(document.clone());
        Ok(document)
    }

    fn title_exists(&self, title: &str) -> bool {
        self.documents.iter().any(|d| d.title == title)
    }

    fn save_chapter(
        &mut self,
        version: u64,
        slug: &str,
        title: &str,
        content: String,
        status: &str,
    ) -> Result<Chapter> {
        let now = Utc::now();
        let chapter = Chapter {
            id: self.allocate_id(),
            version,
            slug: slug.to_string(),
            title: title.to_string(),
            content,
            status: status.to_string(),
            created: now,
            modified: now,
        };
        self.chapters.push(chapter.clone());
        Ok(chapter)
    }

    fn save_toc_entry(
        &mut self,
        version: u64,
        name: &str,
        weight: i64,
        chapter: Option<u64>,
    ) -> Result<TocRecord> {
        if self
            .toc
            .iter()
            .any(|t| t.version == version && t.weight == weight)
        {
            return Err(Error::Store(format!(
                "duplicate TOC weight {weight} in version {version}"
            )));
        }
        let record = TocRecord {
            id: self.allocate_id(),
            version,
            name: name.to_string(),
            weight,
            chapter,
        };
        self.toc.push(record.clone());
        Ok(record)
    }

    fn save_attachment(
        &mut self,
        version: u64,
        filename: &str,
        data: Vec<u8>,
    ) -> Result<Attachment> {
        let attachment = Attachment {
            id: self.allocate_id(),
            version,
            filename: filename.to_string(),
        };
        self.blobs.push((attachment.id, data));
        self.attachments.push(attachment.clone());
        Ok(attachment)
    }

    fn save_metadata_record(
        &mut self,
        document: u64,
        name: &str,
        value: &str,
    ) -> Result<MetadataRecord> {
        let record = MetadataRecord {
            id: self.allocate_id(),
            document,
            name: name.to_string(),
            value: value.to_string(),
            kind: metadata::value_kind(value),
        };
        self.metadata.push(record.clone());
        Ok(record)
    }

    fn chapter(&self, id: u64) -> Result<&Chapter> {
        self.chapters
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| Error::Store(format!("no chapter with id {id}")))
    }

    fn chapters(&self, version: u64) -> Vec<&Chapter> {
        self.chapters.iter().filter(|c| c.version == version).collect()
    }

    fn toc_entries(&self, version: u64) -> Vec<&TocRecord> {
        self.toc.iter().filter(|t| t.version == version).collect()
    }

    fn attachments(&self, version: u64) -> Vec<&Attachment> {
        self.attachments
            .iter()
            .filter(|a| a.version == version)
            .collect()
    }

    fn metadata_records(&self, document: u64) -> Vec<&MetadataRecord> {
        self.metadata
            .iter()
            .filter(|m| m.document == document)
            .collect()
    }

    fn read_attachment(&self, id: u64) -> Result<Vec<u8>> {
        if self.unreadable.contains(&id) {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                format!("attachment {id} is unreadable"),
            )));
        }
        self.blobs
            .iter()
            .find(|(blob_id, _)| *blob_id == id)
            .map(|(_, data)| data.clone())
            .ok_or_else(|| Error::Store(format!("no attachment with id {id}")))
    }

    fn most_recent_modification(&self, document: &Document) -> Option<DateTime<Utc>> {
        self.chapters
            .iter()
            .filter(|c| c.version == document.version)
            .map(|c| c.modified)
            .max()
    }
}
