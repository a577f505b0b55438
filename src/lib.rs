//! # bookizip
//!
//! A library for importing and exporting books as bookizip archives: zip
//! files carrying HTML chapters, static attachments, and an `info.json`
//! manifest with metadata, a nested table of contents, and a spine.
//!
//! ## Features
//!
//! - Import a bookizip into a document store, with title de-duplication,
//!   TOC flattening, and content link rewriting
//! - Export a stored document back to a sealed bookizip, rebuilding the
//!   two-level TOC and injecting Dublin Core metadata defaults
//! - Fetch archives over HTTP and import them in one call
//! - Pluggable persistence via the [`DocumentStore`] trait, with an
//!   in-memory implementation included
//!
//! ## Quick Start
//!
//! ```no_run
//! use bookizip::{export_book, import_book, ExportConfig, MemoryStore, NoTemplating};
//!
//! let bytes = std::fs::read("input.zip").unwrap();
//! let mut store = MemoryStore::new();
//!
//! // Import the archive into the store.
//! let report = import_book(&mut store, "alice", bytes).unwrap();
//! println!("imported {} as {}", report.document.title, report.document.slug);
//!
//! // Export it back out.
//! let document = report.document;
//! let exported = export_book(&store, &document, &NoTemplating, &ExportConfig::default()).unwrap();
//! exported.archive.persist("output.zip").unwrap();
//! ```
//!
//! ## Archives by hand
//!
//! [`BookizipReader`] and [`BookizipWriter`] work directly on the container
//! when the store round-trip is not needed:
//!
//! ```
//! use std::io::Cursor;
//! use bookizip::{BookizipWriter, MetadataSet, TocNode, DC};
//!
//! let mut writer = BookizipWriter::new(Cursor::new(Vec::new()));
//! writer.add_entry("ch000_intro", "ch000_intro.html", b"<p>hi</p>", "text/html").unwrap();
//!
//! let mut metadata = MetadataSet::new();
//! metadata.add("title", "Hello", DC, "");
//! let toc = vec![TocNode::chapter("Intro", "ch000_intro.html")];
//! let bytes = writer.finish(metadata, toc, vec!["ch000_intro".into()]).unwrap().into_inner();
//! assert!(!bytes.is_empty());
//! ```

pub mod archive;
pub mod error;
pub mod export;
pub mod fetch;
pub mod import;
pub mod links;
pub mod metadata;
pub mod naming;
pub mod store;
pub mod toc;

pub use archive::{ArchiveInfo, BookizipReader, BookizipWriter, ManifestItem};
pub use error::{Diagnostic, Error, Result};
pub use export::{AuthorTemplating, ExportConfig, ExportReport, NoTemplating, export_book};
pub use fetch::{fetch_archive, import_book_from_site, import_book_from_url};
pub use import::{ImportReport, import_book};
pub use metadata::{DC, FM, MetadataSet};
pub use naming::{make_unique, slugify};
pub use store::{
    Attachment, Chapter, Document, DocumentStore, MemoryStore, MetadataRecord, TocRecord,
};
pub use toc::{FlatEntry, TocBuilder, TocNode, flatten_toc};
