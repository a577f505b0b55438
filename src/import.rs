//! Import orchestrator: bookizip bytes → materialized document.

use crate::archive::BookizipReader;
use crate::error::{Error, Result};
use crate::links::{normalize_utf8, rewrite_imported_content};
use crate::metadata::{DC, format_key};
use crate::naming::{make_unique, slugify};
use crate::store::{Document, DocumentStore};
use crate::toc::flatten_toc;

/// Status tag given to freshly imported documents and chapters.
const IMPORTED_STATUS: &str = "imported";

/// Outcome of a successful import.
#[derive(Debug)]
pub struct ImportReport {
    pub document: Document,
    pub chapters: usize,
    pub attachments: usize,
}

/// Create a new document from bookizip bytes.
///
/// The title is taken from the archive's Dublin Core `title` metadata and
/// de-duplicated against existing documents. The nested TOC is flattened
/// into weighted records (weights strictly decreasing from `count + 1`, so
/// descending-weight reads restore reading order), chapter content gets the
/// import-side link rewrite, and all `static/` manifest payloads become
/// attachments.
pub fn import_book<S: DocumentStore>(
    store: &mut S,
    owner: &str,
    bytes: Vec<u8>,
) -> Result<ImportReport> {
    let mut reader = BookizipReader::from_bytes(bytes)?;
    let info = reader.info().clone();
    tracing::debug!(
        entries = info.manifest.len(),
        spine = info.spine.len(),
        "loaded archive manifest"
    );

    let title = info
        .metadata
        .get("title", DC, "")
        .first()
        .cloned()
        .ok_or_else(|| Error::MalformedArchive("no title metadata".to_string()))?;
    let title = make_unique(&title, |candidate| store.title_exists(candidate));
    let document = store.create_document(owner, &title, &slugify(&title), IMPORTED_STATUS)?;
    let version = document.version;

    let entries = flatten_toc(&info.toc);
    // The +1 is headroom over the true count; only relative order matters.
    let mut weight = entries.len() as i64 + 1;
    let mut chapters = 0;
    for entry in &entries {
        if entry.is_section {
            store.save_toc_entry(version, &entry.title, weight, None)?;
        } else {
            let raw = reader.read_entry(&entry.url)?;
            let text = normalize_utf8(&raw);
            let content = rewrite_imported_content(&text);
            let chapter = store.save_chapter(
                version,
                &slugify(&entry.title),
                &entry.title,
                content,
                IMPORTED_STATUS,
            )?;
            store.save_toc_entry(version, &entry.title, weight, Some(chapter.id))?;
            chapters += 1;
        }
        weight -= 1;
    }

    let mut attachments = 0;
    for item in info.manifest.values() {
        if item.mimetype == "text/html" || !item.url.starts_with("static/") {
            continue;
        }
        let data = reader.read_entry(&item.url)?;
        let basename = item.url.rsplit('/').next().unwrap_or(&item.url);
        store.save_attachment(version, basename, data)?;
        attachments += 1;
    }

    for (namespace, keyword, scheme, value) in info.metadata.iter() {
        let name = format_key(namespace, keyword, scheme);
        store.save_metadata_record(document.id, &name, value)?;
    }

    Ok(ImportReport {
        document,
        chapters,
        attachments,
    })
}
