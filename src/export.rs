//! Export orchestrator: stored document state → sealed bookizip file.

use chrono::Utc;
use tempfile::NamedTempFile;

use crate::archive::{BookizipWriter, media_type_for_filename};
use crate::error::{Diagnostic, Result};
use crate::links::{EMPTY_CONTENT, rewrite_exported_content};
use crate::metadata::{DefaultContext, MetadataSet, inject_defaults};
use crate::naming::slugify;
use crate::store::{Chapter, Document, DocumentStore};
use crate::toc::TocBuilder;

/// Magic token expanded into the rendered contributor listing.
pub const AUTHORS_TOKEN: &str = "##AUTHORS##";

/// Templating collaborator that renders the contributor listing for a
/// chapter when its content carries [`AUTHORS_TOKEN`].
pub trait AuthorTemplating {
    fn render_authors(&self, document: &Document, chapter: &Chapter) -> String;
}

/// Templating that renders nothing; the token is simply removed.
pub struct NoTemplating;

impl AuthorTemplating for NoTemplating {
    fn render_authors(&self, _document: &Document, _chapter: &Chapter) -> String {
        String::new()
    }
}

/// Explicit export configuration; there is no ambient process-wide default.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Default `publisher` metadata value when the document has none.
    pub publisher: String,
    /// Hostname used to build the archive-origin identifier.
    pub server_host: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        ExportConfig {
            publisher: "FLOSS Manuals http://flossmanuals.net".to_string(),
            server_host: "www.booki.cc".to_string(),
        }
    }
}

/// Outcome of a successful export. The caller owns the temp file's
/// lifecycle; dropping the report deletes the archive.
#[derive(Debug)]
pub struct ExportReport {
    /// The sealed archive.
    pub archive: NamedTempFile,
    /// Non-fatal conditions encountered along the way.
    pub diagnostics: Vec<Diagnostic>,
}

/// Package a document version as a bookizip in a temporary file.
///
/// TOC records are read in descending weight order (reading order), the
/// two-level TOC tree is rebuilt, chapter content gets the export-side link
/// rewrite, and every attachment of the version is added under `static/`.
/// Unreadable attachments are skipped with a diagnostic.
pub fn export_book<S: DocumentStore, T: AuthorTemplating>(
    store: &S,
    document: &Document,
    templating: &T,
    config: &ExportConfig,
) -> Result<ExportReport> {
    let mut diagnostics = Vec::new();

    let mut metadata = MetadataSet::from_records(
        store
            .metadata_records(document.id)
            .into_iter()
            .map(|record| (record.name.as_str(), record.value.as_str())),
    );
    let now = Utc::now();
    let last_modified = store
        .most_recent_modification(document)
        .unwrap_or(document.created);
    inject_defaults(
        &mut metadata,
        &DefaultContext {
            publisher: &config.publisher,
            server_host: &config.server_host,
            title: &document.title,
            slug: &document.slug,
            created: document.created,
            last_modified,
            now,
        },
    );

    let file = NamedTempFile::new()?;
    let mut writer = BookizipWriter::new(file.reopen()?);
    let mut toc = TocBuilder::new();
    let mut spine: Vec<String> = Vec::new();

    let mut entries = store.toc_entries(document.version);
    entries.sort_by_key(|entry| std::cmp::Reverse(entry.weight));

    for (i, entry) in entries.iter().enumerate() {
        match entry.chapter {
            Some(chapter_id) => {
                let chapter = store.chapter(chapter_id)?;
                let content = fix_content(document, chapter, templating, &mut diagnostics);

                let id = format!("ch{i:03}_{}", chapter.slug);
                let filename = format!("{id}.html");
                toc.push_chapter(&chapter.title, &filename);
                writer.add_entry(&id, &filename, content.as_bytes(), "text/html")?;
                spine.push(id);
            }
            None => toc.push_section(&entry.name),
        }
    }

    for (i, attachment) in store.attachments(document.version).iter().enumerate() {
        let data = match store.read_attachment(attachment.id) {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!(
                    filename = %attachment.filename,
                    error = %e,
                    "couldn't read attachment, skipping"
                );
                diagnostics.push(Diagnostic::AttachmentSkipped {
                    filename: attachment.filename.clone(),
                    reason: e.to_string(),
                });
                continue;
            }
        };

        // Position makes the id unique archive-wide even if basenames collide.
        let id = format!("att{i:03}_{}", slugify(&attachment.filename));
        let media_type = media_type_for_filename(&attachment.filename);
        writer.add_entry(
            &id,
            &format!("static/{}", attachment.filename),
            &data,
            media_type,
        )?;
    }

    writer.finish(metadata, toc.finish(), spine)?;
    Ok(ExportReport {
        archive: file,
        diagnostics,
    })
}

/// Prepare chapter content for the archive: placeholder for empty content,
/// contributor expansion, then the export-side link rewrite.
fn fix_content<T: AuthorTemplating>(
    document: &Document,
    chapter: &Chapter,
    templating: &T,
    diagnostics: &mut Vec<Diagnostic>,
) -> String {
    if chapter.content.is_empty() {
        return EMPTY_CONTENT.to_string();
    }

    let mut content = chapter.content.clone();
    if memchr::memmem::find(content.as_bytes(), AUTHORS_TOKEN.as_bytes()).is_some() {
        let rendered = templating.render_authors(document, chapter);
        content = content.replace(AUTHORS_TOKEN, &rendered);
    }

    rewrite_exported_content(&content, &document.slug, &chapter.slug, diagnostics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::BookizipReader;
    use crate::metadata::DC;
    use crate::store::MemoryStore;
    use crate::toc::SECTION_TYPE;
    use std::io::Read;

    struct Credits;

    impl AuthorTemplating for Credits {
        fn render_authors(&self, document: &Document, _chapter: &Chapter) -> String {
            format!("<ul><li>{}</li></ul>", document.owner)
        }
    }

    fn store_with_document() -> (MemoryStore, Document) {
        let mut store = MemoryStore::new();
        let document = store
            .create_document("alice", "My Book", "my-book", "imported")
            .unwrap();
        (store, document)
    }

    fn read_report(report: &mut ExportReport) -> BookizipReader<std::io::Cursor<Vec<u8>>> {
        let mut bytes = Vec::new();
        report.archive.read_to_end(&mut bytes).unwrap();
        BookizipReader::from_bytes(bytes).unwrap()
    }

    #[test]
    fn test_export_rebuilds_sections_and_spine() {
        let (mut store, document) = store_with_document();
        let version = document.version;
        let ch1 = store
            .save_chapter(version, "intro", "Intro", "<p>a</p>".into(), "imported")
            .unwrap();
        let ch2 = store
            .save_chapter(version, "one", "One", "<p>b</p>".into(), "imported")
            .unwrap();
        store
            .save_toc_entry(version, "Intro", 4, Some(ch1.id))
            .unwrap();
        store.save_toc_entry(version, "Part I", 3, None).unwrap();
        store.save_toc_entry(version, "One", 2, Some(ch2.id)).unwrap();

        let mut report =
            export_book(&store, &document, &NoTemplating, &ExportConfig::default()).unwrap();
        assert!(report.diagnostics.is_empty());
        let mut reader = read_report(&mut report);

        let info = reader.info().clone();
        assert_eq!(info.spine, ["ch000_intro", "ch002_one"]);
        assert_eq!(info.toc.len(), 2);
        assert_eq!(info.toc[0].title.as_deref(), Some("Intro"));
        assert_eq!(info.toc[1].kind.as_deref(), Some(SECTION_TYPE));
        // The section borrowed its first chapter's filename.
        assert_eq!(info.toc[1].url.as_deref(), Some("ch002_one.html"));
        assert_eq!(info.toc[1].children.len(), 1);
        assert_eq!(
            reader.read_entry("ch000_intro.html").unwrap(),
            b"<p>a</p>"
        );
    }

    #[test]
    fn test_export_injects_default_metadata() {
        let (mut store, document) = store_with_document();
        let ch = store
            .save_chapter(document.version, "one", "One", "<p>x</p>".into(), "imported")
            .unwrap();
        store
            .save_toc_entry(document.version, "One", 2, Some(ch.id))
            .unwrap();

        let mut report =
            export_book(&store, &document, &NoTemplating, &ExportConfig::default()).unwrap();
        let reader = read_report(&mut report);
        let metadata = &reader.info().metadata;
        assert_eq!(metadata.get("language", DC, ""), ["en"]);
        assert_eq!(metadata.get("title", DC, ""), ["My Book"]);
        assert_eq!(metadata.get("creator", DC, ""), ["The Contributors"]);
        assert_eq!(metadata.get("date", DC, "published").len(), 1);
        assert!(
            metadata.get("identifier", DC, "archive-origin")[0]
                .starts_with("http://www.booki.cc/my-book/")
        );
    }

    #[test]
    fn test_export_keeps_stored_metadata_over_defaults() {
        let (mut store, document) = store_with_document();
        store
            .save_metadata_record(document.id, &format!("{{{DC}}}language"), "fr")
            .unwrap();
        let ch = store
            .save_chapter(document.version, "one", "One", "<p>x</p>".into(), "imported")
            .unwrap();
        store
            .save_toc_entry(document.version, "One", 2, Some(ch.id))
            .unwrap();

        let mut report =
            export_book(&store, &document, &NoTemplating, &ExportConfig::default()).unwrap();
        let reader = read_report(&mut report);
        assert_eq!(reader.info().metadata.get("language", DC, ""), ["fr"]);
    }

    #[test]
    fn test_export_empty_content_placeholder_and_authors_expansion() {
        let (mut store, document) = store_with_document();
        let version = document.version;
        let empty = store
            .save_chapter(version, "empty", "Empty", String::new(), "imported")
            .unwrap();
        let credits = store
            .save_chapter(
                version,
                "credits",
                "Credits",
                "<h1>Credits</h1>##AUTHORS##".into(),
                "imported",
            )
            .unwrap();
        store
            .save_toc_entry(version, "Empty", 3, Some(empty.id))
            .unwrap();
        store
            .save_toc_entry(version, "Credits", 2, Some(credits.id))
            .unwrap();

        let mut report =
            export_book(&store, &document, &Credits, &ExportConfig::default()).unwrap();
        let mut reader = read_report(&mut report);
        assert_eq!(
            reader.read_entry("ch000_empty.html").unwrap(),
            EMPTY_CONTENT.as_bytes()
        );
        assert_eq!(
            reader.read_entry("ch001_credits.html").unwrap(),
            b"<h1>Credits</h1><ul><li>alice</li></ul>"
        );
    }

    #[test]
    fn test_export_skips_unreadable_attachment() {
        let (mut store, document) = store_with_document();
        let version = document.version;
        let ch = store
            .save_chapter(version, "one", "One", "<p>x</p>".into(), "imported")
            .unwrap();
        store.save_toc_entry(version, "One", 2, Some(ch.id)).unwrap();
        store
            .save_attachment(version, "good.png", vec![1, 2])
            .unwrap();
        let bad = store
            .save_attachment(version, "bad.png", vec![3, 4])
            .unwrap();
        store.poison_attachment(bad.id);

        let mut report =
            export_book(&store, &document, &NoTemplating, &ExportConfig::default()).unwrap();
        assert_eq!(report.diagnostics.len(), 1);
        assert!(matches!(
            &report.diagnostics[0],
            Diagnostic::AttachmentSkipped { filename, .. } if filename == "bad.png"
        ));

        let mut reader = read_report(&mut report);
        let statics: Vec<String> = reader
            .info()
            .manifest
            .values()
            .filter(|item| item.url.starts_with("static/"))
            .map(|item| item.url.clone())
            .collect();
        assert_eq!(statics, ["static/good.png"]);
        assert_eq!(reader.read_entry("static/good.png").unwrap(), [1, 2]);
    }

    #[test]
    fn test_export_attachment_media_types_from_filename() {
        use crate::archive::FALLBACK_MEDIA_TYPE;

        let (mut store, document) = store_with_document();
        let version = document.version;
        let ch = store
            .save_chapter(version, "one", "One", "<p>x</p>".into(), "imported")
            .unwrap();
        store.save_toc_entry(version, "One", 2, Some(ch.id)).unwrap();
        store
            .save_attachment(version, "photo.JPG", vec![1])
            .unwrap();
        store.save_attachment(version, ".hidden", vec![2]).unwrap();
        store.save_attachment(version, "notes", vec![3]).unwrap();

        let mut report =
            export_book(&store, &document, &NoTemplating, &ExportConfig::default()).unwrap();
        let reader = read_report(&mut report);
        let mimetype = |url: &str| {
            reader
                .info()
                .manifest
                .values()
                .find(|item| item.url == url)
                .map(|item| item.mimetype.clone())
                .unwrap()
        };
        assert_eq!(mimetype("static/photo.JPG"), "image/jpeg");
        // Dotfiles have no extension, only an empty stem.
        assert_eq!(mimetype("static/.hidden"), FALLBACK_MEDIA_TYPE);
        assert_eq!(mimetype("static/notes"), FALLBACK_MEDIA_TYPE);
    }

    #[test]
    fn test_export_flags_anomalous_links() {
        let (mut store, document) = store_with_document();
        let version = document.version;
        let ch = store
            .save_chapter(
                version,
                "one",
                "One",
                r#"<a href="../../outside/page">x</a>"#.into(),
                "imported",
            )
            .unwrap();
        store.save_toc_entry(version, "One", 2, Some(ch.id)).unwrap();

        let mut report =
            export_book(&store, &document, &NoTemplating, &ExportConfig::default()).unwrap();
        assert_eq!(report.diagnostics.len(), 1);
        let mut reader = read_report(&mut report);
        // The anomalous reference is left untouched in the payload.
        assert_eq!(
            reader.read_entry("ch000_one.html").unwrap(),
            br#"<a href="../../outside/page">x</a>"#
        );
    }
}
