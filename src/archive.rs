//! The bookizip container: a zip file whose `info.json` manifest describes
//! metadata, manifest entries, the nested TOC, and the spine.

use std::collections::BTreeMap;
use std::io::{Cursor, Read, Seek, Write};

use serde::{Deserialize, Serialize};
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

use crate::error::{Error, Result};
use crate::metadata::MetadataSet;
use crate::toc::TocNode;

/// Name of the manifest entry inside the archive.
pub const INFO_FILENAME: &str = "info.json";

/// Media type used when the file extension is unknown or absent.
pub const FALLBACK_MEDIA_TYPE: &str = "application/octet-stream";

/// One manifest entry: where the payload lives and what it is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestItem {
    pub url: String,
    pub mimetype: String,
}

/// The parsed `info.json` structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArchiveInfo {
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub metadata: MetadataSet,
    #[serde(default)]
    pub manifest: BTreeMap<String, ManifestItem>,
    #[serde(default, rename = "TOC")]
    pub toc: Vec<TocNode>,
    #[serde(default)]
    pub spine: Vec<String>,
}

/// Media type for a lowercase file extension, with fallback.
pub fn media_type_for_extension(extension: &str) -> &'static str {
    match extension.to_ascii_lowercase().as_str() {
        "html" | "htm" => "text/html",
        "xhtml" => "application/xhtml+xml",
        "css" => "text/css",
        "txt" => "text/plain",
        "xml" => "application/xml",
        "json" => "application/json",
        "js" => "text/javascript",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "ico" => "image/vnd.microsoft.icon",
        "pdf" => "application/pdf",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "mp3" => "audio/mpeg",
        "ogg" => "audio/ogg",
        "mp4" => "video/mp4",
        _ => FALLBACK_MEDIA_TYPE,
    }
}

/// Media type for a filename, via its extension.
pub fn media_type_for_filename(filename: &str) -> &'static str {
    match filename.rsplit_once('.') {
        Some((stem, extension)) if !stem.is_empty() => media_type_for_extension(extension),
        _ => FALLBACK_MEDIA_TYPE,
    }
}

/// Reads a bookizip: the zip entries plus the parsed [`ArchiveInfo`].
///
/// All failures here are [`Error::MalformedArchive`]: a bookizip without a
/// readable structure and manifest cannot be imported at all.
pub struct BookizipReader<R: Read + Seek> {
    archive: ZipArchive<R>,
    info: ArchiveInfo,
}

impl BookizipReader<Cursor<Vec<u8>>> {
    /// Open an archive held in memory.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        Self::new(Cursor::new(bytes))
    }
}

impl<R: Read + Seek> BookizipReader<R> {
    pub fn new(reader: R) -> Result<Self> {
        let mut archive = ZipArchive::new(reader)
            .map_err(|e| Error::MalformedArchive(format!("unreadable zip structure: {e}")))?;
        let raw = read_entry(&mut archive, INFO_FILENAME)?;
        let info: ArchiveInfo = serde_json::from_slice(&raw)
            .map_err(|e| Error::MalformedArchive(format!("invalid {INFO_FILENAME}: {e}")))?;
        Ok(BookizipReader { archive, info })
    }

    pub fn info(&self) -> &ArchiveInfo {
        &self.info
    }

    /// Payload bytes of an entry by path.
    pub fn read_entry(&mut self, path: &str) -> Result<Vec<u8>> {
        read_entry(&mut self.archive, path)
    }
}

fn read_entry<R: Read + Seek>(archive: &mut ZipArchive<R>, path: &str) -> Result<Vec<u8>> {
    let mut file = archive
        .by_name(path)
        .map_err(|e| Error::MalformedArchive(format!("missing entry {path:?}: {e}")))?;
    let mut contents = Vec::with_capacity(file.size() as usize);
    file.read_to_end(&mut contents)?;
    Ok(contents)
}

/// Writes a bookizip: entries are added one by one, the manifest accumulates,
/// and `finish` seals the archive with the assembled `info.json`.
pub struct BookizipWriter<W: Write + Seek> {
    zip: ZipWriter<W>,
    manifest: BTreeMap<String, ManifestItem>,
}

impl<W: Write + Seek> BookizipWriter<W> {
    pub fn new(writer: W) -> Self {
        BookizipWriter {
            zip: ZipWriter::new(writer),
            manifest: BTreeMap::new(),
        }
    }

    /// Add a payload under `path` and record it in the manifest as `id`.
    pub fn add_entry(&mut self, id: &str, path: &str, data: &[u8], media_type: &str) -> Result<()> {
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
        self.zip.start_file(path, options)?;
        self.zip.write_all(data)?;
        self.manifest.insert(
            id.to_string(),
            ManifestItem {
                url: path.to_string(),
                mimetype: media_type.to_string(),
            },
        );
        Ok(())
    }

    /// Write `info.json` and seal the archive, returning the inner writer.
    pub fn finish(
        mut self,
        metadata: MetadataSet,
        toc: Vec<TocNode>,
        spine: Vec<String>,
    ) -> Result<W> {
        let info = ArchiveInfo {
            version: 1,
            metadata,
            manifest: self.manifest,
            toc,
            spine,
        };
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
        self.zip.start_file(INFO_FILENAME, options)?;
        let raw = serde_json::to_vec(&info)?;
        self.zip.write_all(&raw)?;
        Ok(self.zip.finish()?)
    }
}
