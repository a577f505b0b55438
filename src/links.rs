//! Link path normalization between the archive layout and the store layout.
//!
//! The two directions are deliberately asymmetric, because they operate on
//! different physical layouts:
//!
//! - **Export** walks `src`/`href` attributes and resolves each reference
//!   against the chapter's logical location `/{document}/{chapter}`, turning
//!   it into a path relative to the archive root.
//! - **Import** performs a blanket whole-document substitution that prefixes
//!   every `src` value with `../`, accounting for attachments living one
//!   directory level above chapter files inside the archive.
//!
//! Do not try to unify these into one bidirectional transform.

use std::borrow::Cow;

use memchr::memmem;

use crate::error::Diagnostic;

/// Placeholder written to the archive for chapters with no content.
pub const EMPTY_CONTENT: &str = "<body><!--no content!--></body>";

/// What kind of attribute a reference was found in. Image/media references
/// must land under `static/`; hyperlinks may point anywhere in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    Src,
    Href,
}

impl RefKind {
    fn required_prefix(self) -> &'static str {
        match self {
            RefKind::Src => "static/",
            RefKind::Href => "",
        }
    }
}

/// Split a reference into `(scheme, authority, path, query, fragment)`.
fn split_reference(reference: &str) -> (&str, &str, &str, &str, &str) {
    let (rest, fragment) = match reference.split_once('#') {
        Some((r, f)) => (r, f),
        None => (reference, ""),
    };
    let (rest, query) = match rest.split_once('?') {
        Some((r, q)) => (r, q),
        None => (rest, ""),
    };
    let (scheme, rest) = match rest.find(':') {
        Some(i) if is_scheme(&rest[..i]) => (&rest[..i], &rest[i + 1..]),
        _ => ("", rest),
    };
    let (authority, path) = match rest.strip_prefix("//") {
        Some(r) => match r.find('/') {
            Some(i) => (&r[..i], &r[i..]),
            None => (r, ""),
        },
        None => ("", rest),
    };
    (scheme, authority, path, query, fragment)
}

fn is_scheme(candidate: &str) -> bool {
    let mut chars = candidate.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Reattach query and fragment to a path.
fn unsplit(path: &str, query: &str, fragment: &str) -> String {
    let mut out = String::with_capacity(path.len() + query.len() + fragment.len() + 2);
    out.push_str(path);
    if !query.is_empty() {
        out.push('?');
        out.push_str(query);
    }
    if !fragment.is_empty() {
        out.push('#');
        out.push_str(fragment);
    }
    out
}

/// Join `path` onto `base`, treating `base` as a directory.
fn join(base: &str, path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("{base}/{path}")
    }
}

/// Collapse `.` and `..` segments of an absolute logical path.
fn normalize(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                // Above the root there is nothing to pop.
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    let mut out = String::with_capacity(path.len());
    out.push('/');
    out.push_str(&parts.join("/"));
    out
}

/// Resolve one reference found at `/{doc_slug}/{chapter_slug}` into an
/// archive-relative path.
///
/// External references (non-empty scheme or authority) pass through
/// unchanged. References that resolve outside the expected prefix are
/// anomalous: they pass through unchanged and a diagnostic is recorded.
pub fn flatten_reference(
    reference: &str,
    doc_slug: &str,
    chapter_slug: &str,
    kind: RefKind,
    diagnostics: &mut Vec<Diagnostic>,
) -> String {
    let (scheme, authority, path, query, fragment) = split_reference(reference);
    if !scheme.is_empty() || !authority.is_empty() {
        return reference.to_string();
    }

    let base = format!("/{doc_slug}/");
    let here = format!("/{doc_slug}/{chapter_slug}");
    let resolved = normalize(&join(&here, path));

    let required = format!("{base}{}", kind.required_prefix());
    if !resolved.starts_with(&required) {
        tracing::warn!(
            reference,
            location = %here,
            resolved = %resolved,
            wanted = %required,
            "reference resolves outside the document root, leaving unchanged"
        );
        diagnostics.push(Diagnostic::AnomalousLink {
            reference: reference.to_string(),
            location: here,
            resolved,
        });
        return reference.to_string();
    }

    let relative = &resolved[base.len()..];
    tracing::debug!(reference, rewritten = relative, "flattened reference");
    unsplit(relative, query, fragment)
}

/// Export-side content rewrite: resolve every ` src="…"` and ` href="…"`
/// attribute value in `content` via [`flatten_reference`].
///
/// This is an attribute-aware scan, not a full HTML parse; only
/// double-quoted attributes preceded by whitespace are touched.
pub fn rewrite_exported_content(
    content: &str,
    doc_slug: &str,
    chapter_slug: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> String {
    let bytes = content.as_bytes();
    let mut edits: Vec<(usize, usize, RefKind)> = Vec::new();
    for (needle, kind) in [("src=\"", RefKind::Src), ("href=\"", RefKind::Href)] {
        for pos in memmem::find_iter(bytes, needle.as_bytes()) {
            if pos == 0 || !bytes[pos - 1].is_ascii_whitespace() {
                continue;
            }
            let value_start = pos + needle.len();
            if let Some(offset) = memchr::memchr(b'"', &bytes[value_start..]) {
                edits.push((value_start, value_start + offset, kind));
            }
        }
    }
    edits.sort_by_key(|&(start, _, _)| start);

    let mut out = String::with_capacity(content.len());
    let mut cursor = 0;
    for (start, end, kind) in edits {
        if start < cursor {
            // Overlapping match inside an already-rewritten value.
            continue;
        }
        out.push_str(&content[cursor..start]);
        let value = &content[start..end];
        out.push_str(&flatten_reference(
            value,
            doc_slug,
            chapter_slug,
            kind,
            diagnostics,
        ));
        cursor = end;
    }
    out.push_str(&content[cursor..]);
    out
}

/// Import-side content rewrite: prefix every ` src="…"` value with `../`.
///
/// A blanket substitution over the raw chapter HTML, exactly as the archive
/// layout requires once chapters and attachments are stored side by side.
/// Intentionally not the inverse of [`rewrite_exported_content`].
pub fn rewrite_imported_content(content: &str) -> String {
    let bytes = content.as_bytes();
    let mut out = String::with_capacity(content.len() + 64);
    let mut cursor = 0;
    for pos in memmem::find_iter(bytes, b"src=\"") {
        if pos == 0 || !bytes[pos - 1].is_ascii_whitespace() || pos < cursor {
            continue;
        }
        let insert_at = pos + "src=\"".len();
        out.push_str(&content[cursor..insert_at]);
        out.push_str("../");
        cursor = insert_at;
    }
    out.push_str(&content[cursor..]);
    out
}

/// Decode chapter payload bytes into UTF-8 text.
///
/// Tries UTF-8 first (BOM handled by encoding_rs), then falls back to
/// Windows-1252, which is a superset of ISO-8859-1 and the most common
/// legacy encoding in book content.
pub fn normalize_utf8(bytes: &[u8]) -> Cow<'_, str> {
    let (result, _, malformed) = encoding_rs::UTF_8.decode(bytes);
    if !malformed {
        return result;
    }
    let (result, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn flatten(reference: &str, kind: RefKind) -> (String, Vec<Diagnostic>) {
        let mut diagnostics = Vec::new();
        let out = flatten_reference(reference, "mybook", "intro", kind, &mut diagnostics);
        (out, diagnostics)
    }

    #[test]
    fn test_split_reference() {
        assert_eq!(
            split_reference("http://example.com/a/b?x=1#frag"),
            ("http", "example.com", "/a/b", "x=1", "frag")
        );
        assert_eq!(
            split_reference("../static/cover.png"),
            ("", "", "../static/cover.png", "", "")
        );
        assert_eq!(split_reference("#frag"), ("", "", "", "", "frag"));
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("/a/b/../c"), "/a/c");
        assert_eq!(normalize("/a/./b//c"), "/a/b/c");
        assert_eq!(normalize("/a/../../b"), "/b");
    }

    #[test]
    fn test_flatten_relative_static() {
        let (out, diagnostics) = flatten("../static/cover.png", RefKind::Src);
        assert_eq!(out, "static/cover.png");
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_flatten_external_unchanged() {
        let (out, diagnostics) = flatten("http://example.com/x", RefKind::Src);
        assert_eq!(out, "http://example.com/x");
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_flatten_outside_root_is_anomalous() {
        let (out, diagnostics) = flatten("../../outside/page", RefKind::Href);
        assert_eq!(out, "../../outside/page");
        assert_eq!(diagnostics.len(), 1);
        match &diagnostics[0] {
            Diagnostic::AnomalousLink { resolved, .. } => {
                assert_eq!(resolved, "/outside/page");
            }
            other => panic!("expected anomalous link, got {other:?}"),
        }
    }

    #[test]
    fn test_flatten_src_outside_static_is_anomalous() {
        // Resolves inside the document but outside static/.
        let (out, diagnostics) = flatten("../other-chapter", RefKind::Src);
        assert_eq!(out, "../other-chapter");
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn test_flatten_href_between_chapters() {
        let (out, diagnostics) = flatten("../other-chapter", RefKind::Href);
        assert_eq!(out, "other-chapter");
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_flatten_keeps_query_and_fragment() {
        let (out, diagnostics) = flatten("../static/map.png?zoom=2#pin", RefKind::Src);
        assert_eq!(out, "static/map.png?zoom=2#pin");
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_rewrite_exported_content() {
        let html = r#"<p><img src="../static/a.png"/> <a href="http://x.org/">x</a></p>"#;
        let mut diagnostics = Vec::new();
        let out = rewrite_exported_content(html, "mybook", "intro", &mut diagnostics);
        assert_eq!(
            out,
            r#"<p><img src="static/a.png"/> <a href="http://x.org/">x</a></p>"#
        );
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_rewrite_exported_ignores_unquoted_and_data_attrs() {
        let html = r#"<img data-src="../static/a.png"/>"#;
        let mut diagnostics = Vec::new();
        let out = rewrite_exported_content(html, "mybook", "intro", &mut diagnostics);
        assert_eq!(out, html);
    }

    #[test]
    fn test_rewrite_imported_content() {
        let html = r#"<img src="static/a.png"/><img src="static/b.png"/>"#;
        assert_eq!(
            rewrite_imported_content(html),
            r#"<img src="../static/a.png"/><img src="../static/b.png"/>"#
        );
    }

    #[test]
    fn test_rewrite_imported_requires_preceding_whitespace() {
        let html = r#"<img data-src="a.png"/>"#;
        assert_eq!(rewrite_imported_content(html), html);
    }

    #[test]
    fn test_export_then_import_roundtrips_valid_src() {
        // A src reference that was valid before export comes back equivalent.
        let original = r#"<img src="../static/cover.png"/>"#;
        let mut diagnostics = Vec::new();
        let exported = rewrite_exported_content(original, "mybook", "intro", &mut diagnostics);
        assert_eq!(exported, r#"<img src="static/cover.png"/>"#);
        assert_eq!(rewrite_imported_content(&exported), original);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_normalize_utf8_passthrough_and_fallback() {
        assert_eq!(normalize_utf8("héllo".as_bytes()), "héllo");
        // 0xE9 is 'é' in Windows-1252 and malformed UTF-8.
        assert_eq!(normalize_utf8(&[b'h', 0xE9, b'!']), "hé!");
    }

    proptest! {
        #[test]
        fn prop_external_references_pass_through(
            scheme in prop_oneof![Just("http"), Just("https"), Just("ftp"), Just("mailto")],
            rest in "[a-zA-Z0-9./_-]{0,24}",
        ) {
            let reference = format!("{scheme}:{rest}");
            let mut diagnostics = Vec::new();
            let out = flatten_reference(&reference, "doc", "ch", RefKind::Href, &mut diagnostics);
            prop_assert_eq!(out, reference);
            prop_assert!(diagnostics.is_empty());
        }

        #[test]
        fn prop_flattened_href_never_escapes_document(path in "[a-z0-9./-]{1,32}") {
            let mut diagnostics = Vec::new();
            let out = flatten_reference(&path, "doc", "ch", RefKind::Href, &mut diagnostics);
            if diagnostics.is_empty() {
                // Rewritten values are archive-relative, never absolute.
                prop_assert!(!out.starts_with('/'));
                prop_assert!(!out.starts_with(".."));
            } else {
                prop_assert_eq!(out, path);
            }
        }
    }
}
