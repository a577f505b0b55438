//! Remote fetch collaborator: pull bookizip bytes over HTTP and hand them to
//! the import orchestrator.

use std::io::Read;

use crate::error::Result;
use crate::import::{ImportReport, import_book};
use crate::store::DocumentStore;

/// Upper bound on a fetched archive, to keep a misbehaving server from
/// exhausting memory.
const MAX_ARCHIVE_BYTES: u64 = 256 * 1024 * 1024;

/// Download a bookizip from `url` and return its raw bytes.
pub fn fetch_archive(url: &str) -> Result<Vec<u8>> {
    tracing::debug!(url, "fetching remote archive");
    let response = ureq::get(url).call().map_err(Box::new)?;
    let mut bytes = Vec::new();
    response
        .into_reader()
        .take(MAX_ARCHIVE_BYTES)
        .read_to_end(&mut bytes)?;
    tracing::debug!(url, size = bytes.len(), "fetched remote archive");
    Ok(bytes)
}

/// Fetch a bookizip from `url` and import it for `owner`.
pub fn import_book_from_url<S: DocumentStore>(
    store: &mut S,
    owner: &str,
    url: &str,
) -> Result<ImportReport> {
    let bytes = fetch_archive(url)?;
    import_book(store, owner, bytes)
}

/// Like [`import_book_from_url`], but asks the remote end for its zip
/// rendition by appending the `mode=zip` query parameter.
pub fn import_book_from_site<S: DocumentStore>(
    store: &mut S,
    owner: &str,
    book_url: &str,
) -> Result<ImportReport> {
    let url = if book_url.contains('?') {
        format!("{book_url}&mode=zip")
    } else {
        format!("{book_url}?mode=zip")
    };
    import_book_from_url(store, owner, &url)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Network paths are exercised against a local listener; everything else
    // about URL handling is pure.

    #[test]
    fn test_fetch_archive_from_local_server() {
        use std::io::Write;
        use std::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 1024];
            let _ = stream.read(&mut buf).unwrap();
            let body = b"zipbytes";
            write!(
                stream,
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            )
            .unwrap();
            stream.write_all(body).unwrap();
        });

        let bytes = fetch_archive(&format!("http://{addr}/book.zip")).unwrap();
        assert_eq!(bytes, b"zipbytes");
        handle.join().unwrap();
    }

    #[test]
    fn test_fetch_archive_connection_refused_is_network_error() {
        use crate::error::Error;

        // Port 1 is essentially never listening.
        let result = fetch_archive("http://127.0.0.1:1/book.zip");
        assert!(matches!(result, Err(Error::Network(_))));
    }
}
