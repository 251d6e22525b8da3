//! Input resolution: turn the user-supplied path or URL into a local PDF.
//!
//! Text extraction needs a file-system path. URLs are downloaded into a
//! `TempDir` that lives as long as the [`ResolvedInput`], so the file is
//! removed when the run ends. Both paths check the `%PDF` magic bytes first,
//! so a wrong file gives [`ExplainError::NotAPdf`] instead of a pdfium error.

use crate::error::ExplainError;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tracing::{debug, info};

const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// A PDF ready for extraction.
pub enum ResolvedInput {
    Local(PathBuf),
    /// Downloaded copy; deleted when this value is dropped.
    Downloaded { path: PathBuf, _temp_dir: TempDir },
}

impl ResolvedInput {
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local(p) => p,
            ResolvedInput::Downloaded { path, .. } => path,
        }
    }
}

/// True for `http://` and `https://` inputs.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve `input` (path or URL) to a readable local PDF.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ResolvedInput, ExplainError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        resolve_local(input)
    }
}

fn resolve_local(path_str: &str) -> Result<ResolvedInput, ExplainError> {
    let path = PathBuf::from(path_str);

    let mut file = match std::fs::File::open(&path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(ExplainError::PermissionDenied { path });
        }
        Err(_) => return Err(ExplainError::FileNotFound { path }),
    };

    let mut head = [0u8; 4];
    let read = file.read(&mut head).unwrap_or(0);
    check_magic(&head[..read], &path)?;

    debug!("Resolved local PDF: {}", path.display());
    Ok(ResolvedInput::Local(path))
}

/// Reject anything that does not start with `%PDF`.
fn check_magic(head: &[u8], path: &Path) -> Result<(), ExplainError> {
    if head.starts_with(PDF_MAGIC) {
        return Ok(());
    }
    let mut magic = [0u8; 4];
    let n = head.len().min(4);
    magic[..n].copy_from_slice(&head[..n]);
    Err(ExplainError::NotAPdf {
        path: path.to_path_buf(),
        magic,
    })
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, ExplainError> {
    info!("Downloading PDF from: {}", url);
    let failed = |reason: String| ExplainError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            ExplainError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            failed(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    let bytes = response.bytes().await.map_err(|e| failed(e.to_string()))?;

    let temp_dir = TempDir::new().map_err(|e| ExplainError::Internal(e.to_string()))?;
    let file_path = temp_dir.path().join(filename_from_url(url));
    check_magic(&bytes, &file_path)?;

    tokio::fs::write(&file_path, &bytes)
        .await
        .map_err(|e| ExplainError::Internal(format!("Failed to write temp file: {}", e)))?;

    info!("Downloaded {} bytes to {}", bytes.len(), file_path.display());
    Ok(ResolvedInput::Downloaded {
        path: file_path,
        _temp_dir: temp_dir,
    })
}

/// Last path segment of `url` if it looks like a file name, else `downloaded.pdf`.
fn filename_from_url(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .filter(|last| !last.is_empty() && last.contains('.'))
        .unwrap_or_else(|| "downloaded.pdf".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/doc.pdf"));
        assert!(is_url("http://example.com/doc.pdf"));
        assert!(!is_url("/tmp/doc.pdf"));
        assert!(!is_url("doc.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn filename_comes_from_last_segment() {
        assert_eq!(filename_from_url("https://example.com/a/Kafka.pdf"), "Kafka.pdf");
        assert_eq!(filename_from_url("https://example.com/download"), "downloaded.pdf");
        assert_eq!(filename_from_url("https://example.com/"), "downloaded.pdf");
    }

    #[test]
    fn short_files_are_not_pdfs() {
        let err = check_magic(b"%P", Path::new("x")).unwrap_err();
        match err {
            ExplainError::NotAPdf { magic, .. } => assert_eq!(&magic, b"%P\0\0"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_file_is_reported() {
        let err = resolve_input("/definitely/not/here.pdf", 5)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ExplainError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn non_pdf_is_rejected_by_magic_bytes() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"PK\x03\x04 not a pdf").unwrap();
        let err = resolve_input(file.path().to_str().unwrap(), 5)
            .await
            .err()
            .unwrap();
        match err {
            ExplainError::NotAPdf { magic, .. } => assert_eq!(&magic, b"PK\x03\x04"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn pdf_magic_resolves_locally() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"%PDF-1.7\n").unwrap();
        let resolved = resolve_input(file.path().to_str().unwrap(), 5).await.unwrap();
        assert_eq!(resolved.path(), file.path());
    }
}
