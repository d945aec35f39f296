//! Input resolution: load a user-supplied path or URL into memory.
//!
//! Parsers work on raw bytes (the upload path hands over bytes directly), so
//! local files are read whole and URLs are downloaded into a buffer. No temp
//! files are involved.

use crate::error::FlashcardError;
use std::path::PathBuf;
use tracing::{debug, info};

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Load the document named by `input` (local path or http/https URL).
pub async fn load_input(input: &str, timeout_secs: u64) -> Result<Vec<u8>, FlashcardError> {
    if input.trim().is_empty() {
        return Err(FlashcardError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        read_local(input).await
    }
}

async fn read_local(path_str: &str) -> Result<Vec<u8>, FlashcardError> {
    let path = PathBuf::from(path_str);

    let bytes = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => FlashcardError::FileNotFound { path: path.clone() },
        std::io::ErrorKind::PermissionDenied => FlashcardError::PermissionDenied { path: path.clone() },
        _ => FlashcardError::ReadFailed {
            path: path.clone(),
            source: e,
        },
    })?;

    debug!("Read {} bytes from {}", bytes.len(), path.display());
    Ok(bytes)
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<Vec<u8>, FlashcardError> {
    info!("Downloading document from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| FlashcardError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let map_send_err = |e: reqwest::Error| {
        if e.is_timeout() {
            FlashcardError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            FlashcardError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    };

    let response = client.get(url).send().await.map_err(map_send_err)?;

    if !response.status().is_success() {
        return Err(FlashcardError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response.bytes().await.map_err(map_send_err)?;
    info!("Downloaded {} bytes", bytes.len());
    Ok(bytes.to_vec())
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
        assert!(!is_url("doc.md"));
        assert!(!is_url(""));
    }

    #[tokio::test]
    async fn reads_local_file() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"# Notes\nSome text").unwrap();
        let bytes = load_input(tmp.path().to_str().unwrap(), 5).await.unwrap();
        assert_eq!(bytes, b"# Notes\nSome text");
    }

    #[tokio::test]
    async fn missing_file_is_reported() {
        let err = load_input("/definitely/not/here.md", 5).await.unwrap_err();
        assert!(matches!(err, FlashcardError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn directory_is_a_read_failure_not_a_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_input(dir.path().to_str().unwrap(), 5).await.unwrap_err();
        assert!(
            matches!(err, FlashcardError::ReadFailed { .. }),
            "got {err:?}"
        );
    }

    #[tokio::test]
    async fn blank_input_is_invalid() {
        let err = load_input("  ", 5).await.unwrap_err();
        assert!(matches!(err, FlashcardError::InvalidInput { .. }));
    }
}
