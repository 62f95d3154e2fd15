//
// cross_file/content_provider.rs
//
// File content access for cross-file resolution
//
// The resolver never touches the filesystem directly; it reads through a
// FileReader. Open editor buffers are authoritative: when a file is open its
// in-memory text is returned and disk is never consulted for it.
//

use std::collections::HashMap;
use std::io;

use async_trait::async_trait;

use super::path_resolve::FileId;

#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("file not found: {0}")]
    NotFound(FileId),
    #[error("cannot read {file}: {source}")]
    Unreadable {
        file: FileId,
        #[source]
        source: io::Error,
    },
}

impl ReadError {
    pub fn from_io(file: &FileId, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound(file.clone()),
            _ => Self::Unreadable {
                file: file.clone(),
                source: err,
            },
        }
    }
}

/// Capability to read script text by file id.
#[async_trait]
pub trait FileReader: Send + Sync {
    async fn read_text(&self, file: &FileId) -> Result<String, ReadError>;

    async fn exists(&self, file: &FileId) -> bool;
}

/// Reads straight from disk with tokio's filesystem API.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiskReader;

#[async_trait]
impl FileReader for DiskReader {
    async fn read_text(&self, file: &FileId) -> Result<String, ReadError> {
        let bytes = tokio::fs::read(file.path())
            .await
            .map_err(|err| ReadError::from_io(file, err))?;
        Ok(decode_text(&bytes))
    }

    async fn exists(&self, file: &FileId) -> bool {
        tokio::fs::metadata(file.path())
            .await
            .map(|meta| meta.is_file())
            .unwrap_or(false)
    }
}

/// Lossy UTF-8 decoding with a leading byte-order mark removed.
fn decode_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

/// Reader with open documents layered over a fallback reader.
pub struct OverlayReader<R> {
    open: HashMap<FileId, String>,
    fallback: R,
}

impl<R: FileReader> OverlayReader<R> {
    pub fn new(open: HashMap<FileId, String>, fallback: R) -> Self {
        Self { open, fallback }
    }
}

#[async_trait]
impl<R: FileReader> FileReader for OverlayReader<R> {
    async fn read_text(&self, file: &FileId) -> Result<String, ReadError> {
        if let Some(text) = self.open.get(file) {
            return Ok(text.clone());
        }
        self.fallback.read_text(file).await
    }

    async fn exists(&self, file: &FileId) -> bool {
        self.open.contains_key(file) || self.fallback.exists(file).await
    }
}

/// Serves one document's current text and delegates everything else.
///
/// Used when the requesting document's text is known to the caller (for
/// example a CLI run or a snapshot taken under the state lock) and must win
/// over any other copy.
pub struct PinnedDocument<'a, R: ?Sized> {
    file: &'a FileId,
    text: &'a str,
    inner: &'a R,
}

impl<'a, R: FileReader + ?Sized> PinnedDocument<'a, R> {
    pub fn new(file: &'a FileId, text: &'a str, inner: &'a R) -> Self {
        Self { file, text, inner }
    }
}

#[async_trait]
impl<'a, R: FileReader + ?Sized> FileReader for PinnedDocument<'a, R> {
    async fn read_text(&self, file: &FileId) -> Result<String, ReadError> {
        if file == self.file {
            return Ok(self.text.to_string());
        }
        self.inner.read_text(file).await
    }

    async fn exists(&self, file: &FileId) -> bool {
        file == self.file || self.inner.exists(file).await
    }
}
