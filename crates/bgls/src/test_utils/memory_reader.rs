//! In-memory `FileReader` that counts reads per file.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::cross_file::content_provider::{FileReader, ReadError};
use crate::cross_file::path_resolve::FileId;

#[derive(Debug, Default)]
pub struct MemoryReader {
    files: HashMap<FileId, String>,
    reads: Mutex<HashMap<FileId, usize>>,
}

impl MemoryReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file at an absolute path.
    ///
    /// Panics if `path` is not absolute.
    pub fn with_file(mut self, path: &str, text: &str) -> Self {
        let file = FileId::new(path)
            .unwrap_or_else(|| panic!("test file path must be absolute: {}", path));
        self.files.insert(file, text.to_string());
        self
    }

    /// How many times `read_text` was called for `file`, including failed reads.
    pub fn read_count(&self, file: &FileId) -> usize {
        self.reads
            .lock()
            .map(|reads| reads.get(file).copied().unwrap_or(0))
            .unwrap_or(0)
    }
}

#[async_trait]
impl FileReader for MemoryReader {
    async fn read_text(&self, file: &FileId) -> Result<String, ReadError> {
        if let Ok(mut reads) = self.reads.lock() {
            *reads.entry(file.clone()).or_insert(0) += 1;
        }
        self.files
            .get(file)
            .cloned()
            .ok_or_else(|| ReadError::NotFound(file.clone()))
    }

    async fn exists(&self, file: &FileId) -> bool {
        self.files.contains_key(file)
    }
}
