//! `TextStore` backends.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use autocron_protocols::{StoreError, TextStore};
use parking_lot::Mutex;
use tokio::fs;
use tracing::debug;

/// File-backed store. Writes go to a temporary sibling that is then
/// renamed over the target, so readers never see a partial document.
pub struct FileTextStore {
    path: PathBuf,
}

impl FileTextStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "jobs".to_string());
        self.path.with_file_name(format!(".{name}.tmp"))
    }
}

#[async_trait]
impl TextStore for FileTextStore {
    async fn read(&self) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(&self.path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, content: &str) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let temp = self.temp_path();
        fs::write(&temp, content).await?;
        fs::rename(&temp, &self.path).await?;
        debug!("Wrote {} bytes to {:?}", content.len(), self.path);
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// In-memory store for tests and dry runs.
#[derive(Default)]
pub struct MemoryTextStore {
    content: Mutex<Option<String>>,
    writes: Mutex<usize>,
}

impl MemoryTextStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_content(content: impl Into<String>) -> Self {
        Self {
            content: Mutex::new(Some(content.into())),
            writes: Mutex::new(0),
        }
    }

    pub fn content(&self) -> Option<String> {
        self.content.lock().clone()
    }

    /// Number of completed writes.
    pub fn writes(&self) -> usize {
        *self.writes.lock()
    }
}

#[async_trait]
impl TextStore for MemoryTextStore {
    async fn read(&self) -> Result<Option<String>, StoreError> {
        Ok(self.content.lock().clone())
    }

    async fn write(&self, content: &str) -> Result<(), StoreError> {
        *self.content.lock() = Some(content.to_string());
        *self.writes.lock() += 1;
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}
