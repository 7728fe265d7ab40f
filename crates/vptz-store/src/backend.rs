//! Storage backends for the framing store document.

use parking_lot::Mutex;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::document::Document;
use crate::error::StoreResult;

/// Where the document lives.
pub trait StoreBackend: Send + Sync {
    /// Load the stored document, `None` when nothing was stored yet.
    fn load(&self) -> StoreResult<Option<Document>>;

    /// Replace the stored document. Must be all-or-nothing.
    fn commit(&self, doc: &Document) -> StoreResult<()>;

    /// Human-readable location for logs.
    fn describe(&self) -> String;
}

/// JSON file, replaced atomically on every commit.
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    /// Standard file name inside a state directory.
    pub const FILE_NAME: &'static str = "state.json";

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backend for `<dir>/state.json`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join(Self::FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl StoreBackend for JsonFileBackend {
    fn load(&self) -> StoreResult<Option<Document>> {
        match fs::read_to_string(&self.path) {
            Ok(json) => Ok(Some(Document::from_json(&json)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn commit(&self, doc: &Document) -> StoreResult<()> {
        let json = doc.to_json()?;
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }
        let tmp = self.temp_path();
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), bytes = json.len(), "store committed");
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Process-local backend for tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    doc: Mutex<Option<Document>>,
    commits: Mutex<usize>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing document.
    pub fn with_document(doc: Document) -> Self {
        Self {
            doc: Mutex::new(Some(doc)),
            commits: Mutex::new(0),
        }
    }

    /// Number of successful commits.
    pub fn commits(&self) -> usize {
        *self.commits.lock()
    }

    pub fn document(&self) -> Option<Document> {
        self.doc.lock().clone()
    }
}

impl StoreBackend for MemoryBackend {
    fn load(&self) -> StoreResult<Option<Document>> {
        Ok(self.doc.lock().clone())
    }

    fn commit(&self, doc: &Document) -> StoreResult<()> {
        *self.doc.lock() = Some(doc.clone());
        *self.commits.lock() += 1;
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".into()
    }
}
