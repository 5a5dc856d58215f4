use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

const UTF8_BOM: &str = "\u{feff}";

/// The full text of one target file, held in memory for a single run.
///
/// A document is loaded once, mutated as a plain `String`, and stored once.
/// Nothing is written until [`Document::store`] is called.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "Document does nothing until store() is called"]
pub struct Document {
    /// Path the text was read from and will be written back to
    pub path: PathBuf,
    /// Current contents
    pub text: String,
    original: String,
}

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0} is not valid UTF-8: {1}")]
    Utf8(PathBuf, #[source] std::string::FromUtf8Error),

    #[error("{0} starts with a UTF-8 byte-order mark")]
    ByteOrderMark(PathBuf),
}

/// Result of storing a document.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "StoreResult should be checked to see whether the file changed"]
pub enum StoreResult {
    /// New contents were written
    Written { path: PathBuf, bytes: usize },
    /// Contents were unchanged, the file was not touched
    Unchanged { path: PathBuf },
}

impl Document {
    /// Wrap in-memory text, e.g. for tests or dry runs.
    pub fn from_text(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            path: path.into(),
            original: text.clone(),
            text,
        }
    }

    /// Read the whole file. The handle is released before this returns.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DocumentError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|source| DocumentError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let text =
            String::from_utf8(bytes).map_err(|e| DocumentError::Utf8(path.to_path_buf(), e))?;

        if text.starts_with(UTF8_BOM) {
            return Err(DocumentError::ByteOrderMark(path.to_path_buf()));
        }

        info!(path = %path.display(), bytes = text.len(), "loaded document");
        Ok(Self::from_text(path, text))
    }

    /// Text as it was when loaded.
    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn is_modified(&self) -> bool {
        self.text != self.original
    }

    /// Write the current text back to `path`, truncating the file.
    ///
    /// Skips the write entirely when nothing changed since load.
    pub fn store(&self) -> Result<StoreResult, DocumentError> {
        if !self.is_modified() {
            debug!(path = %self.path.display(), "document unchanged, skipping write");
            return Ok(StoreResult::Unchanged {
                path: self.path.clone(),
            });
        }

        write_truncating(&self.path, self.text.as_bytes()).map_err(|source| {
            DocumentError::Io {
                path: self.path.clone(),
                source,
            }
        })?;

        info!(path = %self.path.display(), bytes = self.text.len(), "stored document");
        Ok(StoreResult::Written {
            path: self.path.clone(),
            bytes: self.text.len(),
        })
    }
}

/// Load a file, transform its text, and write it back.
///
/// The transform sees the whole document. If it returns the same text the file
/// is left alone.
pub fn load_and_store<F>(path: impl AsRef<Path>, transform: F) -> Result<StoreResult, DocumentError>
where
    F: FnOnce(String) -> String,
{
    let mut document = Document::load(path)?;
    let text = std::mem::take(&mut document.text);
    document.text = transform(text);
    document.store()
}

/// Plain truncating write. An interrupted write can leave a short file.
fn write_truncating(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;
    file.write_all(content)?;
    file.flush()
}
