use lopdf::ObjectId;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PdfError {
    #[error("Failed to access document {}: {reason}", .path.display())]
    DocumentAccess { path: PathBuf, reason: String },

    #[error("Failed to write {}: {source}", .path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Page {page} is out of range (1-{total})")]
    Bounds { page: u32, total: u32 },

    #[error("Annotation {} {} R not found on page {page}", .id.0, .id.1)]
    NotFound { page: u32, id: ObjectId },
}

impl PdfError {
    pub fn access(path: &Path, reason: impl Display) -> Self {
        PdfError::DocumentAccess {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    pub fn storage(path: &Path, source: std::io::Error) -> Self {
        PdfError::Storage {
            path: path.to_path_buf(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, PdfError>;
