use crate::error::{PdfError, Result};
use crate::naming::split_extension;
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Where split parts are written.
pub trait Storage {
    fn folder(&self) -> &Path;

    /// File names already present in the folder.
    fn existing_names(&self) -> Result<HashSet<String>>;

    /// Create a new file called `name`, failing if it already exists.
    fn create(&self, name: &str) -> Result<(PathBuf, Box<dyn Write>)>;

    /// Delete a file created by [`Storage::create`].
    fn discard(&self, path: &Path) -> Result<()>;

    /// `name`, or `name (1)`, `name (2)`, ... if the folder already has it.
    fn unique_name(&self, name: &str) -> Result<String> {
        let existing = self.existing_names()?;
        if !existing.contains(name) {
            return Ok(name.to_string());
        }

        let (stem, extension) = split_extension(name);
        let mut n = 1;
        loop {
            let candidate = format!("{} ({}).{}", stem, n, extension);
            if !existing.contains(&candidate) {
                return Ok(candidate);
            }
            n += 1;
        }
    }
}

/// Storage backed by a local directory, created on first write.
#[derive(Debug, Clone)]
pub struct FolderStorage {
    folder: PathBuf,
}

impl FolderStorage {
    pub fn new<P: AsRef<Path>>(folder: P) -> Self {
        FolderStorage {
            folder: folder.as_ref().to_path_buf(),
        }
    }
}

impl Storage for FolderStorage {
    fn folder(&self) -> &Path {
        &self.folder
    }

    fn existing_names(&self) -> Result<HashSet<String>> {
        if !self.folder.exists() {
            return Ok(HashSet::new());
        }

        let mut names = HashSet::new();
        for entry in WalkDir::new(&self.folder).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| {
                PdfError::storage(&self.folder, std::io::Error::other(e.to_string()))
            })?;
            if let Some(name) = entry.file_name().to_str() {
                names.insert(name.to_string());
            }
        }
        Ok(names)
    }

    fn create(&self, name: &str) -> Result<(PathBuf, Box<dyn Write>)> {
        fs::create_dir_all(&self.folder).map_err(|e| PdfError::storage(&self.folder, e))?;

        let path = self.folder.join(name);
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| PdfError::storage(&path, e))?;
        debug!(path = %path.display(), "created output file");
        Ok((path, Box::new(BufWriter::new(file))))
    }

    fn discard(&self, path: &Path) -> Result<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PdfError::storage(path, e)),
        }
    }
}
