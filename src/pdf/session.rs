//! Ownership of one working copy of a source document.
//!
//! A [`DocumentSession`] copies the source into a temporary working copy and
//! hands out handles over it:
//!
//! - [`ReadHandle`]: the parsed working copy, for inspection. Any number may
//!   be open at once.
//! - [`WriteHandle`]: a brand-new empty document bound to a file created
//!   through a [`Storage`].
//! - [`StampHandle`]: the parsed working copy bound to a destination file,
//!   for producing a modified copy.
//!
//! Write and stamp handles finalise their file in `close`. Dropping one
//! without closing deletes whatever was written. Only one handle may write
//! to a destination at a time; opening a second is a programming error and
//! panics.

use crate::error::{PdfError, Result};
use crate::page_range::PageNumber;
use crate::pdf::document::{self, PdfInfo};
use crate::storage::Storage;
use lopdf::{Document, ObjectId};
use std::cell::RefCell;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

pub struct DocumentSession {
    source: PathBuf,
    working_copy: NamedTempFile,
    /// PDF version of the source, used for new documents.
    version: String,
    writers: RefCell<HashSet<PathBuf>>,
}

impl DocumentSession {
    /// Open `source` with its working copy in the system temp directory.
    pub fn open<P: AsRef<Path>>(source: P) -> Result<Self> {
        Self::open_in(source, std::env::temp_dir())
    }

    /// Open `source` with its working copy in `work_dir`.
    pub fn open_in<P: AsRef<Path>, Q: AsRef<Path>>(source: P, work_dir: Q) -> Result<Self> {
        let source = source.as_ref();
        let work_dir = work_dir.as_ref();

        let bytes = fs::read(source).map_err(|e| PdfError::access(source, e))?;
        let version = Document::load_mem(&bytes)
            .map_err(|e| PdfError::access(source, e))?
            .version;

        fs::create_dir_all(work_dir).map_err(|e| PdfError::storage(work_dir, e))?;
        let mut working_copy = tempfile::Builder::new()
            .prefix("working-copy-")
            .suffix(".pdf")
            .tempfile_in(work_dir)
            .map_err(|e| PdfError::storage(work_dir, e))?;
        if let Err(e) = working_copy.write_all(&bytes) {
            return Err(PdfError::storage(working_copy.path(), e));
        }

        debug!(
            source = %source.display(),
            working_copy = %working_copy.path().display(),
            "opened document session"
        );

        Ok(DocumentSession {
            source: source.to_path_buf(),
            working_copy,
            version,
            writers: RefCell::new(HashSet::new()),
        })
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn working_copy(&self) -> &Path {
        self.working_copy.path()
    }

    pub fn open_for_reading(&self) -> Result<ReadHandle> {
        let path = self.working_copy();
        let doc = Document::load(path).map_err(|e| PdfError::access(path, e))?;
        Ok(ReadHandle { doc })
    }

    /// Create `name` in `storage` and bind it to a new empty document.
    pub fn open_for_writing<'a>(
        &'a self,
        storage: &'a dyn Storage,
        name: &str,
    ) -> Result<WriteHandle<'a>> {
        let (path, writer) = storage.create(name)?;
        self.claim(&path);
        Ok(WriteHandle {
            session: self,
            storage,
            path,
            writer: Some(writer),
            doc: document::new_empty_document(&self.version),
        })
    }

    /// Load the working copy for modification, writing the result to `dest`.
    pub fn open_for_stamping<P: AsRef<Path>>(&self, dest: P) -> Result<StampHandle<'_>> {
        let dest = dest.as_ref().to_path_buf();
        let doc = self.open_for_reading()?.doc;
        self.claim(&dest);
        let file = match File::create(&dest) {
            Ok(file) => file,
            Err(e) => {
                self.release(&dest);
                return Err(PdfError::storage(&dest, e));
            }
        };
        Ok(StampHandle {
            session: self,
            dest,
            writer: Some(BufWriter::new(file)),
            doc,
        })
    }

    /// Replace the working copy with the file at `path`.
    pub(crate) fn replace_working_copy(&self, path: &Path) -> Result<()> {
        fs::rename(path, self.working_copy()).map_err(|e| PdfError::storage(self.working_copy(), e))
    }

    /// Copy the working copy to `dest`.
    pub fn persist_to<P: AsRef<Path>>(&self, dest: P) -> Result<PathBuf> {
        let dest = dest.as_ref();
        fs::copy(self.working_copy(), dest).map_err(|e| PdfError::storage(dest, e))?;
        Ok(dest.to_path_buf())
    }

    fn claim(&self, dest: &Path) {
        let claimed = self.writers.borrow_mut().insert(dest.to_path_buf());
        if !claimed {
            panic!(
                "contract violation: {} already has an open writer",
                dest.display()
            );
        }
    }

    fn release(&self, dest: &Path) {
        self.writers.borrow_mut().remove(dest);
    }
}

/// Parsed working copy.
pub struct ReadHandle {
    doc: Document,
}

impl ReadHandle {
    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn page_count(&self) -> u32 {
        document::page_count(&self.doc)
    }

    /// Object id of `page`, or a bounds error.
    pub fn page_id(&self, page: PageNumber) -> Result<ObjectId> {
        page_id_checked(&self.doc, page)
    }

    pub fn info(&self) -> PdfInfo {
        document::info(&self.doc)
    }
}

pub(crate) fn page_id_checked(doc: &Document, page: PageNumber) -> Result<ObjectId> {
    document::page_id(doc, page).ok_or(PdfError::Bounds {
        page: page.get(),
        total: document::page_count(doc),
    })
}

pub struct WriteHandle<'a> {
    session: &'a DocumentSession,
    storage: &'a dyn Storage,
    path: PathBuf,
    writer: Option<Box<dyn Write>>,
    doc: Document,
}

impl WriteHandle<'_> {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.doc
    }

    /// Serialise the document and flush the file.
    pub fn close(mut self) -> Result<PathBuf> {
        if let Some(mut writer) = self.writer.take() {
            let saved = self
                .doc
                .save_to(&mut writer)
                .map_err(|e| PdfError::storage(&self.path, e))
                .and_then(|_| writer.flush().map_err(|e| PdfError::storage(&self.path, e)));
            drop(writer);

            if let Err(e) = saved {
                let _ = self.storage.discard(&self.path);
                return Err(e);
            }
        }
        Ok(self.path.clone())
    }
}

impl Drop for WriteHandle<'_> {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.take() {
            drop(writer);
            debug!(path = %self.path.display(), "discarding unfinished output");
            let _ = self.storage.discard(&self.path);
        }
        self.session.release(&self.path);
    }
}

pub struct StampHandle<'a> {
    session: &'a DocumentSession,
    dest: PathBuf,
    writer: Option<BufWriter<File>>,
    doc: Document,
}

impl StampHandle<'_> {
    pub fn dest(&self) -> &Path {
        &self.dest
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.doc
    }

    /// Serialise the modified document, flush and sync the destination.
    pub fn close(mut self) -> Result<PathBuf> {
        if let Some(mut writer) = self.writer.take() {
            let saved = self
                .doc
                .save_to(&mut writer)
                .map_err(|e| PdfError::storage(&self.dest, e))
                .and_then(|_| {
                    writer
                        .into_inner()
                        .map_err(|e| e.into_error())
                        .and_then(|file| file.sync_all())
                        .map_err(|e| PdfError::storage(&self.dest, e))
                });

            if let Err(e) = saved {
                let _ = fs::remove_file(&self.dest);
                return Err(e);
            }
        }
        Ok(self.dest.clone())
    }
}

impl Drop for StampHandle<'_> {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.take() {
            drop(writer);
            debug!(path = %self.dest.display(), "discarding unfinished stamp");
            let _ = fs::remove_file(&self.dest);
        }
        self.session.release(&self.dest);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page_range::merge_contiguous;
    use crate::pdf::fixtures;
    use crate::storage::FolderStorage;

    #[test]
    fn test_missing_source_is_access_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = DocumentSession::open_in(dir.path().join("missing.pdf"), dir.path());
        assert!(matches!(result, Err(PdfError::DocumentAccess { .. })));
    }

    #[test]
    fn test_malformed_source_is_access_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.pdf");
        fs::write(&path, b"not a pdf").unwrap();
        let result = DocumentSession::open_in(&path, dir.path());
        assert!(matches!(result, Err(PdfError::DocumentAccess { .. })));
    }

    #[test]
    fn test_working_copy_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let source = fixtures::write(dir.path(), "in.pdf", 2);

        let session = DocumentSession::open_in(&source, dir.path()).unwrap();
        let working_copy = session.working_copy().to_path_buf();
        assert!(working_copy.exists());
        assert_ne!(working_copy, source);

        drop(session);
        assert!(!working_copy.exists());
        assert!(source.exists());
    }

    #[test]
    fn test_concurrent_readers() {
        let dir = tempfile::tempdir().unwrap();
        let source = fixtures::write(dir.path(), "in.pdf", 3);
        let session = DocumentSession::open_in(&source, dir.path()).unwrap();

        let a = session.open_for_reading().unwrap();
        let b = session.open_for_reading().unwrap();
        assert_eq!(a.page_count(), 3);
        assert_eq!(b.page_count(), 3);
        assert!(a.page_id(PageNumber::new(3).unwrap()).is_ok());
        assert!(matches!(
            b.page_id(PageNumber::new(4).unwrap()),
            Err(PdfError::Bounds { page: 4, total: 3 })
        ));
    }

    #[test]
    fn test_write_handle_close_finalises() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("in.pdf");
        let mut doc = fixtures::document(3);
        doc.version = "1.4".to_string();
        doc.save(&source).unwrap();
        let session = DocumentSession::open_in(&source, dir.path()).unwrap();
        let storage = FolderStorage::new(dir.path().join("out"));

        let reader = session.open_for_reading().unwrap();
        let mut writer = session.open_for_writing(&storage, "part.pdf").unwrap();
        document::copy_pages(reader.document(), writer.document_mut(), &merge_contiguous([2]))
            .unwrap();
        let path = writer.close().unwrap();

        let written = Document::load(&path).unwrap();
        assert_eq!(document::page_count(&written), 1);
        assert_eq!(written.version, "1.4");
    }

    #[test]
    fn test_dropped_write_handle_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let source = fixtures::write(dir.path(), "in.pdf", 1);
        let session = DocumentSession::open_in(&source, dir.path()).unwrap();
        let storage = FolderStorage::new(dir.path().join("out"));

        let writer = session.open_for_writing(&storage, "part.pdf").unwrap();
        let path = writer.path().to_path_buf();
        assert!(path.exists());
        drop(writer);
        assert!(!path.exists());

        // The destination is free again.
        let writer = session.open_for_writing(&storage, "part.pdf").unwrap();
        writer.close().unwrap();
    }

    #[test]
    #[should_panic(expected = "contract violation")]
    fn test_second_stamp_on_same_destination_panics() {
        let dir = tempfile::tempdir().unwrap();
        let source = fixtures::write(dir.path(), "in.pdf", 1);
        let session = DocumentSession::open_in(&source, dir.path()).unwrap();
        let dest = dir.path().join("stamped.pdf");

        let _first = session.open_for_stamping(&dest).unwrap();
        let _second = session.open_for_stamping(&dest);
    }

    #[test]
    fn test_stamp_and_persist() {
        let dir = tempfile::tempdir().unwrap();
        let source = fixtures::write(dir.path(), "in.pdf", 2);
        let session = DocumentSession::open_in(&source, dir.path()).unwrap();

        let dest = dir.path().join("stamped.pdf");
        let mut stamp = session.open_for_stamping(&dest).unwrap();
        assert_eq!(document::page_count(stamp.document()), 2);
        stamp.document_mut().delete_pages(&[2]);
        stamp.close().unwrap();
        session.replace_working_copy(&dest).unwrap();
        assert!(!dest.exists());

        let out = session.persist_to(dir.path().join("out.pdf")).unwrap();
        assert_eq!(document::page_count(&Document::load(out).unwrap()), 1);
        assert_eq!(session.open_for_reading().unwrap().page_count(), 1);
    }
}
