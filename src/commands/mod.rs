pub mod annotate;
pub mod info;
pub mod ranges;
pub mod split;

use crate::pdf::DocumentSession;
use anyhow::Result;
use std::path::Path;

/// Open a session with its working copy in `work_dir`, if given.
pub fn open_session(path: &Path, work_dir: Option<&Path>) -> Result<DocumentSession> {
    let session = match work_dir {
        Some(dir) => DocumentSession::open_in(path, dir)?,
        None => DocumentSession::open(path)?,
    };
    Ok(session)
}
