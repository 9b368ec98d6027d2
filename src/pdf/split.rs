use crate::error::{PdfError, Result};
use crate::naming::build_split_name;
use crate::page_range::{build_ranges, expand_ranges, PageIndex, PageRange};
use crate::pdf::document::copy_pages;
use crate::pdf::session::{DocumentSession, ReadHandle};
use crate::storage::{FolderStorage, Storage};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// One document produced by a split.
#[derive(Debug, Clone, Serialize)]
pub struct SplitPart {
    pub part_number: u32,
    pub name: String,
    pub path: PathBuf,
    pub ranges: Vec<PageRange>,
    pub page_count: u32,
}

/// Split into [`FolderStorage`] at `folder`.
pub fn split_into_folder<P: AsRef<Path>>(
    session: &DocumentSession,
    file_name: &str,
    selected: &[PageIndex],
    folder: P,
) -> Result<Vec<SplitPart>> {
    split(session, file_name, selected, &FolderStorage::new(folder))
}

/// Write the selected pages to one document and the rest to another.
///
/// An empty selection, or one covering every page, produces a single copy
/// of the whole document. A document without pages produces nothing. If any
/// part fails, every part written by this call is deleted again.
pub fn split(
    session: &DocumentSession,
    file_name: &str,
    selected: &[PageIndex],
    storage: &dyn Storage,
) -> Result<Vec<SplitPart>> {
    let reader = session.open_for_reading()?;
    let total_pages = reader.page_count();
    if total_pages == 0 {
        return Ok(Vec::new());
    }

    let selected_numbers: HashSet<u32> = selected.iter().map(|i| i.to_number().get()).collect();
    let unselected_numbers: Vec<u32> = (1..=total_pages)
        .filter(|n| !selected_numbers.contains(n))
        .collect();
    let selected_numbers: Vec<u32> = selected_numbers.into_iter().collect();

    let ranges = build_ranges(&selected_numbers, &unselected_numbers, total_pages);
    let selected_pages = expand_ranges(&ranges.selected);
    let unselected_pages = expand_ranges(&ranges.unselected);

    let mut parts: Vec<SplitPart> = Vec::new();
    for range_list in [ranges.selected, ranges.unselected] {
        if range_list.is_empty() {
            continue;
        }
        let part_number = parts.len() as u32 + 1;
        let name = build_split_name(file_name, part_number, &selected_pages, &unselected_pages);

        match write_part(session, storage, &reader, &name, &range_list) {
            Ok((name, path, page_count)) => {
                debug!(part = part_number, path = %path.display(), pages = page_count, "wrote split part");
                parts.push(SplitPart {
                    part_number,
                    name,
                    path,
                    ranges: range_list,
                    page_count,
                });
            }
            Err(e) => {
                for part in &parts {
                    let _ = storage.discard(&part.path);
                }
                return Err(e);
            }
        }
    }

    info!(
        source = %session.source().display(),
        parts = parts.len(),
        "split document"
    );
    Ok(parts)
}

/// Write one part under a name not yet taken in `storage`.
fn write_part(
    session: &DocumentSession,
    storage: &dyn Storage,
    reader: &ReadHandle,
    name: &str,
    ranges: &[PageRange],
) -> Result<(String, PathBuf, u32)> {
    let name = storage.unique_name(name)?;
    let mut writer = session.open_for_writing(storage, &name)?;
    let copied = copy_pages(reader.document(), writer.document_mut(), ranges)
        .map_err(|e| PdfError::access(session.source(), e))?;
    let path = writer.close()?;
    Ok((name, path, copied))
}
