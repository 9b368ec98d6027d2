use crate::page_range::merge_contiguous;
use std::path::Path;

const DEFAULT_EXTENSION: &str = "pdf";
const DEFAULT_STEM: &str = "document";

/// Name of the file holding part `part_number` of a split.
///
/// Part 1 describes the selected pages and part 2 the unselected ones, e.g.
/// `report.pdf` becomes `report_part1_pages1-3,5.pdf`. The part number is
/// always present so the two halves of one split never share a name.
pub fn build_split_name(
    original_name: &str,
    part_number: u32,
    selected: &[u32],
    unselected: &[u32],
) -> String {
    let (stem, extension) = split_extension(original_name);

    let pages = match part_number {
        1 => selected,
        2 => unselected,
        _ => &[],
    };
    let summary = merge_contiguous(pages.iter().copied())
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",");

    if summary.is_empty() {
        format!("{}_part{}.{}", stem, part_number, extension)
    } else {
        format!("{}_part{}_pages{}.{}", stem, part_number, summary, extension)
    }
}

/// Split a file name into stem and extension, ignoring any directory part.
pub fn split_extension(name: &str) -> (String, String) {
    let path = Path::new(name);
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_STEM);
    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_EXTENSION);
    (stem.to_string(), extension.to_string())
}
