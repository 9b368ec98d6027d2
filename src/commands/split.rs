use crate::commands::open_session;
use crate::page_range::{parse_page_list, PageIndex, PageNumber};
use crate::pdf::split::{split_into_folder, SplitPart};
use anyhow::Result;
use std::path::Path;

pub fn apply(
    input: &Path,
    pages: Option<&str>,
    output_dir: &Path,
    name: Option<&str>,
    work_dir: Option<&Path>,
) -> Result<Vec<SplitPart>> {
    let session = open_session(input, work_dir)?;
    let total_pages = session.open_for_reading()?.page_count();

    let selected: Vec<PageIndex> = match pages {
        Some(list) if total_pages > 0 => parse_page_list(list, total_pages)?
            .into_iter()
            .map(PageNumber::to_index)
            .collect(),
        _ => Vec::new(),
    };

    let file_name = match name {
        Some(name) => name.to_string(),
        None => input
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("document.pdf")
            .to_string(),
    };

    Ok(split_into_folder(&session, &file_name, &selected, output_dir)?)
}

pub fn run(
    input: &Path,
    pages: Option<&str>,
    output_dir: &Path,
    name: Option<&str>,
    work_dir: Option<&Path>,
) -> Result<()> {
    let parts = apply(input, pages, output_dir, name, work_dir)?;

    if parts.is_empty() {
        println!("{} has no pages, nothing written.", input.display());
        return Ok(());
    }

    for part in &parts {
        println!(
            "Part {}: {} page(s) -> {}",
            part.part_number,
            part.page_count,
            part.path.display()
        );
    }

    Ok(())
}
