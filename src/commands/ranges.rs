use crate::page_range::{build_ranges, parse_page_list, PageNumber, PageRange, SplitRanges};
use anyhow::Result;

pub fn compute(total_pages: u32, selected: Option<&str>) -> Result<SplitRanges> {
    let selected: Vec<u32> = match selected {
        Some(list) if total_pages > 0 => parse_page_list(list, total_pages)?
            .into_iter()
            .map(PageNumber::get)
            .collect(),
        _ => Vec::new(),
    };
    let unselected: Vec<u32> = (1..=total_pages)
        .filter(|n| !selected.contains(n))
        .collect();

    Ok(build_ranges(&selected, &unselected, total_pages))
}

pub fn run(total_pages: u32, selected: Option<&str>) -> Result<()> {
    let ranges = compute(total_pages, selected)?;
    println!("Selected: {}", describe(&ranges.selected));
    println!("Unselected: {}", describe(&ranges.unselected));
    Ok(())
}

fn describe(ranges: &[PageRange]) -> String {
    if ranges.is_empty() {
        return "(none)".to_string();
    }
    ranges
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
