use crate::commands::open_session;
use crate::page_range::PageNumber;
use crate::pdf::annotation::AnnotationKind;
use crate::pdf::{Annotation, AnnotationEdit, AnnotationEditor, AnnotationHandle};
use anyhow::{anyhow, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize)]
pub struct ListedAnnotation {
    pub id: u32,
    pub generation: u16,
    #[serde(flatten)]
    pub annotation: Annotation,
}

pub fn page_number(page: u32) -> Result<PageNumber> {
    PageNumber::new(page).ok_or_else(|| anyhow!("Page numbers start at 1, got 0"))
}

pub fn handle(page: u32, id: u32, generation: u16) -> Result<AnnotationHandle> {
    Ok(AnnotationHandle {
        page: page_number(page)?,
        id: (id, generation),
    })
}

pub fn list(path: &Path, page: Option<u32>, work_dir: Option<&Path>) -> Result<Vec<ListedAnnotation>> {
    let page = page.map(page_number).transpose()?;
    let session = open_session(path, work_dir)?;
    let found = AnnotationEditor::new(&session).list(page)?;

    Ok(found
        .into_iter()
        .map(|(handle, annotation)| ListedAnnotation {
            id: handle.id.0,
            generation: handle.id.1,
            annotation,
        })
        .collect())
}

pub fn run_list(path: &Path, page: Option<u32>, work_dir: Option<&Path>) -> Result<()> {
    let found = list(path, page, work_dir)?;
    if found.is_empty() {
        println!("No annotations found.");
        return Ok(());
    }

    for entry in found {
        let a = &entry.annotation;
        let r = a.rect;
        let location = format!(
            "page {} at {},{} {}x{}",
            a.page, r.x, r.y, r.width, r.height
        );
        match &a.kind {
            AnnotationKind::TextNote { title, text } => {
                let title = title.as_deref().unwrap_or("");
                println!(
                    "{} {} note {} {} [{}] {}",
                    entry.id, entry.generation, location, a.color, title, text
                );
            }
            AnnotationKind::Highlight => {
                println!(
                    "{} {} highlight {} {}",
                    entry.id, entry.generation, location, a.color
                );
            }
        }
    }

    Ok(())
}

/// Add `annotation` to a copy of `input` written to `output`.
pub fn add(
    input: &Path,
    annotation: &Annotation,
    output: &Path,
    work_dir: Option<&Path>,
) -> Result<(PathBuf, AnnotationHandle)> {
    let session = open_session(input, work_dir)?;
    let (_, handle) = AnnotationEditor::new(&session).add(annotation)?;
    let written = session.persist_to(output)?;
    Ok((written, handle))
}

pub fn edit(
    input: &Path,
    handle: &AnnotationHandle,
    changes: &AnnotationEdit,
    output: &Path,
    work_dir: Option<&Path>,
) -> Result<PathBuf> {
    let session = open_session(input, work_dir)?;
    AnnotationEditor::new(&session).edit(handle, changes)?;
    Ok(session.persist_to(output)?)
}

pub fn remove(
    input: &Path,
    handle: &AnnotationHandle,
    output: &Path,
    work_dir: Option<&Path>,
) -> Result<PathBuf> {
    let session = open_session(input, work_dir)?;
    AnnotationEditor::new(&session).remove(handle)?;
    Ok(session.persist_to(output)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::{fixtures, Rect};

    #[test]
    fn test_add_list_edit_remove() {
        let dir = tempfile::tempdir().unwrap();
        let input = fixtures::write(dir.path(), "in.pdf", 2);
        let work_dir = dir.path().join("work");
        let work = Some(work_dir.as_path());
        let noted = dir.path().join("noted.pdf");

        let note = Annotation::text_note(page_number(2).unwrap(), 50.0, 60.0, 20.0, "#FF0000", Some("Me"), "Check this");
        let (written, handle) = add(&input, &note, &noted, work).unwrap();
        assert_eq!(written, noted);

        let listed = list(&noted, None, work).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, handle.id.0);
        assert_eq!(listed[0].annotation.page.get(), 2);
        assert!(list(&noted, Some(1), work).unwrap().is_empty());

        let edited = dir.path().join("edited.pdf");
        let changes = AnnotationEdit {
            text: Some("Done".to_string()),
            ..Default::default()
        };
        edit(&noted, &handle, &changes, &edited, work).unwrap();
        let listed = list(&edited, None, work).unwrap();
        assert_eq!(
            listed[0].annotation.kind,
            AnnotationKind::TextNote {
                title: Some("Me".to_string()),
                text: "Done".to_string()
            }
        );

        let removed = dir.path().join("removed.pdf");
        remove(&edited, &handle, &removed, work).unwrap();
        assert!(list(&removed, None, work).unwrap().is_empty());
        // The input of each step is left alone.
        assert_eq!(list(&noted, None, work).unwrap().len(), 1);
    }

    #[test]
    fn test_highlight_on_missing_page_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let input = fixtures::write(dir.path(), "in.pdf", 1);
        let output = dir.path().join("out.pdf");

        let highlight = Annotation::highlight(page_number(3).unwrap(), Rect::new(0.0, 0.0, 10.0, 10.0), "#FFFF00");
        assert!(add(&input, &highlight, &output, None).is_err());
        assert!(!output.exists());
    }

    #[test]
    fn test_page_zero_is_rejected() {
        assert!(page_number(0).is_err());
        assert!(handle(0, 5, 0).is_err());
        assert_eq!(handle(1, 5, 0).unwrap().id, (5, 0));
    }
}
