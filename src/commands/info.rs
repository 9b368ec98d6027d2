use crate::commands::open_session;
use crate::pdf::document::PdfInfo;
use crate::pdf::AnnotationEditor;
use anyhow::Result;
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Serialize)]
pub struct InfoReport {
    pub path: String,
    #[serde(flatten)]
    pub info: PdfInfo,
    pub annotations: usize,
}

pub fn inspect(path: &Path, work_dir: Option<&Path>) -> Result<InfoReport> {
    let session = open_session(path, work_dir)?;
    let info = session.open_for_reading()?.info();
    let annotations = AnnotationEditor::new(&session).list(None)?.len();

    Ok(InfoReport {
        path: path.display().to_string(),
        info,
        annotations,
    })
}

pub fn run(path: &Path, work_dir: Option<&Path>) -> Result<()> {
    let report = inspect(path, work_dir)?;
    let info = &report.info;

    println!("File: {}", report.path);
    println!("Pages: {}", info.page_count);

    if let Some(title) = &info.title {
        println!("Title: {}", title);
    }
    if let Some(author) = &info.author {
        println!("Author: {}", author);
    }
    if let Some(subject) = &info.subject {
        println!("Subject: {}", subject);
    }
    if let Some(creator) = &info.creator {
        println!("Creator: {}", creator);
    }
    if let Some(producer) = &info.producer {
        println!("Producer: {}", producer);
    }
    println!("Annotations: {}", report.annotations);

    Ok(())
}
