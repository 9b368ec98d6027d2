use anyhow::Result;
use rmcp::{
    ServerHandler, ServiceExt,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{ServerCapabilities, ServerInfo},
    schemars, tool, tool_router,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::commands::{annotate, info::inspect, split};
use crate::pdf::{Annotation, AnnotationEdit, Rect};

// Request structs for tools

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct PathRequest {
    #[schemars(description = "Path to the PDF file")]
    pub path: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AnnotationsRequest {
    #[schemars(description = "Path to the PDF file")]
    pub path: String,
    #[schemars(description = "Only list annotations on this page (1-indexed)")]
    pub page: Option<u32>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SplitRequest {
    #[schemars(description = "Path to the PDF file")]
    pub path: String,
    #[schemars(description = "Selected pages (e.g., '1-5,10,15-end'); omit to copy the whole document")]
    pub pages: Option<String>,
    #[schemars(description = "Directory to write the parts to")]
    pub output_dir: String,
    #[schemars(description = "Base file name for the parts (default: input file name)")]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AddNoteRequest {
    #[schemars(description = "Path to the source PDF file")]
    pub path: String,
    #[schemars(description = "Page number (1-indexed)")]
    pub page: u32,
    #[schemars(description = "Anchor x coordinate in PDF user space")]
    pub x: f32,
    #[schemars(description = "Anchor y coordinate in PDF user space")]
    pub y: f32,
    #[schemars(description = "Bubble size (default: 24)")]
    #[serde(default = "default_bubble_size")]
    pub size: f32,
    #[schemars(description = "Color as #RRGGBB (default: #FFCC00)")]
    #[serde(default = "default_note_color")]
    pub color: String,
    #[schemars(description = "Note title")]
    pub title: Option<String>,
    #[schemars(description = "Note text")]
    pub text: String,
    #[schemars(description = "Output file path")]
    pub output: String,
}

fn default_bubble_size() -> f32 {
    24.0
}

fn default_note_color() -> String {
    "#FFCC00".to_string()
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AddHighlightRequest {
    #[schemars(description = "Path to the source PDF file")]
    pub path: String,
    #[schemars(description = "Page number (1-indexed)")]
    pub page: u32,
    #[schemars(description = "Lower-left x coordinate")]
    pub x: f32,
    #[schemars(description = "Lower-left y coordinate")]
    pub y: f32,
    pub width: f32,
    pub height: f32,
    #[schemars(description = "Color as #RRGGBB (default: #FFFF00)")]
    #[serde(default = "default_highlight_color")]
    pub color: String,
    #[schemars(description = "Output file path")]
    pub output: String,
}

fn default_highlight_color() -> String {
    "#FFFF00".to_string()
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct EditAnnotationRequest {
    #[schemars(description = "Path to the source PDF file")]
    pub path: String,
    #[schemars(description = "Page the annotation is on (1-indexed)")]
    pub page: u32,
    #[schemars(description = "Object number from pdf_annotations")]
    pub id: u32,
    #[serde(default)]
    pub generation: u16,
    #[schemars(description = "New title (text notes only)")]
    pub title: Option<String>,
    #[schemars(description = "New text (text notes only)")]
    pub text: Option<String>,
    #[schemars(description = "New area as [x, y, width, height]")]
    pub rect: Option<[f32; 4]>,
    #[schemars(description = "New color as #RRGGBB")]
    pub color: Option<String>,
    #[schemars(description = "Output file path")]
    pub output: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct RemoveAnnotationRequest {
    #[schemars(description = "Path to the source PDF file")]
    pub path: String,
    #[schemars(description = "Page the annotation is on (1-indexed)")]
    pub page: u32,
    #[schemars(description = "Object number from pdf_annotations")]
    pub id: u32,
    #[serde(default)]
    pub generation: u16,
    #[schemars(description = "Output file path")]
    pub output: String,
}

#[derive(Debug, Clone)]
pub struct PdfServer {
    work_dir: Option<PathBuf>,
    #[allow(dead_code)]
    tool_router: ToolRouter<Self>,
}

impl PdfServer {
    pub fn new(work_dir: Option<PathBuf>) -> Self {
        Self {
            work_dir,
            tool_router: Self::tool_router(),
        }
    }

    fn work_dir(&self) -> Option<&Path> {
        self.work_dir.as_deref()
    }
}

impl Default for PdfServer {
    fn default() -> Self {
        Self::new(None)
    }
}

fn to_json<T: Serialize>(result: Result<T>) -> String {
    match result {
        Ok(value) => serde_json::to_string_pretty(&value).unwrap_or_else(|e| format!("Error: {}", e)),
        Err(e) => format!("Error: {}", e),
    }
}

#[tool_router]
impl PdfServer {
    #[tool(description = "Get PDF metadata including title, author, creator, producer, page count and number of annotations")]
    fn pdf_info(&self, Parameters(PathRequest { path }): Parameters<PathRequest>) -> String {
        to_json(inspect(Path::new(&path), self.work_dir()))
    }

    #[tool(description = "List text notes and highlights with their ids, pages, rectangles, colors and text")]
    fn pdf_annotations(&self, Parameters(req): Parameters<AnnotationsRequest>) -> String {
        to_json(annotate::list(Path::new(&req.path), req.page, self.work_dir()))
    }

    #[tool(description = "Split a PDF into one file with the selected pages and one with the rest. Use page range syntax like '1-5,10,15-end'.")]
    fn pdf_split(&self, Parameters(req): Parameters<SplitRequest>) -> String {
        to_json(split::apply(
            Path::new(&req.path),
            req.pages.as_deref(),
            Path::new(&req.output_dir),
            req.name.as_deref(),
            self.work_dir(),
        ))
    }

    #[tool(description = "Add a text note (comment bubble) to a page and save the result to a new file")]
    fn pdf_add_note(&self, Parameters(req): Parameters<AddNoteRequest>) -> String {
        to_json(annotate::page_number(req.page).and_then(|page| {
            let note = Annotation::text_note(
                page,
                req.x,
                req.y,
                req.size,
                &req.color,
                req.title.as_deref(),
                &req.text,
            );
            annotate::add(Path::new(&req.path), &note, Path::new(&req.output), self.work_dir())
                .map(|(output, handle)| AnnotationResult::new(output, handle.id))
        }))
    }

    #[tool(description = "Highlight a rectangular area of a page and save the result to a new file")]
    fn pdf_add_highlight(&self, Parameters(req): Parameters<AddHighlightRequest>) -> String {
        to_json(annotate::page_number(req.page).and_then(|page| {
            let rect = Rect::new(req.x, req.y, req.width, req.height);
            let highlight = Annotation::highlight(page, rect, &req.color);
            annotate::add(Path::new(&req.path), &highlight, Path::new(&req.output), self.work_dir())
                .map(|(output, handle)| AnnotationResult::new(output, handle.id))
        }))
    }

    #[tool(description = "Change the text, title, area or color of an existing annotation and save the result to a new file")]
    fn pdf_edit_annotation(&self, Parameters(req): Parameters<EditAnnotationRequest>) -> String {
        to_json(annotate::handle(req.page, req.id, req.generation).and_then(|handle| {
            let changes = AnnotationEdit {
                title: req.title,
                text: req.text,
                rect: req.rect.map(|[x, y, width, height]| Rect::new(x, y, width, height)),
                color: req.color,
            };
            annotate::edit(
                Path::new(&req.path),
                &handle,
                &changes,
                Path::new(&req.output),
                self.work_dir(),
            )
            .map(|output| AnnotationResult::new(output, handle.id))
        }))
    }

    #[tool(description = "Remove an annotation and save the result to a new file")]
    fn pdf_remove_annotation(&self, Parameters(req): Parameters<RemoveAnnotationRequest>) -> String {
        to_json(annotate::handle(req.page, req.id, req.generation).and_then(|handle| {
            annotate::remove(Path::new(&req.path), &handle, Path::new(&req.output), self.work_dir())
                .map(|output| AnnotationResult::new(output, handle.id))
        }))
    }
}

// Result types for MCP tools

#[derive(Debug, Serialize, Deserialize, schemars::JsonSchema)]
pub struct AnnotationResult {
    pub output_path: String,
    pub id: u32,
    pub generation: u16,
}

impl AnnotationResult {
    fn new(output: PathBuf, (id, generation): (u32, u16)) -> Self {
        AnnotationResult {
            output_path: output.display().to_string(),
            id,
            generation,
        }
    }
}

impl ServerHandler for PdfServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "PDF splitting and annotation tools. Use pdf_info for document metadata, \
                 pdf_split to separate selected pages from the rest, pdf_annotations to list \
                 notes and highlights, and pdf_add_note, pdf_add_highlight, pdf_edit_annotation \
                 and pdf_remove_annotation to change them. Edits never touch the source file."
                    .to_string(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

pub async fn run_server(work_dir: Option<PathBuf>) -> Result<()> {
    let server = PdfServer::new(work_dir);
    info!("serving MCP tools on stdio");

    let service = server.serve((tokio::io::stdin(), tokio::io::stdout())).await?;

    service.waiting().await?;

    Ok(())
}
