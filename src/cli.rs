use crate::pdf::Rect;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pdfsplice")]
#[command(about = "Split PDFs by page selection and manage note and highlight annotations")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Directory for working copies (default: system temp directory)
    #[arg(long, global = true)]
    pub work_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run as MCP server
    Mcp,

    /// Display PDF metadata
    Info {
        /// PDF file to inspect
        path: PathBuf,
    },

    /// List text notes and highlights
    Annotations {
        /// PDF file to inspect
        path: PathBuf,

        /// Only this page (1-based)
        #[arg(short, long)]
        page: Option<u32>,
    },

    /// Show the page ranges a split would produce
    Ranges {
        /// Number of pages in the document
        total: u32,

        /// Selected pages (e.g., "1-3,5")
        selected: Option<String>,
    },

    /// Split a PDF into the selected pages and the rest
    Split {
        /// PDF file to split
        path: PathBuf,

        /// Selected pages (e.g., "1-5,10,15-end"); omit to copy the whole document
        #[arg(short, long)]
        pages: Option<String>,

        /// Output directory
        #[arg(short, long)]
        output_dir: PathBuf,

        /// Base name for the parts (default: input file name)
        #[arg(long)]
        name: Option<String>,
    },

    /// Add a text note
    Note {
        /// PDF file to annotate
        path: PathBuf,

        /// Page number (1-based)
        #[arg(long)]
        page: u32,

        /// Anchor x coordinate
        #[arg(short)]
        x: f32,

        /// Anchor y coordinate
        #[arg(short)]
        y: f32,

        /// Bubble size
        #[arg(long, default_value = "24")]
        size: f32,

        /// Color as #RRGGBB
        #[arg(long, default_value = "#FFCC00")]
        color: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        text: String,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Add a highlight
    Highlight {
        /// PDF file to annotate
        path: PathBuf,

        /// Page number (1-based)
        #[arg(long)]
        page: u32,

        /// Area as "x,y,width,height"
        #[arg(long, value_parser = parse_rect)]
        rect: Rect,

        /// Color as #RRGGBB
        #[arg(long, default_value = "#FFFF00")]
        color: String,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Change an existing annotation
    Edit {
        /// PDF file to modify
        path: PathBuf,

        /// Page the annotation is on (1-based)
        #[arg(long)]
        page: u32,

        /// Object number of the annotation (see `annotations`)
        #[arg(long)]
        id: u32,

        #[arg(long, default_value = "0")]
        generation: u16,

        /// New title (text notes only)
        #[arg(long)]
        title: Option<String>,

        /// New text (text notes only)
        #[arg(long)]
        text: Option<String>,

        /// New area as "x,y,width,height"
        #[arg(long, value_parser = parse_rect)]
        rect: Option<Rect>,

        /// New color as #RRGGBB
        #[arg(long)]
        color: Option<String>,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Remove an annotation
    Remove {
        /// PDF file to modify
        path: PathBuf,

        /// Page the annotation is on (1-based)
        #[arg(long)]
        page: u32,

        /// Object number of the annotation (see `annotations`)
        #[arg(long)]
        id: u32,

        #[arg(long, default_value = "0")]
        generation: u16,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn parse_rect(s: &str) -> Result<Rect, String> {
    let values: Vec<f32> = s
        .split(',')
        .map(|v| v.trim().parse::<f32>())
        .collect::<Result<_, _>>()
        .map_err(|e| format!("invalid number in {:?}: {}", s, e))?;
    match values[..] {
        [x, y, width, height] => Ok(Rect::new(x, y, width, height)),
        _ => Err(format!("expected x,y,width,height, got {:?}", s)),
    }
}
