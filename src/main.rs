mod cli;
mod commands;
mod error;
mod mcp;
mod naming;
mod page_range;
mod pdf;
mod storage;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use commands::annotate;
use pdf::{Annotation, AnnotationEdit};
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    // stdout carries command output and the MCP transport.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let work_dir = cli.work_dir.as_deref();

    match cli.command {
        Commands::Mcp => {
            mcp::run_server(cli.work_dir.clone()).await?;
        }
        Commands::Info { path } => {
            commands::info::run(&path, work_dir)?;
        }
        Commands::Annotations { path, page } => {
            annotate::run_list(&path, page, work_dir)?;
        }
        Commands::Ranges { total, selected } => {
            commands::ranges::run(total, selected.as_deref())?;
        }
        Commands::Split {
            path,
            pages,
            output_dir,
            name,
        } => {
            commands::split::run(
                &path,
                pages.as_deref(),
                &output_dir,
                name.as_deref(),
                work_dir,
            )?;
        }
        Commands::Note {
            path,
            page,
            x,
            y,
            size,
            color,
            title,
            text,
            output,
        } => {
            let note = Annotation::text_note(
                annotate::page_number(page)?,
                x,
                y,
                size,
                &color,
                title.as_deref(),
                &text,
            );
            let (written, handle) = annotate::add(&path, &note, &output, work_dir)?;
            println!(
                "Added note {} {} on page {} -> {}",
                handle.id.0,
                handle.id.1,
                page,
                written.display()
            );
        }
        Commands::Highlight {
            path,
            page,
            rect,
            color,
            output,
        } => {
            let highlight = Annotation::highlight(annotate::page_number(page)?, rect, &color);
            let (written, handle) = annotate::add(&path, &highlight, &output, work_dir)?;
            println!(
                "Added highlight {} {} on page {} -> {}",
                handle.id.0,
                handle.id.1,
                page,
                written.display()
            );
        }
        Commands::Edit {
            path,
            page,
            id,
            generation,
            title,
            text,
            rect,
            color,
            output,
        } => {
            let handle = annotate::handle(page, id, generation)?;
            let changes = AnnotationEdit {
                title,
                text,
                rect,
                color,
            };
            let written = annotate::edit(&path, &handle, &changes, &output, work_dir)?;
            println!("Edited annotation {} {} -> {}", id, generation, written.display());
        }
        Commands::Remove {
            path,
            page,
            id,
            generation,
            output,
        } => {
            let handle = annotate::handle(page, id, generation)?;
            let written = annotate::remove(&path, &handle, &output, work_dir)?;
            println!("Removed annotation {} {} -> {}", id, generation, written.display());
        }
    }

    Ok(())
}
