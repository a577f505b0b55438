//! bookizip - book archive import/export tool

use std::process::ExitCode;

use clap::Parser;

use bookizip::{
    DC, DocumentStore, ExportConfig, MemoryStore, NoTemplating, export_book, fetch_archive,
    import_book,
};

#[derive(Parser)]
#[command(name = "bookizip")]
#[command(version, about = "Book archive import/export tool", long_about = None)]
#[command(after_help = "EXAMPLES:
    bookizip book.zip out.zip        Import a bookizip and re-export it
    bookizip -i book.zip             Show archive contents
    bookizip -i http://host/book/    Fetch a remote archive and show it")]
struct Cli {
    /// Input bookizip file or http(s) URL
    #[arg(value_name = "INPUT")]
    input: String,

    /// Output bookizip file
    #[arg(value_name = "OUTPUT", required_unless_present = "info")]
    output: Option<String>,

    /// Show archive contents without converting
    #[arg(short, long)]
    info: bool,

    /// Suppress output messages
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = if cli.info {
        show_info(&cli.input)
    } else {
        let output = cli.output.clone().expect("output required");
        roundtrip(&cli.input, &output, cli.quiet)
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn read_input(input: &str) -> Result<Vec<u8>, String> {
    if input.starts_with("http://") || input.starts_with("https://") {
        fetch_archive(input).map_err(|e| e.to_string())
    } else {
        std::fs::read(input).map_err(|e| e.to_string())
    }
}

fn show_info(input: &str) -> Result<(), String> {
    let bytes = read_input(input)?;
    let mut store = MemoryStore::new();
    let report = import_book(&mut store, "cli", bytes).map_err(|e| e.to_string())?;

    let document = &report.document;
    println!("File: {input}");
    println!("Title: {}", document.title);
    let records = store.metadata_records(document.id);
    let creator = format!("{{{DC}}}creator");
    let authors: Vec<&str> = records
        .iter()
        .filter(|r| r.name == creator)
        .map(|r| r.value.as_str())
        .collect();
    if !authors.is_empty() {
        println!("Authors: {}", authors.join(", "));
    }
    println!("Chapters: {}", report.chapters);
    println!("TOC entries: {}", store.toc_entries(document.version).len());
    println!("Attachments: {}", report.attachments);

    Ok(())
}

fn roundtrip(input: &str, output: &str, quiet: bool) -> Result<(), String> {
    let bytes = read_input(input)?;
    let mut store = MemoryStore::new();
    let report = import_book(&mut store, "cli", bytes).map_err(|e| e.to_string())?;
    if !quiet {
        println!(
            "imported {:?}: {} chapters, {} attachments",
            report.document.title, report.chapters, report.attachments
        );
    }

    let exported = export_book(
        &store,
        &report.document,
        &NoTemplating,
        &ExportConfig::default(),
    )
    .map_err(|e| e.to_string())?;
    for diagnostic in &exported.diagnostics {
        eprintln!("warning: {diagnostic}");
    }
    // persist() fails across filesystems; fall back to a plain copy.
    let path = exported.archive.path().to_path_buf();
    std::fs::copy(&path, output).map_err(|e| e.to_string())?;
    if !quiet {
        println!("wrote {output}");
    }

    Ok(())
}
