//! weft: convert an intermediate PDF glyph stream into DOCX, ODT, HTML or
//! JSON.
//!
//! The input is the XML produced by `mutool draw -F xmltext ...` or
//! `gs -sDEVICE=txtwrite -dTextFormat=4 ...`. Ruling-line segments for table
//! reconstruction can be supplied per page in a JSON sidecar (`--rulings`).

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::Deserialize;
use std::fs;
use std::fs::File;
use std::path::{Path, PathBuf};
use weft_core::{Options, Rect};

/// Reconstructs the text of a rasterized or stream-extracted PDF page and
/// writes it as a word-processor document.
#[derive(Debug, Parser)]
#[command(name = "weft", version, about)]
struct Cli {
    /// XML glyph stream from the upstream PDF interpreter.
    input: PathBuf,

    /// Output file; defaults to the input path with the format's extension.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format; inferred from the output extension when omitted.
    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,

    /// Split spans whenever the pre-transform y coordinate changes.
    /// Diagnostic: stresses the join engine, which must undo the splits.
    #[arg(long)]
    autosplit: bool,

    /// Do not insert synthetic empty paragraphs between emitted paragraphs.
    #[arg(long)]
    no_spacing: bool,

    /// Disable layout analysis: one subpage per page, no tables.
    #[arg(long)]
    no_layout_analysis: bool,

    /// JSON sidecar with detected ruling-line segments, for table
    /// reconstruction.
    #[arg(long)]
    rulings: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Docx,
    Odt,
    Html,
    Json,
}

impl OutputFormat {
    fn extension(self) -> &'static str {
        match self {
            Self::Docx => "docx",
            Self::Odt => "odt",
            Self::Html => "html",
            Self::Json => "json",
        }
    }

    fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "docx" => Some(Self::Docx),
            "odt" => Some(Self::Odt),
            "html" | "htm" => Some(Self::Html),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// One page's detected ruling segments, as written by the line detector.
#[derive(Debug, Deserialize)]
struct PageRulings {
    page: usize,
    #[serde(default)]
    horizontal: Vec<HorizontalRuling>,
    #[serde(default)]
    vertical: Vec<VerticalRuling>,
}

#[derive(Debug, Deserialize)]
struct HorizontalRuling {
    x0: f64,
    x1: f64,
    y: f64,
}

#[derive(Debug, Deserialize)]
struct VerticalRuling {
    x: f64,
    y0: f64,
    y1: f64,
}

fn apply_rulings(document: &mut weft_core::Document, path: &Path) -> Result<()> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read rulings file {}", path.display()))?;
    let pages: Vec<PageRulings> = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse rulings file {}", path.display()))?;
    for entry in pages {
        let Some(page) = document.pages.get_mut(entry.page) else {
            log::warn!("rulings for page {} ignored: no such page", entry.page);
            continue;
        };
        let Some(subpage) = page.subpages.first_mut() else {
            continue;
        };
        subpage.rulings_horizontal = entry
            .horizontal
            .iter()
            .map(|h| Rect::new(h.x0, h.y, h.x1, h.y))
            .collect();
        subpage.rulings_vertical = entry
            .vertical
            .iter()
            .map(|v| Rect::new(v.x, v.y0, v.x, v.y1))
            .collect();
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let options = Options {
        autosplit: cli.autosplit,
        spacing: !cli.no_spacing,
        layout_analysis: !cli.no_layout_analysis,
    };

    let format = cli
        .format
        .or_else(|| cli.output.as_deref().and_then(OutputFormat::from_path))
        .unwrap_or(OutputFormat::Docx);
    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| cli.input.with_extension(format.extension()));

    let mut document = weft_core::parse_intermediate_file(&cli.input, &options)
        .with_context(|| format!("failed to load glyph stream {}", cli.input.display()))?;

    if let Some(rulings) = &cli.rulings {
        apply_rulings(&mut document, rulings)?;
    }

    document.reconstruct(&options);

    match format {
        OutputFormat::Docx => {
            let file = File::create(&output)
                .with_context(|| format!("failed to create {}", output.display()))?;
            weft_backend::write_docx(&document, &options, file)
                .with_context(|| format!("failed to write {}", output.display()))?;
        }
        OutputFormat::Odt => {
            let file = File::create(&output)
                .with_context(|| format!("failed to create {}", output.display()))?;
            weft_backend::write_odt(&document, &options, file)
                .with_context(|| format!("failed to write {}", output.display()))?;
        }
        OutputFormat::Html => {
            fs::write(&output, weft_backend::document_to_html(&document, &options))
                .with_context(|| format!("failed to write {}", output.display()))?;
        }
        OutputFormat::Json => {
            let text = weft_backend::document_to_json_string(&document, &options)?;
            fs::write(&output, text)
                .with_context(|| format!("failed to write {}", output.display()))?;
        }
    }

    log::info!(
        "wrote {} ({} pages)",
        output.display(),
        document.pages.len()
    );
    println!("{}", output.display());
    Ok(())
}
