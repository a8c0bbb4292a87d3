//! JSON output: pages of text blocks with bounds, font information and
//! tables of nested cells.

use crate::error::Result;
use serde_json::{json, Value};
use weft_core::model::{Document, Paragraph, Table};
use weft_core::options::Options;

fn paragraph_text(paragraph: &Paragraph) -> String {
    paragraph
        .lines
        .iter()
        .flat_map(|l| l.spans.iter())
        .flat_map(|s| s.glyphs.iter())
        .filter_map(|g| char::from_u32(g.ucs))
        .collect()
}

fn paragraph_value(paragraph: &Paragraph) -> Value {
    let bounds = paragraph.bounds();
    let span = paragraph.first_line().first_span();
    json!({
        "Bounds": [bounds.min.x, bounds.min.y, bounds.max.x, bounds.max.y],
        "Text": paragraph_text(paragraph),
        "Font": {
            "family_name": span.font_name,
            "bold": span.bold,
            "italic": span.italic,
        },
        "TextSize": span.font_size(),
    })
}

fn table_value(table: &Table) -> Value {
    let cells: Vec<Value> = table
        .cells
        .iter()
        .map(|cell| {
            json!({
                "Bounds": [cell.rect.min.x, cell.rect.min.y, cell.rect.max.x, cell.rect.max.y],
                "Continuation": cell.is_continuation(),
                "ColSpan": cell.extend_right,
                "RowSpan": cell.extend_down,
                "Paragraphs": cell.paragraphs.iter().map(paragraph_value).collect::<Vec<_>>(),
            })
        })
        .collect();
    json!({
        "Origin": [table.origin.x, table.origin.y],
        "Columns": table.cells_num_x,
        "Rows": table.cells_num_y,
        "Cells": cells,
    })
}

/// Render `document` as a JSON value: one entry per page, each with its
/// paragraphs in reading order and its tables.
#[must_use]
pub fn document_to_json(document: &Document, _options: &Options) -> Value {
    let pages: Vec<Value> = document
        .pages
        .iter()
        .map(|page| {
            let paragraphs: Vec<Value> = page
                .subpages
                .iter()
                .flat_map(|s| s.paragraphs.iter())
                .map(paragraph_value)
                .collect();
            let tables: Vec<Value> = page
                .subpages
                .iter()
                .flat_map(|s| s.tables.iter())
                .map(table_value)
                .collect();
            json!({
                "Paragraphs": paragraphs,
                "Tables": tables,
            })
        })
        .collect();
    json!({ "Pages": pages })
}

/// Render `document` as pretty-printed JSON text.
///
/// # Errors
///
/// Returns [`crate::error::BackendError::Json`] if serialization fails.
pub fn document_to_json_string(document: &Document, options: &Options) -> Result<String> {
    Ok(serde_json::to_string_pretty(&document_to_json(
        document, options,
    ))?)
}
