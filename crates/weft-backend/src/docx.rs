//! DOCX output: WordprocessingML content generation and container assembly.
//!
//! Content is built as a flat `<w:p>`/`<w:r>` fragment with runs batched on
//! font name, size, bold and italic; tables become `<w:tbl>` with
//! `<w:gridSpan>` for horizontal merges and `<w:vMerge>` for vertical ones.
//! The caller can take the bare body fragment or a complete `.docx` archive.

use crate::error::Result;
use crate::escape::{push_xml_char, push_xml_str};
use std::io::{Seek, Write};
use weft_core::geom::Matrix;
use weft_core::model::{Document, Paragraph, Table};
use weft_core::options::Options;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Font state carried across runs so consecutive spans with identical
/// rendering share one `<w:r>`.
#[derive(Debug, Default)]
struct ContentState {
    font_name: Option<String>,
    font_size: f64,
    bold: bool,
    italic: bool,
    ctm_prev: Option<Matrix>,
}

impl ContentState {
    fn run_finish(&mut self, out: &mut String) {
        if self.font_name.take().is_some() {
            out.push_str("</w:t></w:r>");
        }
    }
}

/// Font size rounded to the nearest 0.01, the granularity the emitters use
/// when deciding whether a run's size changed.
fn rounded_font_size(span: &weft_core::model::Span) -> f64 {
    (span.font_size() * 100.0).round() / 100.0
}

fn run_start(out: &mut String, font_name: &str, font_size: f64, bold: bool, italic: bool) {
    out.push_str("\n<w:r><w:rPr><w:rFonts w:ascii=\"");
    push_xml_str(out, font_name);
    out.push_str("\" w:hAnsi=\"");
    push_xml_str(out, font_name);
    out.push_str("\"/>");
    if bold {
        out.push_str("<w:b/>");
    }
    if italic {
        out.push_str("<w:i/>");
    }
    // Word measures font size in half-points.
    let half_points = font_size * 2.0;
    out.push_str(&format!("<w:sz w:val=\"{half_points}\"/>"));
    out.push_str(&format!("<w:szCs w:val=\"{half_points}\"/>"));
    out.push_str("</w:rPr><w:t xml:space=\"preserve\">");
}

fn paragraph_empty(out: &mut String) {
    out.push_str("\n\n<w:p></w:p>");
}

fn append_paragraph(out: &mut String, state: &mut ContentState, paragraph: &Paragraph) {
    out.push_str("\n\n<w:p>");
    for line in &paragraph.lines {
        for span in &line.spans {
            state.ctm_prev = Some(span.ctm);
            let font_size = rounded_font_size(span);
            let changed = state.font_name.as_deref() != Some(span.font_name.as_str())
                || span.bold != state.bold
                || span.italic != state.italic
                || font_size != state.font_size;
            if changed {
                state.run_finish(out);
                state.font_name = Some(span.font_name.clone());
                state.bold = span.bold;
                state.italic = span.italic;
                state.font_size = font_size;
                run_start(out, &span.font_name, font_size, span.bold, span.italic);
            }
            for glyph in &span.glyphs {
                push_xml_char(out, glyph.ucs);
            }
        }
    }
    state.run_finish(out);
    out.push_str("\n</w:p>");
}

fn append_table(out: &mut String, state: &mut ContentState, table: &Table) {
    out.push_str("\n\n<w:tbl>");
    out.push_str(
        "<w:tblPr><w:tblBorders>\
         <w:top w:val=\"single\"/><w:left w:val=\"single\"/>\
         <w:bottom w:val=\"single\"/><w:right w:val=\"single\"/>\
         <w:insideH w:val=\"single\"/><w:insideV w:val=\"single\"/>\
         </w:tblBorders></w:tblPr>",
    );

    // Column widths in twentieths of a point, from the first row's rects.
    out.push_str("<w:tblGrid>");
    for ix in 0..table.cells_num_x {
        let rect = table.cell(ix, 0).rect;
        let twips = ((rect.max.x - rect.min.x) * 20.0).round() as i64;
        out.push_str(&format!("<w:gridCol w:w=\"{twips}\"/>"));
    }
    out.push_str("</w:tblGrid>");

    for iy in 0..table.cells_num_y {
        out.push_str("\n<w:tr>");
        for ix in 0..table.cells_num_x {
            let cell = table.cell(ix, iy);
            if !cell.left {
                // Covered by a gridSpan to the left.
                continue;
            }
            out.push_str("<w:tc><w:tcPr>");
            if cell.extend_right > 1 {
                out.push_str(&format!("<w:gridSpan w:val=\"{}\"/>", cell.extend_right));
            }
            if cell.extend_down > 1 {
                out.push_str("<w:vMerge w:val=\"restart\"/>");
            } else if !cell.top {
                out.push_str("<w:vMerge/>");
            }
            out.push_str("</w:tcPr>");
            if cell.paragraphs.is_empty() {
                out.push_str("<w:p></w:p>");
            } else {
                for paragraph in &cell.paragraphs {
                    append_paragraph(out, state, paragraph);
                }
            }
            out.push_str("</w:tc>");
        }
        out.push_str("</w:tr>");
    }
    out.push_str("\n</w:tbl>");
    // Word requires a paragraph after a table.
    out.push_str("\n<w:p></w:p>");
}

/// Generate the `<w:body>` content fragment for `document`.
///
/// With `options.spacing` set, an empty paragraph separates emitted
/// paragraphs and a second one marks a change of ctm4 (text at a different
/// rotation or scale in the source).
#[must_use]
pub fn document_to_docx_content(document: &Document, options: &Options) -> String {
    let mut out = String::new();
    for page in &document.pages {
        for subpage in &page.subpages {
            let mut state = ContentState::default();
            for paragraph in &subpage.paragraphs {
                if options.spacing {
                    if let Some(prev) = state.ctm_prev {
                        if !prev.eq4(paragraph.ctm()) {
                            paragraph_empty(&mut out);
                        }
                    }
                    paragraph_empty(&mut out);
                }
                append_paragraph(&mut out, &mut state, paragraph);
            }
            for table in &subpage.tables {
                append_table(&mut out, &mut state, table);
            }
        }
    }
    out
}

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
<Default Extension="xml" ContentType="application/xml"/>
<Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>
</Types>
"#;

const RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>
</Relationships>
"#;

/// Write a complete `.docx` archive for `document` to `writer`.
///
/// # Errors
///
/// Returns [`crate::error::BackendError`] on I/O or ZIP failure.
pub fn write_docx<W: Write + Seek>(
    document: &Document,
    options: &Options,
    writer: W,
) -> Result<()> {
    let content = document_to_docx_content(document, options);
    let mut archive = ZipWriter::new(writer);
    let file_options = SimpleFileOptions::default();

    archive.start_file("[Content_Types].xml", file_options)?;
    archive.write_all(CONTENT_TYPES.as_bytes())?;

    archive.start_file("_rels/.rels", file_options)?;
    archive.write_all(RELS.as_bytes())?;

    archive.start_file("word/document.xml", file_options)?;
    archive.write_all(
        b"<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n\
          <w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\">\
          <w:body>",
    )?;
    archive.write_all(content.as_bytes())?;
    archive.write_all(b"</w:body></w:document>\n")?;

    archive.finish()?;
    log::debug!("wrote docx archive ({} bytes of body content)", content.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_core::geom::{Point, Rect};
    use weft_core::model::{Cell, Glyph, Line, Page, Span, Subpage};

    fn glyph(x: f64, ucs: char) -> Glyph {
        Glyph {
            pre: Point::new(x, 0.0),
            pos: Point::new(x, 0.0),
            ucs: u32::from(ucs),
            adv: 5.0,
        }
    }

    fn span(text: &str, bold: bool) -> Span {
        Span {
            ctm: Matrix::IDENTITY,
            trm: Matrix::IDENTITY,
            font_name: "Helvetica".to_string(),
            bold,
            italic: false,
            vertical: false,
            glyphs: text
                .chars()
                .enumerate()
                .map(|(i, c)| glyph(5.0 * i as f64, c))
                .collect(),
        }
    }

    fn document_with_paragraphs(paragraphs: Vec<Paragraph>) -> Document {
        Document {
            pages: vec![Page {
                mediabox: Rect::EMPTY,
                subpages: vec![Subpage {
                    paragraphs,
                    ..Subpage::default()
                }],
            }],
        }
    }

    #[test]
    fn single_paragraph_fragment() {
        let document = document_with_paragraphs(vec![Paragraph::from_line(Line::from_span(
            span("Hello", false),
        ))]);
        let content = document_to_docx_content(
            &document,
            &Options {
                spacing: false,
                ..Options::default()
            },
        );
        assert!(content.contains("<w:p>"));
        assert!(content.contains("Hello"));
        assert!(content.contains("w:ascii=\"Helvetica\""));
        assert!(!content.contains("<w:b/>"));
    }

    #[test]
    fn runs_batch_on_font_change() {
        let line = Line {
            spans: vec![span("plain", false), span("bold", true)],
        };
        let document = document_with_paragraphs(vec![Paragraph::from_line(line)]);
        let content = document_to_docx_content(
            &document,
            &Options {
                spacing: false,
                ..Options::default()
            },
        );
        assert_eq!(content.matches("<w:r>").count(), 2);
        assert!(content.contains("<w:b/>"));
    }

    #[test]
    fn spacing_inserts_empty_paragraphs() {
        let document = document_with_paragraphs(vec![
            Paragraph::from_line(Line::from_span(span("one", false))),
            Paragraph::from_line(Line::from_span(span("two", false))),
        ]);
        let spaced = document_to_docx_content(&document, &Options::default());
        let plain = document_to_docx_content(
            &document,
            &Options {
                spacing: false,
                ..Options::default()
            },
        );
        assert!(spaced.matches("<w:p>").count() > plain.matches("<w:p>").count());
    }

    #[test]
    fn ctm_change_adds_extra_spacing() {
        let mut rotated = span("two", false);
        rotated.ctm = Matrix {
            a: 0.0,
            b: 1.0,
            c: -1.0,
            d: 0.0,
            e: 0.0,
            f: 0.0,
        };
        let document = document_with_paragraphs(vec![
            Paragraph::from_line(Line::from_span(span("one", false))),
            Paragraph::from_line(Line::from_span(rotated)),
        ]);
        let content = document_to_docx_content(&document, &Options::default());
        // One leading empty, then two empties between the paragraphs.
        assert_eq!(content.matches("<w:p></w:p>").count(), 3);
    }

    #[test]
    fn xml_specials_are_escaped() {
        let document =
            document_with_paragraphs(vec![Paragraph::from_line(Line::from_span(span("a<b", false)))]);
        let content = document_to_docx_content(&document, &Options::default());
        assert!(content.contains("a&lt;b"));
        assert!(!content.contains("a<b"));
    }

    #[test]
    fn table_emits_grid_and_merges() {
        let mut cells = Vec::new();
        for iy in 0..2 {
            for ix in 0..2 {
                let mut cell = Cell::new(Rect::new(
                    50.0 * f64::from(ix),
                    50.0 * f64::from(1 - iy),
                    50.0 * f64::from(ix + 1),
                    50.0 * f64::from(2 - iy),
                ));
                cell.left = true;
                cell.top = !(ix == 1 && iy == 1);
                cell.right = true;
                cell.bottom = true;
                cells.push(cell);
            }
        }
        cells[1].extend_down = 2;
        let table = Table {
            origin: Point::new(0.0, 100.0),
            rect: Rect::new(0.0, 0.0, 100.0, 100.0),
            cells_num_x: 2,
            cells_num_y: 2,
            cells,
        };
        let mut document = document_with_paragraphs(Vec::new());
        document.pages[0].subpages[0].tables.push(table);

        let content = document_to_docx_content(&document, &Options::default());
        assert!(content.contains("<w:tbl>"));
        assert_eq!(content.matches("<w:gridCol").count(), 2);
        assert!(content.contains("<w:vMerge w:val=\"restart\"/>"));
        assert!(content.contains("<w:vMerge/>"));
    }

    #[test]
    fn archive_contains_required_parts() {
        let document = document_with_paragraphs(vec![Paragraph::from_line(Line::from_span(
            span("body", false),
        ))]);
        let mut buffer = std::io::Cursor::new(Vec::new());
        write_docx(&document, &Options::default(), &mut buffer).unwrap();

        let mut archive = zip::ZipArchive::new(buffer).unwrap();
        let names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        assert!(names.contains(&"[Content_Types].xml".to_string()));
        assert!(names.contains(&"_rels/.rels".to_string()));
        assert!(names.contains(&"word/document.xml".to_string()));
    }
}
