//! ODT output: OpenDocument text content, a deduplicated automatic-style
//! table, and full container assembly.
//!
//! Runs are `<text:span>` elements referencing automatic styles `T11`,
//! `T12`, …; the numbering leaves room for a template's built-in styles.
//! Paragraph groups at a non-zero rotation are wrapped in a rotated
//! `<draw:frame>` whose extent comes from the core's rotated-bounds helper.

use crate::error::Result;
use crate::escape::{push_xml_char, push_xml_str};
use std::cmp::Ordering;
use std::io::{Seek, Write};
use weft_core::join::rotated_extent;
use weft_core::model::{Document, Paragraph, Span, Subpage, Table};
use weft_core::options::Options;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// One automatic text style: the (font, size, bold, italic) tuple a run
/// renders with.
#[derive(Debug, Clone, PartialEq)]
struct OdtStyle {
    id: usize,
    font_name: String,
    font_size: f64,
    bold: bool,
    italic: bool,
}

impl OdtStyle {
    fn key_cmp(&self, other: &Self) -> Ordering {
        self.font_name
            .cmp(&other.font_name)
            .then(self.font_size.total_cmp(&other.font_size))
            .then(self.bold.cmp(&other.bold))
            .then(self.italic.cmp(&other.italic))
    }
}

/// The deduplicated style table collected while emitting content.
#[derive(Debug, Default)]
pub struct OdtStyles {
    /// Sorted by style key; ids are assigned in insertion order.
    styles: Vec<OdtStyle>,
}

impl OdtStyles {
    /// Style id for a span's rendering, adding a definition when new.
    fn id_for(&mut self, span: &Span, font_size: f64) -> usize {
        let candidate = OdtStyle {
            id: 0,
            font_name: span.font_name.clone(),
            font_size,
            bold: span.bold,
            italic: span.italic,
        };
        match self
            .styles
            .binary_search_by(|existing| existing.key_cmp(&candidate))
        {
            Ok(index) => self.styles[index].id,
            Err(index) => {
                // Ids start at 11 to leave room for a template's own styles.
                let id = self.styles.len() + 11;
                let mut style = candidate;
                style.id = id;
                self.styles.insert(index, style);
                id
            }
        }
    }

    /// `<style:style>` definitions for `<office:automatic-styles>`.
    #[must_use]
    pub fn definitions(&self) -> String {
        let mut out = String::new();
        for style in &self.styles {
            out.push_str(&format!(
                "<style:style style:name=\"T{}\" style:family=\"text\">",
                style.id
            ));
            out.push_str("<style:text-properties style:font-name=\"");
            push_xml_str(&mut out, &style.font_name);
            out.push_str(&format!("\" fo:font-size=\"{}pt\"", style.font_size));
            if style.bold {
                out.push_str(" fo:font-weight=\"bold\"");
            }
            if style.italic {
                out.push_str(" fo:font-style=\"italic\"");
            }
            out.push_str("/></style:style>\n");
        }
        out
    }
}

#[derive(Debug, Default)]
struct ContentState {
    style_id: Option<usize>,
    ctm_prev: Option<weft_core::geom::Matrix>,
}

impl ContentState {
    fn run_finish(&mut self, out: &mut String) {
        if self.style_id.take().is_some() {
            out.push_str("</text:span>");
        }
    }
}

fn rounded_font_size(span: &Span) -> f64 {
    (span.font_size() * 100.0).round() / 100.0
}

fn paragraph_empty(out: &mut String) {
    out.push_str("\n\n<text:p/>");
}

fn append_paragraph(
    out: &mut String,
    state: &mut ContentState,
    styles: &mut OdtStyles,
    paragraph: &Paragraph,
) {
    out.push_str("\n\n<text:p>");
    for line in &paragraph.lines {
        for span in &line.spans {
            state.ctm_prev = Some(span.ctm);
            let id = styles.id_for(span, rounded_font_size(span));
            if state.style_id != Some(id) {
                state.run_finish(out);
                state.style_id = Some(id);
                out.push_str(&format!("<text:span text:style-name=\"T{id}\">"));
            }
            for glyph in &span.glyphs {
                push_xml_char(out, glyph.ucs);
            }
        }
    }
    state.run_finish(out);
    out.push_str("</text:p>");
}

/// Emit the run of equally-rotated paragraphs starting at `p0` inside a
/// rotated text frame; returns the index one past the run.
fn append_rotated_group(
    out: &mut String,
    state: &mut ContentState,
    styles: &mut OdtStyles,
    subpage: &Subpage,
    p0: usize,
) -> usize {
    let (extent, p1) = rotated_extent(&subpage.paragraphs, p0);
    let paragraph = &subpage.paragraphs[p0];
    let rotation = paragraph.rotation();
    let origin = paragraph.first_line().first_glyph().pos;
    // The frame anchors in the document's y-down space.
    let y = if subpage.mediabox.is_valid() {
        subpage.mediabox.max.y - origin.y
    } else {
        origin.y
    };

    out.push_str("\n\n<text:p>");
    out.push_str(&format!(
        "<draw:frame text:anchor-type=\"paragraph\" draw:z-index=\"0\" \
         svg:width=\"{:.2}pt\" svg:height=\"{:.2}pt\" \
         draw:transform=\"rotate ({rotation:.6}) translate ({:.2}pt {y:.2}pt)\">",
        extent.x.max(1.0),
        extent.y.max(1.0),
        origin.x,
    ));
    out.push_str("<draw:text-box>");
    for paragraph in &subpage.paragraphs[p0..p1] {
        append_paragraph(out, state, styles, paragraph);
    }
    out.push_str("</draw:text-box></draw:frame></text:p>");
    p1
}

fn append_table(
    out: &mut String,
    state: &mut ContentState,
    styles: &mut OdtStyles,
    table: &Table,
    index: usize,
) {
    out.push_str(&format!("\n\n<table:table table:name=\"Table{index}\">"));
    out.push_str(&format!(
        "<table:table-column table:number-columns-repeated=\"{}\"/>",
        table.cells_num_x
    ));
    for iy in 0..table.cells_num_y {
        out.push_str("\n<table:table-row>");
        for ix in 0..table.cells_num_x {
            let cell = table.cell(ix, iy);
            if cell.is_continuation() {
                out.push_str("<table:covered-table-cell/>");
                continue;
            }
            out.push_str("<table:table-cell");
            if cell.extend_right > 1 {
                out.push_str(&format!(
                    " table:number-columns-spanned=\"{}\"",
                    cell.extend_right
                ));
            }
            if cell.extend_down > 1 {
                out.push_str(&format!(
                    " table:number-rows-spanned=\"{}\"",
                    cell.extend_down
                ));
            }
            out.push('>');
            for paragraph in &cell.paragraphs {
                append_paragraph(out, state, styles, paragraph);
            }
            out.push_str("</table:table-cell>");
        }
        out.push_str("</table:table-row>");
    }
    out.push_str("\n</table:table>");
}

/// Generate the `<office:text>` content fragment and its style table.
#[must_use]
pub fn document_to_odt_content(document: &Document, options: &Options) -> (String, OdtStyles) {
    let mut out = String::new();
    let mut styles = OdtStyles::default();
    for page in &document.pages {
        for subpage in &page.subpages {
            let mut state = ContentState::default();
            let mut p = 0;
            while p < subpage.paragraphs.len() {
                let paragraph = &subpage.paragraphs[p];
                if options.spacing {
                    if let Some(prev) = state.ctm_prev {
                        if !prev.eq4(paragraph.ctm()) {
                            paragraph_empty(&mut out);
                        }
                    }
                    paragraph_empty(&mut out);
                }
                if paragraph.rotation() != 0.0 {
                    p = append_rotated_group(&mut out, &mut state, &mut styles, subpage, p);
                } else {
                    append_paragraph(&mut out, &mut state, &mut styles, paragraph);
                    p += 1;
                }
            }
            for (index, table) in subpage.tables.iter().enumerate() {
                append_table(&mut out, &mut state, &mut styles, table, index + 1);
            }
        }
    }
    (out, styles)
}

const MIMETYPE: &str = "application/vnd.oasis.opendocument.text";

const MANIFEST: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<manifest:manifest xmlns:manifest="urn:oasis:names:tc:opendocument:xmlns:manifest:1.0" manifest:version="1.2">
<manifest:file-entry manifest:full-path="/" manifest:media-type="application/vnd.oasis.opendocument.text"/>
<manifest:file-entry manifest:full-path="content.xml" manifest:media-type="text/xml"/>
<manifest:file-entry manifest:full-path="styles.xml" manifest:media-type="text/xml"/>
</manifest:manifest>
"#;

const STYLES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<office:document-styles xmlns:office="urn:oasis:names:tc:opendocument:xmlns:office:1.0" office:version="1.2">
<office:styles/>
</office:document-styles>
"#;

const CONTENT_HEAD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<office:document-content xmlns:office="urn:oasis:names:tc:opendocument:xmlns:office:1.0" xmlns:text="urn:oasis:names:tc:opendocument:xmlns:text:1.0" xmlns:style="urn:oasis:names:tc:opendocument:xmlns:style:1.0" xmlns:fo="urn:oasis:names:tc:opendocument:xmlns:xsl-fo-compatible:1.0" xmlns:table="urn:oasis:names:tc:opendocument:xmlns:table:1.0" xmlns:draw="urn:oasis:names:tc:opendocument:xmlns:drawing:1.0" xmlns:svg="urn:oasis:names:tc:opendocument:xmlns:svg-compatible:1.0" office:version="1.2">
"#;

/// Write a complete `.odt` archive for `document` to `writer`.
///
/// The `mimetype` entry is stored uncompressed as the archive's first entry,
/// as OpenDocument consumers require.
///
/// # Errors
///
/// Returns [`crate::error::BackendError`] on I/O or ZIP failure.
pub fn write_odt<W: Write + Seek>(document: &Document, options: &Options, writer: W) -> Result<()> {
    let (content, styles) = document_to_odt_content(document, options);

    let mut archive = ZipWriter::new(writer);
    archive.start_file(
        "mimetype",
        SimpleFileOptions::default().compression_method(CompressionMethod::Stored),
    )?;
    archive.write_all(MIMETYPE.as_bytes())?;

    let deflated = SimpleFileOptions::default();
    archive.start_file("META-INF/manifest.xml", deflated)?;
    archive.write_all(MANIFEST.as_bytes())?;

    archive.start_file("styles.xml", deflated)?;
    archive.write_all(STYLES_XML.as_bytes())?;

    archive.start_file("content.xml", deflated)?;
    archive.write_all(CONTENT_HEAD.as_bytes())?;
    archive.write_all(b"<office:automatic-styles>\n")?;
    archive.write_all(styles.definitions().as_bytes())?;
    archive.write_all(b"</office:automatic-styles>\n<office:body><office:text>")?;
    archive.write_all(content.as_bytes())?;
    archive.write_all(b"</office:text></office:body></office:document-content>\n")?;

    archive.finish()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_core::geom::{Matrix, Point, Rect};
    use weft_core::model::{Glyph, Line, Page};

    fn span(text: &str, font_name: &str, bold: bool) -> Span {
        Span {
            ctm: Matrix::IDENTITY,
            trm: Matrix::IDENTITY,
            font_name: font_name.to_string(),
            bold,
            italic: false,
            vertical: false,
            glyphs: text
                .chars()
                .enumerate()
                .map(|(i, c)| Glyph {
                    pre: Point::new(5.0 * i as f64, 0.0),
                    pos: Point::new(5.0 * i as f64, 0.0),
                    ucs: u32::from(c),
                    adv: 5.0,
                })
                .collect(),
        }
    }

    fn document_with(paragraphs: Vec<Paragraph>) -> Document {
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
    fn styles_deduplicate_and_number_from_eleven() {
        let line = Line {
            spans: vec![
                span("a", "Helvetica", false),
                span("b", "Helvetica", true),
                span("c", "Helvetica", false),
            ],
        };
        let document = document_with(vec![Paragraph::from_line(line)]);
        let (content, styles) = document_to_odt_content(
            &document,
            &Options {
                spacing: false,
                ..Options::default()
            },
        );
        // Two distinct styles despite three spans.
        let definitions = styles.definitions();
        assert_eq!(definitions.matches("<style:style").count(), 2);
        assert!(definitions.contains("style:name=\"T11\""));
        assert!(definitions.contains("style:name=\"T12\""));
        assert!(content.contains("text:style-name=\"T11\""));
        assert!(content.contains("text:style-name=\"T12\""));
    }

    #[test]
    fn rotated_paragraphs_get_a_frame() {
        let mut rotated = span("up", "Helvetica", false);
        rotated.ctm = Matrix {
            a: 0.0,
            b: 1.0,
            c: -1.0,
            d: 0.0,
            e: 0.0,
            f: 0.0,
        };
        let document = document_with(vec![Paragraph::from_line(Line::from_span(rotated))]);
        let (content, _) = document_to_odt_content(
            &document,
            &Options {
                spacing: false,
                ..Options::default()
            },
        );
        assert!(content.contains("<draw:frame"));
        assert!(content.contains("draw:transform=\"rotate ("));
        assert!(content.contains("<draw:text-box>"));
    }

    #[test]
    fn tables_use_covered_cells_for_continuations() {
        let mut cells: Vec<weft_core::model::Cell> = (0..4)
            .map(|i| {
                let ix = i % 2;
                let iy = i / 2;
                let mut cell = weft_core::model::Cell::new(Rect::new(
                    50.0 * f64::from(ix),
                    50.0 * f64::from(1 - iy),
                    50.0 * f64::from(ix + 1),
                    50.0 * f64::from(2 - iy),
                ));
                cell.left = true;
                cell.top = true;
                cell
            })
            .collect();
        cells[1].extend_down = 2;
        cells[3].top = false;
        let table = Table {
            origin: Point::new(0.0, 100.0),
            rect: Rect::new(0.0, 0.0, 100.0, 100.0),
            cells_num_x: 2,
            cells_num_y: 2,
            cells,
        };
        let mut document = document_with(Vec::new());
        document.pages[0].subpages[0].tables.push(table);

        let (content, _) = document_to_odt_content(&document, &Options::default());
        assert!(content.contains("<table:table "));
        assert!(content.contains("table:number-rows-spanned=\"2\""));
        assert_eq!(content.matches("<table:covered-table-cell/>").count(), 1);
    }

    #[test]
    fn archive_stores_mimetype_first_and_uncompressed() {
        let document = document_with(vec![Paragraph::from_line(Line::from_span(span(
            "x",
            "Helvetica",
            false,
        )))]);
        let mut buffer = std::io::Cursor::new(Vec::new());
        write_odt(&document, &Options::default(), &mut buffer).unwrap();

        let mut archive = zip::ZipArchive::new(buffer).unwrap();
        let first = archive.by_index(0).unwrap();
        assert_eq!(first.name(), "mimetype");
        assert_eq!(first.compression(), CompressionMethod::Stored);
        drop(first);
        assert!(archive.by_name("content.xml").is_ok());
        assert!(archive.by_name("META-INF/manifest.xml").is_ok());
        assert!(archive.by_name("styles.xml").is_ok());
    }
}
