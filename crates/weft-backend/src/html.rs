//! HTML output: paragraphs with inline bold/italic state tracking and
//! bordered tables with colspan/rowspan.

use crate::escape::push_xml_char;
use weft_core::model::{Document, Paragraph, Table};
use weft_core::options::Options;

/// Bold/italic state carried across spans so tags open and close only when
/// the rendering actually changes.
#[derive(Debug, Default)]
struct ContentState {
    bold: bool,
    italic: bool,
}

impl ContentState {
    fn close(&mut self, out: &mut String) {
        if self.bold {
            out.push_str("</b>");
            self.bold = false;
        }
        if self.italic {
            out.push_str("</i>");
            self.italic = false;
        }
    }
}

fn append_paragraphs(out: &mut String, state: &mut ContentState, paragraphs: &[Paragraph]) {
    for paragraph in paragraphs {
        out.push_str("\n\n<p>");
        for line in &paragraph.lines {
            for span in &line.spans {
                if span.bold != state.bold {
                    out.push_str(if span.bold { "<b>" } else { "</b>" });
                    state.bold = span.bold;
                }
                if span.italic != state.italic {
                    out.push_str(if span.italic { "<i>" } else { "</i>" });
                    state.italic = span.italic;
                }
                for glyph in &span.glyphs {
                    push_xml_char(out, glyph.ucs);
                }
            }
        }
        out.push_str("\n</p>");
    }
}

fn append_table(out: &mut String, state: &mut ContentState, table: &Table) {
    out.push_str("\n\n<table border=\"1\" style=\"border-collapse:collapse\">\n");
    for row in table.rows() {
        out.push_str("    <tr>\n        ");
        for cell in row {
            if cell.is_continuation() {
                continue;
            }
            out.push_str("<td");
            if cell.extend_right > 1 {
                out.push_str(&format!(" colspan=\"{}\"", cell.extend_right));
            }
            if cell.extend_down > 1 {
                out.push_str(&format!(" rowspan=\"{}\"", cell.extend_down));
            }
            out.push('>');
            append_paragraphs(out, state, &cell.paragraphs);
            out.push_str("</td>");
        }
        out.push_str("\n    </tr>\n");
    }
    out.push_str("</table>\n");
}

/// Render `document` as a standalone HTML page.
#[must_use]
pub fn document_to_html(document: &Document, _options: &Options) -> String {
    let mut out = String::new();
    out.push_str("<html>\n<body>\n");
    for page in &document.pages {
        for subpage in &page.subpages {
            let mut state = ContentState::default();
            append_paragraphs(&mut out, &mut state, &subpage.paragraphs);
            state.close(&mut out);
            for table in &subpage.tables {
                let mut state = ContentState::default();
                append_table(&mut out, &mut state, table);
                state.close(&mut out);
            }
        }
    }
    out.push_str("</body>\n</html>\n");
    out
}
