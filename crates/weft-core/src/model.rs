//! The reconstructed document tree.
//!
//! Ownership forms a strict tree: a span owns its glyphs, a line owns its
//! spans, a paragraph owns its lines, a cell owns the paragraphs routed into
//! it, a table owns its cells, a subpage owns its paragraphs and tables, a
//! page owns its subpages and a document owns its pages. Entities are built
//! during assembly and never mutated after their container is finalized.

use crate::geom::{Matrix, Point, Rect};
use crate::options::Options;
use serde::Serialize;

/// Unicode scalar marking a glyph that has been routed into a table cell and
/// must be purged from its original span. Never visible outside the routing
/// pass.
pub(crate) const UCS_REMOVED: u32 = u32::MAX;

/// One typeset character.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Glyph {
    /// Position before transformation by the ctm.
    pub pre: Point,
    /// Position after transformation by the ctm.
    pub pos: Point,
    /// Unicode scalar value.
    pub ucs: u32,
    /// Advance in font units.
    pub adv: f64,
}

impl Glyph {
    /// True for the ASCII space character.
    #[inline]
    #[must_use]
    pub fn is_space(&self) -> bool {
        self.ucs == u32::from(' ')
    }
}

/// A contiguous run of glyphs sharing font, ctm, trm and writing mode.
///
/// A span is never empty; every pass that can drain one removes it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Span {
    /// Current transformation matrix (user space → device space).
    pub ctm: Matrix,
    /// Text rendering matrix (font units → user space).
    pub trm: Matrix,
    /// Font name with any subset prefix (`ABCDEF+`) stripped.
    pub font_name: String,
    /// `-Bold` seen in the font name.
    pub bold: bool,
    /// `-Oblique` seen in the font name.
    pub italic: bool,
    /// Writing mode: false = horizontal, true = vertical.
    pub vertical: bool,
    /// The glyph run, in input order.
    pub glyphs: Vec<Glyph>,
}

impl Span {
    /// A new empty span inheriting the rendering state of `self`.
    #[must_use]
    pub fn derived(&self) -> Self {
        Self {
            ctm: self.ctm,
            trm: self.trm,
            font_name: self.font_name.clone(),
            bold: self.bold,
            italic: self.italic,
            vertical: self.vertical,
            glyphs: Vec::new(),
        }
    }

    /// First glyph. Panics on an empty span, which no pass may produce.
    #[inline]
    #[must_use]
    pub fn first_glyph(&self) -> &Glyph {
        &self.glyphs[0]
    }

    /// Last glyph.
    #[inline]
    #[must_use]
    pub fn last_glyph(&self) -> &Glyph {
        &self.glyphs[self.glyphs.len() - 1]
    }

    /// Rotation of the span: `atan2(-ctm.c, ctm.a)`.
    #[inline]
    #[must_use]
    pub fn angle(&self) -> f64 {
        (-self.ctm.c).atan2(self.ctm.a)
    }

    /// Effective font size: the product of the trm and ctm expansions.
    #[inline]
    #[must_use]
    pub fn font_size(&self) -> f64 {
        self.trm.expansion() * self.ctm.expansion()
    }

    /// Total advance of the span: the distance from first to last glyph plus
    /// the last glyph's own advance, so a one-glyph span is never zero-width.
    #[must_use]
    pub fn adv_total(&self) -> f64 {
        let first = self.first_glyph().pos;
        let last = self.last_glyph().pos;
        first.distance(&last) + self.last_glyph().adv * self.trm.expansion()
    }

    /// Whether both spans may ever share a line: same writing mode and a
    /// ctm4-equal transform.
    #[inline]
    #[must_use]
    pub fn compatible(&self, other: &Self) -> bool {
        self.vertical == other.vertical && self.ctm.eq4(&other.ctm)
    }
}

/// Spans sharing one baseline, in geometric order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Line {
    /// The spans of the line; never empty.
    pub spans: Vec<Span>,
}

impl Line {
    /// Wrap a single span.
    #[inline]
    #[must_use]
    pub fn from_span(span: Span) -> Self {
        Self { spans: vec![span] }
    }

    /// First span.
    #[inline]
    #[must_use]
    pub fn first_span(&self) -> &Span {
        &self.spans[0]
    }

    /// Last span.
    #[inline]
    #[must_use]
    pub fn last_span(&self) -> &Span {
        &self.spans[self.spans.len() - 1]
    }

    /// First glyph of the first span.
    #[inline]
    #[must_use]
    pub fn first_glyph(&self) -> &Glyph {
        self.first_span().first_glyph()
    }

    /// Last glyph of the last span.
    #[inline]
    #[must_use]
    pub fn last_glyph(&self) -> &Glyph {
        self.last_span().last_glyph()
    }

    /// Line angle; all spans in a line share it, so the first span decides.
    #[inline]
    #[must_use]
    pub fn angle(&self) -> f64 {
        self.first_span().angle()
    }

    /// Maximum trm expansion over the line's spans.
    #[must_use]
    pub fn font_size_max(&self) -> f64 {
        self.spans
            .iter()
            .map(|s| s.trm.expansion())
            .fold(0.0, f64::max)
    }
}

/// Vertically adjacent lines sharing a ctm4, in reading order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Paragraph {
    /// The lines of the paragraph; never empty.
    pub lines: Vec<Line>,
}

impl Paragraph {
    /// Wrap a single line.
    #[inline]
    #[must_use]
    pub fn from_line(line: Line) -> Self {
        Self { lines: vec![line] }
    }

    /// First line.
    #[inline]
    #[must_use]
    pub fn first_line(&self) -> &Line {
        &self.lines[0]
    }

    /// Last line.
    #[inline]
    #[must_use]
    pub fn last_line(&self) -> &Line {
        &self.lines[self.lines.len() - 1]
    }

    /// The ctm shared by every line of the paragraph.
    #[inline]
    #[must_use]
    pub fn ctm(&self) -> &Matrix {
        &self.first_line().first_span().ctm
    }

    /// Rotation of the paragraph in radians: `atan2(ctm.b, ctm.a)`.
    #[inline]
    #[must_use]
    pub fn rotation(&self) -> f64 {
        let ctm = self.ctm();
        ctm.b.atan2(ctm.a)
    }

    /// Union of the glyph positions in the paragraph.
    #[must_use]
    pub fn bounds(&self) -> Rect {
        let mut rect = Rect::EMPTY;
        for line in &self.lines {
            for span in &line.spans {
                for glyph in &span.glyphs {
                    rect.extend(glyph.pos);
                }
            }
        }
        rect
    }
}

/// One table cell.
///
/// A cell missing its `left` or `top` edge is a continuation cell: it is
/// covered by the rightward/downward extension of an earlier cell and owns no
/// content of its own.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cell {
    /// Cell bounds within the table rect.
    pub rect: Rect,
    /// A ruling line closes the left edge.
    pub left: bool,
    /// A ruling line closes the right edge.
    pub right: bool,
    /// A ruling line closes the top edge.
    pub top: bool,
    /// A ruling line closes the bottom edge.
    pub bottom: bool,
    /// Number of grid columns this cell spans (≥ 1).
    pub extend_right: usize,
    /// Number of grid rows this cell spans (≥ 1).
    pub extend_down: usize,
    /// The cell's own reconstructed paragraphs.
    pub paragraphs: Vec<Paragraph>,
}

impl Cell {
    pub fn new(rect: Rect) -> Self {
        Self {
            rect,
            left: false,
            right: false,
            top: false,
            bottom: false,
            extend_right: 1,
            extend_down: 1,
            paragraphs: Vec::new(),
        }
    }

    /// True when this cell is covered by a merged neighbor and emits no
    /// content of its own.
    #[inline]
    #[must_use]
    pub fn is_continuation(&self) -> bool {
        !self.left || !self.top
    }
}

/// A reconstructed table: a rectangular, row-major grid of cells.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    /// Top-left corner of the table in page coordinates.
    pub origin: Point,
    /// Table bounds.
    pub rect: Rect,
    /// Number of grid columns.
    pub cells_num_x: usize,
    /// Number of grid rows.
    pub cells_num_y: usize,
    /// Row-major cells; `cells.len() == cells_num_x * cells_num_y`.
    pub cells: Vec<Cell>,
}

impl Table {
    /// Cell at grid position `(ix, iy)`.
    #[inline]
    #[must_use]
    pub fn cell(&self, ix: usize, iy: usize) -> &Cell {
        &self.cells[iy * self.cells_num_x + ix]
    }

    /// Iterate rows as slices of cells.
    pub fn rows(&self) -> impl Iterator<Item = &[Cell]> {
        self.cells.chunks(self.cells_num_x)
    }
}

/// A zero-extent ruling-line segment in page coordinates.
///
/// Horizontal segments have `min.y == max.y`; vertical segments have
/// `min.x == max.x`. They arrive from an external line detector.
pub type Ruling = Rect;

/// Content within one media rectangle.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Subpage {
    /// Union of the glyph positions seen on the subpage.
    pub mediabox: Rect,
    /// Detected horizontal ruling segments.
    pub rulings_horizontal: Vec<Ruling>,
    /// Detected vertical ruling segments.
    pub rulings_vertical: Vec<Ruling>,
    /// Raw spans as loaded; drained into `paragraphs` and `tables` by
    /// [`Subpage::reconstruct`].
    pub spans: Vec<Span>,
    /// Reconstructed paragraphs in reading order.
    pub paragraphs: Vec<Paragraph>,
    /// Reconstructed tables.
    pub tables: Vec<Table>,
}

impl Subpage {
    /// Run the join engine on the subpage: table reconstruction first (when
    /// layout analysis is enabled), then line and paragraph assembly over the
    /// remaining spans, then reading-order sorting.
    ///
    /// Glyphs routed into a table cell are removed from the page-level stream
    /// before page-level assembly runs, so every glyph ends up in exactly one
    /// of the two.
    pub fn reconstruct(&mut self, options: &Options) {
        if options.layout_analysis {
            self.tables = crate::tables::reconstruct_tables(
                &mut self.spans,
                &self.rulings_horizontal,
                &self.rulings_vertical,
            );
        }
        let spans = std::mem::take(&mut self.spans);
        let lines = crate::join::make_lines(spans);
        self.paragraphs = crate::join::make_paragraphs(lines);
    }
}

/// One page of the document.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Page {
    /// Union of the glyph positions seen on the page.
    pub mediabox: Rect,
    /// The page's subpages; a single subpage unless layout analysis split
    /// the page.
    pub subpages: Vec<Subpage>,
}

/// An ordered sequence of pages.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Document {
    /// The pages, in input order.
    pub pages: Vec<Page>,
}

impl Document {
    /// Join spans into lines, lines into paragraphs and ruling lines into
    /// tables on every page.
    pub fn reconstruct(&mut self, options: &Options) {
        for (index, page) in self.pages.iter_mut().enumerate() {
            let span_count: usize = page.subpages.iter().map(|s| s.spans.len()).sum();
            log::debug!("reconstructing page {index}: {span_count} spans");
            for subpage in &mut page.subpages {
                subpage.reconstruct(options);
            }
        }
    }
}
