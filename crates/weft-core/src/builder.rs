//! Incremental construction of a [`Document`] from a glyph-stream event
//! sequence, with per-span refinement applied as glyphs arrive.
//!
//! The refinement pass inspects the last two glyphs of the open span every
//! time one is appended. Spurious intra-word spaces (a leftover of some
//! interpreters' word segmentation) are deleted; glyphs that do not continue
//! their predecessor within tolerance are split off into a new span. The
//! split is deliberately aggressive: the line assembler re-merges whatever
//! belongs together.

use crate::geom::{Matrix, Point, Rect};
use crate::model::{Document, Glyph, Page, Span, Subpage};
use crate::options::Options;

/// Relative positional error (in units of font size) beyond which a glyph no
/// longer counts as a continuation of its span.
const SPLIT_TOLERANCE: f64 = 0.01;

/// Builds a [`Document`] from `page_begin`/`span_begin`/`glyph`/… events.
///
/// The intermediate-XML reader drives this; embedding callers with their own
/// event source can drive it directly.
#[derive(Debug, Default)]
pub struct DocumentBuilder {
    document: Document,
    /// Spans of the page currently open, if any.
    page: Option<Vec<Span>>,
    /// True between `span_begin` and `span_end`.
    span_open: bool,
    /// Running pre-transform offset subtracted from incoming glyph
    /// positions; only ever non-zero in autosplit mode.
    offset: Point,
    options: Options,
    spans_split: usize,
    spans_autosplit: usize,
    spaces_removed: usize,
}

impl DocumentBuilder {
    /// A builder honoring `options` (only `autosplit` matters here).
    #[must_use]
    pub fn new(options: Options) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Start a new page.
    pub fn page_begin(&mut self) {
        debug_assert!(self.page.is_none(), "page already open");
        self.page = Some(Vec::new());
    }

    /// Finish the current page.
    pub fn page_end(&mut self) {
        let spans = self.page.take().unwrap_or_default();
        log::debug!(
            "loaded page {}: {} spans ({} split, {} autosplit, {} spaces removed)",
            self.document.pages.len(),
            spans.len(),
            self.spans_split,
            self.spans_autosplit,
            self.spaces_removed,
        );
        let mut mediabox = Rect::EMPTY;
        for span in &spans {
            for glyph in &span.glyphs {
                mediabox.extend(glyph.pos);
            }
        }
        self.document.pages.push(Page {
            mediabox,
            subpages: vec![Subpage {
                mediabox,
                spans,
                ..Subpage::default()
            }],
        });
    }

    /// Start a new span.
    ///
    /// `font_name` is stripped of any `+`-terminated subset prefix; the
    /// `-Bold` and `-Oblique` markers set the style flags.
    pub fn span_begin(&mut self, ctm: Matrix, trm: Matrix, font_name: &str, vertical: bool) {
        debug_assert!(!self.span_open, "span already open");
        let font_name = match font_name.split_once('+') {
            Some((_, suffix)) => suffix,
            None => font_name,
        };
        let span = Span {
            ctm,
            trm,
            font_name: font_name.to_string(),
            bold: font_name.contains("-Bold"),
            italic: font_name.contains("-Oblique"),
            vertical,
            glyphs: Vec::new(),
        };
        self.offset = Point::default();
        if let Some(page) = self.page.as_mut() {
            page.push(span);
            self.span_open = true;
        }
    }

    /// Close the current span, dropping it if it stayed empty.
    pub fn span_end(&mut self) {
        self.span_open = false;
        if let Some(page) = self.page.as_mut() {
            if page.last().is_some_and(|s| s.glyphs.is_empty()) {
                page.pop();
            }
        }
    }

    /// Append one glyph at pre-transform position `(x, y)` to the open span
    /// and refine the span's tail.
    pub fn glyph(&mut self, x: f64, y: f64, adv: f64, ucs: u32) {
        debug_assert!(self.span_open, "glyph outside span");
        let autosplit = self.options.autosplit;
        let Some(page) = self.page.as_mut() else {
            return;
        };
        if page.is_empty() {
            return;
        }

        if autosplit && y - self.offset.y != 0.0 {
            // Rebase the ctm translation onto the new offset and open a new
            // span, so each text row gets its own span even when the
            // interpreter emitted one.
            let span = &page[page.len() - 1];
            let ctm = span.ctm;
            let e = ctm.e + ctm.a * (x - self.offset.x) + ctm.b * (y - self.offset.y);
            let f = ctm.f + ctm.c * (x - self.offset.x) + ctm.d * (y - self.offset.y);
            self.offset = Point::new(x, y);
            if !span.glyphs.is_empty() {
                self.spans_autosplit += 1;
                let derived = span.derived();
                page.push(derived);
            }
            let span = page.last_mut().expect("page has a span");
            span.ctm.e = e;
            span.ctm.f = f;
        }

        let span = page.last_mut().expect("page has a span");
        let pre = Point::new(x - self.offset.x, y - self.offset.y);
        let pos = span.ctm.transform_point(pre);
        span.glyphs.push(Glyph { pre, pos, ucs, adv });

        self.refine_last();
    }

    /// Consume the builder, returning the finished document.
    #[must_use]
    pub fn finish(self) -> Document {
        debug_assert!(self.page.is_none(), "unterminated page");
        self.document
    }

    /// Inspect the last two glyphs of the page's last span and either leave
    /// them, delete a spurious penultimate space, or split the final glyph
    /// into a new span.
    fn refine_last(&mut self) {
        let Some(page) = self.page.as_mut() else {
            return;
        };
        let span = page.last_mut().expect("page has a span");
        let n = span.glyphs.len();
        if n < 2 {
            return;
        }

        let font_size = span.font_size();
        // The advance is in font units, so the expected step is the writing
        // direction mapped through the trm.
        let dir = if span.vertical {
            Point::new(0.0, 1.0)
        } else {
            Point::new(1.0, 0.0)
        };
        let dir = span.trm.transform_vector(dir);

        let prev = span.glyphs[n - 2];
        let last = span.glyphs[n - 1];
        let err_x = (last.pre.x - (prev.pre.x + prev.adv * dir.x)) / font_size;
        let err_y = (last.pre.y - (prev.pre.y + prev.adv * dir.y)) / font_size;

        if prev.is_space() {
            // The final glyph landing back inside the space's own advance, or
            // a very narrow gap between the two glyphs, marks the space as an
            // in-word artifact.
            let inside_space = err_x < -prev.adv / 2.0 && err_x > -prev.adv;
            let narrow_gap = (last.pre.x - prev.pre.x) / font_size < last.adv / 10.0;
            if inside_space || narrow_gap {
                span.glyphs[n - 2] = last;
                span.glyphs.pop();
                self.spaces_removed += 1;
            }
        } else if err_x.abs() > SPLIT_TOLERANCE || err_y.abs() > SPLIT_TOLERANCE {
            // Not a continuation of the previous glyph. Split; often wrong,
            // always corrected when spans are joined back into lines.
            let mut split = span.derived();
            split.glyphs.push(last);
            span.glyphs.pop();
            page.push(split);
            self.spans_split += 1;
        }
    }
}
