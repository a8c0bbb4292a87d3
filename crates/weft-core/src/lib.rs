//! weft-core: geometric reconstruction of text structure from PDF glyph
//! streams.
//!
//! An upstream PDF interpreter reports, per glyph, a pre-transform position,
//! the current transformation matrix, the text rendering matrix, an advance
//! and a Unicode scalar. This crate turns that unordered soup back into a
//! document: spans of glyphs, lines of spans, paragraphs of lines in reading
//! order, and (when ruling-line segments are known) tables of cells with
//! merge information.
//!
//! The pipeline per page:
//!
//! 1. [`xml::parse_intermediate`] loads the stream, refining spans as glyphs
//!    arrive (spurious-space removal, continuation splits).
//! 2. [`Document::reconstruct`] routes glyphs into table cells, joins spans
//!    into lines and lines into paragraphs, and sorts paragraphs into
//!    reading order.
//!
//! Everything is synchronous and single-threaded; one page is processed to
//! completion at a time.

pub mod builder;
pub mod error;
pub mod geom;
pub mod join;
pub mod model;
pub mod options;
pub mod tables;
pub mod xml;

pub use builder::DocumentBuilder;
pub use error::{Result, WeftError};
pub use geom::{Matrix, Point, Rect};
pub use model::{Cell, Document, Glyph, Line, Page, Paragraph, Ruling, Span, Subpage, Table};
pub use options::Options;
pub use xml::{parse_intermediate, parse_intermediate_file, parse_intermediate_str};
