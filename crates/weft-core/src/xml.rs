//! Reader for the intermediate glyph-stream XML produced by the upstream
//! PDF interpreter (`mutool draw -F xmltext`, `gs -sDEVICE=txtwrite`).
//!
//! The stream is a flat sequence of pages:
//!
//! ```text
//! <page>
//!   <span ctm="a b c d e f" trm="a b c d e f" font_name="..." wmode="0">
//!     <char x="..." y="..." adv="..." ucs="..."/>
//!     ...
//!   </span>
//!   ...
//! </page>
//! ```
//!
//! An `<?xml ...?>` declaration is accepted and skipped. Anything else at
//! the top level is a hard error, as is a missing required attribute or a
//! non-numeric value; the error carries the byte offset of the offending
//! element.

use crate::builder::DocumentBuilder;
use crate::error::{Result, WeftError};
use crate::geom::Matrix;
use crate::model::Document;
use crate::options::Options;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Parse an intermediate stream from any buffered reader.
///
/// # Errors
///
/// Returns [`WeftError::Input`] for a malformed stream and [`WeftError::Xml`]
/// / [`WeftError::Io`] for low-level trouble. Any partially loaded document
/// is dropped.
pub fn parse_intermediate<R: BufRead>(reader: R, options: &Options) -> Result<Document> {
    let mut reader = Reader::from_reader(reader);
    reader.trim_text(true);
    let mut builder = DocumentBuilder::new(*options);
    let mut buf = Vec::new();

    loop {
        let offset = reader.buffer_position() as u64;
        match reader.read_event_into(&mut buf)? {
            Event::Decl(_) => {}
            Event::Start(e) if e.name().as_ref() == b"page" => {
                parse_page(&mut reader, &mut builder)?;
            }
            Event::Empty(e) if e.name().as_ref() == b"page" => {
                builder.page_begin();
                builder.page_end();
            }
            Event::Eof => break,
            Event::Comment(_) => {}
            other => {
                return Err(WeftError::input(
                    offset,
                    format!("expected <page> but found {}", describe(&other)),
                ));
            }
        }
        buf.clear();
    }

    Ok(builder.finish())
}

/// Parse an intermediate stream held in memory.
///
/// # Errors
///
/// See [`parse_intermediate`].
pub fn parse_intermediate_str(input: &str, options: &Options) -> Result<Document> {
    parse_intermediate(input.as_bytes(), options)
}

/// Parse an intermediate stream from a file.
///
/// # Errors
///
/// See [`parse_intermediate`].
pub fn parse_intermediate_file(path: &Path, options: &Options) -> Result<Document> {
    let file = File::open(path)?;
    parse_intermediate(BufReader::new(file), options)
}

fn parse_page<R: BufRead>(reader: &mut Reader<R>, builder: &mut DocumentBuilder) -> Result<()> {
    builder.page_begin();
    let mut buf = Vec::new();
    loop {
        let offset = reader.buffer_position() as u64;
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.name().as_ref() == b"span" => {
                span_begin(&e, offset, builder)?;
                parse_span(reader, builder)?;
            }
            Event::Empty(e) if e.name().as_ref() == b"span" => {
                span_begin(&e, offset, builder)?;
                builder.span_end();
            }
            Event::End(e) if e.name().as_ref() == b"page" => {
                builder.page_end();
                return Ok(());
            }
            Event::Comment(_) => {}
            Event::Eof => {
                return Err(WeftError::input(offset, "unterminated <page>"));
            }
            other => {
                return Err(WeftError::input(
                    offset,
                    format!("expected <span> or </page> but found {}", describe(&other)),
                ));
            }
        }
        buf.clear();
    }
}

fn parse_span<R: BufRead>(reader: &mut Reader<R>, builder: &mut DocumentBuilder) -> Result<()> {
    let mut buf = Vec::new();
    loop {
        let offset = reader.buffer_position() as u64;
        match reader.read_event_into(&mut buf)? {
            Event::Empty(e) if e.name().as_ref() == b"char" => {
                let x = float_attr(&e, "x", offset)?;
                let y = float_attr(&e, "y", offset)?;
                let adv = float_attr(&e, "adv", offset)?;
                let ucs = int_attr(&e, "ucs", offset)?;
                builder.glyph(x, y, adv, ucs);
            }
            Event::End(e) if e.name().as_ref() == b"span" => {
                builder.span_end();
                return Ok(());
            }
            Event::Comment(_) => {}
            Event::Eof => {
                return Err(WeftError::input(offset, "unterminated <span>"));
            }
            other => {
                return Err(WeftError::input(
                    offset,
                    format!("expected <char/> or </span> but found {}", describe(&other)),
                ));
            }
        }
        buf.clear();
    }
}

fn span_begin(e: &BytesStart<'_>, offset: u64, builder: &mut DocumentBuilder) -> Result<()> {
    let ctm = matrix_attr(e, "ctm", offset)?;
    let trm = matrix_attr(e, "trm", offset)?;
    let font_name = string_attr(e, "font_name", offset)?;
    let wmode = int_attr(e, "wmode", offset)?;
    builder.span_begin(ctm, trm, &font_name, wmode != 0);
    Ok(())
}

fn describe(event: &Event<'_>) -> String {
    match event {
        Event::Start(e) | Event::Empty(e) => {
            format!("<{}>", String::from_utf8_lossy(e.name().as_ref()))
        }
        Event::End(e) => format!("</{}>", String::from_utf8_lossy(e.name().as_ref())),
        Event::Text(_) => "text".to_string(),
        other => format!("{other:?}"),
    }
}

fn string_attr(e: &BytesStart<'_>, name: &str, offset: u64) -> Result<String> {
    for attr in e.attributes() {
        let attr =
            attr.map_err(|err| WeftError::input(offset, format!("bad attribute: {err}")))?;
        if attr.key.as_ref() == name.as_bytes() {
            let value = attr
                .unescape_value()
                .map_err(|err| WeftError::input(offset, format!("bad attribute value: {err}")))?;
            return Ok(value.into_owned());
        }
    }
    Err(WeftError::input(
        offset,
        format!("missing required attribute '{name}'"),
    ))
}

fn float_attr(e: &BytesStart<'_>, name: &str, offset: u64) -> Result<f64> {
    let value = string_attr(e, name, offset)?;
    value.trim().parse().map_err(|_| {
        WeftError::input(offset, format!("attribute '{name}' is not a number: '{value}'"))
    })
}

fn int_attr(e: &BytesStart<'_>, name: &str, offset: u64) -> Result<u32> {
    let value = string_attr(e, name, offset)?;
    value.trim().parse().map_err(|_| {
        WeftError::input(
            offset,
            format!("attribute '{name}' is not an integer: '{value}'"),
        )
    })
}

fn matrix_attr(e: &BytesStart<'_>, name: &str, offset: u64) -> Result<Matrix> {
    let value = string_attr(e, name, offset)?;
    let mut parts = value.split_whitespace().map(str::parse::<f64>);
    let mut next = || -> Result<f64> {
        parts
            .next()
            .and_then(std::result::Result::ok)
            .ok_or_else(|| {
                WeftError::input(
                    offset,
                    format!("attribute '{name}' is not a 6-element matrix: '{value}'"),
                )
            })
    };
    Ok(Matrix {
        a: next()?,
        b: next()?,
        c: next()?,
        d: next()?,
        e: next()?,
        f: next()?,
    })
}
