//! weft-backend: output emitters for reconstructed documents.
//!
//! The core guarantees that paragraphs arrive in reading order, that cell
//! routing is complete, and that synthetic spaces and dehyphenation are
//! already applied; the backends only render. Each backend owns its own
//! escaping, run batching and container assembly:
//!
//! - [`docx`]: WordprocessingML fragments and a complete `.docx` archive.
//! - [`odt`]: OpenDocument text with deduplicated automatic styles and a
//!   complete `.odt` archive (stored `mimetype` first).
//! - [`html`]: a standalone HTML page.
//! - [`json`]: a JSON tree of pages, text blocks and tables.

pub mod docx;
pub mod error;
pub mod escape;
pub mod html;
pub mod json;
pub mod odt;

pub use docx::{document_to_docx_content, write_docx};
pub use error::{BackendError, Result};
pub use html::document_to_html;
pub use json::{document_to_json, document_to_json_string};
pub use odt::{document_to_odt_content, write_odt};
