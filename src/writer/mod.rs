//! PDF writing module.
//!
//! ## Architecture
//!
//! ```text
//! Document (rewritten page tree)
//!     ↓
//! [PdfWriter] (reachability, numbering, xref table, trailer)
//!     ↓
//! [ObjectSerializer] (serializes PDF objects)
//!     ↓
//! PDF bytes
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use pdf_reorder::config::WriterOptions;
//! use pdf_reorder::document::Document;
//! use pdf_reorder::writer::write_document;
//!
//! # fn main() -> pdf_reorder::Result<()> {
//! let data = std::fs::read("input.pdf")?;
//! let doc = Document::load(&data)?;
//! let bytes = write_document(&doc, &WriterOptions::default())?;
//! std::fs::write("output.pdf", bytes)?;
//! # Ok(())
//! # }
//! ```

mod object_serializer;
mod pdf_writer;

pub use object_serializer::ObjectSerializer;
pub use pdf_writer::{write_document, PdfWriter};
