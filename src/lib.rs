// Allow some clippy lints that are too pedantic for this project
#![allow(clippy::type_complexity)]
#![allow(clippy::enum_variant_names)]
#![allow(clippy::match_like_matches_macro)]

//! # pdf_reorder
//!
//! Native PDF page reordering: select, reorder and duplicate whole pages of a
//! PDF while preserving everything else in the file.
//!
//! ## Pipeline
//!
//! ```text
//! PDF bytes
//!     ↓
//! [Document::load]   object graph, cross-reference sections, trailer
//!     ↓
//! [PageTree::walk]   page order, inherited attributes, parent index
//!     ↓
//! [plan]             page ranges → permutation of source pages
//!     ↓
//! [rewrite]          new page tree in the requested order
//!     ↓
//! [PdfWriter]        header, live objects, xref table, trailer
//!     ↓
//! PDF bytes
//! ```
//!
//! Page ranges are 1-based and inclusive. Pages may repeat (duplicates are
//! cloned) and pages that are not mentioned are dropped.
//!
//! ## Quick Start
//!
//! ```no_run
//! use pdf_reorder::{reorder_pages, PageRange};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let input = std::fs::read("input.pdf")?;
//!
//! // Pages 3 and 4, then page 1
//! let output = reorder_pages(&input, &[PageRange::range(3, 4), PageRange::single(1)])?;
//! std::fs::write("output.pdf", output)?;
//!
//! // The same with a page-range string
//! let output = pdf_reorder::reorder_pages_str(&input, "3-4,1")?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

// Error handling
pub mod error;

// Core PDF parsing
pub mod document;
pub mod lexer;
pub mod object;
pub mod objstm;
pub mod parser;
/// Parser configuration options
pub mod parser_config;
pub mod xref;
pub mod xref_reconstruction;

// Stream decoders
pub mod decoders;

// Page tree
pub mod page_tree;

// Reordering
pub mod planner;
pub mod rewriter;

// PDF writing
pub mod writer;

// Configuration
pub mod config;

// Re-exports
pub use config::{PageTreeLayout, ReorderOptions, WriterOptions};
pub use document::Document;
pub use error::{Error, ErrorKind, Result};
pub use page_tree::PageTree;
pub use parser_config::ParserOptions;
pub use planner::{parse_page_ranges, PageRange, Permutation};
pub use rewriter::RewriteSummary;

/// Reorder the pages of `input` with default options.
///
/// # Errors
///
/// The first error of any stage: [`Error::MalformedDocument`],
/// [`Error::CorruptPageTree`], [`Error::InvalidRange`],
/// [`Error::PageOutOfBounds`], [`Error::EmptySpecification`] or
/// [`Error::Serialization`]. No partial output is produced.
pub fn reorder_pages(input: &[u8], ranges: &[PageRange]) -> Result<Vec<u8>> {
    reorder_pages_with_options(input, ranges, &ReorderOptions::default())
}

/// Reorder the pages of `input`.
pub fn reorder_pages_with_options(
    input: &[u8],
    ranges: &[PageRange],
    options: &ReorderOptions,
) -> Result<Vec<u8>> {
    let mut doc = Document::load_with_options(input, &options.parser)?;
    let tree = PageTree::walk(&doc)?;
    let permutation = planner::plan(tree.len(), ranges)?;
    let summary = rewriter::rewrite(&mut doc, &tree, &permutation, options.layout)?;

    log::info!(
        "Reordered {} pages into {} ({} duplicated, {} dropped)",
        tree.len(),
        summary.page_count,
        summary.clones.len(),
        summary.dropped.len()
    );

    writer::write_document(&doc, &options.writer)
}

/// Reorder the pages of `input` using a page-range string such as `"3-4,1"`.
pub fn reorder_pages_str(input: &[u8], ranges: &str) -> Result<Vec<u8>> {
    let ranges = parse_page_ranges(ranges)?;
    reorder_pages(input, &ranges)
}

// Version info
/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
