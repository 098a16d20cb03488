//! Configuration for the reordering pipeline.

use crate::parser_config::ParserOptions;

/// Default fan-out for [`PageTreeLayout::Balanced`].
pub const DEFAULT_MAX_KIDS: usize = 32;

/// Shape of the rebuilt page tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageTreeLayout {
    /// Every page is a direct kid of the root `Pages` node.
    #[default]
    Flat,
    /// Intermediate `Pages` nodes with at most `max_kids` kids each.
    Balanced {
        /// Fan-out limit per node (values below 2 are treated as 2)
        max_kids: usize,
    },
}

impl PageTreeLayout {
    /// Balanced layout with the default fan-out.
    pub fn balanced() -> Self {
        PageTreeLayout::Balanced {
            max_kids: DEFAULT_MAX_KIDS,
        }
    }
}

/// Output formatting options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriterOptions {
    /// Renumber live objects sequentially from 1
    pub renumber: bool,
    /// Write dictionaries on one line
    pub compact: bool,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            renumber: true,
            compact: false,
        }
    }
}

/// Options for a complete reorder run.
///
/// # Example
///
/// ```
/// use pdf_reorder::config::{PageTreeLayout, ReorderOptions};
/// use pdf_reorder::parser_config::ParserOptions;
///
/// let options = ReorderOptions::new()
///     .with_parser_options(ParserOptions::lenient())
///     .with_layout(PageTreeLayout::Balanced { max_kids: 8 })
///     .with_renumbering(false);
/// assert!(!options.writer.renumber);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ReorderOptions {
    /// How the input is parsed
    pub parser: ParserOptions,
    /// Shape of the output page tree
    pub layout: PageTreeLayout,
    /// How the output is written
    pub writer: WriterOptions,
}

impl ReorderOptions {
    /// Create options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the parser options.
    pub fn with_parser_options(mut self, parser: ParserOptions) -> Self {
        self.parser = parser;
        self
    }

    /// Set the page tree layout.
    pub fn with_layout(mut self, layout: PageTreeLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Enable or disable object renumbering.
    pub fn with_renumbering(mut self, enable: bool) -> Self {
        self.writer.renumber = enable;
        self
    }

    /// Enable or disable compact dictionary layout.
    pub fn with_compact_output(mut self, enable: bool) -> Self {
        self.writer.compact = enable;
        self
    }
}
