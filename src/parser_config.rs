//! Parser configuration for controlling lenient/strict parsing modes.

/// Parser options for controlling error handling and recovery behavior.
///
/// These options trade strict PDF compliance for broader compatibility with
/// malformed or non-standard files. The default tolerates common writer bugs
/// (missing `endobj`, wrong stream `/Length`) but still fails on objects it
/// cannot read.
///
/// # Example
///
/// ```
/// use pdf_reorder::parser_config::ParserOptions;
///
/// // Strict mode - fail on first error
/// let strict = ParserOptions::strict();
/// assert!(!strict.allow_missing_endobj);
///
/// // Lenient mode - skip invalid objects and rebuild broken xref tables
/// let lenient = ParserOptions::lenient();
/// assert!(lenient.recover_xref);
///
/// // Custom configuration
/// let custom = ParserOptions {
///     max_nesting: 50,
///     ..ParserOptions::default()
/// };
/// assert_eq!(custom.max_nesting, 50);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserOptions {
    /// Fail on the first format violation instead of attempting recovery
    pub strict: bool,

    /// Skip objects that fail to load instead of failing the document
    pub skip_invalid_objects: bool,

    /// Maximum number of skipped objects before giving up (0 = unlimited)
    pub max_errors: usize,

    /// Maximum object nesting depth
    ///
    /// PDF Spec: ISO 32000-1:2008, Section H.1 - Implementation Limits
    pub max_nesting: usize,

    /// Allow objects without "endobj" keyword
    pub allow_missing_endobj: bool,

    /// Allow streams with missing or incorrect Length
    pub allow_malformed_streams: bool,

    /// Rebuild the cross-reference table by scanning the file when it cannot be read
    pub recover_xref: bool,

    /// Maximum decompression ratio (decompressed:compressed). 0 disables the check.
    pub max_decompression_ratio: u32,

    /// Maximum decompressed stream size in bytes. 0 disables the check.
    pub max_decompressed_size: usize,

    /// Maximum page tree depth
    pub max_recursion_depth: u32,

    /// Maximum input size in bytes. 0 disables the check.
    pub max_file_size: usize,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            strict: false,
            skip_invalid_objects: false,
            max_errors: 1,
            max_nesting: 100,
            allow_missing_endobj: true,
            allow_malformed_streams: true,
            recover_xref: false,
            max_decompression_ratio: 100,
            max_decompressed_size: 100 * 1024 * 1024, // 100 MB
            max_recursion_depth: 100,
            max_file_size: 500 * 1024 * 1024, // 500 MB
        }
    }
}

impl ParserOptions {
    /// Strict mode: fail on any parsing error
    ///
    /// Use this for validating PDF compliance or when parsing trusted files.
    pub fn strict() -> Self {
        Self {
            strict: true,
            skip_invalid_objects: false,
            max_errors: 1,
            allow_missing_endobj: false,
            allow_malformed_streams: false,
            recover_xref: false,
            ..Self::default()
        }
    }

    /// Lenient mode: attempt to recover from parsing errors
    ///
    /// Objects that fail to load are skipped (references to them read as
    /// null) and an unreadable cross-reference table is rebuilt by scanning.
    pub fn lenient() -> Self {
        Self {
            skip_invalid_objects: true,
            max_errors: 1000,
            recover_xref: true,
            ..Self::default()
        }
    }

    /// Check if loading should continue after `error_count` skipped objects
    pub(crate) fn should_continue(&self, error_count: usize) -> bool {
        if self.strict || !self.skip_invalid_objects {
            return false;
        }

        if self.max_errors == 0 {
            return true;
        }

        error_count < self.max_errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_mode() {
        let opts = ParserOptions::strict();
        assert!(opts.strict);
        assert!(!opts.skip_invalid_objects);
        assert!(!opts.allow_missing_endobj);
        assert!(!opts.allow_malformed_streams);
        assert!(!opts.recover_xref);
    }

    #[test]
    fn test_default_mode() {
        let opts = ParserOptions::default();
        assert!(!opts.strict);
        assert!(!opts.skip_invalid_objects);
        assert!(opts.allow_missing_endobj);
        assert!(opts.allow_malformed_streams);
        assert!(!opts.recover_xref);
        assert_eq!(opts.max_nesting, 100);
    }

    #[test]
    fn test_lenient_mode() {
        let opts = ParserOptions::lenient();
        assert!(!opts.strict);
        assert!(opts.skip_invalid_objects);
        assert!(opts.allow_missing_endobj);
        assert!(opts.recover_xref);
    }

    #[test]
    fn test_should_continue() {
        assert!(!ParserOptions::strict().should_continue(0));
        assert!(!ParserOptions::default().should_continue(0));

        let lenient = ParserOptions::lenient();
        assert!(lenient.should_continue(0));
        assert!(lenient.should_continue(999));
        assert!(!lenient.should_continue(1000));

        let unlimited = ParserOptions {
            max_errors: 0,
            ..ParserOptions::lenient()
        };
        assert!(unlimited.should_continue(100_000));
    }
}
