//! PDF object parser.
//!
//! Combines lexer tokens into complete objects (arrays, dictionaries,
//! references, streams) by recursive descent. Parsing functions return nom's
//! `IResult`; callers at module boundaries convert failures into
//! [`Error::MalformedDocument`] with the byte offset where parsing stopped.

use crate::error::{Error, Result};
use crate::lexer::{is_whitespace, token, Token};
use crate::object::{Dictionary, Object, ObjectRef};
use crate::parser_config::ParserOptions;
use nom::IResult;

/// Resolves an indirect `/Length` entry of a stream dictionary.
///
/// Stream lengths are frequently stored as separate objects written after
/// the stream itself, so the parser asks the loader for them.
pub trait LengthResolver {
    /// Return the integer value of the referenced length object.
    fn resolve_length(&self, length_ref: ObjectRef) -> Option<usize>;
}

/// Decode escape sequences in a PDF literal string.
///
/// Handles `\n \r \t \b \f \( \) \\`, octal `\ddd` (1-3 digits), line
/// continuation (`\` before an end-of-line) and unescaped end-of-line markers,
/// which always read as a single LF. An unknown escape drops the backslash.
///
/// # Examples
///
/// ```
/// # use pdf_reorder::parser::decode_literal_string_escapes;
/// assert_eq!(decode_literal_string_escapes(b"Section \\247 71.01"), b"Section \xa7 71.01");
/// assert_eq!(decode_literal_string_escapes(b"a\\\nb"), b"ab");
/// ```
pub fn decode_literal_string_escapes(raw: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(raw.len());
    let mut i = 0;

    while i < raw.len() {
        match raw[i] {
            b'\\' if i + 1 < raw.len() => {
                let escaped = raw[i + 1];
                i += 2;
                match escaped {
                    b'n' => result.push(b'\n'),
                    b'r' => result.push(b'\r'),
                    b't' => result.push(b'\t'),
                    b'b' => result.push(0x08),
                    b'f' => result.push(0x0C),
                    b'\n' => {},
                    b'\r' => {
                        if raw.get(i) == Some(&b'\n') {
                            i += 1;
                        }
                    },
                    b'0'..=b'7' => {
                        let mut code = u32::from(escaped - b'0');
                        let mut digits = 1;
                        while digits < 3 {
                            match raw.get(i) {
                                Some(&d @ b'0'..=b'7') => {
                                    code = code * 8 + u32::from(d - b'0');
                                    i += 1;
                                    digits += 1;
                                },
                                _ => break,
                            }
                        }
                        // High-order overflow is ignored
                        result.push((code & 0xFF) as u8);
                    },
                    other => result.push(other),
                }
            },
            // Trailing lone backslash
            b'\\' => i += 1,
            b'\r' => {
                result.push(b'\n');
                i += 1;
                if raw.get(i) == Some(&b'\n') {
                    i += 1;
                }
            },
            byte => {
                result.push(byte);
                i += 1;
            },
        }
    }

    result
}

/// Decode a hex string body to bytes.
///
/// Whitespace is ignored; an odd final digit is padded with 0.
///
/// # Example
///
/// ```
/// use pdf_reorder::parser::decode_hex;
///
/// assert_eq!(decode_hex(b"48656C6C6F").unwrap(), b"Hello");
/// assert_eq!(decode_hex(b"7").unwrap(), vec![0x70]);
/// ```
pub fn decode_hex(hex_bytes: &[u8]) -> Result<Vec<u8>> {
    let mut result = Vec::with_capacity(hex_bytes.len() / 2 + 1);
    let mut high: Option<u8> = None;

    for &c in hex_bytes {
        if is_whitespace(c) {
            continue;
        }
        let nibble = (c as char)
            .to_digit(16)
            .ok_or_else(|| Error::Decode(format!("invalid hex digit '{}'", c as char)))?
            as u8;
        match high.take() {
            Some(h) => result.push((h << 4) | nibble),
            None => high = Some(nibble),
        }
    }
    if let Some(h) = high {
        result.push(h << 4);
    }

    Ok(result)
}

/// Byte offset of a nom failure relative to `base`.
pub(crate) fn error_offset(base: &[u8], err: &nom::Err<nom::error::Error<&[u8]>>) -> usize {
    match err {
        nom::Err::Error(e) | nom::Err::Failure(e) => base.len().saturating_sub(e.input.len()),
        nom::Err::Incomplete(_) => base.len(),
    }
}

fn fail<T>(input: &[u8], kind: nom::error::ErrorKind) -> IResult<&[u8], T> {
    Err(nom::Err::Error(nom::error::Error::new(input, kind)))
}

/// Configurable recursive-descent object parser.
#[derive(Clone, Copy)]
pub struct ObjectParser<'r> {
    max_nesting: usize,
    strict: bool,
    allow_malformed_streams: bool,
    allow_missing_endobj: bool,
    lengths: Option<&'r dyn LengthResolver>,
}

impl std::fmt::Debug for ObjectParser<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectParser")
            .field("max_nesting", &self.max_nesting)
            .field("strict", &self.strict)
            .field("allow_malformed_streams", &self.allow_malformed_streams)
            .field("allow_missing_endobj", &self.allow_missing_endobj)
            .field("has_length_resolver", &self.lengths.is_some())
            .finish()
    }
}

impl Default for ObjectParser<'_> {
    fn default() -> Self {
        Self::new(&ParserOptions::default())
    }
}

impl<'r> ObjectParser<'r> {
    /// Create a parser following the given options.
    pub fn new(options: &ParserOptions) -> Self {
        Self {
            max_nesting: options.max_nesting,
            strict: options.strict,
            allow_malformed_streams: options.allow_malformed_streams,
            allow_missing_endobj: options.allow_missing_endobj,
            lengths: None,
        }
    }

    /// Attach a resolver for indirect stream lengths.
    pub fn with_length_resolver(mut self, resolver: &'r dyn LengthResolver) -> Self {
        self.lengths = Some(resolver);
        self
    }

    /// Parse one direct object.
    pub fn parse<'a>(&self, input: &'a [u8]) -> IResult<&'a [u8], Object> {
        self.parse_at_depth(input, 0)
    }

    /// Parse an indirect object definition: `N G obj <object> endobj`.
    pub fn parse_indirect<'a>(&self, input: &'a [u8]) -> IResult<&'a [u8], (ObjectRef, Object)> {
        let (rest, id) = match token(input)? {
            (rest, Token::Integer(id)) if (0..=u32::MAX as i64).contains(&id) => (rest, id as u32),
            _ => return fail(input, nom::error::ErrorKind::Digit),
        };
        let (rest, gen) = match token(rest)? {
            (rest, Token::Integer(gen)) if (0..=u16::MAX as i64).contains(&gen) => {
                (rest, gen as u16)
            },
            _ => return fail(rest, nom::error::ErrorKind::Digit),
        };
        let rest = match token(rest)? {
            (rest, Token::ObjStart) => rest,
            _ => return fail(rest, nom::error::ErrorKind::Tag),
        };

        let (rest, object) = self.parse(rest)?;

        match token(rest) {
            Ok((after, Token::ObjEnd)) => Ok((after, (ObjectRef::new(id, gen), object))),
            _ if self.allow_missing_endobj => {
                log::warn!("Object {} {} is missing endobj", id, gen);
                Ok((rest, (ObjectRef::new(id, gen), object)))
            },
            _ => fail(rest, nom::error::ErrorKind::Tag),
        }
    }

    fn parse_at_depth<'a>(&self, input: &'a [u8], depth: usize) -> IResult<&'a [u8], Object> {
        if depth > self.max_nesting {
            return Err(nom::Err::Failure(nom::error::Error::new(
                input,
                nom::error::ErrorKind::TooLarge,
            )));
        }

        let (rest, tok) = token(input)?;

        match tok {
            Token::Null => Ok((rest, Object::Null)),
            Token::True => Ok((rest, Object::Boolean(true))),
            Token::False => Ok((rest, Object::Boolean(false))),
            Token::Real(r) => Ok((rest, Object::Real(r))),
            Token::Name(name) => Ok((rest, Object::Name(name))),

            Token::Integer(i) => {
                // `id gen R` is a reference, anything else a plain integer
                if let Ok((after_gen, Token::Integer(gen))) = token(rest) {
                    if let Ok((after_r, Token::R)) = token(after_gen) {
                        if (0..=u32::MAX as i64).contains(&i) && (0..=u16::MAX as i64).contains(&gen)
                        {
                            return Ok((
                                after_r,
                                Object::Reference(ObjectRef::new(i as u32, gen as u16)),
                            ));
                        }
                    }
                }
                Ok((rest, Object::Integer(i)))
            },

            Token::LiteralString(raw) => Ok((rest, Object::String(decode_literal_string_escapes(raw)))),

            Token::HexString(hex) => match decode_hex(hex) {
                Ok(decoded) => Ok((rest, Object::String(decoded))),
                Err(_) => fail(input, nom::error::ErrorKind::HexDigit),
            },

            Token::ArrayStart => self.parse_array(rest, depth + 1),

            Token::DictStart => {
                let (after_dict, dict) = self.parse_dictionary(rest, depth + 1)?;
                if let Ok((stream_input, Token::StreamStart)) = token(after_dict) {
                    let (after_stream, data) = self.parse_stream_data(stream_input, &dict)?;
                    return Ok((after_stream, Object::Stream { dict, data }));
                }
                Ok((after_dict, Object::Dictionary(dict)))
            },

            _ => fail(input, nom::error::ErrorKind::Tag),
        }
    }

    /// Parse array items after `[` up to the matching `]`.
    fn parse_array<'a>(&self, input: &'a [u8], depth: usize) -> IResult<&'a [u8], Object> {
        let mut items = Vec::new();
        let mut remaining = input;

        loop {
            if let Ok((rest, Token::ArrayEnd)) = token(remaining) {
                return Ok((rest, Object::Array(items)));
            }
            let (rest, item) = self.parse_at_depth(remaining, depth)?;
            items.push(item);
            remaining = rest;
        }
    }

    /// Parse dictionary entries after `<<` up to the matching `>>`.
    fn parse_dictionary<'a>(
        &self,
        input: &'a [u8],
        depth: usize,
    ) -> IResult<&'a [u8], Dictionary> {
        let mut dict = Dictionary::new();
        let mut remaining = input;

        loop {
            let (rest, tok) = token(remaining)?;
            match tok {
                Token::DictEnd => return Ok((rest, dict)),
                Token::Name(key) => {
                    let (rest, value) = self.parse_at_depth(rest, depth)?;
                    dict.insert(key, value);
                    remaining = rest;
                },
                // Keys must be names
                _ => return fail(remaining, nom::error::ErrorKind::Tag),
            }
        }
    }

    fn declared_length(&self, dict: &Dictionary) -> Option<usize> {
        match dict.get("Length")? {
            Object::Integer(n) if *n >= 0 => Some(*n as usize),
            Object::Reference(r) => self.lengths.and_then(|resolver| resolver.resolve_length(*r)),
            _ => None,
        }
    }

    /// Parse stream data after the `stream` keyword.
    ///
    /// The keyword must be followed by CRLF or LF (ISO 32000-1, 7.3.8.1).
    fn parse_stream_data<'a>(
        &self,
        input: &'a [u8],
        dict: &Dictionary,
    ) -> IResult<&'a [u8], bytes::Bytes> {
        let body = if let Some(rest) = input.strip_prefix(b"\r\n") {
            rest
        } else if let Some(rest) = input.strip_prefix(b"\n") {
            rest
        } else if let Some(rest) = input.strip_prefix(b"\r") {
            if self.strict {
                return fail(input, nom::error::ErrorKind::CrLf);
            }
            log::warn!("Stream keyword followed by a lone CR");
            rest
        } else {
            if self.strict {
                return fail(input, nom::error::ErrorKind::CrLf);
            }
            log::warn!("Stream keyword not followed by an end-of-line marker");
            input
        };

        if let Some(length) = self.declared_length(dict) {
            if length <= body.len() {
                if let Ok((rest, Token::StreamEnd)) = token(&body[length..]) {
                    let data = bytes::Bytes::copy_from_slice(&body[..length]);
                    return Ok((rest, data));
                }
            }
            log::debug!("Declared stream /Length {} does not end at endstream", length);
        }

        if !self.allow_malformed_streams {
            return fail(body, nom::error::ErrorKind::Eof);
        }

        match find_endstream(body) {
            Some(pos) => {
                log::warn!("Recovered stream data by scanning for endstream ({} bytes)", pos);
                let data = trim_trailing_eol(&body[..pos]);
                let (rest, _) = token(&body[pos..])?;
                Ok((rest, bytes::Bytes::copy_from_slice(data)))
            },
            None => fail(body, nom::error::ErrorKind::Eof),
        }
    }
}

/// Find the position of the `endstream` keyword.
fn find_endstream(input: &[u8]) -> Option<usize> {
    let keyword = b"endstream";
    input
        .windows(keyword.len())
        .position(|window| window == keyword)
}

/// Drop the single end-of-line marker that precedes `endstream`.
fn trim_trailing_eol(data: &[u8]) -> &[u8] {
    data.strip_suffix(b"\r\n")
        .or_else(|| data.strip_suffix(b"\n"))
        .or_else(|| data.strip_suffix(b"\r"))
        .unwrap_or(data)
}

/// Parse a PDF object with default options and no length resolver.
///
/// # Example
///
/// ```
/// use pdf_reorder::parser::parse_object;
///
/// let (_, obj) = parse_object(b"<< /Type /Page /Count 3 >>").unwrap();
/// assert_eq!(obj.dict_type(), Some("Page"));
/// ```
pub fn parse_object(input: &[u8]) -> IResult<&[u8], Object> {
    ObjectParser::default().parse(input)
}

/// Parse the indirect object starting at `offset` in `data`.
///
/// # Errors
///
/// [`Error::MalformedDocument`] carrying the absolute byte offset where
/// parsing stopped.
pub fn parse_indirect_object_at(
    data: &[u8],
    offset: usize,
    parser: &ObjectParser<'_>,
) -> Result<(ObjectRef, Object)> {
    let input = data
        .get(offset..)
        .filter(|slice| !slice.is_empty())
        .ok_or_else(|| Error::malformed(offset, "object offset beyond end of file"))?;

    parser
        .parse_indirect(input)
        .map(|(_, parsed)| parsed)
        .map_err(|e| {
            Error::malformed(offset + error_offset(input, &e), "unparseable indirect object")
        })
}
