//! Stream decoders for the filters that guard document structure.
//!
//! Page content is copied byte-for-byte and never decoded. Decoding is only
//! needed to read cross-reference streams and object streams, which in
//! practice use:
//! - FlateDecode (zlib/deflate), usually with a PNG predictor
//! - ASCIIHexDecode
//!
//! Decoders are applied in the order listed by `/Filter`.

use crate::error::{Error, Result};
use crate::parser_config::ParserOptions;

mod ascii_hex;
mod flate;
mod predictor;

pub use ascii_hex::AsciiHexDecoder;
pub use flate::FlateDecoder;
pub use predictor::{decode_predictor, DecodeParams};

/// Trait for PDF stream decoders.
pub trait StreamDecoder {
    /// Decode the input data.
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>>;

    /// Get the name of this decoder (e.g., "FlateDecode").
    fn name(&self) -> &str;
}

/// Look up the decoder for a filter name, accepting the standard abbreviations.
fn decoder_for(filter_name: &str) -> Result<Box<dyn StreamDecoder>> {
    match filter_name {
        "FlateDecode" | "Fl" => Ok(Box::new(FlateDecoder)),
        "ASCIIHexDecode" | "AHx" => Ok(Box::new(AsciiHexDecoder)),
        _ => Err(Error::UnsupportedFilter(filter_name.to_string())),
    }
}

/// Decode stream data through a filter pipeline.
///
/// Uses the default decompression limits of [`ParserOptions`].
///
/// # Examples
///
/// ```
/// use pdf_reorder::decoders::decode_stream;
///
/// let decoded = decode_stream(b"48656C6C6F>", &["ASCIIHexDecode".to_string()]).unwrap();
/// assert_eq!(decoded, b"Hello");
/// ```
pub fn decode_stream(data: &[u8], filters: &[String]) -> Result<Vec<u8>> {
    decode_stream_with_options(data, filters, None, None)
}

/// Decode stream data with decode parameters and decompression limits.
///
/// The predictor from `params` is applied after the last filter. Limits come
/// from `options`, or from [`ParserOptions::default`] when `None`:
/// - the decoded size divided by the encoded size must not exceed
///   `max_decompression_ratio`
/// - the decoded size must not exceed `max_decompressed_size`
///
/// Both checks run after every filter, and a limit of 0 disables it.
pub fn decode_stream_with_options(
    data: &[u8],
    filters: &[String],
    params: Option<&DecodeParams>,
    options: Option<&ParserOptions>,
) -> Result<Vec<u8>> {
    let defaults = ParserOptions::default();
    let options = options.unwrap_or(&defaults);
    let max_ratio = u64::from(options.max_decompression_ratio);
    let max_size = options.max_decompressed_size;

    let compressed_size = data.len().max(1) as u64;
    let mut current = data.to_vec();

    for filter_name in filters {
        let decoder = decoder_for(filter_name)?;
        current = decoder.decode(&current)?;
        log::trace!("{} produced {} bytes", decoder.name(), current.len());

        if max_ratio > 0 {
            let ratio = current.len() as u64 / compressed_size;
            if ratio > max_ratio {
                return Err(Error::Decode(format!(
                    "decompression ratio {}:1 exceeds limit {}:1 ({} -> {} bytes)",
                    ratio,
                    max_ratio,
                    data.len(),
                    current.len()
                )));
            }
        }

        if max_size > 0 && current.len() > max_size {
            return Err(Error::Decode(format!(
                "decompressed size {} bytes exceeds limit {} bytes",
                current.len(),
                max_size
            )));
        }
    }

    match params {
        Some(params) if params.predictor > 1 => decode_predictor(&current, params),
        _ => Ok(current),
    }
}
