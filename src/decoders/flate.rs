//! FlateDecode (zlib/deflate) implementation.
//!
//! Cross-reference and object streams are almost always Flate-compressed.

use crate::decoders::StreamDecoder;
use crate::error::{Error, Result};
use flate2::read::{DeflateDecoder, ZlibDecoder};
use std::io::Read;

/// FlateDecode filter implementation.
///
/// Reads a zlib stream; when the zlib wrapper is damaged the payload is
/// retried as raw deflate data.
pub struct FlateDecoder;

impl StreamDecoder for FlateDecoder {
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        let zlib_err = match ZlibDecoder::new(input).read_to_end(&mut output) {
            Ok(_) => return Ok(output),
            Err(e) => e,
        };

        // Data read before a checksum error or truncation is still usable
        if !output.is_empty() {
            log::warn!(
                "FlateDecode partial recovery: {} bytes before error: {}",
                output.len(),
                zlib_err
            );
            return Ok(output);
        }

        log::debug!("Zlib decode failed ({}), trying raw deflate", zlib_err);
        output.clear();
        match DeflateDecoder::new(input).read_to_end(&mut output) {
            Ok(_) if !output.is_empty() => {
                log::warn!("Raw deflate recovery succeeded: {} bytes", output.len());
                Ok(output)
            },
            Err(_) if !output.is_empty() => {
                log::warn!("Raw deflate partial recovery: {} bytes", output.len());
                Ok(output)
            },
            Ok(_) | Err(_) => Err(Error::Decode(format!(
                "FlateDecode decompression failed: {} ({} compressed bytes)",
                zlib_err,
                input.len()
            ))),
        }
    }

    fn name(&self) -> &str {
        "FlateDecode"
    }
}
