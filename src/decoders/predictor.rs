//! PNG and TIFF predictors.
//!
//! Cross-reference streams are normally written with the PNG Up predictor
//! (`/Predictor 12`), which stores each row as the difference from the row
//! above it.

use crate::error::{Error, Result};

/// Decode parameters (`/DecodeParms`) relevant to predictors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeParams {
    /// Predictor algorithm (1 = none, 2 = TIFF, 10-15 = PNG)
    pub predictor: i64,
    /// Number of samples per row
    pub columns: usize,
    /// Number of color components per sample
    pub colors: usize,
    /// Bits per component
    pub bits_per_component: usize,
}

impl Default for DecodeParams {
    fn default() -> Self {
        Self {
            predictor: 1,
            columns: 1,
            colors: 1,
            bits_per_component: 8,
        }
    }
}

impl DecodeParams {
    /// Bytes of sample data per row (without the PNG tag byte).
    pub fn pixel_bytes_per_row(&self) -> usize {
        (self.columns * self.colors * self.bits_per_component).div_ceil(8)
    }

    /// Bytes per complete pixel, at least 1.
    fn bytes_per_pixel(&self) -> usize {
        ((self.colors * self.bits_per_component) / 8).max(1)
    }
}

/// Reverse the predictor described by `params`.
pub fn decode_predictor(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    match params.predictor {
        1 => Ok(data.to_vec()),
        2 => decode_tiff_predictor(data, params),
        10..=15 => decode_png_predictor(data, params),
        other => Err(Error::Decode(format!("Unsupported predictor: {}", other))),
    }
}

fn check_row_size(row_size: usize) -> Result<()> {
    if row_size == 0 {
        return Err(Error::Decode("predictor row size is zero".to_string()));
    }
    Ok(())
}

/// TIFF Predictor 2, 8 bits per component.
fn decode_tiff_predictor(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    if params.bits_per_component != 8 {
        return Err(Error::Decode(format!(
            "TIFF predictor with {} bits per component",
            params.bits_per_component
        )));
    }
    let row_size = params.pixel_bytes_per_row();
    check_row_size(row_size)?;
    let bpp = params.bytes_per_pixel();

    let mut output = data.to_vec();
    for row in output.chunks_mut(row_size) {
        for i in bpp..row.len() {
            row[i] = row[i].wrapping_add(row[i - bpp]);
        }
    }
    Ok(output)
}

/// PNG predictors. Each row starts with a tag byte selecting the algorithm.
fn decode_png_predictor(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    let row_size = params.pixel_bytes_per_row();
    check_row_size(row_size)?;
    let bpp = params.bytes_per_pixel();

    if data.len() % (row_size + 1) != 0 {
        log::warn!(
            "Predictor data length {} is not a multiple of row size {}",
            data.len(),
            row_size + 1
        );
    }

    let mut output = Vec::with_capacity(data.len());
    let mut prev = vec![0u8; row_size];

    for encoded in data.chunks(row_size + 1) {
        let (&tag, encoded) = match encoded.split_first() {
            Some(split) => split,
            None => break,
        };
        let mut row = vec![0u8; row_size];

        for (i, &byte) in encoded.iter().enumerate() {
            let left = if i >= bpp { row[i - bpp] } else { 0 };
            let up = prev[i];
            let up_left = if i >= bpp { prev[i - bpp] } else { 0 };

            row[i] = match tag {
                0 => byte,
                1 => byte.wrapping_add(left),
                2 => byte.wrapping_add(up),
                3 => byte.wrapping_add(((u16::from(left) + u16::from(up)) / 2) as u8),
                4 => byte.wrapping_add(paeth(left, up, up_left)),
                _ => return Err(Error::Decode(format!("Invalid PNG predictor tag: {}", tag))),
            };
        }

        output.extend_from_slice(&row[..encoded.len()]);
        prev = row;
    }

    Ok(output)
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = i16::from(a) + i16::from(b) - i16::from(c);
    let pa = (p - i16::from(a)).abs();
    let pb = (p - i16::from(b)).abs();
    let pc = (p - i16::from(c)).abs();

    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}
