//! PNG encoding for tile rasters.
//!
//! Two encoding modes:
//! - **Grayscale (color type 0)**: one intensity byte per pixel, used when
//!   no colormap is applied.
//! - **RGB (color type 2)**: three bytes per pixel, used after a gradient
//!   has been applied.
//!
//! Chunks are written by hand (IHDR/IDAT/IEND with CRC32, scanline filter
//! type 0) and deflated with flate2.

use std::io::Write;

use tiles_common::{TileError, TileResult};

/// Encode a grayscale intensity raster as a PNG byte stream.
pub fn encode_gray(intensities: &[u8], width: usize, height: usize) -> TileResult<Vec<u8>> {
    if intensities.len() != width * height {
        return Err(TileError::EncodeError(format!(
            "intensity buffer has {} bytes, expected {}x{}",
            intensities.len(),
            width,
            height
        )));
    }
    encode(intensities, width, height, ColorType::Gray)
}

/// Encode a packed-RGB raster (3 bytes per pixel) as a PNG byte stream.
pub fn encode_rgb(pixels: &[u8], width: usize, height: usize) -> TileResult<Vec<u8>> {
    if pixels.len() != width * height * 3 {
        return Err(TileError::EncodeError(format!(
            "pixel buffer has {} bytes, expected {}x{}x3",
            pixels.len(),
            width,
            height
        )));
    }
    encode(pixels, width, height, ColorType::Rgb)
}

#[derive(Clone, Copy)]
enum ColorType {
    Gray,
    Rgb,
}

impl ColorType {
    fn code(self) -> u8 {
        match self {
            ColorType::Gray => 0,
            ColorType::Rgb => 2,
        }
    }

    fn bytes_per_pixel(self) -> usize {
        match self {
            ColorType::Gray => 1,
            ColorType::Rgb => 3,
        }
    }
}

fn encode(pixels: &[u8], width: usize, height: usize, color: ColorType) -> TileResult<Vec<u8>> {
    let mut png = Vec::new();

    // PNG signature
    png.extend_from_slice(&[137, 80, 78, 71, 13, 10, 26, 10]);

    // IHDR chunk
    let mut ihdr_data = Vec::with_capacity(13);
    ihdr_data.extend_from_slice(&(width as u32).to_be_bytes());
    ihdr_data.extend_from_slice(&(height as u32).to_be_bytes());
    ihdr_data.push(8); // bit depth
    ihdr_data.push(color.code());
    ihdr_data.push(0); // compression method
    ihdr_data.push(0); // filter method
    ihdr_data.push(0); // interlace method
    write_chunk(&mut png, b"IHDR", &ihdr_data);

    // IDAT chunk (image data)
    let idat_data = deflate_idat(pixels, width, height, color.bytes_per_pixel())
        .map_err(|e| TileError::EncodeError(format!("IDAT compression failed: {}", e)))?;
    write_chunk(&mut png, b"IDAT", &idat_data);

    // IEND chunk
    write_chunk(&mut png, b"IEND", &[]);

    Ok(png)
}

/// Write a PNG chunk: length, type, data, CRC over type + data.
fn write_chunk(png: &mut Vec<u8>, chunk_type: &[u8; 4], data: &[u8]) {
    png.extend_from_slice(&(data.len() as u32).to_be_bytes());
    png.extend_from_slice(chunk_type);
    png.extend_from_slice(data);

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(chunk_type);
    hasher.update(data);
    png.extend_from_slice(&hasher.finalize().to_be_bytes());
}

/// Deflate image data for the IDAT chunk, scanline filter type 0.
fn deflate_idat(
    pixels: &[u8],
    width: usize,
    height: usize,
    bytes_per_pixel: usize,
) -> std::io::Result<Vec<u8>> {
    let row_bytes = width * bytes_per_pixel;
    let mut uncompressed = Vec::with_capacity(height * (1 + row_bytes));

    for y in 0..height {
        uncompressed.push(0); // filter type: none
        let row_start = y * row_bytes;
        uncompressed.extend_from_slice(&pixels[row_start..row_start + row_bytes]);
    }

    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::fast());
    encoder.write_all(&uncompressed)?;
    encoder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GenericImageView;

    #[test]
    fn test_signature_and_header_fields() {
        let png = encode_gray(&[0, 64, 128, 255], 2, 2).unwrap();

        assert_eq!(&png[..8], &[137, 80, 78, 71, 13, 10, 26, 10]);
        // IHDR immediately follows the signature
        assert_eq!(&png[12..16], b"IHDR");
        // width and height
        assert_eq!(&png[16..20], &2u32.to_be_bytes());
        assert_eq!(&png[20..24], &2u32.to_be_bytes());
        // bit depth 8, color type 0
        assert_eq!(png[24], 8);
        assert_eq!(png[25], 0);
        // trailer
        assert_eq!(&png[png.len() - 8..png.len() - 4], b"IEND");
    }

    #[test]
    fn test_buffer_size_mismatch_is_encode_error() {
        let err = encode_gray(&[0u8; 3], 2, 2).unwrap_err();
        assert!(matches!(err, tiles_common::TileError::EncodeError(_)));

        let err = encode_rgb(&[0u8; 4], 2, 2).unwrap_err();
        assert!(matches!(err, tiles_common::TileError::EncodeError(_)));
    }

    #[test]
    fn test_flat_gray_roundtrip_with_independent_decoder() {
        let intensities = vec![93u8; 16 * 16];
        let png = encode_gray(&intensities, 16, 16).unwrap();

        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!(decoded.dimensions(), (16, 16));
        assert_eq!(decoded.color(), image::ColorType::L8);
        let gray = decoded.to_luma8();
        assert!(gray.pixels().all(|p| p.0[0] == 93));
    }

    #[test]
    fn test_gray_ramp_roundtrip() {
        let intensities: Vec<u8> = (0..=255).collect();
        let png = encode_gray(&intensities, 16, 16).unwrap();

        let gray = image::load_from_memory(&png).unwrap().to_luma8();
        for (i, pixel) in gray.pixels().enumerate() {
            assert_eq!(pixel.0[0], i as u8);
        }
    }

    #[test]
    fn test_rgb_roundtrip_with_independent_decoder() {
        // 2x1: pure red then pure blue
        let pixels = vec![255, 0, 0, 0, 0, 255];
        let png = encode_rgb(&pixels, 2, 1).unwrap();

        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!(decoded.color(), image::ColorType::Rgb8);
        let rgb = decoded.to_rgb8();
        assert_eq!(rgb.get_pixel(0, 0).0, [255, 0, 0]);
        assert_eq!(rgb.get_pixel(1, 0).0, [0, 0, 255]);
    }
}
