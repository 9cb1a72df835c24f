//! Least-significant-bit image steganography: embedding an encrypted
//! payload into a PNG or JPEG carrier image and extracting it back out.
//!
//! Layout: the red, green, and blue channels of each pixel are used in
//! raster order (rows top-to-bottom, pixels left-to-right, R then G then B
//! within a pixel); alpha is left untouched. The first 64 channel samples
//! carry an 8-byte big-endian payload length, immediately followed by the
//! payload's own bits.

use byteorder::{BigEndian, ByteOrder};
use image::{DynamicImage, GenericImageView, ImageFormat, Rgba, RgbaImage};

use crate::config::STEGO_HEADER_LEN;
use crate::error::{ImcryptError, Result};

/// Returns the maximum payload size, in bytes, that `image` can carry.
pub fn capacity(image: &DynamicImage) -> usize {
    let (width, height) = image.dimensions();
    let usable_bits = (width as usize) * (height as usize) * 3;
    usable_bits / 8
}

/// Detects whether `bytes` is a PNG or JPEG image, returning the decoded
/// image and its format.
pub fn decode_carrier(bytes: &[u8]) -> Result<(DynamicImage, ImageFormat)> {
    let format = image::guess_format(bytes).map_err(ImcryptError::Image)?;
    if format != ImageFormat::Png && format != ImageFormat::Jpeg {
        return Err(ImcryptError::UnsupportedCarrierFormat);
    }
    let decoded = image::load_from_memory_with_format(bytes, format).map_err(ImcryptError::Image)?;
    Ok((decoded, format))
}

/// Embeds `payload` into `carrier`, returning the encoded bytes in the
/// carrier's original format.
pub fn encode(carrier: &DynamicImage, format: ImageFormat, payload: &[u8]) -> Result<Vec<u8>> {
    let cap = capacity(carrier);
    let needed = STEGO_HEADER_LEN + payload.len();
    if needed > cap {
        return Err(ImcryptError::InsufficientCarrierCapacity {
            needed,
            available: cap,
        });
    }

    let mut header = [0u8; STEGO_HEADER_LEN];
    BigEndian::write_u64(&mut header, payload.len() as u64);

    let mut bits = bit_iter(&header).chain(bit_iter(payload));

    let mut rgba: RgbaImage = carrier.to_rgba8();
    let (width, height) = rgba.dimensions();

    'outer: for y in 0..height {
        for x in 0..width {
            let pixel = rgba.get_pixel_mut(x, y);
            for channel in 0..3 {
                match bits.next() {
                    Some(bit) => {
                        pixel[channel] = (pixel[channel] & !1) | bit;
                    }
                    None => break 'outer,
                }
            }
        }
    }

    let mut out = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut out);
    DynamicImage::ImageRgba8(rgba)
        .write_to(&mut cursor, format)
        .map_err(ImcryptError::Image)?;
    Ok(out)
}

/// Extracts a payload previously embedded by [`encode`].
pub fn decode(carrier: &DynamicImage) -> Result<Vec<u8>> {
    let rgba = carrier.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut bits = Vec::new();
    let needed_bits = STEGO_HEADER_LEN * 8;

    'header: for y in 0..height {
        for x in 0..width {
            let pixel = rgba.get_pixel(x, y);
            for channel in 0..3 {
                bits.push(pixel[channel] & 1);
                if bits.len() == needed_bits {
                    break 'header;
                }
            }
        }
    }

    if bits.len() < needed_bits {
        return Err(ImcryptError::DecryptionFailed);
    }

    let header_bytes = bits_to_bytes(&bits);
    let payload_len = BigEndian::read_u64(&header_bytes) as usize;

    let total_bits = needed_bits + payload_len * 8;
    let mut all_bits = bits;
    collect_bits(&rgba, width, height, total_bits, &mut all_bits);

    if all_bits.len() < total_bits {
        return Err(ImcryptError::DecryptionFailed);
    }

    let payload_bits = &all_bits[needed_bits..total_bits];
    Ok(bits_to_bytes(payload_bits))
}

fn collect_bits(rgba: &RgbaImage, width: u32, height: u32, total_bits: usize, out: &mut Vec<u8>) {
    out.clear();
    'all: for y in 0..height {
        for x in 0..width {
            let pixel: &Rgba<u8> = rgba.get_pixel(x, y);
            for channel in 0..3 {
                out.push(pixel[channel] & 1);
                if out.len() == total_bits {
                    break 'all;
                }
            }
        }
    }
}

fn bit_iter(bytes: &[u8]) -> impl Iterator<Item = u8> + '_ {
    bytes
        .iter()
        .flat_map(|&byte| (0..8).rev().map(move |i| (byte >> i) & 1))
}

fn bits_to_bytes(bits: &[u8]) -> Vec<u8> {
    bits.chunks(8)
        .map(|chunk| chunk.iter().fold(0u8, |acc, &bit| (acc << 1) | bit))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank_carrier(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba([10, 20, 30, 255])))
    }

    #[test]
    fn embed_extract_roundtrip() {
        let carrier = blank_carrier(64, 64);
        let payload = b"a secret payload";
        let encoded = encode(&carrier, ImageFormat::Png, payload).unwrap();
        let (decoded_image, _) = decode_carrier(&encoded).unwrap();
        let extracted = decode(&decoded_image).unwrap();
        assert_eq!(extracted, payload);
    }

    #[test]
    fn rejects_payload_too_large_for_carrier() {
        let carrier = blank_carrier(2, 2);
        let payload = vec![0u8; 1000];
        let result = encode(&carrier, ImageFormat::Png, &payload);
        assert!(matches!(
            result,
            Err(ImcryptError::InsufficientCarrierCapacity { .. })
        ));
    }

    #[test]
    fn alpha_channel_untouched() {
        let carrier = blank_carrier(32, 32);
        let encoded = encode(&carrier, ImageFormat::Png, b"payload").unwrap();
        let (decoded_image, _) = decode_carrier(&encoded).unwrap();
        let rgba = decoded_image.to_rgba8();
        assert!(rgba.pixels().all(|p| p[3] == 255));
    }
}
