use crate::error::{RelayError, Result};
use crate::models::NormalizedImage;
use image::{DynamicImage, ImageFormat, ImageReader};
use std::io::Cursor;

/// Reduces arbitrary image bytes to one of the formats the generation API
/// accepts. The transport-level content type is never trusted; the format
/// is read from the bytes themselves. JPEG and PNG pass through untouched,
/// everything else re-encodes to PNG. An alpha channel in the source
/// survives as RGBA PNG, all other color modes collapse to RGB.
pub fn normalize_image(bytes: &[u8]) -> Result<NormalizedImage> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| RelayError::DecodeError(e.to_string()))?;

    let format = reader
        .format()
        .ok_or_else(|| RelayError::DecodeError("unrecognized image format".into()))?;

    // Decode even for passthrough formats so corrupt payloads fail here
    // instead of at the remote end.
    let decoded = reader
        .decode()
        .map_err(|e| RelayError::DecodeError(e.to_string()))?;

    match format {
        ImageFormat::Jpeg => Ok(NormalizedImage {
            bytes: bytes.to_vec(),
            mime_type: "image/jpeg",
        }),
        ImageFormat::Png => Ok(NormalizedImage {
            bytes: bytes.to_vec(),
            mime_type: "image/png",
        }),
        _ => {
            let converted = if decoded.color().has_alpha() {
                DynamicImage::ImageRgba8(decoded.to_rgba8())
            } else {
                DynamicImage::ImageRgb8(decoded.to_rgb8())
            };

            let mut out = Vec::new();
            converted
                .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
                .map_err(|e| RelayError::DecodeError(format!("PNG re-encode failed: {}", e)))?;

            Ok(NormalizedImage {
                bytes: out,
                mime_type: "image/png",
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};

    fn sample_rgb() -> RgbImage {
        RgbImage::from_fn(8, 5, |x, y| Rgb([(x * 30) as u8, (y * 40) as u8, 90]))
    }

    fn encode(img: &DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut out = Vec::new();
        img.write_to(&mut Cursor::new(&mut out), format).unwrap();
        out
    }

    #[test]
    fn jpeg_passes_through_unchanged() {
        let bytes = encode(&DynamicImage::ImageRgb8(sample_rgb()), ImageFormat::Jpeg);
        let normalized = normalize_image(&bytes).unwrap();
        assert_eq!(normalized.bytes, bytes);
        assert_eq!(normalized.mime_type, "image/jpeg");
    }

    #[test]
    fn png_passes_through_unchanged() {
        let bytes = encode(&DynamicImage::ImageRgb8(sample_rgb()), ImageFormat::Png);
        let normalized = normalize_image(&bytes).unwrap();
        assert_eq!(normalized.bytes, bytes);
        assert_eq!(normalized.mime_type, "image/png");
    }

    #[test]
    fn bmp_re_encodes_to_png_with_same_dimensions() {
        let bytes = encode(&DynamicImage::ImageRgb8(sample_rgb()), ImageFormat::Bmp);
        let normalized = normalize_image(&bytes).unwrap();

        assert_eq!(normalized.mime_type, "image/png");
        assert_eq!(
            image::guess_format(&normalized.bytes).unwrap(),
            ImageFormat::Png
        );

        let roundtrip = image::load_from_memory(&normalized.bytes).unwrap();
        assert_eq!(roundtrip.width(), 8);
        assert_eq!(roundtrip.height(), 5);
        assert!(!roundtrip.color().has_alpha());
    }

    #[test]
    fn alpha_channel_survives_re_encode() {
        let rgba = RgbaImage::from_fn(4, 4, |x, _| Rgba([200, 10, 10, (x * 60) as u8]));
        let bytes = encode(&DynamicImage::ImageRgba8(rgba), ImageFormat::WebP);
        let normalized = normalize_image(&bytes).unwrap();

        assert_eq!(normalized.mime_type, "image/png");
        let roundtrip = image::load_from_memory(&normalized.bytes).unwrap();
        assert!(roundtrip.color().has_alpha());
        assert_eq!(roundtrip.to_rgba8().get_pixel(2, 0).0[3], 120);
    }

    #[test]
    fn undecodable_bytes_fail_with_decode_error() {
        let err = normalize_image(b"definitely not an image").unwrap_err();
        assert!(matches!(err, RelayError::DecodeError(_)));
    }

    #[test]
    fn truncated_png_fails_with_decode_error() {
        let mut bytes = encode(&DynamicImage::ImageRgb8(sample_rgb()), ImageFormat::Png);
        bytes.truncate(20);
        let err = normalize_image(&bytes).unwrap_err();
        assert!(matches!(err, RelayError::DecodeError(_)));
    }
}
