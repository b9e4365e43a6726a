use image::RgbImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("undecodable image: {0}")]
    Undecodable(#[from] image::ImageError),
}

/// Decode raw image bytes into an RGB8 pixel buffer.
///
/// The format is sniffed from the bytes; alpha channels and palettes
/// are flattened so the oracle always sees the same channel order.
pub fn decode_rgb(bytes: &[u8]) -> Result<RgbImage, DecodeError> {
    Ok(image::load_from_memory(bytes)?.to_rgb8())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_rgb_roundtrip() {
        let img = RgbImage::from_pixel(2, 2, image::Rgb([10, 20, 30]));
        let mut buf = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut buf, image::ImageFormat::Png)
            .unwrap();

        let decoded = decode_rgb(buf.get_ref()).unwrap();
        assert_eq!(decoded.dimensions(), (2, 2));
        assert_eq!(decoded.get_pixel(0, 0).0, [10, 20, 30]);
    }

    #[test]
    fn test_decode_rgb_rejects_garbage() {
        assert!(decode_rgb(b"not an image").is_err());
    }
}
