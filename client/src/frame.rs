use image::{GrayImage, ImageReader, RgbImage};
use std::io::Cursor;

/// A decoded camera frame with capture metadata.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub image: RgbImage,
    /// Client wall clock at acquisition (Unix millis).
    pub captured_at_ms: i64,
    /// Per-source sequence number, starting at 0.
    pub seq: u64,
}

impl CapturedFrame {
    pub fn new(image: RgbImage, captured_at_ms: i64, seq: u64) -> Self {
        Self {
            image,
            captured_at_ms,
            seq,
        }
    }

    /// Decode an encoded still (JPEG, PNG, ...) into a frame.
    pub fn decode(bytes: &[u8], captured_at_ms: i64, seq: u64) -> Result<Self, image::ImageError> {
        let image = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()?
            .decode()?
            .to_rgb8();
        Ok(Self::new(image, captured_at_ms, seq))
    }

    pub fn luma(&self) -> GrayImage {
        image::imageops::grayscale(&self.image)
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

#[cfg(test)]
pub(crate) fn solid_frame(value: u8, seq: u64) -> CapturedFrame {
    CapturedFrame::new(
        RgbImage::from_pixel(32, 24, image::Rgb([value, value, value])),
        1_708_300_000_000 + seq as i64,
        seq,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageFormat;

    #[test]
    fn decode_png_roundtrip_dimensions() {
        let frame = solid_frame(200, 3);
        let mut encoded = Vec::new();
        frame
            .image
            .write_to(&mut Cursor::new(&mut encoded), ImageFormat::Png)
            .unwrap();

        let decoded = CapturedFrame::decode(&encoded, 42, 7).unwrap();
        assert_eq!(decoded.dimensions(), (32, 24));
        assert_eq!(decoded.seq, 7);
        assert_eq!(decoded.captured_at_ms, 42);
        assert_eq!(decoded.image.get_pixel(0, 0).0, [200, 200, 200]);
    }

    #[test]
    fn decode_garbage_fails() {
        assert!(CapturedFrame::decode(&[0x00, 0x01, 0x02], 0, 0).is_err());
    }

    #[test]
    fn luma_of_gray_frame_is_flat() {
        let gray = solid_frame(90, 0).luma();
        assert!(gray.pixels().all(|p| p.0[0] == 90));
    }
}
