//! In-memory RGBA canvas backed by `image`. Used by the FFmpeg host and by any
//! host that decodes into CPU memory.

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageBuffer, Rgba, RgbaImage};

use super::{Canvas, StillFormat, VideoFrame};
use crate::error::{DrawError, HostError};

pub struct RgbaCanvas {
    image: RgbaImage,
}

impl RgbaCanvas {
    pub fn new(width: u32, height: u32) -> Result<Self, HostError> {
        if width == 0 || height == 0 {
            return Err(HostError::InvalidState(format!(
                "canvas dimensions must be non-zero ({}x{})",
                width, height
            )));
        }
        Ok(Self {
            image: RgbaImage::new(width, height),
        })
    }
}

impl Canvas for RgbaCanvas {
    fn width(&self) -> u32 {
        self.image.width()
    }

    fn height(&self) -> u32 {
        self.image.height()
    }

    fn draw_frame(&mut self, frame: &VideoFrame) -> Result<(), DrawError> {
        if frame.width == 0 || frame.height == 0 {
            return Err(DrawError(format!(
                "frame has zero dimensions ({}x{})",
                frame.width, frame.height
            )));
        }
        let expected = VideoFrame::expected_len(frame.width, frame.height);
        if frame.data.len() != expected {
            return Err(DrawError(format!(
                "frame buffer is {} bytes, expected {}",
                frame.data.len(),
                expected
            )));
        }

        if frame.width == self.width() && frame.height == self.height() {
            self.image.copy_from_slice(&frame.data);
            return Ok(());
        }

        let src = ImageBuffer::<Rgba<u8>, &[u8]>::from_raw(frame.width, frame.height, &frame.data)
            .ok_or_else(|| DrawError("frame buffer does not match its dimensions".into()))?;
        self.image = imageops::resize(&src, self.width(), self.height(), FilterType::Triangle);
        Ok(())
    }

    fn pixels(&self) -> &[u8] {
        self.image.as_raw()
    }

    fn encode_still(&self, format: StillFormat) -> Result<Vec<u8>, HostError> {
        let mut out = Vec::new();
        match format {
            StillFormat::Jpeg { quality } => {
                // JPEG has no alpha channel.
                let rgb = DynamicImage::ImageRgba8(self.image.clone()).to_rgb8();
                let encoder = JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100));
                rgb.write_with_encoder(encoder)
                    .map_err(|e| HostError::Encode(e.to_string()))?;
            }
            StillFormat::Png => {
                let encoder = PngEncoder::new(&mut out);
                self.image
                    .write_with_encoder(encoder)
                    .map_err(|e| HostError::Encode(e.to_string()))?;
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_frame(width: u32, height: u32, rgba: [u8; 4]) -> VideoFrame {
        VideoFrame {
            width,
            height,
            timestamp: 0.0,
            data: rgba.repeat((width * height) as usize),
        }
    }

    #[test]
    fn zero_sized_canvas_is_rejected() {
        assert!(RgbaCanvas::new(0, 10).is_err());
    }

    #[test]
    fn same_size_frame_is_copied() {
        let mut canvas = RgbaCanvas::new(4, 2).unwrap();
        canvas.draw_frame(&solid_frame(4, 2, [10, 20, 30, 255])).unwrap();
        assert_eq!(&canvas.pixels()[..4], &[10, 20, 30, 255]);
        assert_eq!(canvas.pixels().len(), 4 * 2 * 4);
    }

    #[test]
    fn larger_frame_is_scaled_down() {
        let mut canvas = RgbaCanvas::new(8, 4).unwrap();
        canvas.draw_frame(&solid_frame(16, 8, [200, 0, 0, 255])).unwrap();
        assert_eq!(canvas.pixels().len(), 8 * 4 * 4);
        assert_eq!(&canvas.pixels()[..4], &[200, 0, 0, 255]);
    }

    #[test]
    fn short_buffer_is_a_draw_error() {
        let mut canvas = RgbaCanvas::new(4, 4).unwrap();
        let mut frame = solid_frame(4, 4, [0, 0, 0, 255]);
        frame.data.truncate(10);
        assert!(canvas.draw_frame(&frame).is_err());
    }

    #[test]
    fn encodes_jpeg_and_png() {
        let mut canvas = RgbaCanvas::new(16, 16).unwrap();
        canvas.draw_frame(&solid_frame(16, 16, [0, 128, 0, 255])).unwrap();
        let jpeg = canvas.encode_still(StillFormat::Jpeg { quality: 80 }).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        let png = canvas.encode_still(StillFormat::Png).unwrap();
        assert_eq!(&png[1..4], b"PNG");
    }
}
