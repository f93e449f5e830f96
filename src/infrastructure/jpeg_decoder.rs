use crate::application::video_ingest::ImageDecoder;
use crate::domain::errors::DecodeError;
use crate::domain::video::{DecodedFrame, VideoFrame};
use image::ImageFormat;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default)]
pub struct JpegDecoder;

impl ImageDecoder for JpegDecoder {
    fn decode(&self, frame: VideoFrame) -> Result<DecodedFrame, DecodeError> {
        let image = image::load_from_memory_with_format(&frame.data, ImageFormat::Jpeg)
            .map_err(|e| DecodeError::Image(e.to_string()))?;

        Ok(DecodedFrame {
            sequence: frame.sequence,
            image: Arc::new(image.to_rgb8()),
        })
    }
}

/// Re-encode a decoded frame for the HTTP surface.
pub fn encode_jpeg(frame: &DecodedFrame) -> Result<Vec<u8>, DecodeError> {
    let mut out = std::io::Cursor::new(Vec::new());
    frame
        .image
        .write_to(&mut out, ImageFormat::Jpeg)
        .map_err(|e| DecodeError::Image(e.to_string()))?;
    Ok(out.into_inner())
}
