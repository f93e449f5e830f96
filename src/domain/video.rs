// Video frame domain models
use bytes::Bytes;
use image::RgbImage;
use std::sync::Arc;

/// One encoded image cut out of the HTTP body, SOI through EOI inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFrame {
    pub sequence: u64,
    pub data: Bytes,
}

/// Raster produced by an `ImageDecoder` from a `VideoFrame`.
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    pub sequence: u64,
    pub image: Arc<RgbImage>,
}

impl DecodedFrame {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}
