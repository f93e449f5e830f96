// Frame demuxer - Cuts JPEG frames out of a chunked HTTP body
use crate::domain::video::VideoFrame;
use bytes::{Buf, BytesMut};

const SOI: [u8; 2] = [0xFF, 0xD8];
const EOI: [u8; 2] = [0xFF, 0xD9];

pub const DEFAULT_MAX_BUFFER_BYTES: usize = 4 * 1024 * 1024;

/// Splits a byte stream into frames purely on SOI/EOI markers, so it works
/// on bodies that carry no multipart boundaries at all.
///
/// Only the region appended since the last call (plus one byte of overlap
/// for a marker split across chunks) is searched, so a long run of
/// non-image bytes costs linear time overall.
#[derive(Debug)]
pub struct FrameDemuxer {
    buffer: BytesMut,
    /// Whether `buffer` currently starts with an unresolved SOI.
    in_frame: bool,
    /// Offset into `buffer` from which the next marker search starts.
    scanned: usize,
    next_sequence: u64,
    max_buffer: usize,
}

impl FrameDemuxer {
    pub fn new(max_buffer: usize) -> Self {
        Self {
            buffer: BytesMut::new(),
            in_frame: false,
            scanned: 0,
            next_sequence: 0,
            max_buffer,
        }
    }

    /// Append a chunk and return every frame it completes, in stream order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<VideoFrame> {
        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();

        loop {
            if !self.in_frame && !self.seek_start() {
                break;
            }

            match find_marker(&self.buffer[self.scanned..], &EOI) {
                Some(pos) => {
                    let end = self.scanned + pos + EOI.len();
                    let data = self.buffer.split_to(end).freeze();
                    frames.push(VideoFrame {
                        sequence: self.next_sequence,
                        data,
                    });
                    self.next_sequence += 1;
                    self.in_frame = false;
                    self.scanned = 0;
                }
                None => {
                    self.scanned = self.buffer.len().saturating_sub(1).max(SOI.len());
                    break;
                }
            }
        }

        if self.buffer.len() > self.max_buffer {
            tracing::warn!(
                "Frame buffer exceeded {} bytes without an end marker, resynchronizing",
                self.max_buffer
            );
            self.discard_buffer();
        }

        frames
    }

    /// Drop buffered bytes but keep the sequence counter running.
    pub fn discard_buffer(&mut self) {
        self.buffer.clear();
        self.in_frame = false;
        self.scanned = 0;
    }

    #[cfg(test)]
    fn reset(&mut self) {
        self.discard_buffer();
        self.next_sequence = 0;
    }

    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Advance the buffer to the next SOI. Bytes before it can never belong
    /// to a frame; a trailing 0xFF is kept since it may open a split marker.
    fn seek_start(&mut self) -> bool {
        match find_marker(&self.buffer[self.scanned..], &SOI) {
            Some(pos) => {
                self.buffer.advance(self.scanned + pos);
                self.in_frame = true;
                self.scanned = SOI.len();
                true
            }
            None => {
                let keep = usize::from(self.buffer.last() == Some(&SOI[0]));
                let len = self.buffer.len();
                self.buffer.advance(len - keep);
                self.scanned = 0;
                false
            }
        }
    }
}

fn find_marker(haystack: &[u8], marker: &[u8; 2]) -> Option<usize> {
    haystack.windows(2).position(|w| w == marker)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_jpeg(payload: &[u8]) -> Vec<u8> {
        let mut out = SOI.to_vec();
        out.extend_from_slice(payload);
        out.extend_from_slice(&EOI);
        out
    }

    fn sample_frames() -> Vec<Vec<u8>> {
        vec![
            fake_jpeg(b"first frame"),
            fake_jpeg(b""),
            fake_jpeg(&[0x00, 0xFF, 0x00, 0x10, 0x20]),
            fake_jpeg(&vec![0x42; 300]),
        ]
    }

    fn feed_in_chunks(demuxer: &mut FrameDemuxer, stream: &[u8], sizes: &[usize]) -> Vec<VideoFrame> {
        let mut frames = Vec::new();
        let mut offset = 0;
        let mut i = 0;
        while offset < stream.len() {
            let size = sizes[i % sizes.len()].min(stream.len() - offset);
            frames.extend(demuxer.push(&stream[offset..offset + size]));
            offset += size;
            i += 1;
        }
        frames
    }

    #[test]
    fn test_extracts_frames_from_single_chunk() {
        let mut demuxer = FrameDemuxer::new(DEFAULT_MAX_BUFFER_BYTES);
        let mut stream = b"--boundary\r\nContent-Type: image/jpeg\r\n\r\n".to_vec();
        stream.extend(fake_jpeg(b"abc"));
        stream.extend_from_slice(b"\r\n--boundary\r\n");
        stream.extend(fake_jpeg(b"def"));

        let frames = demuxer.push(&stream);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].data.as_ref(), fake_jpeg(b"abc").as_slice());
        assert_eq!(frames[1].data.as_ref(), fake_jpeg(b"def").as_slice());
        assert_eq!(frames[0].sequence, 0);
        assert_eq!(frames[1].sequence, 1);
    }

    #[test]
    fn test_arbitrary_chunk_boundaries() {
        let expected = sample_frames();
        let stream: Vec<u8> = expected.concat();

        let cases: [&[usize]; 6] = [&[1], &[2], &[3, 1], &[7, 2, 5], &[64], &[1000]];
        for sizes in cases {
            let mut demuxer = FrameDemuxer::new(DEFAULT_MAX_BUFFER_BYTES);
            let frames = feed_in_chunks(&mut demuxer, &stream, sizes);

            assert_eq!(frames.len(), expected.len(), "chunk sizes {:?}", sizes);
            for (frame, original) in frames.iter().zip(&expected) {
                assert_eq!(frame.data.as_ref(), original.as_slice());
            }
            let sequences: Vec<_> = frames.iter().map(|f| f.sequence).collect();
            assert_eq!(sequences, vec![0, 1, 2, 3]);
        }
    }

    #[test]
    fn test_reset_gives_identical_runs() {
        let stream: Vec<u8> = sample_frames().concat();
        let mut demuxer = FrameDemuxer::new(DEFAULT_MAX_BUFFER_BYTES);

        let first = feed_in_chunks(&mut demuxer, &stream, &[5, 3]);
        demuxer.reset();
        let second = feed_in_chunks(&mut demuxer, &stream, &[5, 3]);

        assert_eq!(first, second);
    }

    #[test]
    fn test_trailing_bytes_never_emitted() {
        let mut demuxer = FrameDemuxer::new(DEFAULT_MAX_BUFFER_BYTES);
        let mut stream = fake_jpeg(b"only");
        stream.extend_from_slice(b"trailing garbage \xFF\xD9 more");

        assert_eq!(demuxer.push(&stream).len(), 1);
        for _ in 0..10 {
            assert!(demuxer.push(&[]).is_empty());
        }
        assert!(demuxer.buffered_len() <= 1);
    }

    #[test]
    fn test_non_image_bytes_yield_nothing() {
        let mut demuxer = FrameDemuxer::new(DEFAULT_MAX_BUFFER_BYTES);
        let page = b"<html><body>502 Bad Gateway</body></html>";
        for _ in 0..100 {
            assert!(demuxer.push(page).is_empty());
        }
        assert_eq!(demuxer.buffered_len(), 0);
    }

    #[test]
    fn test_marker_split_across_chunks() {
        let mut demuxer = FrameDemuxer::new(DEFAULT_MAX_BUFFER_BYTES);
        assert!(demuxer.push(&[0x01, 0xFF]).is_empty());
        assert!(demuxer.push(&[0xD8, 0x11, 0xFF]).is_empty());
        let frames = demuxer.push(&[0xD9]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data.as_ref(), &[0xFF, 0xD8, 0x11, 0xFF, 0xD9]);
    }

    #[test]
    fn test_overflow_resynchronizes() {
        let mut demuxer = FrameDemuxer::new(16);
        let mut oversized = SOI.to_vec();
        oversized.extend_from_slice(&[0x33; 20]);

        assert!(demuxer.push(&oversized).is_empty());
        assert_eq!(demuxer.buffered_len(), 0);

        let mut rest = vec![0x33; 5];
        rest.extend_from_slice(&EOI);
        rest.extend(fake_jpeg(b"next"));
        let frames = demuxer.push(&rest);

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data.as_ref(), fake_jpeg(b"next").as_slice());
    }

    #[test]
    fn test_pending_frame_is_retained() {
        let mut demuxer = FrameDemuxer::new(DEFAULT_MAX_BUFFER_BYTES);
        let frame = fake_jpeg(b"hello-world");
        let (head, tail) = frame.split_at(6);

        assert!(demuxer.push(b"junk").is_empty());
        assert!(demuxer.push(head).is_empty());
        assert_eq!(demuxer.buffered_len(), head.len());

        let frames = demuxer.push(tail);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data.as_ref(), frame.as_slice());
    }
}
