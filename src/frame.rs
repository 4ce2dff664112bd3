//! Immutable frame container and the pixel transforms applied before publishing.
//!
//! - `Frame`: pixel samples plus geometry. Storage is private and shared, so a frame
//!   can sit in the last-frame cache and be handed to the consumer without a copy.
//! - `Flip`: per-axis mirror selection. `Flip::Both` is a single 180° pass.
//! - `Frame::resized_area`: area-averaging resample to a target geometry.
//!
//! There is no mutable access to pixels once a frame exists:
//!
//! ```compile_fail
//! use capture_relay::Frame;
//!
//! let frame = Frame::zeroed(2, 2, 3);
//! let _bytes = frame.data;
//! ```
//!
//! ```compile_fail
//! use capture_relay::Frame;
//!
//! let frame = Frame::zeroed(2, 2, 3);
//! frame.as_bytes()[0] = 255;
//! ```

use std::sync::Arc;
use thiserror::Error;

/// Grayscale channel count.
pub const CHANNELS_GRAY: u8 = 1;
/// RGB channel count.
pub const CHANNELS_RGB: u8 = 3;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("unsupported channel count {0} (expected 1 or 3)")]
    UnsupportedChannels(u8),

    #[error("frame dimensions must be non-zero, got {width}x{height}")]
    EmptyGeometry { width: u32, height: u32 },

    #[error("frame length mismatch: expected {expected} bytes, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("frame dimensions overflow")]
    Overflow,
}

/// One decoded image sample.
///
/// Rows are stored top to bottom, pixels left to right, channels interleaved.
/// Cloning shares the underlying storage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    data: Arc<[u8]>,
    width: u32,
    height: u32,
    channels: u8,
}

impl Frame {
    /// Wrap interleaved samples. Validates channel count and buffer length.
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8) -> Result<Self, FrameError> {
        let expected = expected_len(width, height, channels)?;
        if data.len() != expected {
            return Err(FrameError::LengthMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            data: data.into(),
            width,
            height,
            channels,
        })
    }

    /// A black frame of the given geometry.
    ///
    /// Zero geometry or an unsupported channel count degrade to a 1x1 frame with
    /// the nearest valid channel count, so this never fails.
    pub fn zeroed(width: u32, height: u32, channels: u8) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let channels = if channels == CHANNELS_GRAY {
            CHANNELS_GRAY
        } else {
            CHANNELS_RGB
        };
        let len = width as usize * height as usize * channels as usize;
        Self {
            data: vec![0u8; len].into(),
            width,
            height,
            channels,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    /// (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Read-only view of the interleaved samples.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    /// Samples of the pixel at (x, y), or `None` when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<&[u8]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let c = self.channels as usize;
        let offset = (y as usize * self.width as usize + x as usize) * c;
        self.data.get(offset..offset + c)
    }

    /// True when every sample is zero.
    pub fn is_blank(&self) -> bool {
        self.data.iter().all(|&b| b == 0)
    }

    /// Mirror the frame along the selected axes.
    pub fn flipped(&self, flip: Flip) -> Frame {
        match flip {
            Flip::Horizontal => self.mirror_rows(),
            Flip::Vertical => self.mirror_columns(),
            Flip::Both => self.rotated_180(),
        }
    }

    /// Rotate by 180°: pixel order reversed in one pass.
    pub fn rotated_180(&self) -> Frame {
        let c = self.channels as usize;
        let mut out = Vec::with_capacity(self.data.len());
        for pixel in self.data.chunks_exact(c).rev() {
            out.extend_from_slice(pixel);
        }
        self.with_data(out, self.width, self.height)
    }

    /// Resample to `width` x `height` by averaging the source area each
    /// destination pixel covers.
    pub fn resized_area(&self, width: u32, height: u32) -> Result<Frame, FrameError> {
        expected_len(width, height, self.channels)?;
        if (width, height) == (self.width, self.height) {
            return Ok(self.clone());
        }

        let xs = area_weights(self.width, width);
        let ys = area_weights(self.height, height);
        let c = self.channels as usize;
        let src_row = self.width as usize * c;

        let mut out = Vec::with_capacity(width as usize * height as usize * c);
        let mut acc = vec![0f32; c];
        for row in &ys {
            for col in &xs {
                acc.iter_mut().for_each(|a| *a = 0.0);
                for &(sy, wy) in row {
                    let base = sy * src_row;
                    for &(sx, wx) in col {
                        let w = wy * wx;
                        let offset = base + sx * c;
                        for (ch, a) in acc.iter_mut().enumerate() {
                            *a += self.data[offset + ch] as f32 * w;
                        }
                    }
                }
                out.extend(acc.iter().map(|&v| v.round().clamp(0.0, 255.0) as u8));
            }
        }

        Ok(self.with_data(out, width, height))
    }

    // Left-right mirror.
    fn mirror_rows(&self) -> Frame {
        let c = self.channels as usize;
        let row_len = self.width as usize * c;
        let mut out = Vec::with_capacity(self.data.len());
        for row in self.data.chunks_exact(row_len) {
            for pixel in row.chunks_exact(c).rev() {
                out.extend_from_slice(pixel);
            }
        }
        self.with_data(out, self.width, self.height)
    }

    // Top-bottom mirror.
    fn mirror_columns(&self) -> Frame {
        let row_len = self.width as usize * self.channels as usize;
        let mut out = Vec::with_capacity(self.data.len());
        for row in self.data.chunks_exact(row_len).rev() {
            out.extend_from_slice(row);
        }
        self.with_data(out, self.width, self.height)
    }

    fn with_data(&self, data: Vec<u8>, width: u32, height: u32) -> Frame {
        Frame {
            data: data.into(),
            width,
            height,
            channels: self.channels,
        }
    }
}

/// Mirror axes applied after resizing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flip {
    /// Mirror left-right.
    Horizontal,
    /// Mirror top-bottom.
    Vertical,
    /// Both axes, equivalent to a 180° rotation.
    Both,
}

impl Flip {
    /// Combine the two flag settings into one transform, if any.
    pub fn from_flags(horizontal: bool, vertical: bool) -> Option<Flip> {
        match (horizontal, vertical) {
            (true, true) => Some(Flip::Both),
            (true, false) => Some(Flip::Horizontal),
            (false, true) => Some(Flip::Vertical),
            (false, false) => None,
        }
    }
}

fn expected_len(width: u32, height: u32, channels: u8) -> Result<usize, FrameError> {
    if channels != CHANNELS_GRAY && channels != CHANNELS_RGB {
        return Err(FrameError::UnsupportedChannels(channels));
    }
    if width == 0 || height == 0 {
        return Err(FrameError::EmptyGeometry { width, height });
    }
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(channels as usize))
        .ok_or(FrameError::Overflow)
}

/// For each destination index, the source indices it covers and the fraction of
/// the destination cell each one contributes. Weights per cell sum to 1.
fn area_weights(src: u32, dst: u32) -> Vec<Vec<(usize, f32)>> {
    let scale = src as f64 / dst as f64;
    (0..dst)
        .map(|d| {
            let start = d as f64 * scale;
            let end = (start + scale).min(src as f64);
            let first = start.floor() as usize;
            let last = (end.ceil() as usize).min(src as usize);
            (first..last)
                .filter_map(|s| {
                    let overlap = end.min(s as f64 + 1.0) - start.max(s as f64);
                    (overlap > 1e-9).then(|| (s, (overlap / scale) as f32))
                })
                .collect()
        })
        .collect()
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // 3x2 RGB frame whose red channel encodes the pixel index.
    fn indexed_frame(width: u32, height: u32) -> Frame {
        let mut data = Vec::new();
        for i in 0..(width * height) {
            data.extend_from_slice(&[i as u8, 0, 100]);
        }
        Frame::new(data, width, height, CHANNELS_RGB).unwrap()
    }

    fn red_channel(frame: &Frame) -> Vec<u8> {
        frame.as_bytes().chunks_exact(3).map(|p| p[0]).collect()
    }

    #[test]
    fn new_rejects_length_mismatch() {
        let err = Frame::new(vec![0u8; 5], 2, 1, CHANNELS_RGB).unwrap_err();
        assert_eq!(
            err,
            FrameError::LengthMismatch {
                expected: 6,
                actual: 5
            }
        );
    }

    #[test]
    fn new_rejects_unsupported_channels() {
        let err = Frame::new(vec![0u8; 8], 2, 1, 4).unwrap_err();
        assert_eq!(err, FrameError::UnsupportedChannels(4));
    }

    #[test]
    fn zeroed_frame_matches_geometry() {
        let frame = Frame::zeroed(4, 3, CHANNELS_RGB);
        assert_eq!(frame.dimensions(), (4, 3));
        assert_eq!(frame.byte_len(), 36);
        assert!(frame.is_blank());
    }

    #[test]
    fn horizontal_flip_mirrors_each_row() {
        let frame = indexed_frame(3, 2);
        let flipped = frame.flipped(Flip::Horizontal);
        assert_eq!(red_channel(&flipped), vec![2, 1, 0, 5, 4, 3]);
    }

    #[test]
    fn vertical_flip_reverses_rows() {
        let frame = indexed_frame(3, 2);
        let flipped = frame.flipped(Flip::Vertical);
        assert_eq!(red_channel(&flipped), vec![3, 4, 5, 0, 1, 2]);
    }

    #[test]
    fn both_flip_equals_sequential_single_axis_flips() {
        let frame = indexed_frame(5, 3);
        let sequential = frame
            .flipped(Flip::Horizontal)
            .flipped(Flip::Vertical);
        assert_eq!(frame.flipped(Flip::Both), frame.rotated_180());
        assert_eq!(sequential, frame.rotated_180());
    }

    #[test]
    fn flips_keep_channel_order_within_pixel() {
        let frame = indexed_frame(2, 1);
        let flipped = frame.flipped(Flip::Horizontal);
        assert_eq!(flipped.pixel(0, 0), Some(&[1u8, 0, 100][..]));
    }

    #[test]
    fn flip_from_flags() {
        assert_eq!(Flip::from_flags(true, true), Some(Flip::Both));
        assert_eq!(Flip::from_flags(false, true), Some(Flip::Vertical));
        assert_eq!(Flip::from_flags(false, false), None);
    }

    #[test]
    fn area_downscale_averages_blocks() {
        let data = vec![
            0, 100, 10, 30, //
            200, 100, 50, 70, //
        ];
        let frame = Frame::new(data, 4, 2, CHANNELS_GRAY).unwrap();
        let resized = frame.resized_area(2, 1).unwrap();
        assert_eq!(resized.as_bytes(), &[100, 40]);
    }

    #[test]
    fn area_resize_handles_fractional_scale() {
        let frame = Frame::new(vec![0, 90, 180], 3, 1, CHANNELS_GRAY).unwrap();
        let resized = frame.resized_area(2, 1).unwrap();
        // Each output cell covers 1.5 source pixels.
        assert_eq!(resized.as_bytes(), &[30, 150]);
    }

    #[test]
    fn area_upscale_preserves_uniform_color() {
        let frame = Frame::new(vec![7, 8, 9], 1, 1, CHANNELS_RGB).unwrap();
        let resized = frame.resized_area(3, 2).unwrap();
        assert_eq!(resized.dimensions(), (3, 2));
        for pixel in resized.as_bytes().chunks_exact(3) {
            assert_eq!(pixel, &[7, 8, 9]);
        }
    }

    #[test]
    fn resize_to_zero_is_rejected() {
        let frame = Frame::zeroed(2, 2, CHANNELS_GRAY);
        assert!(frame.resized_area(0, 2).is_err());
    }
}
