//! Device pixel formats to packed gray/RGB.

use super::GrabError;
use crate::frame::CHANNELS_GRAY;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PixelFormat {
    Rgb24,
    Yuyv,
    Grey,
}

impl PixelFormat {
    pub(crate) fn from_fourcc(fourcc: &[u8; 4]) -> Option<Self> {
        match fourcc {
            b"RGB3" => Some(Self::Rgb24),
            b"YUYV" => Some(Self::Yuyv),
            b"GREY" => Some(Self::Grey),
            _ => None,
        }
    }

    fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgb24 => 3,
            Self::Yuyv => 2,
            Self::Grey => 1,
        }
    }
}

/// Convert one device buffer to `channels` interleaved bytes per pixel.
///
/// Drivers may pad buffers, so anything longer than the packed size is
/// truncated. Shorter buffers are a dropped frame.
pub(crate) fn normalize(
    pixels: &[u8],
    width: u32,
    height: u32,
    format: PixelFormat,
    channels: u8,
) -> Result<Vec<u8>, GrabError> {
    let count = (width as usize)
        .checked_mul(height as usize)
        .ok_or_else(|| GrabError::NoFrame("frame dimensions overflow".to_string()))?;
    let expected = count * format.bytes_per_pixel();
    if pixels.len() < expected {
        return Err(GrabError::NoFrame(format!(
            "{:?} frame too short: expected {}, got {}",
            format,
            expected,
            pixels.len()
        )));
    }
    let pixels = &pixels[..expected];

    let gray = channels == CHANNELS_GRAY;
    Ok(match (format, gray) {
        (PixelFormat::Rgb24, false) => pixels.to_vec(),
        (PixelFormat::Rgb24, true) => pixels.chunks_exact(3).map(luma).collect(),
        (PixelFormat::Grey, true) => pixels.to_vec(),
        (PixelFormat::Grey, false) => pixels.iter().flat_map(|&y| [y, y, y]).collect(),
        (PixelFormat::Yuyv, true) => pixels.chunks_exact(2).map(|pair| pair[0]).collect(),
        (PixelFormat::Yuyv, false) => yuyv_to_rgb(pixels),
    })
}

fn luma(rgb: &[u8]) -> u8 {
    clamp_to_u8(0.299 * rgb[0] as f32 + 0.587 * rgb[1] as f32 + 0.114 * rgb[2] as f32)
}

fn yuyv_to_rgb(pixels: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(pixels.len() / 2 * 3);
    for macro_pixel in pixels.chunks_exact(4) {
        let u = macro_pixel[1] as f32 - 128.0;
        let v = macro_pixel[3] as f32 - 128.0;
        for y in [macro_pixel[0], macro_pixel[2]] {
            let y = y as f32;
            rgb.push(clamp_to_u8(y + 1.402_f32 * v));
            rgb.push(clamp_to_u8(y - 0.344_136_f32 * u - 0.714_136_f32 * v));
            rgb.push(clamp_to_u8(y + 1.772_f32 * u));
        }
    }
    rgb
}

fn clamp_to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}
