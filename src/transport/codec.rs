//! Frame payload codec.
//!
//! Layout (little-endian):
//! ```text
//! 0..4    magic "CRF1"
//! 4..8    width  u32
//! 8..12   height u32
//! 12      channels
//! 13      encoding (0 = raw, 1 = jpeg)
//! 14..16  reserved, zero
//! 16..    body
//! ```

use thiserror::Error;

use crate::frame::{Frame, FrameError};

pub const MAGIC: &[u8; 4] = b"CRF1";
pub const HEADER_LEN: usize = 16;

#[cfg(feature = "jpeg")]
const JPEG_QUALITY: u8 = 90;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Encoding {
    #[default]
    Raw,
    Jpeg,
}

impl Encoding {
    pub fn from_jpg_flag(jpg: bool) -> Self {
        if jpg {
            Self::Jpeg
        } else {
            Self::Raw
        }
    }

    fn tag(self) -> u8 {
        match self {
            Self::Raw => 0,
            Self::Jpeg => 1,
        }
    }

    fn from_tag(tag: u8) -> Result<Self, CodecError> {
        match tag {
            0 => Ok(Self::Raw),
            1 => Ok(Self::Jpeg),
            other => Err(CodecError::UnknownEncoding(other)),
        }
    }
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("payload too short: {0} bytes")]
    Truncated(usize),

    #[error("bad payload magic")]
    BadMagic,

    #[error("unknown encoding tag {0}")]
    UnknownEncoding(u8),

    #[error("JPEG support not compiled in (enable feature 'jpeg')")]
    JpegDisabled,

    #[error("image codec: {0}")]
    Image(String),

    #[error(transparent)]
    Frame(#[from] FrameError),
}

pub fn encode_frame(frame: &Frame, encoding: Encoding) -> Result<Vec<u8>, CodecError> {
    let body = match encoding {
        Encoding::Raw => frame.as_bytes().to_vec(),
        Encoding::Jpeg => encode_jpeg(frame)?,
    };

    let mut payload = Vec::with_capacity(HEADER_LEN + body.len());
    payload.extend_from_slice(MAGIC);
    payload.extend_from_slice(&frame.width().to_le_bytes());
    payload.extend_from_slice(&frame.height().to_le_bytes());
    payload.push(frame.channels());
    payload.push(encoding.tag());
    payload.extend_from_slice(&[0, 0]);
    payload.extend_from_slice(&body);
    Ok(payload)
}

pub fn decode_frame(payload: &[u8]) -> Result<Frame, CodecError> {
    if payload.len() < HEADER_LEN {
        return Err(CodecError::Truncated(payload.len()));
    }
    if &payload[0..4] != MAGIC {
        return Err(CodecError::BadMagic);
    }
    let width = u32::from_le_bytes([payload[4], payload[5], payload[6], payload[7]]);
    let height = u32::from_le_bytes([payload[8], payload[9], payload[10], payload[11]]);
    let channels = payload[12];
    let encoding = Encoding::from_tag(payload[13])?;
    let body = &payload[HEADER_LEN..];

    let data = match encoding {
        Encoding::Raw => body.to_vec(),
        Encoding::Jpeg => decode_jpeg(body, channels)?,
    };
    Ok(Frame::new(data, width, height, channels)?)
}

#[cfg(feature = "jpeg")]
fn encode_jpeg(frame: &Frame) -> Result<Vec<u8>, CodecError> {
    use image::codecs::jpeg::JpegEncoder;
    use image::ExtendedColorType;

    let color = if frame.channels() == crate::frame::CHANNELS_GRAY {
        ExtendedColorType::L8
    } else {
        ExtendedColorType::Rgb8
    };
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY)
        .encode(frame.as_bytes(), frame.width(), frame.height(), color)
        .map_err(|err| CodecError::Image(err.to_string()))?;
    Ok(out)
}

#[cfg(not(feature = "jpeg"))]
fn encode_jpeg(_frame: &Frame) -> Result<Vec<u8>, CodecError> {
    Err(CodecError::JpegDisabled)
}

#[cfg(feature = "jpeg")]
fn decode_jpeg(body: &[u8], channels: u8) -> Result<Vec<u8>, CodecError> {
    let image = image::load_from_memory_with_format(body, image::ImageFormat::Jpeg)
        .map_err(|err| CodecError::Image(err.to_string()))?;
    Ok(if channels == crate::frame::CHANNELS_GRAY {
        image.to_luma8().into_raw()
    } else {
        image.to_rgb8().into_raw()
    })
}

#[cfg(not(feature = "jpeg"))]
fn decode_jpeg(_body: &[u8], _channels: u8) -> Result<Vec<u8>, CodecError> {
    Err(CodecError::JpegDisabled)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
