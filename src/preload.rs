//! Off-surface verification of candidate images.
//!
//! A reference is only ever handed to the renderer after its bytes were
//! fetched in full and decoded without error. Everything in this module is
//! side-effect free with respect to the display.

use std::fs;
use std::io::Cursor;
use std::path::Path;
use std::time::Duration;

use exif::{In, Reader, Tag, Value};
use image::ImageFormat;
use tokio_util::sync::CancellationToken;

use crate::reference::{ImageReference, SourceLocation};
use crate::transition::CycleId;

/// Starts asynchronous verification of candidates.
///
/// `verify` must return immediately. The outcome is delivered later, out of
/// band, tagged with the same [`CycleId`]; see
/// [`Controller::complete_preload`](crate::controller::Controller::complete_preload).
/// Implementations should stop work early once `cancel` fires.
pub trait PreloadVerifier {
    type Handle: Clone;

    fn verify(&mut self, cycle: CycleId, reference: ImageReference, cancel: CancellationToken);
}

pub type Verification<H> = Result<H, PreloadError>;

#[derive(thiserror::Error, Debug)]
pub enum PreloadError {
    #[error("fetch failed: {0}")]
    Fetch(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("decode failed: {0}")]
    Decode(#[from] image::ImageError),

    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("image exceeds {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("preload cancelled")]
    Cancelled,

    #[error("preload worker failed: {0}")]
    Worker(String),
}

/// What a successful verification hands to the renderer.
pub type ImageHandle = std::sync::Arc<DecodedImage>;

/// A fully fetched and decoded image, upright after EXIF rotation.
///
/// `pixels` is tightly packed RGBA8, `width * height * 4` bytes. The surface
/// uploads exactly these pixels, so nothing it shows was decoded anywhere but
/// here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub pixels: std::sync::Arc<[u8]>,
    pub width: u32,
    pub height: u32,
}

/// How fetches are bounded.
#[derive(Debug, Clone, Copy)]
pub struct FetchLimits {
    pub timeout: Duration,
    pub max_bytes: u64,
}

pub fn http_agent(limits: FetchLimits) -> ureq::Agent {
    let config = ureq::Agent::config_builder()
        .timeout_global(Some(limits.timeout))
        .build();
    ureq::Agent::new_with_config(config)
}

/// Fetches and decodes `reference`. Blocking; run it off the frame thread.
pub fn load(
    agent: &ureq::Agent,
    reference: &ImageReference,
    limits: FetchLimits,
) -> Result<DecodedImage, PreloadError> {
    let bytes = fetch(agent, reference, limits)?;
    decode(&bytes)
}

pub fn fetch(
    agent: &ureq::Agent,
    reference: &ImageReference,
    limits: FetchLimits,
) -> Result<Vec<u8>, PreloadError> {
    match reference.location() {
        SourceLocation::Http(url) => {
            let mut response = agent
                .get(&url)
                .call()
                .map_err(|e| PreloadError::Fetch(e.to_string()))?;
            response
                .body_mut()
                .with_config()
                .limit(limits.max_bytes)
                .read_to_vec()
                .map_err(|e| PreloadError::Fetch(e.to_string()))
        }
        SourceLocation::File(path) => read_file(&path, limits.max_bytes),
    }
}

fn read_file(path: &Path, max_bytes: u64) -> Result<Vec<u8>, PreloadError> {
    let len = fs::metadata(path)?.len();
    if len > max_bytes {
        return Err(PreloadError::TooLarge { limit: max_bytes });
    }
    Ok(fs::read(path)?)
}

/// Decodes `bytes` completely and turns the result upright.
pub fn decode(bytes: &[u8]) -> Result<DecodedImage, PreloadError> {
    let format = image::guess_format(bytes)?;
    if !matches!(
        format,
        ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::Bmp | ImageFormat::Gif
    ) {
        return Err(PreloadError::UnsupportedFormat(format!("{format:?}")));
    }

    let decoded = image::load_from_memory_with_format(bytes, format)?;

    let orientation = if format == ImageFormat::Jpeg {
        read_orientation(bytes)
    } else {
        1
    };
    let upright = match orientation {
        3 => decoded.rotate180(),
        6 => decoded.rotate90(),
        8 => decoded.rotate270(),
        _ => decoded,
    };

    let rgba = upright.into_rgba8();
    Ok(DecodedImage {
        width: rgba.width(),
        height: rgba.height(),
        pixels: rgba.into_raw().into(),
    })
}

/// EXIF orientation of a JPEG, 1 when absent or unreadable.
///
/// 1 = normal, 3 = 180 deg, 6 = 90 deg clockwise, 8 = 90 deg counter-clockwise.
/// Flipped orientations are treated as normal.
pub fn read_orientation(bytes: &[u8]) -> u16 {
    match Reader::new().read_from_container(&mut Cursor::new(bytes)) {
        Ok(exif) => exif
            .get_field(Tag::Orientation, In::PRIMARY)
            .and_then(|field| match &field.value {
                Value::Short(values) => values.first().copied(),
                _ => None,
            })
            .unwrap_or(1),
        Err(e) => {
            tracing::debug!("no usable EXIF data: {e}");
            1
        }
    }
}
