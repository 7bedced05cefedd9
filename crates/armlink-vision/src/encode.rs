//! Stateless JPEG encoding of RGB24 frames.

use armlink_hal::Frame;
use armlink_types::ArmError;
use image::ExtendedColorType;
use image::codecs::jpeg::JpegEncoder;
use tracing::warn;

/// Encode `frame` as a baseline JPEG at `quality` (1-100).
///
/// Returns `None` when encoding fails; the failure is logged.
pub fn encode(frame: &Frame, quality: u8) -> Option<Vec<u8>> {
    match try_encode(frame, quality) {
        Ok(jpeg) => Some(jpeg),
        Err(e) => {
            warn!(width = frame.width, height = frame.height, quality, error = %e, "jpeg encode failed");
            None
        }
    }
}

/// # Errors
///
/// Returns [`ArmError::Encode`] for a buffer that does not match the frame's
/// dimensions or any encoder failure.
pub fn try_encode(frame: &Frame, quality: u8) -> Result<Vec<u8>, ArmError> {
    let expected = frame.width as usize * frame.height as usize * 3;
    if frame.data.len() != expected || expected == 0 {
        return Err(ArmError::Encode(format!(
            "{}x{} frame carries {} bytes",
            frame.width,
            frame.height,
            frame.data.len()
        )));
    }
    let mut jpeg = Vec::with_capacity(expected / 8);
    JpegEncoder::new_with_quality(&mut jpeg, quality.clamp(1, 100))
        .encode(&frame.data, frame.width, frame.height, ExtendedColorType::Rgb8)
        .map_err(|e| ArmError::Encode(e.to_string()))?;
    Ok(jpeg)
}
