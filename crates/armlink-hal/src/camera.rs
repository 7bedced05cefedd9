//! `ImageSource` trait and the decoded [`Frame`] it produces.

use armlink_types::ArmError;

/// A decoded RGB24 bitmap.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Row-major RGB24 pixel data, `width * height * 3` bytes.
    pub data: Vec<u8>,
}

impl Frame {
    /// Wrap raw RGB24 data, checking that its length matches the dimensions.
    ///
    /// # Errors
    ///
    /// Returns [`ArmError::CaptureFault`] when the buffer size is wrong.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self, ArmError> {
        let expected = Self::byte_len(width, height);
        if data.len() != expected {
            return Err(ArmError::CaptureFault {
                device: "frame".to_string(),
                details: format!(
                    "expected {expected} bytes for {width}x{height} RGB24, got {}",
                    data.len()
                ),
            });
        }
        Ok(Self { width, height, data })
    }

    /// A frame filled with one colour.
    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let data = rgb
            .iter()
            .copied()
            .cycle()
            .take(Self::byte_len(width, height))
            .collect();
        Self { width, height, data }
    }

    fn byte_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * 3
    }
}

/// A device that yields decoded frames, e.g. a V4L2 webcam.
pub trait ImageSource: Send {
    /// Stable identifier for this source, e.g. `"/dev/video0"`.
    fn id(&self) -> &str;

    /// Block until the next frame is available and return it.
    ///
    /// # Errors
    ///
    /// Returns [`ArmError::CaptureFault`] when the read fails. The failure is
    /// transient from the caller's point of view; the next read may succeed.
    fn read_frame(&mut self) -> Result<Frame, ArmError>;
}

/// Acquires an [`ImageSource`]. Called repeatedly while device acquisition is
/// retried at startup.
pub trait ImageSourceOpener: Send {
    /// # Errors
    ///
    /// Returns [`ArmError::DeviceUnavailable`] when the device is busy or absent.
    fn open(&mut self) -> Result<Box<dyn ImageSource>, ArmError>;
}

impl<F> ImageSourceOpener for F
where
    F: FnMut() -> Result<Box<dyn ImageSource>, ArmError> + Send,
{
    fn open(&mut self) -> Result<Box<dyn ImageSource>, ArmError> {
        self()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockCamera {
        id: String,
    }

    impl ImageSource for MockCamera {
        fn id(&self) -> &str {
            &self.id
        }

        fn read_frame(&mut self) -> Result<Frame, ArmError> {
            Frame::new(2, 2, vec![0u8; 2 * 2 * 3])
        }
    }

    #[test]
    fn mock_camera_capture() {
        let mut cam = MockCamera {
            id: "front_rgb".to_string(),
        };
        assert_eq!(cam.id(), "front_rgb");
        let frame = cam.read_frame().unwrap();
        assert_eq!(frame.width, 2);
        assert_eq!(frame.height, 2);
        assert_eq!(frame.data.len(), 12);
    }

    #[test]
    fn frame_new_rejects_wrong_length() {
        assert!(matches!(
            Frame::new(4, 4, vec![0u8; 10]),
            Err(ArmError::CaptureFault { .. })
        ));
    }

    #[test]
    fn solid_frame_repeats_colour() {
        let frame = Frame::solid(3, 2, [1, 2, 3]);
        assert_eq!(frame.data.len(), 18);
        assert!(frame.data.chunks(3).all(|px| px == [1, 2, 3]));
    }

    #[test]
    fn closure_is_an_opener() {
        let mut opener = || -> Result<Box<dyn ImageSource>, ArmError> {
            Ok(Box::new(MockCamera {
                id: "cam".to_string(),
            }))
        };
        let mut source = ImageSourceOpener::open(&mut opener).unwrap();
        assert_eq!(source.read_frame().unwrap().width, 2);
    }
}
