use crate::error::{BridgeError, Result};

/// RGBA frames carry four bytes per pixel.
pub const BYTES_PER_PIXEL: usize = 4;

/// Host-owned RGBA pixel data with a validated `width * height * 4` length.
///
/// Produced once per tick by the frame driver, consumed by one
/// [`EdgeBridge::detect`](crate::EdgeBridge::detect) call, then discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Frame {
    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let expected = u64::from(width) * u64::from(height) * BYTES_PER_PIXEL as u64;
        if pixels.len() as u64 != expected {
            return Err(BridgeError::BadFrameLength {
                width,
                height,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// All-zero (transparent black) frame.
    #[must_use]
    pub fn black(width: u32, height: u32) -> Self {
        let len = (u64::from(width) * u64::from(height) * BYTES_PER_PIXEL as u64) as usize;
        Self {
            width,
            height,
            pixels: vec![0; len],
        }
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_must_match_dimensions() {
        assert!(Frame::from_rgba(2, 2, vec![0; 16]).is_ok());
        let err = Frame::from_rgba(2, 2, vec![0; 15]).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::BadFrameLength {
                width: 2,
                height: 2,
                actual: 15
            }
        ));
    }

    #[test]
    fn black_frame_has_rgba_length() {
        let frame = Frame::black(3, 5);
        assert_eq!(frame.len(), 3 * 5 * BYTES_PER_PIXEL);
        assert!(frame.pixels().iter().all(|b| *b == 0));
    }
}
