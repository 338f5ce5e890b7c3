//! Frame hand-off between the emulation thread and the display surface

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Pixel layouts a core may announce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelFormat {
    /// 0RGB1555, the libretro default
    #[default]
    Rgb1555,
    Xrgb8888,
    Rgb565,
}

impl PixelFormat {
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(PixelFormat::Rgb1555),
            1 => Some(PixelFormat::Xrgb8888),
            2 => Some(PixelFormat::Rgb565),
            _ => None,
        }
    }

    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Xrgb8888 => 4,
            PixelFormat::Rgb1555 | PixelFormat::Rgb565 => 2,
        }
    }
}

/// Number of bytes a core buffer must hold for the given geometry
pub fn required_len(width: u32, height: u32, pitch: usize, format: PixelFormat) -> usize {
    if width == 0 || height == 0 {
        return 0;
    }
    pitch * (height as usize - 1) + width as usize * format.bytes_per_pixel()
}

#[inline]
fn expand5(v: u16) -> u8 {
    let v = (v & 0x1F) as u8;
    (v << 3) | (v >> 2)
}

#[inline]
fn expand6(v: u16) -> u8 {
    let v = (v & 0x3F) as u8;
    (v << 2) | (v >> 4)
}

/// Convert one core frame to tightly packed RGBA8.
///
/// Returns `None` when the buffer is too short for the announced geometry.
pub fn convert_to_rgba(
    data: &[u8],
    width: u32,
    height: u32,
    pitch: usize,
    format: PixelFormat,
) -> Option<Vec<u8>> {
    let bpp = format.bytes_per_pixel();
    if pitch < width as usize * bpp || data.len() < required_len(width, height, pitch, format) {
        return None;
    }

    let mut rgba = Vec::with_capacity(width as usize * height as usize * 4);
    for y in 0..height as usize {
        let row = &data[y * pitch..y * pitch + width as usize * bpp];
        match format {
            PixelFormat::Xrgb8888 => {
                for px in row.chunks_exact(4) {
                    // little-endian 0x00RRGGBB
                    rgba.extend_from_slice(&[px[2], px[1], px[0], 0xFF]);
                }
            }
            PixelFormat::Rgb565 => {
                for px in row.chunks_exact(2) {
                    let p = u16::from_le_bytes([px[0], px[1]]);
                    rgba.extend_from_slice(&[expand5(p >> 11), expand6(p >> 5), expand5(p), 0xFF]);
                }
            }
            PixelFormat::Rgb1555 => {
                for px in row.chunks_exact(2) {
                    let p = u16::from_le_bytes([px[0], px[1]]);
                    rgba.extend_from_slice(&[expand5(p >> 10), expand5(p >> 5), expand5(p), 0xFF]);
                }
            }
        }
    }
    Some(rgba)
}

/// A converted frame ready for display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
    /// Increments with every published frame
    pub serial: u64,
}

/// Latest-frame mailbox shared by the core and the surface owner
#[derive(Debug, Default)]
pub struct VideoOutput {
    latest: Mutex<Option<VideoFrame>>,
    serial: AtomicU64,
}

impl VideoOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, width: u32, height: u32, rgba: Vec<u8>) {
        let serial = self.serial.fetch_add(1, Ordering::AcqRel) + 1;
        *self.latest.lock() = Some(VideoFrame {
            width,
            height,
            rgba,
            serial,
        });
    }

    /// The latest frame, if it is newer than `seen`
    pub fn newer_than(&self, seen: u64) -> Option<VideoFrame> {
        if self.serial.load(Ordering::Acquire) <= seen {
            return None;
        }
        self.latest.lock().clone()
    }

    pub fn clear(&self) {
        *self.latest.lock() = None;
    }
}
