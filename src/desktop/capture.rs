use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, ImageFormat, RgbaImage};
use tauri::WebviewWindow;
use thiserror::Error;
use xcap::Monitor;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("No screens found")]
    NoMonitor,
    #[error("Failed to capture screen: {0}")]
    Capture(#[from] xcap::XCapError),
    #[error("Failed to capture below the overlay: {0}")]
    BelowWindow(String),
    #[error("Failed to encode PNG: {0}")]
    Encode(#[from] image::ImageError),
}

/// Native id of the overlay window, used to capture only what lies beneath it.
#[cfg(target_os = "macos")]
pub fn overlay_window_id(window: &WebviewWindow) -> Option<u32> {
    use objc2::msg_send;
    use objc2::runtime::AnyObject;

    let ns_window = window.ns_window().ok()?;
    let number: isize = unsafe {
        let ns_window: *mut AnyObject = ns_window.cast();
        msg_send![ns_window, windowNumber]
    };
    u32::try_from(number).ok()
}

#[cfg(not(target_os = "macos"))]
pub fn overlay_window_id(_window: &WebviewWindow) -> Option<u32> {
    None
}

/// Capture the screen as a base64 PNG.
///
/// With an overlay id on macOS only the windows below the overlay are
/// composited, so the overlay never shows up in its own screenshot. Any
/// failure there falls back to the whole primary monitor.
pub fn capture_screen(overlay: Option<u32>) -> Result<String, CaptureError> {
    #[cfg(target_os = "macos")]
    {
        if let Some(window_id) = overlay {
            match macos::capture_below_window(window_id) {
                Ok(frame) => return encode_png(frame),
                Err(e) => log::warn!("[capture] falling back to full display: {e}"),
            }
        }
    }
    #[cfg(not(target_os = "macos"))]
    let _ = overlay;

    capture_primary_monitor()
}

/// Grab the primary monitor (or the first one).
fn capture_primary_monitor() -> Result<String, CaptureError> {
    let monitors = Monitor::all()?;
    let monitor = monitors
        .iter()
        .find(|m| m.is_primary().unwrap_or(false))
        .or_else(|| monitors.first())
        .ok_or(CaptureError::NoMonitor)?;

    encode_png(monitor.capture_image()?)
}

fn encode_png(frame: RgbaImage) -> Result<String, CaptureError> {
    log::debug!("[capture] {}x{} frame", frame.width(), frame.height());
    let mut png = Vec::new();
    DynamicImage::ImageRgba8(frame).write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
    Ok(STANDARD.encode(png))
}

/// Repack padded BGRA rows into tightly packed RGBA.
#[cfg(any(target_os = "macos", test))]
fn bgra_to_rgba(data: &[u8], width: usize, height: usize, bytes_per_row: usize) -> Option<Vec<u8>> {
    let row_len = width.checked_mul(4)?;
    if bytes_per_row < row_len || data.len() < bytes_per_row.checked_mul(height)? {
        return None;
    }
    let mut rgba = Vec::with_capacity(row_len * height);
    for row in data.chunks(bytes_per_row).take(height) {
        for px in row[..row_len].chunks_exact(4) {
            rgba.extend_from_slice(&[px[2], px[1], px[0], px[3]]);
        }
    }
    Some(rgba)
}

#[cfg(target_os = "macos")]
mod macos {
    use core_foundation::data::CFData;
    use core_graphics::display::CGDisplay;
    use core_graphics::window::{
        create_image, kCGWindowImageDefault, kCGWindowListOptionOnScreenBelowWindow,
    };
    use image::RgbaImage;

    use super::{bgra_to_rgba, CaptureError};

    pub fn capture_below_window(window_id: u32) -> Result<RgbaImage, CaptureError> {
        let bounds = CGDisplay::main().bounds();
        let image = create_image(
            bounds,
            kCGWindowListOptionOnScreenBelowWindow,
            window_id,
            kCGWindowImageDefault,
        )
        .ok_or_else(|| CaptureError::BelowWindow("CGWindowListCreateImage returned null".into()))?;

        let (width, height) = (image.width(), image.height());
        let data: CFData = image.data();
        let rgba = bgra_to_rgba(data.bytes(), width, height, image.bytes_per_row())
            .ok_or_else(|| CaptureError::BelowWindow("unexpected pixel buffer length".into()))?;

        let too_large = |_| CaptureError::BelowWindow("image too large".into());
        RgbaImage::from_raw(
            u32::try_from(width).map_err(too_large)?,
            u32::try_from(height).map_err(too_large)?,
            rgba,
        )
        .ok_or_else(|| CaptureError::BelowWindow("pixel buffer does not match size".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bgra_rows_repacked_without_padding() {
        // 2x2 image, 12-byte rows (4 bytes of padding each)
        let data = [
            1, 2, 3, 4, 5, 6, 7, 8, 0, 0, 0, 0, //
            9, 10, 11, 12, 13, 14, 15, 16, 0, 0, 0, 0,
        ];

        let rgba = bgra_to_rgba(&data, 2, 2, 12).unwrap();

        assert_eq!(
            rgba,
            vec![3, 2, 1, 4, 7, 6, 5, 8, 11, 10, 9, 12, 15, 14, 13, 16]
        );
    }

    #[test]
    fn test_short_pixel_buffer_is_rejected() {
        assert_eq!(bgra_to_rgba(&[0; 20], 2, 2, 12), None);
        assert_eq!(bgra_to_rgba(&[0; 32], 3, 2, 8), None);
    }
}
