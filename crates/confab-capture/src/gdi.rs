//! Primary-display frame grab via Win32 GDI.
//!
//! Captures the primary monitor with `BitBlt` and reads the pixels back as a
//! 32-bit top-down BGRA buffer. Every failure returns `None`; the caller
//! treats a missing frame as "nothing to capture", not as an error.

/// A raw BGRA frame straight from the display.
#[derive(Debug)]
pub struct RawFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl RawFrame {
    /// A frame with no pixels, or with nothing rendered into it, counts as
    /// empty and is discarded by the provider.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.data.iter().all(|byte| *byte == 0)
    }
}

/// Grab the primary display.
#[cfg(target_os = "windows")]
pub fn capture_primary_frame() -> Option<RawFrame> {
    use windows_sys::Win32::Graphics::Gdi::*;
    use windows_sys::Win32::UI::WindowsAndMessaging::{GetSystemMetrics, SM_CXSCREEN, SM_CYSCREEN};

    unsafe {
        let hdc_screen = GetDC(0);
        if hdc_screen == 0 {
            tracing::warn!("GetDC failed, no capturable display");
            return None;
        }

        let width = GetSystemMetrics(SM_CXSCREEN);
        let height = GetSystemMetrics(SM_CYSCREEN);
        if width <= 0 || height <= 0 {
            ReleaseDC(0, hdc_screen);
            return None;
        }

        let hdc_mem = CreateCompatibleDC(hdc_screen);
        let hbm = CreateCompatibleBitmap(hdc_screen, width, height);
        let old_bm = SelectObject(hdc_mem, hbm);

        let blitted = BitBlt(hdc_mem, 0, 0, width, height, hdc_screen, 0, 0, SRCCOPY);
        let frame = if blitted == 0 {
            tracing::warn!("BitBlt failed");
            None
        } else {
            // BITMAPINFOHEADER for a 32-bit top-down DIB (40 bytes).
            let image_size = (width as usize) * (height as usize) * 4;
            let mut pixels = vec![0u8; image_size];
            let mut bih = [0u8; 40];
            bih[0..4].copy_from_slice(&40u32.to_le_bytes());
            bih[4..8].copy_from_slice(&width.to_le_bytes());
            bih[8..12].copy_from_slice(&(-height).to_le_bytes()); // negative = top-down
            bih[12..14].copy_from_slice(&1u16.to_le_bytes()); // planes
            bih[14..16].copy_from_slice(&32u16.to_le_bytes()); // bits per pixel

            let lines = GetDIBits(
                hdc_mem,
                hbm,
                0,
                height as u32,
                pixels.as_mut_ptr() as *mut _,
                bih.as_mut_ptr() as *mut _,
                DIB_RGB_COLORS,
            );
            if lines == height {
                Some(RawFrame {
                    data: pixels,
                    width: width as u32,
                    height: height as u32,
                })
            } else {
                tracing::warn!("GetDIBits returned {} of {} lines", lines, height);
                None
            }
        };

        SelectObject(hdc_mem, old_bm);
        DeleteObject(hbm);
        DeleteDC(hdc_mem);
        ReleaseDC(0, hdc_screen);

        frame
    }
}
