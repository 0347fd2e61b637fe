//! Screen capture provider for the Confab orchestration core.
//!
//! Provides the `ScreenCapture` trait the chat orchestrator calls when the
//! completion backend requests a screen capture, a `MockScreenCapture` for
//! testing, and a `PrimaryDisplayCapture` that grabs the primary monitor via
//! Win32 GDI on Windows. The provider never fails loudly: "nothing could be
//! captured" is `None`, and the orchestrator decides what that means.

pub mod encode;
pub mod gdi;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;

/// Resolution ceiling applied to captured frames.
pub const CAPTURE_MAX_WIDTH: u32 = 2560;
pub const CAPTURE_MAX_HEIGHT: u32 = 1440;

/// A captured still image, PNG-encoded, ready for transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedImage {
    /// PNG bytes.
    pub bytes: Vec<u8>,
    /// Width after scaling.
    pub width: u32,
    /// Height after scaling.
    pub height: u32,
}

impl CapturedImage {
    /// Renders the image as a `data:image/png;base64,...` URL for inline
    /// transport inside a content part.
    pub fn to_data_url(&self) -> String {
        format!(
            "data:image/png;base64,{}",
            BASE64_STANDARD.encode(&self.bytes)
        )
    }
}

/// Provider of still images of the current display.
///
/// Implementations select the primary display, render at the fixed
/// resolution ceiling, and encode as a compressed still image. Returning
/// `None` is not an error: it means there is no capturable source or the
/// captured frame was empty.
#[async_trait]
pub trait ScreenCapture: Send + Sync {
    /// Capture the primary display, or `None` if nothing can be captured.
    async fn capture(&self) -> Option<CapturedImage>;
}

/// Mock capture provider for testing.
#[derive(Debug, Clone, Default)]
pub struct MockScreenCapture {
    image: Option<CapturedImage>,
}

impl MockScreenCapture {
    /// A provider that always returns the given image.
    pub fn with_image(image: CapturedImage) -> Self {
        Self { image: Some(image) }
    }

    /// A provider that returns a small synthetic PNG.
    pub fn with_test_pattern() -> Self {
        let data = vec![0x40u8; 8 * 8 * 4];
        let image = encode::bgra_to_png(&data, 8, 8, CAPTURE_MAX_WIDTH, CAPTURE_MAX_HEIGHT)
            .expect("test pattern must encode");
        Self::with_image(image)
    }

    /// A provider with no capturable source.
    pub fn unavailable() -> Self {
        Self { image: None }
    }
}

#[async_trait]
impl ScreenCapture for MockScreenCapture {
    async fn capture(&self) -> Option<CapturedImage> {
        self.image.clone()
    }
}

/// Captures the primary display via Win32 GDI and encodes it as a PNG no
/// larger than the resolution ceiling.
///
/// On non-Windows platforms there is no capturable source and `capture`
/// returns `None`.
#[derive(Debug, Clone)]
pub struct PrimaryDisplayCapture {
    max_width: u32,
    max_height: u32,
}

impl PrimaryDisplayCapture {
    /// A provider with the default resolution ceiling.
    pub fn new() -> Self {
        Self {
            max_width: CAPTURE_MAX_WIDTH,
            max_height: CAPTURE_MAX_HEIGHT,
        }
    }

    /// Overrides the resolution ceiling.
    pub fn with_ceiling(max_width: u32, max_height: u32) -> Self {
        Self {
            max_width,
            max_height,
        }
    }
}

impl Default for PrimaryDisplayCapture {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(target_os = "windows")]
#[async_trait]
impl ScreenCapture for PrimaryDisplayCapture {
    async fn capture(&self) -> Option<CapturedImage> {
        let frame = gdi::capture_primary_frame()?;
        if frame.is_empty() {
            tracing::debug!("captured frame is empty, treating as no source");
            return None;
        }
        match encode::bgra_to_png(
            &frame.data,
            frame.width,
            frame.height,
            self.max_width,
            self.max_height,
        ) {
            Ok(image) => Some(image),
            Err(err) => {
                tracing::warn!(error = %err, "failed to encode captured frame");
                None
            }
        }
    }
}

#[cfg(not(target_os = "windows"))]
#[async_trait]
impl ScreenCapture for PrimaryDisplayCapture {
    async fn capture(&self) -> Option<CapturedImage> {
        tracing::warn!("screen capture is only implemented on Windows");
        None
    }
}
