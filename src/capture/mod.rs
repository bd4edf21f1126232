//! The `capture` module wraps the camera the loop takes photos with.
//! The loop only sees the `Camera` trait; `folder` is the desktop stand-in.
use async_trait::async_trait;

pub mod encode;
pub mod folder;

pub const MIN_ZOOM: f32 = 1.0;

/// Error type for camera operations. Any of these stops the loop.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CaptureError {
    #[error("Camera unavailable: {0}")]
    Unavailable(String),
    #[error("Camera permission denied")]
    PermissionDenied,
    #[error("Capture failed: {0}")]
    Failed(String),
}

/// Device camera as the loop sees it. Implementations need not clamp:
/// callers pass zoom already within `[MIN_ZOOM, max_zoom()]` and focus
/// coordinates within `[0, 1]`.
#[async_trait]
pub trait Camera: Send {
    async fn start_session(&mut self) -> Result<(), CaptureError>;

    async fn stop_session(&mut self);

    /// Take one photo and return it as JPEG bytes.
    async fn capture_photo(&mut self) -> Result<Vec<u8>, CaptureError>;

    async fn set_zoom(&mut self, factor: f32) -> Result<(), CaptureError>;

    async fn set_focus_point(&mut self, x: f32, y: f32) -> Result<(), CaptureError>;

    /// Largest zoom factor the device reports.
    fn max_zoom(&self) -> f32;
}

/// Clamp `factor` into `[1.0, max_zoom]`. NaN maps to 1.0.
pub fn clamp_zoom(factor: f32, max_zoom: f32) -> f32 {
    let max_zoom = max_zoom.max(MIN_ZOOM);
    if factor.is_nan() {
        return MIN_ZOOM;
    }
    factor.clamp(MIN_ZOOM, max_zoom)
}

/// Clamp a normalized focus coordinate into `[0, 1]`. NaN maps to the centre.
pub fn clamp_focus(v: f32) -> f32 {
    if v.is_nan() {
        0.5
    } else {
        v.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zoom_is_clamped_to_device_range() {
        assert_eq!(clamp_zoom(10.0, 5.0), 5.0);
        assert_eq!(clamp_zoom(0.2, 5.0), 1.0);
        assert_eq!(clamp_zoom(2.5, 5.0), 2.5);
        assert_eq!(clamp_zoom(-3.0, 5.0), 1.0);
        assert_eq!(clamp_zoom(f32::INFINITY, 5.0), 5.0);
        assert_eq!(clamp_zoom(f32::NAN, 5.0), 1.0);
    }

    #[test]
    fn zoom_with_bogus_device_max() {
        // Devices that report less than 1x cannot zoom at all.
        assert_eq!(clamp_zoom(3.0, 0.5), 1.0);
    }

    #[test]
    fn focus_is_clamped() {
        assert_eq!(clamp_focus(1.7), 1.0);
        assert_eq!(clamp_focus(-0.1), 0.0);
        assert_eq!(clamp_focus(0.25), 0.25);
        assert_eq!(clamp_focus(f32::NAN), 0.5);
    }
}
