// Opens the default camera and hands out raw frames.
// The session owns the only `FrameSource`, so there is never more than one
// read in flight.

use crate::error::Error;
use crate::types::{Frame, PixelLayout};
use std::time::Instant;

// Bring in nokhwa types for camera control.
use nokhwa::{
    Camera,
    pixel_format::RgbFormat,
    utils::{
        CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution,
    },
};

/// Anything that can be pulled for the next frame.
/// A failed read is transient: callers skip it and try again next tick.
pub trait FrameSource {
    fn read(&mut self) -> Result<Frame, Error>;
}

// A small wrapper around nokhwa::Camera so the session stays clean.
pub struct CameraCapture {
    cam: Camera,
    width: u32,
    height: u32,
}

impl CameraCapture {
    /// Open camera `index` near the requested resolution (falls back if not exact).
    pub fn new(index: u32, width: u32, height: u32, fps: u32) -> Result<Self, Error> {
        let idx = CameraIndex::Index(index);

        let fmt = CameraFormat::new(
            Resolution::new(width, height),
            FrameFormat::YUYV, // uncompressed; cheap to convert to RGB
            fps,
        );

        let req = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(fmt));

        let mut cam = Camera::new(idx, req)
            .map_err(|e| Error::CameraInit(format!("Create camera: {e}")))?;

        cam.open_stream()
            .map_err(|e| Error::CameraInit(format!("Open stream: {e}")))?;

        // The actual stream might choose a slightly different resolution.
        let actual = cam.resolution();
        tracing::info!(
            index,
            width = actual.width(),
            height = actual.height(),
            "camera stream open"
        );

        Ok(Self {
            cam,
            width: actual.width(),
            height: actual.height(),
        })
    }

    /// Report the actual resolution the camera is delivering.
    pub fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl FrameSource for CameraCapture {
    /// Grab one frame and decode it to packed RGB (blocks until a frame is ready).
    fn read(&mut self) -> Result<Frame, Error> {
        let frame = self
            .cam
            .frame()
            .map_err(|e| Error::CameraFrame(format!("Fetch frame: {e}")))?;
        let captured_at = Instant::now();

        let rgb_img = frame
            .decode_image::<RgbFormat>()
            .map_err(|e| Error::CameraFrame(format!("Decode RGB: {e}")))?;

        let (w, h) = rgb_img.dimensions();
        Ok(Frame {
            width: w,
            height: h,
            layout: PixelLayout::Rgb8,
            data: rgb_img.into_raw(),
            captured_at,
        })
    }
}

impl Drop for CameraCapture {
    fn drop(&mut self) {
        if let Err(e) = self.cam.stop_stream() {
            tracing::warn!(error = %e, "failed to stop camera stream");
        }
    }
}
