use super::FrameSource;
use crate::error::Result;
use crate::frame::Frame;
use anyhow::Context;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType};
use nokhwa::Camera;
use std::time::{Duration, Instant};

/// Live webcam source. Frames are stamped with microseconds since the
/// stream opened; delivery is paced to the target frame rate.
pub struct WebcamCapture {
    camera: Camera,
    width: u32,
    height: u32,
    started: Instant,
    frame_interval: Duration,
    last_frame_at: Option<Instant>,
}

impl WebcamCapture {
    pub fn new(device_index: u32, width: u32, height: u32, fps: u32) -> Result<Self> {
        tracing::info!(
            "Initializing webcam {} at {}x{}, {} fps",
            device_index,
            width,
            height,
            fps
        );

        let index = CameraIndex::Index(device_index);
        let requested =
            RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestResolution);

        let mut camera = Camera::new(index, requested).context("Failed to open camera")?;
        camera
            .open_stream()
            .context("Failed to open camera stream")?;

        tracing::info!("Webcam initialized successfully");

        Ok(Self {
            camera,
            width,
            height,
            started: Instant::now(),
            frame_interval: Duration::from_secs_f32(1.0 / fps.max(1) as f32),
            last_frame_at: None,
        })
    }

    fn pace(&mut self) {
        if let Some(last) = self.last_frame_at {
            let elapsed = last.elapsed();
            if elapsed < self.frame_interval {
                std::thread::sleep(self.frame_interval - elapsed);
            }
        }
        self.last_frame_at = Some(Instant::now());
    }
}

impl FrameSource for WebcamCapture {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        self.pace();

        let buffer = self.camera.frame().context("Failed to capture frame")?;
        let decoded = buffer
            .decode_image::<RgbFormat>()
            .context("Failed to decode frame")?;

        // The decoded buffer's dimensions are authoritative, whatever the
        // device advertised at open time.
        let timestamp_us = self.started.elapsed().as_micros() as i64;
        Ok(Some(Frame::new(decoded, timestamp_us)))
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
