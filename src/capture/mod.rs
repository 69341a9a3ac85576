mod webcam;

pub use webcam::WebcamCapture;

use crate::error::Result;
use crate::frame::Frame;

/// Trait for raw frame sources feeding the pipeline.
///
/// The pipeline pulls: it asks for the next frame only once the previous
/// frame's round-trip has completed, which makes the pull itself the
/// backpressure signal. `None` is the explicit end-of-sequence marker.
pub trait FrameSource {
    /// Deliver the next frame, or `None` when the sequence has ended.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Nominal resolution of delivered frames. Individual frames may
    /// differ (device renegotiation); their own dimensions win.
    fn resolution(&self) -> (u32, u32);
}
