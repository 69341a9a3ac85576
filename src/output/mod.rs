mod loopback;

pub use loopback::V4L2Output;

use crate::error::Result;
use crate::frame::Frame;

/// What a sink did with an offered frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SinkStatus {
    Accepted,
    /// The consumer stopped pulling. A normal drain condition, not an
    /// error: the pipeline drops the frame and shuts the run down cleanly.
    Terminated,
}

/// Trait for composited-frame destinations.
///
/// `accept` may stall (device write, bounded channel) — that stall is the
/// output-side backpressure the pipeline honors before producing the next
/// frame. The pipeline calls `finish` exactly once per attached source.
pub trait FrameSink {
    /// Offer one composited frame, in input order.
    fn accept(&mut self, frame: Frame) -> Result<SinkStatus>;

    /// Signal end-of-sequence to the consumer.
    fn finish(&mut self) -> Result<()>;

    /// Resolution the sink expects; frames are adapted on the way in.
    fn resolution(&self) -> (u32, u32);
}
