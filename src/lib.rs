//! Real-time video background effects: webcam frames are segmented into
//! foreground and background, the background is replaced (solid color or
//! blur), and the result is re-emitted as a live video sequence with its
//! per-frame timing intact.

pub mod capture;
pub mod compositor;
pub mod effect;
pub mod error;
pub mod frame;
pub mod output;
pub mod pipeline;
pub mod segmentation;

pub use effect::{EffectConfig, EffectStore};
pub use error::{Error, Result};
pub use frame::Frame;
pub use pipeline::{FrameFailure, FramePipeline, PipelineState, RunSummary};
