use crate::capture::FrameSource;
use crate::compositor;
use crate::effect::{EffectConfig, EffectStore};
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::output::{FrameSink, SinkStatus};
use crate::segmentation::{self, SegmentationBridge, SegmentationModel};
use std::sync::mpsc;
use std::sync::Arc;

/// Where the pipeline is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineState {
    /// No source attached; ready for one.
    Idle,
    /// Frames are flowing.
    Active,
    /// The source ended or the sink terminated; flushing.
    Draining,
    /// The engine is gone. The host must initialize again.
    Closed,
}

/// One frame's inference failed. Reported to the host, who should treat it
/// as a transient glitch (a dropped frame), not a broken session.
#[derive(Clone, Debug)]
pub struct FrameFailure {
    pub timestamp_us: i64,
    pub reason: String,
}

/// Totals for one attached source sequence.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub frames_in: u64,
    pub frames_out: u64,
    pub frames_failed: u64,
}

/// The frame-transform pipeline.
///
/// Owns the per-frame lifecycle across the asynchronous segmentation
/// boundary: pull one frame, submit it, release it, await its matte,
/// composite under the current effect config, emit. One frame in flight at
/// a time — the pull loop is the backpressure mechanism, throttling the
/// source to the engine's real throughput. Every accepted frame is
/// released exactly once on every path.
pub struct FramePipeline {
    state: PipelineState,
    bridge: Option<SegmentationBridge>,
    effects: Arc<EffectStore>,
    failure_tx: mpsc::Sender<FrameFailure>,
    failure_rx: Option<mpsc::Receiver<FrameFailure>>,
}

impl FramePipeline {
    pub fn new() -> Self {
        let (failure_tx, failure_rx) = mpsc::channel();
        Self {
            state: PipelineState::Idle,
            bridge: None,
            effects: Arc::new(EffectStore::new()),
            failure_tx,
            failure_rx: Some(failure_rx),
        }
    }

    /// Load the segmentation engine from an ONNX asset and stand the
    /// bridge up. Fails with `AlreadyInitialized` when called twice
    /// without an intervening `shutdown`.
    pub fn initialize(&mut self, model_asset: &str) -> Result<()> {
        if self.bridge.is_some() {
            return Err(Error::AlreadyInitialized);
        }
        let model = segmentation::load_engine(model_asset)?;
        self.install_engine(model);
        Ok(())
    }

    /// Like [`initialize`](Self::initialize), with a caller-supplied
    /// engine. This is the seam the tests inject stub engines through.
    pub fn initialize_with_engine(&mut self, model: Box<dyn SegmentationModel>) -> Result<()> {
        if self.bridge.is_some() {
            return Err(Error::AlreadyInitialized);
        }
        self.install_engine(model);
        Ok(())
    }

    fn install_engine(&mut self, model: Box<dyn SegmentationModel>) {
        self.bridge = Some(SegmentationBridge::spawn(model));
        self.state = PipelineState::Idle;
        tracing::info!("Pipeline initialized");
    }

    /// Release the engine. Fails with `AlreadyClosed` when the pipeline
    /// was never initialized or was already shut down; a later
    /// `initialize` starts a fresh session.
    pub fn shutdown(&mut self) -> Result<()> {
        let mut bridge = self.bridge.take().ok_or(Error::AlreadyClosed)?;
        bridge.close()?;
        self.state = PipelineState::Closed;
        tracing::info!("Pipeline shut down");
        Ok(())
    }

    /// Replace the effect parameters; takes hold at the next composite.
    pub fn set_effect(&self, config: EffectConfig) -> Result<()> {
        self.effects.set(config)
    }

    pub fn current_effect(&self) -> EffectConfig {
        self.effects.current()
    }

    /// Shared handle to the effect store, for a host UI thread.
    pub fn effects(&self) -> Arc<EffectStore> {
        Arc::clone(&self.effects)
    }

    /// Per-frame failure reports. Yields the receiver once.
    pub fn failure_events(&mut self) -> Option<mpsc::Receiver<FrameFailure>> {
        self.failure_rx.take()
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Drive one complete source sequence through the pipeline into the
    /// sink. Returns once the source ends or the sink terminates; the sink
    /// is finished exactly once either way and the engine's temporal state
    /// is reset so the next source starts clean.
    ///
    /// A per-frame inference failure drops that frame, reports it, and
    /// moves on. Losing the engine entirely is fatal: the sink is still
    /// finished, the pipeline transitions to `Closed`, and the error is
    /// returned.
    pub fn attach_source(
        &mut self,
        source: &mut dyn FrameSource,
        sink: &mut dyn FrameSink,
    ) -> Result<RunSummary> {
        if self.bridge.is_none() {
            return Err(Error::BridgeClosed);
        }

        self.state = PipelineState::Active;
        tracing::info!("Source attached, pipeline active");

        let mut summary = RunSummary::default();
        match self.pump(source, sink, &mut summary) {
            Ok(()) => {
                self.state = PipelineState::Draining;
                let finished = sink.finish();
                if let Some(bridge) = &mut self.bridge {
                    bridge.reset();
                }
                self.state = PipelineState::Idle;
                finished?;
                tracing::info!(
                    "Source drained: {} in, {} out, {} failed",
                    summary.frames_in,
                    summary.frames_out,
                    summary.frames_failed
                );
                Ok(summary)
            }
            Err(err) => {
                if matches!(err, Error::BridgeClosed) {
                    // The engine is gone for good.
                    self.state = PipelineState::Closed;
                    self.bridge = None;
                    let _ = sink.finish();
                    tracing::error!("Pipeline failed fatally: {err}");
                } else {
                    // Device trouble ends the run, not the pipeline.
                    self.state = PipelineState::Draining;
                    let _ = sink.finish();
                    if let Some(bridge) = &mut self.bridge {
                        bridge.reset();
                    }
                    self.state = PipelineState::Idle;
                    tracing::warn!("Source detached on error: {err}");
                }
                Err(err)
            }
        }
    }

    fn pump(
        &mut self,
        source: &mut dyn FrameSource,
        sink: &mut dyn FrameSink,
        summary: &mut RunSummary,
    ) -> Result<()> {
        loop {
            let Some(frame) = source.next_frame()? else {
                return Ok(());
            };
            summary.frames_in += 1;

            let timestamp_us = frame.timestamp_us();
            let bridge = self.bridge.as_mut().ok_or(Error::BridgeClosed)?;

            // The bridge copies what it needs at submission; the raw
            // frame's backing resource is released right after.
            bridge.submit(&frame)?;
            frame.close();

            let result = match bridge.await_mask() {
                Ok(result) => result,
                Err(Error::BridgeSubmission {
                    timestamp_us,
                    reason,
                }) => {
                    summary.frames_failed += 1;
                    tracing::warn!("Dropping frame at {timestamp_us}us: {reason}");
                    let _ = self.failure_tx.send(FrameFailure {
                        timestamp_us,
                        reason,
                    });
                    continue;
                }
                Err(fatal) => return Err(fatal),
            };

            let config = self.effects.current();
            let composited = match compositor::composite(&result.source, &result.matte, &config) {
                Ok(image) => image,
                Err(err) => {
                    summary.frames_failed += 1;
                    tracing::warn!("Dropping frame at {timestamp_us}us: {err}");
                    let _ = self.failure_tx.send(FrameFailure {
                        timestamp_us,
                        reason: err.to_string(),
                    });
                    continue;
                }
            };

            match sink.accept(Frame::new(composited, timestamp_us))? {
                SinkStatus::Accepted => {
                    summary.frames_out += 1;
                    if summary.frames_out % 30 == 0 {
                        tracing::info!(
                            "Frame {}: {} in, {} failed",
                            summary.frames_out,
                            summary.frames_in,
                            summary.frames_failed
                        );
                    }
                }
                SinkStatus::Terminated => {
                    tracing::info!("Sink terminated, draining");
                    return Ok(());
                }
            }
        }
    }
}

impl Default for FramePipeline {
    fn default() -> Self {
        Self::new()
    }
}
