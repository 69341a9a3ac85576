use super::types::{Matte, SegmentationModel};
use crate::error::{Error, Result};
use crate::frame::Frame;
use image::RgbImage;
use std::sync::mpsc;
use std::thread;

/// One completed segmentation round-trip: the pixels that were submitted,
/// their matte, and the submitting frame's timestamp carried back unchanged.
pub struct MaskResult {
    pub source: RgbImage,
    pub matte: Matte,
    pub timestamp_us: i64,
    epoch: u64,
}

enum Request {
    Segment {
        image: RgbImage,
        timestamp_us: i64,
        epoch: u64,
    },
    Reset,
}

enum Outcome {
    Mask(MaskResult),
    Failed {
        timestamp_us: i64,
        epoch: u64,
        reason: String,
    },
}

/// Serialized asynchronous front for a segmentation engine.
///
/// The engine runs on a dedicated worker thread; `submit` hands it one
/// frame's pixels and `await_mask` suspends until that frame's result comes
/// back. Callers keep at most one submission outstanding — the bridge never
/// queues, since queued frames would grow latency without bound.
///
/// Every submission carries the bridge's current epoch. `reset` bumps the
/// epoch, so a result that was still in flight when the stream restarted is
/// recognized as stale and discarded instead of being applied to the new
/// sequence.
pub struct SegmentationBridge {
    requests: Option<mpsc::SyncSender<Request>>,
    results: mpsc::Receiver<Outcome>,
    worker: Option<thread::JoinHandle<()>>,
    epoch: u64,
    in_flight: bool,
}

impl SegmentationBridge {
    /// Start the worker for the given engine.
    pub fn spawn(mut model: Box<dyn SegmentationModel>) -> Self {
        let (req_tx, req_rx) = mpsc::sync_channel::<Request>(1);
        let (res_tx, res_rx) = mpsc::channel();

        let worker = thread::spawn(move || {
            while let Ok(request) = req_rx.recv() {
                match request {
                    Request::Segment {
                        image,
                        timestamp_us,
                        epoch,
                    } => {
                        let outcome = match model.segment(&image) {
                            Ok(matte) => Outcome::Mask(MaskResult {
                                source: image,
                                matte,
                                timestamp_us,
                                epoch,
                            }),
                            Err(err) => Outcome::Failed {
                                timestamp_us,
                                epoch,
                                reason: format!("{err:#}"),
                            },
                        };
                        if res_tx.send(outcome).is_err() {
                            break;
                        }
                    }
                    Request::Reset => model.reset_state(),
                }
            }
        });

        Self {
            requests: Some(req_tx),
            results: res_rx,
            worker: Some(worker),
            epoch: 0,
            in_flight: false,
        }
    }

    /// Hand one frame's pixels to the engine. The frame itself stays with
    /// the caller and can be released as soon as this returns.
    ///
    /// Precondition: the previous submission has resolved (or been
    /// abandoned by `reset`). The bridge rejects rather than queues.
    pub fn submit(&mut self, frame: &Frame) -> Result<()> {
        let requests = self.requests.as_ref().ok_or(Error::BridgeClosed)?;
        debug_assert!(!self.in_flight, "previous submission has not resolved");

        requests
            .send(Request::Segment {
                image: frame.image().clone(),
                timestamp_us: frame.timestamp_us(),
                epoch: self.epoch,
            })
            .map_err(|_| Error::BridgeClosed)?;
        self.in_flight = true;
        Ok(())
    }

    /// Suspend until the outstanding submission resolves.
    ///
    /// Stale results (submitted before the last `reset`) are discarded.
    /// A per-frame engine failure is `BridgeSubmission`; a vanished worker
    /// is `BridgeClosed` and the bridge is unusable afterwards.
    pub fn await_mask(&mut self) -> Result<MaskResult> {
        loop {
            let outcome = self.results.recv().map_err(|_| Error::BridgeClosed)?;
            match outcome {
                Outcome::Mask(result) if result.epoch == self.epoch => {
                    self.in_flight = false;
                    return Ok(result);
                }
                Outcome::Failed {
                    timestamp_us,
                    epoch,
                    reason,
                } if epoch == self.epoch => {
                    self.in_flight = false;
                    return Err(Error::BridgeSubmission {
                        timestamp_us,
                        reason,
                    });
                }
                // Stale epoch: a reset happened after this was submitted.
                _ => continue,
            }
        }
    }

    /// Abandon any outstanding submission and clear the engine's temporal
    /// state so a fresh source can reuse the bridge.
    pub fn reset(&mut self) {
        self.epoch += 1;
        self.in_flight = false;
        if let Some(requests) = &self.requests {
            let _ = requests.send(Request::Reset);
        }
    }

    /// Tear down the worker. A second close is an error, not a no-op:
    /// callers are expected to track whether they already did this.
    pub fn close(&mut self) -> Result<()> {
        if self.requests.take().is_none() {
            return Err(Error::AlreadyClosed);
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        Ok(())
    }
}

impl Drop for SegmentationBridge {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct StubModel {
        resets: Arc<AtomicUsize>,
        fail_next: bool,
    }

    impl StubModel {
        fn new() -> (Self, Arc<AtomicUsize>) {
            let resets = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    resets: Arc::clone(&resets),
                    fail_next: false,
                },
                resets,
            )
        }
    }

    impl SegmentationModel for StubModel {
        fn segment(&mut self, frame: &RgbImage) -> anyhow::Result<Matte> {
            if self.fail_next {
                self.fail_next = false;
                bail!("synthetic model failure");
            }
            Ok(Matte::splat(frame.width(), frame.height(), 1.0))
        }

        fn reset_state(&mut self) {
            self.resets.fetch_add(1, Ordering::SeqCst);
        }

        fn input_size(&self) -> (u32, u32) {
            (512, 512)
        }
    }

    fn frame(ts: i64) -> Frame {
        Frame::new(RgbImage::new(8, 6), ts)
    }

    #[test]
    fn round_trip_correlates_by_timestamp() {
        let (model, _) = StubModel::new();
        let mut bridge = SegmentationBridge::spawn(Box::new(model));

        bridge.submit(&frame(42)).unwrap();
        let result = bridge.await_mask().unwrap();
        assert_eq!(result.timestamp_us, 42);
        assert_eq!((result.matte.width(), result.matte.height()), (8, 6));
        assert_eq!(result.source.dimensions(), (8, 6));
    }

    #[test]
    fn per_frame_failure_is_not_fatal() {
        let (mut model, _) = StubModel::new();
        model.fail_next = true;
        let mut bridge = SegmentationBridge::spawn(Box::new(model));

        bridge.submit(&frame(1)).unwrap();
        let err = bridge.await_mask().unwrap_err();
        assert!(matches!(
            err,
            Error::BridgeSubmission { timestamp_us: 1, .. }
        ));

        bridge.submit(&frame(2)).unwrap();
        assert_eq!(bridge.await_mask().unwrap().timestamp_us, 2);
    }

    #[test]
    fn reset_discards_the_stale_result() {
        let (model, resets) = StubModel::new();
        let mut bridge = SegmentationBridge::spawn(Box::new(model));

        bridge.submit(&frame(10)).unwrap();
        bridge.reset();
        bridge.submit(&frame(20)).unwrap();

        // Only the post-reset submission's result surfaces.
        let result = bridge.await_mask().unwrap();
        assert_eq!(result.timestamp_us, 20);
        assert_eq!(resets.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn close_is_single_use() {
        let (model, _) = StubModel::new();
        let mut bridge = SegmentationBridge::spawn(Box::new(model));

        bridge.close().unwrap();
        assert!(matches!(bridge.close(), Err(Error::AlreadyClosed)));
    }

    #[test]
    fn submit_after_close_fails() {
        let (model, _) = StubModel::new();
        let mut bridge = SegmentationBridge::spawn(Box::new(model));

        bridge.close().unwrap();
        assert!(matches!(bridge.submit(&frame(0)), Err(Error::BridgeClosed)));
    }
}
