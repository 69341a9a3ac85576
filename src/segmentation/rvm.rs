use super::preprocess::Preprocessor;
use super::types::{Matte, SegmentationModel};
use anyhow::{Context, Result};
use image::RgbImage;
use ndarray::{Array4, IxDyn};
use ort::{GraphOptimizationLevel, Session};
use std::path::Path;

/// The model's recurrent hidden tensors, carried from one frame to the
/// next for temporally stable mattes. Dropping them starts a fresh
/// sequence.
struct RecurrentState {
    r1: Array4<f32>,
    r2: Array4<f32>,
    r3: Array4<f32>,
    r4: Array4<f32>,
}

impl RecurrentState {
    fn zeros(width: u32, height: u32, downsample_ratio: f32) -> Self {
        let h = (height as f32 * downsample_ratio) as usize;
        let w = (width as f32 * downsample_ratio) as usize;

        tracing::debug!("Initializing hidden states to {}x{}", w, h);

        Self {
            r1: Array4::zeros((1, 16, h, w)),
            r2: Array4::zeros((1, 20, h / 2, w / 2)),
            r3: Array4::zeros((1, 24, h / 4, w / 4)),
            r4: Array4::zeros((1, 28, h / 8, w / 8)),
        }
    }
}

/// RobustVideoMatting segmentation engine.
pub struct RobustVideoMatting {
    session: Session,
    preprocessor: Preprocessor,
    width: u32,
    height: u32,
    state: Option<RecurrentState>,
    downsample_ratio: f32,
}

impl RobustVideoMatting {
    /// Load the engine from an ONNX asset.
    ///
    /// Input resolution is fixed at 512x512 with hidden states at 1/4 of
    /// that, the model's published defaults.
    pub fn new<P: AsRef<Path>>(model_asset: P) -> Result<Self> {
        let path = model_asset.as_ref();

        tracing::info!("Loading RVM model from {}", path.display());

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?
            .commit_from_file(path)
            .with_context(|| format!("Failed to load model from {}", path.display()))?;

        tracing::info!("RVM model loaded successfully");

        let width = 512;
        let height = 512;

        Ok(Self {
            session,
            preprocessor: Preprocessor::new(width, height),
            width,
            height,
            state: None,
            downsample_ratio: 0.25,
        })
    }
}

fn extract_state(output: &ort::DynValue) -> Result<Array4<f32>> {
    Ok(output
        .try_extract_tensor::<f32>()?
        .view()
        .to_owned()
        .into_dimensionality()?)
}

impl SegmentationModel for RobustVideoMatting {
    fn segment(&mut self, frame: &RgbImage) -> Result<Matte> {
        let _span = tracing::debug_span!("rvm_segment").entered();

        if self.state.is_none() {
            self.state = Some(RecurrentState::zeros(
                self.width,
                self.height,
                self.downsample_ratio,
            ));
        }
        let state = self.state.as_ref().unwrap();

        let input_tensor = self.preprocessor.preprocess(frame)?;

        let infer_span = tracing::debug_span!("inference").entered();
        let outputs = self
            .session
            .run(ort::inputs![
                input_tensor.view(),
                state.r1.view(),
                state.r2.view(),
                state.r3.view(),
                state.r4.view()
            ]?)
            .context("Failed to run inference")?;
        drop(infer_span);

        // Outputs: fgr, pha, r1, r2, r3, r4. The alpha matte is pha; the
        // updated hidden states feed the next frame.
        let pha = outputs[1]
            .try_extract_tensor::<f32>()?
            .view()
            .to_owned()
            .into_dimensionality::<IxDyn>()?;

        self.state = Some(RecurrentState {
            r1: extract_state(&outputs[2])?,
            r2: extract_state(&outputs[3])?,
            r3: extract_state(&outputs[4])?,
            r4: extract_state(&outputs[5])?,
        });

        // pha has shape [1, 1, H, W].
        let matte_shape = pha.shape();
        let matte_height = matte_shape[2] as u32;
        let matte_width = matte_shape[3] as u32;
        let matte_flat: Vec<f32> = pha.iter().copied().collect();

        let (frame_width, frame_height) = frame.dimensions();
        Preprocessor::postprocess_matte(
            &matte_flat,
            matte_width,
            matte_height,
            frame_width,
            frame_height,
        )
    }

    fn reset_state(&mut self) {
        tracing::info!("Resetting RVM hidden states");
        self.state = None;
    }

    fn input_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
