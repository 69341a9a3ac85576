mod bridge;
mod preprocess;
mod rvm;
pub mod types;

pub use bridge::{MaskResult, SegmentationBridge};
pub use preprocess::Preprocessor;
pub use rvm::RobustVideoMatting;
pub use types::{Matte, SegmentationModel};

use crate::error::Result;

/// Load the default segmentation engine (RVM) from an ONNX asset.
/// The asset location is an opaque path supplied by the host.
pub fn load_engine(model_asset: &str) -> Result<Box<dyn SegmentationModel>> {
    let model = RobustVideoMatting::new(model_asset)?;
    Ok(Box::new(model))
}
