use super::types::Matte;
use anyhow::Result;
use image::{imageops, RgbImage};
use ndarray::Array4;

/// Converts RGB frames to model input tensors and model output back to
/// frame-sized mattes.
pub struct Preprocessor {
    target_width: u32,
    target_height: u32,
}

impl Preprocessor {
    pub fn new(target_width: u32, target_height: u32) -> Self {
        Self {
            target_width,
            target_height,
        }
    }

    /// Resize to the model resolution, normalize to [0, 1] and transpose
    /// HWC to NCHW. Returns a tensor of shape [1, 3, height, width].
    pub fn preprocess(&self, image: &RgbImage) -> Result<Array4<f32>> {
        let _span = tracing::debug_span!("preprocess").entered();

        let resized;
        let source = if image.dimensions() == (self.target_width, self.target_height) {
            image
        } else {
            resized = imageops::resize(
                image,
                self.target_width,
                self.target_height,
                imageops::FilterType::Triangle,
            );
            &resized
        };

        let (width, height) = source.dimensions();
        let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));
        for (x, y, pixel) in source.enumerate_pixels() {
            for channel in 0..3 {
                tensor[[0, channel, y as usize, x as usize]] = pixel[channel] as f32 / 255.0;
            }
        }

        Ok(tensor)
    }

    /// Resize a model-resolution matte back to the frame's dimensions.
    pub fn postprocess_matte(
        matte: &[f32],
        matte_width: u32,
        matte_height: u32,
        target_width: u32,
        target_height: u32,
    ) -> Result<Matte> {
        let _span = tracing::debug_span!("postprocess").entered();

        if matte_width == target_width && matte_height == target_height {
            return Matte::new(target_width, target_height, matte.to_vec());
        }

        // Round-trip through a grayscale image so the resampler does the work.
        let gray = image::GrayImage::from_fn(matte_width, matte_height, |x, y| {
            let value = matte[(y * matte_width + x) as usize];
            image::Luma([(value * 255.0).clamp(0.0, 255.0) as u8])
        });
        let resized = imageops::resize(
            &gray,
            target_width,
            target_height,
            imageops::FilterType::Triangle,
        );

        let data = resized.pixels().map(|p| p[0] as f32 / 255.0).collect();
        Matte::new(target_width, target_height, data)
    }
}
