use anyhow::{bail, Result};
use image::RgbImage;

/// Per-pixel foreground opacity, 0.0 = background, 1.0 = foreground.
/// Dimensions always match the frame the matte was produced for.
#[derive(Clone, Debug, PartialEq)]
pub struct Matte {
    width: u32,
    height: u32,
    data: Vec<f32>,
}

impl Matte {
    pub fn new(width: u32, height: u32, data: Vec<f32>) -> Result<Self> {
        let expected = width as usize * height as usize;
        if data.len() != expected {
            bail!(
                "matte buffer holds {} values, expected {} for {}x{}",
                data.len(),
                expected,
                width,
                height
            );
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// A matte with the same opacity everywhere.
    pub fn splat(width: u32, height: u32, value: f32) -> Self {
        Self {
            width,
            height,
            data: vec![value; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Opacity at (x, y), row-major.
    pub fn value(&self, x: u32, y: u32) -> f32 {
        self.data[(y * self.width + x) as usize]
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

/// Trait for segmentation engines.
/// Allows swapping between different backends (RVM, MODNet, etc.)
pub trait SegmentationModel: Send {
    /// Process a frame and return its alpha matte, sized to the frame.
    fn segment(&mut self, frame: &RgbImage) -> Result<Matte>;

    /// Discard temporal state (recurrent tensors, motion history).
    ///
    /// Call this when switching cameras or starting a new video session.
    /// Stateless models need not override.
    fn reset_state(&mut self) {}

    /// The model's preferred input dimensions, (width, height).
    fn input_size(&self) -> (u32, u32);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_checks_buffer_length() {
        assert!(Matte::new(3, 2, vec![0.0; 6]).is_ok());
        assert!(Matte::new(3, 2, vec![0.0; 5]).is_err());
    }

    #[test]
    fn value_is_row_major() {
        let matte = Matte::new(2, 2, vec![0.1, 0.2, 0.3, 0.4]).unwrap();
        assert_eq!(matte.value(1, 0), 0.2);
        assert_eq!(matte.value(0, 1), 0.3);
    }
}
