use crate::effect::EffectConfig;
use crate::error::{Error, Result};
use crate::segmentation::Matte;
use image::{imageops, Rgb, RgbImage};

/// Composite one frame with its matte under the given effect config.
///
/// Per pixel: `out = a * fg + (1 - a) * bg`, where `a` is the matte's
/// foreground opacity, `fg` the source pixel and `bg` the background layer
/// (a flat fill, or the source itself blurred). The output is a fresh,
/// fully opaque image of the source dimensions; the caller re-wraps it with
/// the input frame's timestamp.
///
/// Pure function of its arguments. The matte must match the source
/// dimensions; the source dimensions themselves may change from call to
/// call (camera renegotiation).
pub fn composite(source: &RgbImage, matte: &Matte, config: &EffectConfig) -> Result<RgbImage> {
    let (width, height) = source.dimensions();
    if (matte.width(), matte.height()) != (width, height) {
        return Err(Error::MatteSize {
            matte_width: matte.width(),
            matte_height: matte.height(),
            frame_width: width,
            frame_height: height,
        });
    }

    let blurred = match config {
        EffectConfig::Blur { radius_px } if *radius_px > 0.0 => {
            Some(imageops::fast_blur(source, radius_px / 2.0))
        }
        _ => None,
    };

    let out = RgbImage::from_fn(width, height, |x, y| {
        let alpha = matte.value(x, y).clamp(0.0, 1.0);
        let fg = source.get_pixel(x, y);
        let bg = match config {
            EffectConfig::SolidColor { color } => *color,
            EffectConfig::Blur { .. } => match &blurred {
                Some(image) => *image.get_pixel(x, y),
                // Radius 0: the background layer is the frame itself.
                None => *fg,
            },
        };
        Rgb([
            blend(fg[0], bg[0], alpha),
            blend(fg[1], bg[1], alpha),
            blend(fg[2], bg[2], alpha),
        ])
    });

    Ok(out)
}

fn blend(fg: u8, bg: u8, alpha: f32) -> u8 {
    (alpha * fg as f32 + (1.0 - alpha) * bg as f32).round() as u8
}
