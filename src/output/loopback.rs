use super::{FrameSink, SinkStatus};
use crate::error::Result;
use crate::frame::Frame;
use anyhow::Context;
use image::RgbImage;
use std::fs::File;
use std::io::{ErrorKind, Write};
use std::path::Path;
use v4l::video::Output;
use v4l::{Device, FourCC};

/// Sink writing YUYV frames to a v4l2loopback device.
pub struct V4L2Output {
    file: File,
    width: u32,
    height: u32,
    frames_written: u64,
}

impl V4L2Output {
    pub fn new<P: AsRef<Path>>(device_path: P, width: u32, height: u32) -> Result<Self> {
        let path = device_path.as_ref();
        tracing::info!(
            "Opening v4l2loopback device at {} ({}x{})",
            path.display(),
            width,
            height
        );

        // Negotiate the pixel format up front so readers opening the
        // loopback later see the geometry we are about to write.
        let device = Device::with_path(path)
            .with_context(|| format!("Failed to open v4l2 device at {}", path.display()))?;
        let mut format = Output::format(&device).context("Failed to query output format")?;
        format.width = width;
        format.height = height;
        format.fourcc = FourCC::new(b"YUYV");
        let applied =
            Output::set_format(&device, &format).context("Failed to set output format")?;
        tracing::debug!(
            "Negotiated output format {}x{} {}",
            applied.width,
            applied.height,
            applied.fourcc
        );
        drop(device);

        // v4l2loopback accepts raw frame data written to the device file.
        let file = File::options()
            .write(true)
            .open(path)
            .with_context(|| format!("Failed to open v4l2loopback device at {}", path.display()))?;

        tracing::info!("v4l2loopback device opened successfully");

        Ok(Self {
            file,
            width,
            height,
            frames_written: 0,
        })
    }

    /// Pack an RGB frame into YUYV (4:2:2), the format v4l2loopback
    /// readers expect.
    fn rgb_to_yuyv(rgb_image: &RgbImage) -> Vec<u8> {
        let (width, height) = rgb_image.dimensions();
        let mut yuyv = Vec::with_capacity((width * height * 2) as usize);

        for y in 0..height {
            for x in (0..width).step_by(2) {
                let pixel1 = rgb_image.get_pixel(x, y);
                let pixel2 = if x + 1 < width {
                    rgb_image.get_pixel(x + 1, y)
                } else {
                    pixel1
                };

                let (y1, u1, v1) = rgb_to_yuv(pixel1[0], pixel1[1], pixel1[2]);
                let (y2, u2, v2) = rgb_to_yuv(pixel2[0], pixel2[1], pixel2[2]);

                // Chroma is shared per pixel pair: Y0 U Y1 V.
                let u = ((u1 as u16 + u2 as u16) / 2) as u8;
                let v = ((v1 as u16 + v2 as u16) / 2) as u8;

                yuyv.push(y1);
                yuyv.push(u);
                yuyv.push(y2);
                yuyv.push(v);
            }
        }

        yuyv
    }
}

fn rgb_to_yuv(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let r = r as f32;
    let g = g as f32;
    let b = b as f32;

    let y = (0.299 * r + 0.587 * g + 0.114 * b).clamp(0.0, 255.0) as u8;
    let u = ((-0.147 * r - 0.289 * g + 0.436 * b) + 128.0).clamp(0.0, 255.0) as u8;
    let v = ((0.615 * r - 0.515 * g - 0.100 * b) + 128.0).clamp(0.0, 255.0) as u8;

    (y, u, v)
}

impl FrameSink for V4L2Output {
    fn accept(&mut self, frame: Frame) -> Result<SinkStatus> {
        let resized;
        let image = if frame.image().dimensions() == (self.width, self.height) {
            frame.image()
        } else {
            resized = image::imageops::resize(
                frame.image(),
                self.width,
                self.height,
                image::imageops::FilterType::Triangle,
            );
            &resized
        };

        let yuyv_data = Self::rgb_to_yuyv(image);

        match self.file.write_all(&yuyv_data) {
            Ok(()) => {
                self.frames_written += 1;
                Ok(SinkStatus::Accepted)
            }
            Err(err) if err.kind() == ErrorKind::BrokenPipe => {
                tracing::debug!("Loopback reader went away");
                Ok(SinkStatus::Terminated)
            }
            Err(err) => Err(anyhow::Error::new(err)
                .context("Failed to write frame to v4l2loopback device")
                .into()),
        }
    }

    fn finish(&mut self) -> Result<()> {
        tracing::info!(
            "Closing loopback output after {} frames",
            self.frames_written
        );
        Ok(())
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn yuyv_packs_two_pixels_into_four_bytes() {
        let image = RgbImage::from_pixel(4, 2, Rgb([255, 255, 255]));
        let yuyv = V4L2Output::rgb_to_yuyv(&image);
        assert_eq!(yuyv.len(), 4 * 2 * 2);
        // White: full luma, neutral chroma.
        assert_eq!(yuyv[0], 255);
        assert!((yuyv[1] as i16 - 128).abs() <= 1);
        assert!((yuyv[3] as i16 - 128).abs() <= 1);
    }

    #[test]
    fn odd_width_duplicates_the_last_pixel() {
        let image = RgbImage::from_pixel(3, 1, Rgb([0, 0, 0]));
        let yuyv = V4L2Output::rgb_to_yuyv(&image);
        assert_eq!(yuyv.len(), 8);
    }
}
