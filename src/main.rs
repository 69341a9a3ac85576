use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use greenroom::capture::WebcamCapture;
use greenroom::output::V4L2Output;
use greenroom::{EffectConfig, FramePipeline};
use image::Rgb;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum EffectKind {
    /// Replace the background with a flat color
    Solid,
    /// Blur the background
    Blur,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input webcam device index
    #[arg(short, long, default_value_t = 0)]
    input_device: u32,

    /// Output v4l2loopback device path
    #[arg(short, long, default_value = "/dev/video10")]
    output_device: String,

    /// Capture resolution width
    #[arg(long, default_value_t = 1280)]
    capture_width: u32,

    /// Capture resolution height
    #[arg(long, default_value_t = 720)]
    capture_height: u32,

    /// Output resolution width
    #[arg(long, default_value_t = 1280)]
    output_width: u32,

    /// Output resolution height
    #[arg(long, default_value_t = 720)]
    output_height: u32,

    /// Target frames per second
    #[arg(long, default_value_t = 30)]
    fps: u32,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Path to the segmentation model (ONNX file)
    #[arg(long)]
    model: String,

    /// Background effect
    #[arg(long, value_enum, default_value_t = EffectKind::Blur)]
    effect: EffectKind,

    /// Background color for the solid effect, as RRGGBB hex
    #[arg(long, default_value = "00ff00")]
    color: String,

    /// Blur radius in pixels for the blur effect
    #[arg(long, default_value_t = 10.0)]
    blur_radius: f32,
}

fn parse_color(hex: &str) -> Result<Rgb<u8>> {
    let hex = hex.trim_start_matches('#');
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        bail!("color must be six hex digits, got {hex:?}");
    }
    let r = u8::from_str_radix(&hex[0..2], 16)?;
    let g = u8::from_str_radix(&hex[2..4], 16)?;
    let b = u8::from_str_radix(&hex[4..6], 16)?;
    Ok(Rgb([r, g, b]))
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    tracing::info!("Greenroom starting");
    tracing::info!("Capture: {}x{}", args.capture_width, args.capture_height);
    tracing::info!("Output: {}x{}", args.output_width, args.output_height);
    tracing::info!("Target FPS: {}", args.fps);

    let effect = match args.effect {
        EffectKind::Solid => EffectConfig::SolidColor {
            color: parse_color(&args.color)?,
        },
        EffectKind::Blur => EffectConfig::Blur {
            radius_px: args.blur_radius,
        },
    };

    let mut pipeline = FramePipeline::new();
    pipeline
        .initialize(&args.model)
        .context("Failed to initialize the segmentation engine")?;
    pipeline.set_effect(effect)?;

    // Per-frame glitches get logged rather than tearing the session down.
    if let Some(failures) = pipeline.failure_events() {
        std::thread::spawn(move || {
            for failure in failures {
                tracing::warn!(
                    "Dropped frame at {}us: {}",
                    failure.timestamp_us,
                    failure.reason
                );
            }
        });
    }

    let mut capture = WebcamCapture::new(
        args.input_device,
        args.capture_width,
        args.capture_height,
        args.fps,
    )
    .context("Failed to initialize webcam capture")?;

    let mut output = V4L2Output::new(&args.output_device, args.output_width, args.output_height)
        .context("Failed to initialize v4l2loopback output")?;

    tracing::info!("Starting pipeline, press Ctrl+C to stop");
    let summary = pipeline.attach_source(&mut capture, &mut output)?;
    tracing::info!(
        "Session ended: {} frames in, {} out, {} failed",
        summary.frames_in,
        summary.frames_out,
        summary.frames_failed
    );

    pipeline.shutdown()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_color_accepts_hex_with_and_without_hash() {
        assert_eq!(parse_color("00ff00").unwrap(), Rgb([0, 255, 0]));
        assert_eq!(parse_color("#102030").unwrap(), Rgb([16, 32, 48]));
    }

    #[test]
    fn parse_color_rejects_malformed_input() {
        assert!(parse_color("short").is_err());
        assert!(parse_color("gggggg").is_err());
        assert!(parse_color("01234567").is_err());
    }
}
