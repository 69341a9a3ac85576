use image::RgbImage;

/// One decoded image sample from a live video sequence.
///
/// A `Frame` exclusively owns its pixel buffer and an optional release hook
/// standing in for the underlying device resource. The hook fires exactly
/// once: either when the frame is explicitly closed or, as a backstop, when
/// it is dropped on an error path. Because `close` consumes the frame,
/// double-release and use-after-release do not compile.
pub struct Frame {
    image: RgbImage,
    timestamp_us: i64,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Frame {
    /// Wrap an owned image with a presentation timestamp (monotonic,
    /// source-defined units; the capture sources in this crate use
    /// microseconds since stream start).
    pub fn new(image: RgbImage, timestamp_us: i64) -> Self {
        Self {
            image,
            timestamp_us,
            release: None,
        }
    }

    /// Like [`Frame::new`], but with a release hook for the backing resource.
    pub fn with_release(
        image: RgbImage,
        timestamp_us: i64,
        release: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            image,
            timestamp_us,
            release: Some(Box::new(release)),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn timestamp_us(&self) -> i64 {
        self.timestamp_us
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Release the backing resource. Consumes the frame, so this can only
    /// happen once per frame.
    pub fn close(self) {
        // Drop fires the hook.
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}
