pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A second `initialize` arrived without an intervening `shutdown`.
    #[error("pipeline is already initialized")]
    AlreadyInitialized,

    /// A second `shutdown`/`close`, or one before any `initialize`.
    #[error("pipeline is already closed")]
    AlreadyClosed,

    /// The segmentation engine is gone; the pipeline cannot continue.
    #[error("segmentation engine is closed")]
    BridgeClosed,

    /// One frame's inference failed; later frames are still attempted.
    #[error("segmentation failed for frame at {timestamp_us}us: {reason}")]
    BridgeSubmission { timestamp_us: i64, reason: String },

    #[error("invalid effect config: {0}")]
    InvalidConfig(String),

    #[error("matte is {matte_width}x{matte_height} but frame is {frame_width}x{frame_height}")]
    MatteSize {
        matte_width: u32,
        matte_height: u32,
        frame_width: u32,
        frame_height: u32,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_are_stable() {
        assert!(Error::AlreadyInitialized
            .to_string()
            .contains("already initialized"));
        assert!(Error::AlreadyClosed.to_string().contains("already closed"));
        assert!(Error::invalid_config("x")
            .to_string()
            .contains("invalid effect config"));
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("device gone");
        let err = Error::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("device gone"));
    }
}
