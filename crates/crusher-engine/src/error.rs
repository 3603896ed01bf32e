use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown parameter '{0}' (expected steps, mix or bypass)")]
    UnknownParam(String),
    #[error("expected name=value, got '{0}'")]
    BadAssignment(String),
    #[error("invalid value '{value}' for {param}")]
    BadValue { param: &'static str, value: String },

    #[error("no {0} device matched (and no default available)")]
    NoDevice(&'static str),
    #[error("unsupported {direction} sample format: {format}")]
    UnsupportedFormat { direction: &'static str, format: String },
    #[error("block size must be at least 1 frame")]
    ZeroBlockSize,
    #[error("output channels ({output}) must not be fewer than input channels ({input})")]
    ChannelMismatch { input: u16, output: u16 },

    #[error("device enumeration failed: {0}")]
    Devices(#[from] cpal::DevicesError),
    #[error("no default stream config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),
    #[error("failed to build stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),
    #[error("failed to play stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("wav: {0}")]
    Wav(#[from] hound::Error),
}
