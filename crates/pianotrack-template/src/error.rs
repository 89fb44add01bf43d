use thiserror::Error;

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("pixels per white key must be positive and finite, got {0}")]
    InvalidScale(f64),
    #[error("start pitch class must be in 0..=11, got {0}")]
    InvalidPitchClass(u8),
    #[error("image of {width}x{height} is too large to encode")]
    TooLarge { width: usize, height: usize },
    #[error("png encoding failed: {0}")]
    Png(#[from] png::EncodingError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
