use thiserror::Error;

/// Largest accepted canvas edge, in pixels.
pub const MAX_CANVAS_DIMENSION: u32 = 16384;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid canvas dimensions: {width}x{height} (each edge must be 1..={max})", max = MAX_CANVAS_DIMENSION)]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Layer {0} is locked")]
    LayerLocked(usize),

    #[error("Layer {0} is hidden")]
    LayerHidden(usize),

    #[error("No writable active layer")]
    NoActiveLayer,

    #[error("Coordinates out of bounds: ({x}, {y})")]
    OutOfBounds { x: i64, y: i64 },

    #[error("Invalid layer index: {0}")]
    InvalidLayerIndex(usize),

    #[error("The background layer cannot be {0}")]
    BackgroundLayer(&'static str),

    #[error("Invalid layer move: {0}")]
    InvalidMove(String),

    #[error("Unknown blend mode: {0}")]
    UnknownBlendMode(String),

    #[error("Stamp synthesis failed: {0}")]
    StampSynthesisFailed(String),

    #[error("Invalid brush preset: {0}")]
    InvalidPreset(String),

    #[error("Invalid snapshot: {0}")]
    Snapshot(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<EngineError> for String {
    fn from(e: EngineError) -> Self {
        e.to_string()
    }
}

/// Validate canvas dimensions against the supported range.
pub fn validate_dimensions(width: u32, height: u32) -> Result<(), EngineError> {
    if width == 0 || height == 0 || width > MAX_CANVAS_DIMENSION || height > MAX_CANVAS_DIMENSION {
        return Err(EngineError::InvalidDimensions { width, height });
    }
    Ok(())
}
