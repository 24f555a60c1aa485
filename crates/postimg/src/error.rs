//! Error Types

/// Controller error
#[derive(Debug, thiserror::Error)]
pub enum PostimgError {
    #[error("Picture parser is not available ({count} picture elements)")]
    PictureParserMissing { count: usize },

    #[error("Invalid options: {0}")]
    InvalidOptions(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PostimgError>;
