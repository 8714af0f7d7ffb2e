#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Encoded input ended before the declared number of elements was decoded.
    #[error("Not enough bytes: needed {needed}, have {available}")]
    Truncated {
        /// Number of bytes required to continue decoding
        needed: usize,
        /// Number of bytes actually supplied
        available: usize,
    },

    #[error("Invalid codeword: {0}")]
    InvalidCodeword(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
