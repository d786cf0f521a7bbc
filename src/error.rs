#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unexpected end of data while reading {context}")]
    UnexpectedEof { context: &'static str },

    #[error("unknown signature: {0:?}")]
    UnknownSignature([u8; 4]),

    #[error("unsupported {signature} version: {version}")]
    UnsupportedVersion { signature: &'static str, version: u32 },

    #[error("grid too large: {x}x{y}")]
    GridTooLarge { x: u32, y: u32 },

    #[error("invalid quadtree element size: {0} (expected 1, 2 or 4)")]
    InvalidElementSize(usize),

    #[error("invalid quadtree: {0}")]
    InvalidQuadTree(String),

    #[error("{algorithm} decompression failed: {reason}")]
    Decompression { algorithm: &'static str, reason: String },

    #[error("checksum mismatch: expected {expected:#x}, got {actual:#x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error came from running out of input.
    pub fn is_truncation(&self) -> bool {
        matches!(self, Error::UnexpectedEof { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
