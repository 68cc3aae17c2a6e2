use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Which of the two images an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageRole {
    Rom,
    Update,
}

impl fmt::Display for ImageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageRole::Rom => f.write_str("ROM"),
            ImageRole::Update => f.write_str("BIN"),
        }
    }
}

#[derive(Debug, Error)]
pub enum UcodeError {
    #[error("{}: file not found", path.display())]
    FileNotFound { path: PathBuf },

    #[error("{image}: no microcode at pos {offset:#x}")]
    RecordNotFound { image: ImageRole, offset: u64 },

    #[error(
        "{image}: invalid file length at {offset:#x} (need {needed:#x} bytes, have {available:#x})"
    )]
    InsufficientData {
        image: ImageRole,
        offset: u64,
        needed: u64,
        available: u64,
    },

    #[error("sanity check failed: stream at {actual:#x}, expected {expected:#x}")]
    IntegrityError { expected: u64, actual: u64 },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{}: cannot create & open file", path.display())]
    DestinationUnwritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("operation cancelled, nothing was written")]
    Cancelled,

    #[error("nothing to do, check inputs")]
    NothingToDo,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, UcodeError>;
