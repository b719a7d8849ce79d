use thiserror::Error;

#[derive(Error, Debug)]
pub enum CellError {
    #[error("Cell capacity exceeded: {requested} bits requested, {available} available")]
    CapacityExceeded { requested: usize, available: usize },

    #[error("Value {value} does not fit in {bits} bits")]
    ValueOutOfRange { value: u64, bits: usize },

    #[error("Cell already holds the maximum number of references")]
    TooManyReferences,

    #[error("Cell depth exceeds the maximum representable depth")]
    DepthExceeded,

    #[error("Invalid magic number in container header")]
    InvalidMagic,

    #[error("Malformed container header: {0}")]
    MalformedHeader(String),

    #[error("Container checksum verification failed")]
    ChecksumMismatch,

    #[error("Truncated container data: {0}")]
    TruncatedData(String),

    #[error("Reference from cell {from} to cell {to} is not strictly forward")]
    CyclicOrForwardReference { from: usize, to: usize },
}

pub type Result<T> = std::result::Result<T, CellError>;
