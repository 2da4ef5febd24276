use thiserror::Error;

/// Configuration problems, surfaced to the caller before a search starts.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("hash table must be at least {min} MB, got {got} MB")]
    HashTooSmall { min: usize, got: usize },
    #[error("unknown option: {0}")]
    UnknownOption(String),
    #[error("invalid value for {option}: {value}")]
    InvalidValue { option: String, value: String },
    #[error("USE_MTDF and USE_PVS cannot both be enabled")]
    MtdfWithPvs,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FenError {
    #[error("FEN is missing the {0} field")]
    MissingField(&'static str),
    #[error("invalid character in piece placement: {0}")]
    InvalidPiece(char),
    #[error("invalid {field} field: {value}")]
    InvalidField { field: &'static str, value: String },
}
