use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("binlog event error: {0}")]
    BinlogEventError(String),
    #[error("binlog checksum mismatch: expected={0}, actual={1}")]
    BinlogChecksumMismatch(u32, u32),
    #[error("invalid gtid set: {0}")]
    InvalidGtidSet(String),
    #[error("utf8 string error: {0}")]
    Utf8StringError(#[from] std::string::FromUtf8Error),
    #[error("utf8 str error: {0}")]
    Utf8StrError(#[from] std::str::Utf8Error),
    #[error("parse error: {0}")]
    ParseError(#[from] bytes_parser::error::Error),
    #[error("parse int error: {0}")]
    ParseIntError(#[from] std::num::ParseIntError),
    #[error("parse bigdecimal error: {0}")]
    ParseBigDecimalError(#[from] bigdecimal::ParseBigDecimalError),
    #[error("parse uuid error: {0}")]
    ParseUuidError(#[from] uuid::Error),
}
