use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("matchType must be one of: any, all")]
    InvalidMatchType,

    #[error("type must be one of: visitors, engaged, sales")]
    InvalidRecordKind,

    #[error("date range falls outside the supported calendar")]
    DateOutOfRange,
}
