use thiserror::Error;

pub type ChartResult<T> = Result<T, ChartError>;

#[derive(Debug, Error)]
pub enum ChartError {
    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    #[error("unknown chart: id={id}")]
    UnknownChart { id: u32 },

    #[error("chart already registered: id={id}")]
    DuplicateChart { id: u32 },

    #[error("data source failure: {0}")]
    DataSource(String),
}
