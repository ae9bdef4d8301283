/// Failures of the query → forecast → alignment chain.
///
/// Nothing in the crate catches or retries these; they surface to whoever
/// started the call.
#[derive(Debug, thiserror::Error)]
pub enum ForecastError {
    #[error("Data source error: {0}")]
    DataSource(String),

    #[error("Endpoint invocation failed: {0}")]
    EndpointInvocation(String),

    #[error("Function invocation failed: {0}")]
    Invocation(String),

    #[error("Forecast parse error: {0}")]
    ForecastParse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Table error: {0}")]
    Table(String),
}

pub type ForecastResult<T> = std::result::Result<T, ForecastError>;

impl From<rusqlite::Error> for ForecastError {
    fn from(e: rusqlite::Error) -> Self {
        ForecastError::DataSource(e.to_string())
    }
}

impl From<polars::error::PolarsError> for ForecastError {
    fn from(e: polars::error::PolarsError) -> Self {
        ForecastError::Table(e.to_string())
    }
}
