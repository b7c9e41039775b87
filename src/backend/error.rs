use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("backend returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("backend reported failure: {0}")]
    Unsuccessful(String),

    #[error("backend response carried no data")]
    MissingData,

    #[error("backend returned an unusable {field}: {value}")]
    Malformed { field: &'static str, value: f64 },

    #[error("token store unavailable: {0}")]
    TokenStore(String),
}
