use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("platform api rejected the report: status {0}")]
    Rejected(u16),
}
