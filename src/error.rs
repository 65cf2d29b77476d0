use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("scrape failed: {0}")]
    Scrape(String),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("key asset unavailable: {0}")]
    KeyAsset(String),
    #[error("program not found: {0}")]
    NotFound(String),
    #[error("media capture failed: {0}")]
    MediaCapture(String),
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Short label of the pipeline stage that produced this error.
    pub fn stage(&self) -> &'static str {
        match self {
            Error::Scrape(_) => "scrape",
            Error::Auth(_) => "authentication",
            Error::KeyAsset(_) => "key asset",
            Error::NotFound(_) => "title lookup",
            Error::MediaCapture(_) => "media capture",
            Error::Config(_) => "configuration",
        }
    }
}

/// Describes a transport failure, calling out timeouts explicitly.
pub(crate) fn describe_http(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        format!("request timed out: {err}")
    } else {
        err.to_string()
    }
}
