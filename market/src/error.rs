use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("asset {0} is not listed by the exchange")]
    UnknownAsset(String),

    #[error("invalid response from exchange: {0}")]
    InvalidResponse(String),

    #[error("invalid decimal in {field}: {value:?}")]
    ParseDecimal { field: &'static str, value: String },
}
