use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Webhook signature didn't match; surfaced as HTTP 401 (§6, §7).
    #[error("webhook signature verification failed")]
    SignatureInvalid,

    /// Payload couldn't be parsed into the provider's expected shape;
    /// surfaced as HTTP 400 (§7).
    #[error("malformed webhook payload: {0}")]
    MalformedPayload(String),

    #[error("github api error: {0}")]
    Api(#[from] reqwest::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for kubechecks_core::Error {
    fn from(e: Error) -> Self {
        kubechecks_core::Error::Other(anyhow::anyhow!(e))
    }
}
