use shared::domain::LayerId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid content url `{path}`: {source}")]
    InvalidUrl {
        path: String,
        #[source]
        source: url::ParseError,
    },
    #[error("content request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("content request for `{path}` was rejected: {reason}")]
    Rejected { path: String, reason: String },
    #[error("response from `{path}` is not valid JSON: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayerError {
    #[error("no layer registered with id `{0}`")]
    Unknown(LayerId),
    #[error("layer `{layer_id}` cannot be shown: {reason}")]
    Unshowable { layer_id: LayerId, reason: String },
}
