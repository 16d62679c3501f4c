use thiserror::Error;

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("malformed `{event}` payload: {source}")]
    Malformed {
        event: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("`{event}` payload does not match its schema: {source}")]
    Schema {
        event: String,
        #[source]
        source: serde_json::Error,
    },
}

impl PayloadError {
    pub fn event(&self) -> &str {
        match self {
            PayloadError::Malformed { event, .. } | PayloadError::Schema { event, .. } => event,
        }
    }
}
