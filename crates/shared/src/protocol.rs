use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    domain::{EntityId, TaskId},
    error::PayloadError,
};

/// Named events emitted on the server push stream.
pub mod events {
    pub const UPDATE: &str = "update";
    pub const TASK_QUEUED: &str = "task-queued";
    pub const TASK_START: &str = "task-start";
    pub const TASK_COMPLETE: &str = "task-complete";
    pub const NEW_SAMPLE: &str = "new-sample";
    pub const NEW_HYPOTHESIS: &str = "new-hypothesis";
    pub const NEW_HYPOTHESIS_SAMPLE_MATCH: &str = "new-hypothesis-sample-match";
    pub const FILES_TO_DOWNLOAD: &str = "files-to-download";
}

/// One frame of the push stream, before its payload is parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPushEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub event: String,
    pub data: String,
}

impl RawPushEvent {
    pub fn new(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            id: None,
            event: event.into(),
            data: data.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskNotice {
    pub id: TaskId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub id: EntityId,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilesToDownload {
    pub files: Vec<String>,
}

/// JSON body sent with POST layer fetches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerContentRequest {
    pub params: Value,
    pub context: Map<String, Value>,
    pub settings: Map<String, Value>,
}

pub fn parse_payload(event: &str, data: &str) -> Result<Value, PayloadError> {
    serde_json::from_str(data).map_err(|source| PayloadError::Malformed {
        event: event.to_string(),
        source,
    })
}

pub fn decode_payload<T: DeserializeOwned>(event: &str, payload: &Value) -> Result<T, PayloadError> {
    T::deserialize(payload).map_err(|source| PayloadError::Schema {
        event: event.to_string(),
        source,
    })
}
