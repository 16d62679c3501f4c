use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Push payloads carry ids as JSON numbers or strings depending on the producer.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawKey {
    Int(i64),
    Text(String),
}

macro_rules! key_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                Ok(match RawKey::deserialize(deserializer)? {
                    RawKey::Int(value) => Self(value.to_string()),
                    RawKey::Text(value) => Self(value),
                })
            }
        }
    };
}

key_newtype!(LayerId);
key_newtype!(TaskId);
key_newtype!(EntityId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    Running,
    Finished,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Running => "running",
            TaskStatus::Finished => "finished",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    pub status: TaskStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Sample,
    Hypothesis,
    HypothesisSampleMatch,
}

impl EntityKind {
    pub const ALL: [EntityKind; 3] = [
        EntityKind::Sample,
        EntityKind::Hypothesis,
        EntityKind::HypothesisSampleMatch,
    ];

    /// Local notification name consumed by list views.
    pub fn render_event(&self) -> &'static str {
        match self {
            EntityKind::Sample => "render-samples",
            EntityKind::Hypothesis => "render-hypotheses",
            EntityKind::HypothesisSampleMatch => "render-hypothesis-sample-matches",
        }
    }

    pub fn api_path(&self) -> &'static str {
        match self {
            EntityKind::Sample => "/api/samples",
            EntityKind::Hypothesis => "/api/hypotheses",
            EntityKind::HypothesisSampleMatch => "/api/hypothesis_sample_matches",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
}

/// How a layer gets its content: a pre-rendered container or a remote fragment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayerDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
    #[serde(
        default,
        alias = "contentURL",
        skip_serializing_if = "Option::is_none"
    )]
    pub content_url: Option<String>,
    #[serde(
        default,
        alias = "contentURLTemplate",
        skip_serializing_if = "Option::is_none"
    )]
    pub content_url_template: Option<String>,
    #[serde(default)]
    pub method: HttpMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closeable: Option<bool>,
}

impl LayerDescriptor {
    pub fn remote(name: impl Into<String>, content_url: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            content_url: Some(content_url.into()),
            ..Self::default()
        }
    }

    pub fn templated(name: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            content_url_template: Some(template.into()),
            ..Self::default()
        }
    }

    pub fn static_container(name: impl Into<String>, container: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            container: Some(container.into()),
            ..Self::default()
        }
    }

    pub fn with_method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_closeable(mut self, closeable: bool) -> Self {
        self.closeable = Some(closeable);
        self
    }

    /// Layers are closeable unless the descriptor says otherwise.
    pub fn is_closeable(&self) -> bool {
        self.closeable.unwrap_or(true)
    }
}
