use shared::domain::{EntityKind, LayerId, Task, TaskId};

pub mod app;
pub mod bridge;
pub mod config;
pub mod entities;
pub mod error;
pub mod layer;
pub mod push;
pub mod router;
pub mod tasks;
pub mod template;
pub mod transport;
pub mod view;

pub use app::{AppCommand, AppState, Application};
pub use bridge::{DispatchOutcome, EventBridge};
pub use config::{load_settings, load_settings_from, ClientSettings};
pub use layer::{Layer, LayerSource, LoadState};
pub use push::{PushStream, SseDecoder};
pub use router::{LayerLoad, LayerRouter};
pub use template::render_template;
pub use transport::{ContentFetcher, ContentRequest, HttpContentFetcher, RequestScope};
pub use view::{HeadlessView, LayerView};

/// Local notifications fanned out to view collaborators.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    LayerAdded {
        layer_id: LayerId,
    },
    LayerChanged {
        requested: LayerId,
        showing: Option<LayerId>,
    },
    LayerLoaded {
        layer_id: LayerId,
    },
    LayerLoadFailed {
        layer_id: LayerId,
        reason: String,
    },
    TaskListUpdated(Vec<Task>),
    Render(EntityKind),
    Notice(String),
    DownloadRequested {
        path: String,
        url: String,
    },
    TaskLog {
        task_id: TaskId,
        document: String,
    },
    SettingsUpdated,
    Error(String),
}

impl ClientEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::LayerAdded { .. } => "layer-added",
            ClientEvent::LayerChanged { .. } => "layer-change",
            ClientEvent::LayerLoaded { .. } => "layer-loaded",
            ClientEvent::LayerLoadFailed { .. } => "layer-load-failed",
            ClientEvent::TaskListUpdated(_) => "task-list-updated",
            ClientEvent::Render(kind) => kind.render_event(),
            ClientEvent::Notice(_) => "notice",
            ClientEvent::DownloadRequested { .. } => "download-requested",
            ClientEvent::TaskLog { .. } => "task-log",
            ClientEvent::SettingsUpdated => "settings-updated",
            ClientEvent::Error(_) => "error",
        }
    }
}

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;
