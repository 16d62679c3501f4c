use serde_json::Value;
use shared::domain::{HttpMethod, LayerId};

#[derive(Debug, Clone, PartialEq)]
pub enum LayerSource {
    Static {
        container: String,
    },
    Remote {
        url: Option<String>,
        params: Option<Value>,
        method: HttpMethod,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    Static,
    Pending,
    Ready,
    Failed(String),
}

/// A navigable content panel.
#[derive(Debug, Clone)]
pub struct Layer {
    id: LayerId,
    name: String,
    source: LayerSource,
    closeable: bool,
    pub(crate) showing: bool,
    pub(crate) state: LoadState,
    pub(crate) document: Option<String>,
    /// Token of the most recent fetch; completions carrying an older token are stale.
    pub(crate) generation: u64,
}

impl Layer {
    pub(crate) fn new(id: LayerId, name: String, source: LayerSource, closeable: bool) -> Self {
        let state = match source {
            LayerSource::Static { .. } => LoadState::Static,
            LayerSource::Remote { .. } => LoadState::Pending,
        };
        Self {
            id,
            name,
            source,
            closeable,
            showing: false,
            state,
            document: None,
            generation: 0,
        }
    }

    pub fn id(&self) -> &LayerId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &LayerSource {
        &self.source
    }

    pub fn is_closeable(&self) -> bool {
        self.closeable
    }

    pub fn is_showing(&self) -> bool {
        self.showing
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    /// Last fetched document, kept for `reload`.
    pub fn document(&self) -> Option<&str> {
        self.document.as_deref()
    }

    pub fn is_remote(&self) -> bool {
        matches!(self.source, LayerSource::Remote { .. })
    }

    pub(crate) fn failure(&self) -> Option<&str> {
        match &self.state {
            LoadState::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}
