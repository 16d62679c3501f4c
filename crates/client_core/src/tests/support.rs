//! Recording fakes for the view and content-fetch collaborators.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use shared::domain::LayerId;
use tokio::sync::broadcast;

use crate::{
    error::FetchError,
    layer::Layer,
    transport::{ContentFetcher, ContentRequest},
    view::LayerView,
    ClientEvent,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewCall {
    Attach(LayerId),
    Render {
        layer_id: LayerId,
        document: String,
        closeable: bool,
    },
    Visible(LayerId, bool),
    Detach(LayerId),
    Refresh(Option<LayerId>),
}

#[derive(Clone, Default)]
pub struct RecordingView {
    calls: Arc<Mutex<Vec<ViewCall>>>,
}

impl RecordingView {
    pub fn calls(&self) -> Vec<ViewCall> {
        self.calls.lock().expect("view log").clone()
    }

    pub fn renders(&self) -> Vec<(LayerId, String)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ViewCall::Render {
                    layer_id, document, ..
                } => Some((layer_id, document)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: ViewCall) {
        self.calls.lock().expect("view log").push(call);
    }
}

impl LayerView for RecordingView {
    fn attach(&mut self, layer: &Layer) {
        self.record(ViewCall::Attach(layer.id().clone()));
    }

    fn render(&mut self, layer_id: &LayerId, document: &str, closeable: bool) {
        self.record(ViewCall::Render {
            layer_id: layer_id.clone(),
            document: document.to_string(),
            closeable,
        });
    }

    fn set_visible(&mut self, layer_id: &LayerId, visible: bool) {
        self.record(ViewCall::Visible(layer_id.clone(), visible));
    }

    fn detach(&mut self, layer_id: &LayerId) {
        self.record(ViewCall::Detach(layer_id.clone()));
    }

    fn refresh_widgets(&mut self, showing: Option<&LayerId>) {
        self.record(ViewCall::Refresh(showing.cloned()));
    }
}

/// Serves canned bodies by path; unknown paths are rejected.
#[derive(Clone, Default)]
pub struct StaticFetcher {
    pages: Arc<Mutex<HashMap<String, Result<String, String>>>>,
    requests: Arc<Mutex<Vec<ContentRequest>>>,
}

impl StaticFetcher {
    pub fn with_page(self, path: &str, body: &str) -> Self {
        self.pages
            .lock()
            .expect("pages")
            .insert(path.to_string(), Ok(body.to_string()));
        self
    }

    pub fn with_failure(self, path: &str, reason: &str) -> Self {
        self.pages
            .lock()
            .expect("pages")
            .insert(path.to_string(), Err(reason.to_string()));
        self
    }

    pub fn requests(&self) -> Vec<ContentRequest> {
        self.requests.lock().expect("requests").clone()
    }
}

#[async_trait]
impl ContentFetcher for StaticFetcher {
    async fn fetch(&self, request: ContentRequest) -> Result<String, FetchError> {
        self.requests
            .lock()
            .expect("requests")
            .push(request.clone());
        let page = self.pages.lock().expect("pages").get(&request.path).cloned();
        match page {
            Some(Ok(body)) => Ok(body),
            Some(Err(reason)) => Err(FetchError::Rejected {
                path: request.path,
                reason,
            }),
            None => Err(FetchError::Rejected {
                path: request.path,
                reason: "not found".to_string(),
            }),
        }
    }
}

pub fn drain_events(rx: &mut broadcast::Receiver<ClientEvent>) -> Vec<ClientEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
