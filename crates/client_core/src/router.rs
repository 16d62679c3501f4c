//! Layer stack: named content panels, the one currently showing, and navigation history.

use std::{collections::HashMap, sync::Arc};

use serde_json::Value;
use shared::{
    actions::home_layer_id,
    domain::{HttpMethod, LayerDescriptor, LayerId},
};
use tokio::sync::{broadcast, mpsc, RwLock};
use tracing::{debug, error, info, warn};

use crate::{
    error::{FetchError, LayerError},
    layer::{Layer, LayerSource, LoadState},
    template::render_template,
    transport::{ContentFetcher, ContentRequest, RequestScope},
    view::LayerView,
    ClientEvent,
};

/// Completion of a layer content fetch, delivered back to the router's owner.
#[derive(Debug)]
pub struct LayerLoad {
    pub layer_id: LayerId,
    pub generation: u64,
    pub result: Result<String, FetchError>,
}

struct Loader {
    fetcher: Arc<dyn ContentFetcher>,
    scope: Arc<RwLock<RequestScope>>,
    loads: mpsc::UnboundedSender<LayerLoad>,
    next_generation: u64,
}

impl Loader {
    fn start(&mut self, layer: &mut Layer) {
        let (url, params, method) = match layer.source() {
            LayerSource::Remote {
                url,
                params,
                method,
            } => (url.clone(), params.clone(), *method),
            LayerSource::Static { .. } => return,
        };

        self.next_generation += 1;
        layer.generation = self.next_generation;

        let Some(path) = url else {
            warn!(layer_id = %layer.id(), "layer has no content url and will never load");
            layer.state = LoadState::Failed("missing content url".into());
            return;
        };
        layer.state = LoadState::Pending;

        let fetcher = Arc::clone(&self.fetcher);
        let scope = Arc::clone(&self.scope);
        let loads = self.loads.clone();
        let layer_id = layer.id().clone();
        let generation = layer.generation;
        tokio::spawn(async move {
            let request = match method {
                HttpMethod::Get => ContentRequest::get(path),
                HttpMethod::Post => {
                    let body = scope.read().await.layer_request_body(params.as_ref());
                    match serde_json::to_value(body) {
                        Ok(body) => ContentRequest::post(path, body),
                        Err(err) => {
                            error!(layer_id = %layer_id, "failed to encode layer request body: {err}");
                            return;
                        }
                    }
                }
            };
            let result = fetcher.fetch(request).await;
            if loads
                .send(LayerLoad {
                    layer_id,
                    generation,
                    result,
                })
                .is_err()
            {
                debug!("layer load receiver dropped");
            }
        });
    }
}

pub struct LayerRouter {
    view: Box<dyn LayerView>,
    loader: Loader,
    events: broadcast::Sender<ClientEvent>,
    layers: HashMap<LayerId, Layer>,
    order: Vec<LayerId>,
    stack: Vec<LayerId>,
    layer_counter: u64,
    last_added: Option<LayerId>,
}

impl LayerRouter {
    pub fn new(
        view: Box<dyn LayerView>,
        fetcher: Arc<dyn ContentFetcher>,
        scope: Arc<RwLock<RequestScope>>,
        events: broadcast::Sender<ClientEvent>,
        loads: mpsc::UnboundedSender<LayerLoad>,
    ) -> Self {
        Self {
            view,
            loader: Loader {
                fetcher,
                scope,
                loads,
                next_generation: 0,
            },
            events,
            layers: HashMap::new(),
            order: Vec::new(),
            stack: Vec::new(),
            layer_counter: 0,
            last_added: None,
        }
    }

    fn next_counter(&mut self) -> u64 {
        self.layer_counter += 1;
        self.layer_counter
    }

    fn derive_layer_id(&mut self, name: Option<&str>, has_params: bool) -> LayerId {
        match (name, has_params) {
            (Some(name), true) => LayerId::new(format!("{name}-{}", self.next_counter())),
            (Some(name), false) => LayerId::new(name),
            (None, _) => LayerId::new(format!("action-layer-{}", self.next_counter())),
        }
    }

    /// Registers a new layer and starts loading its content. The layer is shown right
    /// away only when nothing else is showing.
    pub fn add_layer(&mut self, descriptor: LayerDescriptor, params: Option<Value>) -> LayerId {
        let closeable = descriptor.is_closeable();
        let (id, source) = match descriptor.container.as_deref() {
            Some(container) => (
                LayerId::new(container.trim_start_matches('#')),
                LayerSource::Static {
                    container: container.to_string(),
                },
            ),
            None => {
                let id = self.derive_layer_id(descriptor.name.as_deref(), params.is_some());
                let url = match (&descriptor.content_url_template, &descriptor.content_url) {
                    (Some(template), _) => {
                        Some(render_template(template, params.as_ref().unwrap_or(&Value::Null)))
                    }
                    (None, url) => url.clone(),
                };
                (
                    id,
                    LayerSource::Remote {
                        url,
                        params,
                        method: descriptor.method,
                    },
                )
            }
        };
        let name = descriptor
            .name
            .clone()
            .unwrap_or_else(|| format!("layer-{id}"));

        if self.layers.contains_key(&id) {
            warn!(layer_id = %id, "replacing existing layer with the same id");
            self.remove_layer(&id);
        }

        let mut layer = Layer::new(id.clone(), name, source, closeable);
        self.loader.start(&mut layer);
        self.view.attach(&layer);
        self.view.set_visible(&id, false);
        self.layers.insert(id.clone(), layer);
        self.order.push(id.clone());
        self.last_added = Some(id.clone());
        info!(layer_id = %id, "layer added");
        let _ = self.events.send(ClientEvent::LayerAdded {
            layer_id: id.clone(),
        });

        if self.showing_layer_id().is_none() {
            if let Err(err) = self.show(&id) {
                warn!(layer_id = %id, "new layer could not be shown: {err}");
            }
        }
        if self.stack.is_empty() {
            self.stack.push(id.clone());
        }
        id
    }

    pub fn get_showing_layer(&self) -> Option<&Layer> {
        self.order
            .iter()
            .filter_map(|id| self.layers.get(id))
            .find(|layer| layer.showing)
    }

    pub fn showing_layer_id(&self) -> Option<LayerId> {
        self.get_showing_layer().map(|layer| layer.id().clone())
    }

    /// Switches the visible layer. A missing or unshowable target falls back to the home
    /// layer so navigation never leaves the display empty. Returns the layer now showing.
    pub fn set_showing_layer(&mut self, id: &LayerId) -> Option<LayerId> {
        match self.showing_layer_id() {
            Some(current) => self.hide(&current),
            None => debug!("no layer showing; nothing to hide"),
        }

        let shown = match self.show(id) {
            Ok(()) => Some(id.clone()),
            Err(err) => {
                warn!(layer_id = %id, "{err}; falling back to home layer");
                let home = home_layer_id();
                match self.show(&home) {
                    Ok(()) => Some(home),
                    Err(err) => {
                        error!("home layer unavailable, no layer is showing: {err}");
                        None
                    }
                }
            }
        };

        if let Some(shown) = &shown {
            if let Some(index) = self.find_layer(shown) {
                self.stack.remove(index);
            }
            self.stack.push(shown.clone());
        }

        let _ = self.events.send(ClientEvent::LayerChanged {
            requested: id.clone(),
            showing: shown.clone(),
        });
        self.view.refresh_widgets(shown.as_ref());
        shown
    }

    /// Detaches a layer and forgets it. Visibility of other layers is left alone.
    pub fn remove_layer(&mut self, id: &LayerId) -> bool {
        let Some(layer) = self.layers.remove(id) else {
            debug!(layer_id = %id, "remove requested for unknown layer");
            return false;
        };
        self.view.detach(layer.id());
        self.order.retain(|other| other != id);
        if let Some(index) = self.find_layer(id) {
            self.stack.remove(index);
        }
        if self.last_added.as_ref() == Some(id) {
            self.last_added = None;
        }
        info!(layer_id = %id, "layer removed");
        true
    }

    /// Pops the current layer, shows `next` (or the new stack top), then disposes the
    /// outgoing layer once the switch has completed.
    pub fn remove_current_layer(&mut self, next: Option<LayerId>) -> Option<LayerId> {
        let current = self.showing_layer_id();
        self.stack.pop();
        let next = next
            .or_else(|| self.stack.last().cloned())
            .unwrap_or_else(home_layer_id);
        let shown = self.set_showing_layer(&next);

        if let Some(current) = current {
            let closeable = self
                .layers
                .get(&current)
                .map(Layer::is_closeable)
                .unwrap_or(false);
            if shown.as_ref() == Some(&current) {
                debug!(layer_id = %current, "outgoing layer is showing again; keeping it");
            } else if !closeable {
                debug!(layer_id = %current, "layer is not closeable; keeping it registered");
            } else {
                self.remove_layer(&current);
            }
        }
        shown
    }

    /// Position of `id` in the navigation stack.
    pub fn find_layer(&self, id: &LayerId) -> Option<usize> {
        self.stack.iter().position(|other| other == id)
    }

    /// Applies a finished fetch. Completions for removed layers, or superseded by a newer
    /// fetch of the same layer, are discarded.
    pub fn apply_load(&mut self, load: LayerLoad) -> bool {
        let Some(layer) = self.layers.get_mut(&load.layer_id) else {
            debug!(layer_id = %load.layer_id, "discarding content for removed layer");
            return false;
        };
        if layer.generation != load.generation {
            debug!(
                layer_id = %load.layer_id,
                stale = load.generation,
                current = layer.generation,
                "discarding stale layer content"
            );
            return false;
        }

        match load.result {
            Ok(document) => {
                self.view
                    .render(layer.id(), &document, layer.is_closeable());
                if !layer.showing {
                    self.view.set_visible(layer.id(), false);
                }
                layer.document = Some(document);
                layer.state = LoadState::Ready;
                let _ = self.events.send(ClientEvent::LayerLoaded {
                    layer_id: load.layer_id,
                });
                true
            }
            Err(err) => {
                warn!(layer_id = %load.layer_id, "layer content fetch failed: {err}");
                let reason = err.to_string();
                layer.state = LoadState::Failed(reason.clone());
                let was_showing = layer.showing;
                let _ = self.events.send(ClientEvent::LayerLoadFailed {
                    layer_id: load.layer_id.clone(),
                    reason,
                });
                if was_showing {
                    info!(layer_id = %load.layer_id, "showing layer failed to load; returning home");
                    self.set_showing_layer(&home_layer_id());
                }
                false
            }
        }
    }

    /// Re-renders the cached document without fetching.
    pub fn reload_layer(&mut self, id: &LayerId) -> bool {
        let Some(layer) = self.layers.get(id) else {
            return false;
        };
        let Some(document) = layer.document() else {
            debug!(layer_id = %id, "nothing cached to reload");
            return false;
        };
        self.view.render(id, document, layer.is_closeable());
        true
    }

    /// Issues a fresh fetch for a remote layer; any in-flight fetch becomes stale.
    pub fn refresh_layer(&mut self, id: &LayerId) -> bool {
        let Some(layer) = self.layers.get_mut(id) else {
            return false;
        };
        if !layer.is_remote() {
            return false;
        }
        self.loader.start(layer);
        true
    }

    pub fn layer(&self, id: &LayerId) -> Option<&Layer> {
        self.layers.get(id)
    }

    /// Layers in insertion order.
    pub fn layers(&self) -> impl Iterator<Item = &Layer> {
        self.order.iter().filter_map(|id| self.layers.get(id))
    }

    pub fn stack(&self) -> &[LayerId] {
        &self.stack
    }

    pub fn last_added(&self) -> Option<&LayerId> {
        self.last_added.as_ref()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    fn show(&mut self, id: &LayerId) -> Result<(), LayerError> {
        let layer = self
            .layers
            .get_mut(id)
            .ok_or_else(|| LayerError::Unknown(id.clone()))?;
        if let Some(reason) = layer.failure() {
            return Err(LayerError::Unshowable {
                layer_id: id.clone(),
                reason: reason.to_string(),
            });
        }
        layer.showing = true;
        self.view.set_visible(id, true);
        Ok(())
    }

    fn hide(&mut self, id: &LayerId) {
        if let Some(layer) = self.layers.get_mut(id) {
            layer.showing = false;
            self.view.set_visible(id, false);
        }
    }
}

#[cfg(test)]
#[path = "tests/router_tests.rs"]
mod tests;
