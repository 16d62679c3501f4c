//! Application context: owns the layer router, the push-event bridge and the client-side
//! registries, and applies commands, fetch completions and push events one at a time.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{Map, Value};
use shared::{
    actions,
    domain::{EntityKind, LayerDescriptor, LayerId, TaskId},
    protocol::{decode_payload, events, EntityRecord, FilesToDownload, RawPushEvent, TaskNotice},
};
use tokio::sync::{broadcast, mpsc, RwLock};
use tracing::{debug, info, warn};

use crate::{
    bridge::{DispatchOutcome, EventBridge},
    config::ClientSettings,
    entities::{parse_entity_listing, EntityCollections},
    error::FetchError,
    router::{LayerLoad, LayerRouter},
    tasks::TaskRegistry,
    transport::{fetch_json, ContentFetcher, ContentRequest, RequestScope},
    view::LayerView,
    ClientEvent,
};

pub enum AppCommand {
    AddLayer {
        descriptor: LayerDescriptor,
        params: Option<Value>,
        show: bool,
    },
    ShowLayer(LayerId),
    RemoveLayer(LayerId),
    RemoveCurrentLayer {
        next: Option<LayerId>,
    },
    ReloadLayer(LayerId),
    AcknowledgeTask(TaskId),
    ViewTaskLog(TaskId),
    UpdateSettings(Map<String, Value>),
    LoadData,
    Shutdown,
}

/// Results of background requests other than layer content.
#[derive(Debug)]
pub enum Completion {
    Settings(Result<Value, FetchError>),
    Entities {
        kind: EntityKind,
        result: Result<Value, FetchError>,
    },
    TaskLog {
        task_id: TaskId,
        result: Result<String, FetchError>,
    },
}

/// State mutated by push-event handlers.
pub struct AppState {
    pub tasks: TaskRegistry,
    pub entities: EntityCollections,
    events: broadcast::Sender<ClientEvent>,
}

impl AppState {
    fn emit(&self, event: ClientEvent) {
        let _ = self.events.send(event);
    }

    fn publish_tasks(&self) {
        self.emit(ClientEvent::TaskListUpdated(self.tasks.snapshot()));
    }
}

pub fn file_download_url(path: &str) -> String {
    format!("/internal/file_download/{}", STANDARD.encode(path.as_bytes()))
}

pub fn task_log_path(task_id: &TaskId) -> String {
    format!("/internal/log/{task_id}")
}

fn install_builtin_handlers(bridge: &mut EventBridge<AppState>) {
    bridge.handle_message(events::UPDATE, |state, payload| {
        let message = match payload {
            Value::String(text) => text.replace('"', ""),
            other => other.to_string().replace('"', ""),
        };
        state.emit(ClientEvent::Notice(message));
        Ok(())
    });

    bridge.handle_message(events::TASK_QUEUED, |state, payload| {
        let notice: TaskNotice = decode_payload(events::TASK_QUEUED, payload)?;
        state.tasks.queued(notice);
        state.publish_tasks();
        Ok(())
    });

    bridge.handle_message(events::TASK_START, |state, payload| {
        let notice: TaskNotice = decode_payload(events::TASK_START, payload)?;
        state.tasks.started(notice);
        state.publish_tasks();
        Ok(())
    });

    bridge.handle_message(events::TASK_COMPLETE, |state, payload| {
        let notice: TaskNotice = decode_payload(events::TASK_COMPLETE, payload)?;
        state.tasks.completed(notice);
        state.publish_tasks();
        Ok(())
    });

    for (event, kind) in [
        (events::NEW_SAMPLE, EntityKind::Sample),
        (events::NEW_HYPOTHESIS, EntityKind::Hypothesis),
        (
            events::NEW_HYPOTHESIS_SAMPLE_MATCH,
            EntityKind::HypothesisSampleMatch,
        ),
    ] {
        bridge.handle_message(event, move |state, payload| {
            let record: EntityRecord = decode_payload(event, payload)?;
            state.entities.upsert(kind, record);
            state.emit(ClientEvent::Render(kind));
            Ok(())
        });
    }

    bridge.handle_message(events::FILES_TO_DOWNLOAD, |state, payload| {
        let listing: FilesToDownload = decode_payload(events::FILES_TO_DOWNLOAD, payload)?;
        for path in listing.files {
            let url = file_download_url(&path);
            state.emit(ClientEvent::DownloadRequested { path, url });
        }
        Ok(())
    });
}

pub struct Application {
    settings: ClientSettings,
    router: LayerRouter,
    bridge: EventBridge<AppState>,
    state: AppState,
    fetcher: Arc<dyn ContentFetcher>,
    scope: Arc<RwLock<RequestScope>>,
    events: broadcast::Sender<ClientEvent>,
    layer_loads: mpsc::UnboundedReceiver<LayerLoad>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
}

impl Application {
    pub fn new(
        settings: ClientSettings,
        fetcher: Arc<dyn ContentFetcher>,
        view: Box<dyn LayerView>,
    ) -> Self {
        let (events, _) = broadcast::channel(settings.event_capacity.max(1));
        let (loads_tx, layer_loads) = mpsc::unbounded_channel();
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let scope = Arc::new(RwLock::new(RequestScope::default()));
        let router = LayerRouter::new(
            view,
            Arc::clone(&fetcher),
            Arc::clone(&scope),
            events.clone(),
            loads_tx,
        );
        let mut bridge = EventBridge::new();
        install_builtin_handlers(&mut bridge);

        Self {
            settings,
            router,
            bridge,
            state: AppState {
                tasks: TaskRegistry::new(),
                entities: EntityCollections::default(),
                events: events.clone(),
            },
            fetcher,
            scope,
            events,
            layer_loads,
            completions_tx,
            completions_rx,
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    pub fn router(&self) -> &LayerRouter {
        &self.router
    }

    pub fn router_mut(&mut self) -> &mut LayerRouter {
        &mut self.router
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn bridge_mut(&mut self) -> &mut EventBridge<AppState> {
        &mut self.bridge
    }

    pub fn scope(&self) -> Arc<RwLock<RequestScope>> {
        Arc::clone(&self.scope)
    }

    /// Startup sequence: pull preferences, mount the home layer, load entity listings.
    pub fn run_initializers(&mut self) {
        self.update_settings(Map::new());
        self.router.add_layer(actions::home(), None);
        self.load_data();
    }

    pub fn handle_push(&mut self, event: &RawPushEvent) -> DispatchOutcome {
        let outcome = self.bridge.dispatch(&mut self.state, event);
        if let DispatchOutcome::Malformed(err) = &outcome {
            let _ = self.events.send(ClientEvent::Error(err.to_string()));
        }
        outcome
    }

    pub fn acknowledge_task(&mut self, task_id: &TaskId) -> bool {
        match self.state.tasks.acknowledge(task_id) {
            Some(task) => {
                debug!(task_id = %task.id, "task acknowledged");
                self.state.publish_tasks();
                true
            }
            None => false,
        }
    }

    pub fn view_task_log(&self, task_id: TaskId) {
        let fetcher = Arc::clone(&self.fetcher);
        let completions = self.completions_tx.clone();
        tokio::spawn(async move {
            let result = fetcher.fetch(ContentRequest::get(task_log_path(&task_id))).await;
            let _ = completions.send(Completion::TaskLog { task_id, result });
        });
    }

    /// Sends `payload` to the preferences endpoint; the returned map is merged into the
    /// settings once the completion is applied.
    pub fn update_settings(&self, payload: Map<String, Value>) {
        let fetcher = Arc::clone(&self.fetcher);
        let completions = self.completions_tx.clone();
        let path = self.settings.preferences_path.clone();
        tokio::spawn(async move {
            let result =
                fetch_json(fetcher.as_ref(), ContentRequest::post(path, Value::Object(payload)))
                    .await;
            let _ = completions.send(Completion::Settings(result));
        });
    }

    pub fn load_data(&self) {
        for kind in EntityKind::ALL {
            let fetcher = Arc::clone(&self.fetcher);
            let completions = self.completions_tx.clone();
            tokio::spawn(async move {
                let result = fetch_json(fetcher.as_ref(), ContentRequest::get(kind.api_path())).await;
                let _ = completions.send(Completion::Entities { kind, result });
            });
        }
    }

    pub async fn apply_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Settings(Ok(Value::Object(update))) => {
                self.scope.write().await.settings.extend(update);
                info!("settings updated");
                let _ = self.events.send(ClientEvent::SettingsUpdated);
                self.refresh_showing_layer();
            }
            Completion::Settings(Ok(other)) => {
                warn!("preferences endpoint returned a non-object document: {other}");
            }
            Completion::Settings(Err(err)) => warn!("error in update_settings: {err}"),
            Completion::Entities {
                kind,
                result: Ok(listing),
            } => {
                let records = parse_entity_listing(kind, listing);
                self.state.entities.replace_all(kind, records);
                self.state.emit(ClientEvent::Render(kind));
            }
            Completion::Entities {
                kind,
                result: Err(err),
            } => warn!(kind = ?kind, "failed to load entity listing: {err}"),
            Completion::TaskLog {
                task_id,
                result: Ok(document),
            } => {
                let _ = self.events.send(ClientEvent::TaskLog { task_id, document });
            }
            Completion::TaskLog {
                task_id,
                result: Err(err),
            } => warn!(task_id = %task_id, "failed to fetch task log: {err}"),
        }
    }

    fn refresh_showing_layer(&mut self) {
        let Some(current) = self.router.showing_layer_id() else {
            return;
        };
        if current.as_str() != actions::HOME_LAYER {
            debug!(layer_id = %current, "refreshing layer after settings update");
            self.router.refresh_layer(&current);
        }
    }

    /// Returns `false` once the loop should stop.
    pub fn apply_command(&mut self, command: AppCommand) -> bool {
        match command {
            AppCommand::AddLayer {
                descriptor,
                params,
                show,
            } => {
                let id = self.router.add_layer(descriptor, params);
                if show {
                    self.router.set_showing_layer(&id);
                }
            }
            AppCommand::ShowLayer(id) => {
                self.router.set_showing_layer(&id);
            }
            AppCommand::RemoveLayer(id) => {
                self.router.remove_layer(&id);
            }
            AppCommand::RemoveCurrentLayer { next } => {
                self.router.remove_current_layer(next);
            }
            AppCommand::ReloadLayer(id) => {
                self.router.reload_layer(&id);
            }
            AppCommand::AcknowledgeTask(id) => {
                self.acknowledge_task(&id);
            }
            AppCommand::ViewTaskLog(id) => self.view_task_log(id),
            AppCommand::UpdateSettings(payload) => self.update_settings(payload),
            AppCommand::LoadData => self.load_data(),
            AppCommand::Shutdown => return false,
        }
        true
    }

    /// Waits for the next layer load or background completion and applies it.
    pub async fn pump(&mut self) -> bool {
        tokio::select! {
            Some(load) = self.layer_loads.recv() => {
                self.router.apply_load(load);
                true
            }
            Some(completion) = self.completions_rx.recv() => {
                self.apply_completion(completion).await;
                true
            }
            else => false,
        }
    }

    /// Serially applies commands, push events and completions until shutdown.
    pub async fn run(
        mut self,
        mut commands: mpsc::Receiver<AppCommand>,
        mut push: mpsc::Receiver<RawPushEvent>,
    ) {
        info!("application loop started");
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => {
                        if !self.apply_command(command) {
                            break;
                        }
                    }
                    None => break,
                },
                Some(event) = push.recv() => {
                    self.handle_push(&event);
                }
                Some(load) = self.layer_loads.recv() => {
                    self.router.apply_load(load);
                }
                Some(completion) = self.completions_rx.recv() => {
                    self.apply_completion(completion).await;
                }
            }
        }
        info!("application loop stopped");
    }
}

#[cfg(test)]
#[path = "tests/app_tests.rs"]
mod tests;
