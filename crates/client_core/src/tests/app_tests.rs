use super::*;
use std::time::Duration;

use crate::test_support::{drain_events, RecordingView, StaticFetcher};
use serde_json::json;
use shared::domain::{EntityId, TaskStatus};
use tokio::time::timeout;

fn app_with(fetcher: StaticFetcher) -> (Application, broadcast::Receiver<ClientEvent>) {
    let app = Application::new(
        ClientSettings::default(),
        Arc::new(fetcher),
        Box::new(RecordingView::default()),
    );
    let events = app.subscribe_events();
    (app, events)
}

fn push(event: &str, payload: Value) -> RawPushEvent {
    RawPushEvent::new(event, payload.to_string())
}

async fn pump_n(app: &mut Application, count: usize) {
    for _ in 0..count {
        let pumped = timeout(Duration::from_secs(5), app.pump())
            .await
            .expect("pump timed out");
        assert!(pumped);
    }
}

#[tokio::test]
async fn completion_after_queue_keeps_task_name() {
    let (mut app, mut events) = app_with(StaticFetcher::default());

    app.handle_push(&push(events::TASK_QUEUED, json!({ "id": 1, "name": "search" })));
    app.handle_push(&push(events::TASK_COMPLETE, json!({ "id": 1 })));

    let task = app.state().tasks.get(&TaskId::new("1")).expect("task 1");
    assert_eq!(task.status, TaskStatus::Finished);
    assert_eq!(task.name, "search");

    let updates: Vec<_> = drain_events(&mut events)
        .into_iter()
        .filter_map(|event| match event {
            ClientEvent::TaskListUpdated(tasks) => Some(tasks),
            _ => None,
        })
        .collect();
    assert_eq!(updates.len(), 2);
    assert_eq!(updates[0][0].status, TaskStatus::Queued);
    assert_eq!(updates[1][0].status, TaskStatus::Finished);
}

#[tokio::test]
async fn completion_without_prior_events_creates_finished_task() {
    let (mut app, _events) = app_with(StaticFetcher::default());

    app.handle_push(&push(events::TASK_COMPLETE, json!({ "id": 99, "name": "x" })));

    let task = app.state().tasks.get(&TaskId::new("99")).expect("task 99");
    assert_eq!(task.status, TaskStatus::Finished);
    assert_eq!(task.name, "x");
    assert_eq!(app.state().tasks.len(), 1);
}

#[tokio::test]
async fn acknowledging_removes_only_finished_tasks() {
    let (mut app, mut events) = app_with(StaticFetcher::default());
    app.handle_push(&push(events::TASK_START, json!({ "id": "a", "name": "build" })));
    app.handle_push(&push(events::TASK_COMPLETE, json!({ "id": "b", "name": "export" })));
    drain_events(&mut events);

    assert!(!app.acknowledge_task(&TaskId::new("a")));
    assert!(app.acknowledge_task(&TaskId::new("b")));
    assert!(!app.acknowledge_task(&TaskId::new("missing")));

    let ids: Vec<_> = app.state().tasks.iter().map(|task| task.id.clone()).collect();
    assert_eq!(ids, vec![TaskId::new("a")]);
    assert_eq!(
        drain_events(&mut events),
        vec![ClientEvent::TaskListUpdated(app.state().tasks.snapshot())]
    );
}

#[tokio::test]
async fn new_entity_events_upsert_and_request_render() {
    let (mut app, mut events) = app_with(StaticFetcher::default());

    app.handle_push(&push(events::NEW_SAMPLE, json!({ "id": 5, "name": "serum" })));
    app.handle_push(&push(
        events::NEW_HYPOTHESIS_SAMPLE_MATCH,
        json!({ "id": "m-1", "hypothesis_id": 2 }),
    ));

    let sample = app
        .state()
        .entities
        .get(EntityKind::Sample, &EntityId::new("5"))
        .expect("sample 5");
    assert_eq!(sample.fields.get("name"), Some(&json!("serum")));
    assert_eq!(
        drain_events(&mut events),
        vec![
            ClientEvent::Render(EntityKind::Sample),
            ClientEvent::Render(EntityKind::HypothesisSampleMatch),
        ]
    );
}

#[tokio::test]
async fn files_to_download_become_encoded_download_urls() {
    let (mut app, mut events) = app_with(StaticFetcher::default());

    app.handle_push(&push(
        events::FILES_TO_DOWNLOAD,
        json!({ "files": ["results/out.csv"] }),
    ));

    assert_eq!(
        drain_events(&mut events),
        vec![ClientEvent::DownloadRequested {
            path: "results/out.csv".into(),
            url: "/internal/file_download/cmVzdWx0cy9vdXQuY3N2".into(),
        }]
    );
}

#[tokio::test]
async fn update_notice_strips_quotes() {
    let (mut app, mut events) = app_with(StaticFetcher::default());

    app.handle_push(&push(events::UPDATE, json!("Task \"search\" done")));

    assert_eq!(
        drain_events(&mut events),
        vec![ClientEvent::Notice("Task search done".into())]
    );
}

#[tokio::test]
async fn malformed_push_payload_is_reported() {
    let (mut app, mut events) = app_with(StaticFetcher::default());

    let outcome = app.handle_push(&RawPushEvent::new(events::TASK_QUEUED, "{oops"));

    assert!(matches!(outcome, DispatchOutcome::Malformed(_)));
    assert!(app.state().tasks.is_empty());
    assert!(matches!(
        drain_events(&mut events).as_slice(),
        [ClientEvent::Error(message)] if message.contains("task-queued")
    ));
}

#[tokio::test]
async fn payload_missing_required_fields_fails_the_handler_only() {
    let (mut app, mut events) = app_with(StaticFetcher::default());

    let outcome = app.handle_push(&push(events::TASK_QUEUED, json!({ "name": "no id" })));

    assert!(matches!(
        outcome,
        DispatchOutcome::Delivered {
            handlers: 1,
            failures: 1
        }
    ));
    assert!(drain_events(&mut events).is_empty());
}

#[tokio::test]
async fn custom_handlers_run_after_builtin_ones() {
    let (mut app, _events) = app_with(StaticFetcher::default());
    app.bridge_mut()
        .handle_message(events::TASK_START, |state: &mut AppState, _: &Value| {
            anyhow::ensure!(!state.tasks.is_empty(), "builtin handler should run first");
            Ok(())
        });

    let outcome = app.handle_push(&push(events::TASK_START, json!({ "id": 3 })));

    assert!(matches!(
        outcome,
        DispatchOutcome::Delivered {
            handlers: 2,
            failures: 0
        }
    ));
}

#[tokio::test]
async fn initializers_mount_home_and_load_listings() {
    let fetcher = StaticFetcher::default()
        .with_page("/preferences", r#"{"minimum_ms2_score": 0.2}"#)
        .with_page("/api/samples", r#"[{"id": 1, "name": "serum"}]"#)
        .with_page("/api/hypotheses", r#"{"7": {"id": 7, "name": "n-glycan"}}"#)
        .with_page("/api/hypothesis_sample_matches", "[]");
    let (mut app, mut events) = app_with(fetcher.clone());

    app.run_initializers();
    assert_eq!(app.router().showing_layer_id(), Some(actions::home_layer_id()));
    pump_n(&mut app, 4).await;

    assert_eq!(app.state().entities.collection(EntityKind::Sample).len(), 1);
    assert_eq!(app.state().entities.collection(EntityKind::Hypothesis).len(), 1);
    assert_eq!(
        app.scope().read().await.settings.get("minimum_ms2_score"),
        Some(&json!(0.2))
    );

    let events = drain_events(&mut events);
    assert!(events.contains(&ClientEvent::SettingsUpdated));
    for kind in EntityKind::ALL {
        assert!(events.contains(&ClientEvent::Render(kind)), "{kind:?} rendered");
    }
    // home is static, so only preferences and the three listings hit the server
    assert_eq!(fetcher.requests().len(), 4);
    let preferences = fetcher
        .requests()
        .into_iter()
        .find(|request| request.path == "/preferences")
        .expect("preferences request");
    assert_eq!(preferences.method, shared::domain::HttpMethod::Post);
    assert_eq!(preferences.body, Some(json!({})));
}

#[tokio::test]
async fn settings_update_refreshes_the_showing_layer() {
    let fetcher = StaticFetcher::default()
        .with_page("/preferences", r#"{"minimum_ms1_score": 0.4}"#)
        .with_page("/add_sample", "<form></form>");
    let (mut app, _events) = app_with(fetcher.clone());
    app.router_mut().add_layer(actions::home(), None);
    let layer = app.router_mut().add_layer(actions::add_sample(), None);
    app.router_mut().set_showing_layer(&layer);
    pump_n(&mut app, 1).await;

    let mut payload = Map::new();
    payload.insert("minimum_ms1_score".into(), json!(0.4));
    app.apply_command(AppCommand::UpdateSettings(payload));
    pump_n(&mut app, 2).await;

    let refetches = fetcher
        .requests()
        .iter()
        .filter(|request| request.path == "/add_sample")
        .count();
    assert_eq!(refetches, 2);
    assert!(app.router().layer(&layer).and_then(|l| l.document()).is_some());
}

#[tokio::test]
async fn failed_settings_update_leaves_scope_untouched() {
    let (mut app, mut events) = app_with(StaticFetcher::default());

    app.update_settings(Map::new());
    pump_n(&mut app, 1).await;

    assert!(app.scope().read().await.settings.is_empty());
    assert!(!drain_events(&mut events).contains(&ClientEvent::SettingsUpdated));
}

#[tokio::test]
async fn task_log_is_fetched_by_id() {
    let fetcher = StaticFetcher::default().with_page("/internal/log/7", "<pre>done</pre>");
    let (mut app, mut events) = app_with(fetcher);

    app.apply_command(AppCommand::ViewTaskLog(TaskId::new("7")));
    pump_n(&mut app, 1).await;

    assert_eq!(
        drain_events(&mut events),
        vec![ClientEvent::TaskLog {
            task_id: TaskId::new("7"),
            document: "<pre>done</pre>".into(),
        }]
    );
}

#[tokio::test]
async fn commands_drive_the_router() {
    let fetcher = StaticFetcher::default().with_page("/add_sample", "<form></form>");
    let (mut app, _events) = app_with(fetcher);
    app.router_mut().add_layer(actions::home(), None);

    assert!(app.apply_command(AppCommand::AddLayer {
        descriptor: actions::add_sample(),
        params: None,
        show: true,
    }));
    assert_eq!(app.router().showing_layer_id(), Some(LayerId::new("add-sample")));

    assert!(app.apply_command(AppCommand::RemoveCurrentLayer { next: None }));
    assert_eq!(app.router().showing_layer_id(), Some(actions::home_layer_id()));
    assert!(app.router().layer(&LayerId::new("add-sample")).is_none());

    assert!(!app.apply_command(AppCommand::Shutdown));
}

#[tokio::test]
async fn run_loop_applies_push_events_until_shutdown() {
    let (app, mut events) = app_with(StaticFetcher::default());
    let (commands_tx, commands_rx) = mpsc::channel(8);
    let (push_tx, push_rx) = mpsc::channel(8);
    let handle = tokio::spawn(app.run(commands_rx, push_rx));

    push_tx
        .send(push(events::TASK_QUEUED, json!({ "id": 1, "name": "search" })))
        .await
        .expect("push");
    let event = timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("event timed out")
        .expect("event");
    assert!(matches!(event, ClientEvent::TaskListUpdated(ref tasks) if tasks.len() == 1));

    commands_tx.send(AppCommand::Shutdown).await.expect("shutdown");
    timeout(Duration::from_secs(5), handle)
        .await
        .expect("loop stopped")
        .expect("join");
}

#[test]
fn download_and_log_paths() {
    assert_eq!(
        file_download_url("results/out.csv"),
        "/internal/file_download/cmVzdWx0cy9vdXQuY3N2"
    );
    assert_eq!(task_log_path(&TaskId::new("12")), "/internal/log/12");
}
