use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use client_core::{
    load_settings, load_settings_from, tasks::render_task_list, AppCommand, Application,
    ClientEvent, HeadlessView, HttpContentFetcher, PushStream,
};
use shared::actions;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

#[derive(Parser, Debug)]
struct Args {
    /// Overrides `server_url` from the config file and environment.
    #[arg(long)]
    server_url: Option<String>,
    #[arg(long)]
    config: Option<PathBuf>,
    /// Layer to open and show after startup, by action name (e.g. `add-sample`).
    #[arg(long = "open")]
    open: Vec<String>,
    #[arg(long, default_value = "info")]
    log_filter: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(args.log_filter.as_str())
        .init();

    let mut settings = match &args.config {
        Some(path) => load_settings_from(Some(path.as_path()))?,
        None => load_settings(),
    };
    if let Some(server_url) = args.server_url {
        settings.server_url = server_url;
    }
    info!(server_url = %settings.server_url, "starting workbench client");

    let fetcher = HttpContentFetcher::new(&settings.server_url)
        .with_context(|| format!("invalid server url: {}", settings.server_url))?;
    let push = PushStream::new(&settings)?;
    let mut app = Application::new(settings, Arc::new(fetcher), Box::new(HeadlessView));
    let events = app.subscribe_events();
    let printer = tokio::spawn(log_events(events));

    app.run_initializers();
    for name in &args.open {
        match actions::lookup(name) {
            Some(descriptor) => {
                app.apply_command(AppCommand::AddLayer {
                    descriptor,
                    params: None,
                    show: true,
                });
            }
            None => warn!(action = %name, "unknown action; skipping"),
        }
    }

    let (push_tx, push_rx) = mpsc::channel(256);
    let (commands_tx, commands_rx) = mpsc::channel(32);
    let stream = push.spawn(push_tx);
    let app_loop = tokio::spawn(app.run(commands_rx, push_rx));

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    if commands_tx.send(AppCommand::Shutdown).await.is_err() {
        warn!("application loop already stopped");
    }
    app_loop.await?;
    stream.abort();
    printer.abort();
    Ok(())
}

async fn log_events(mut events: broadcast::Receiver<ClientEvent>) {
    loop {
        match events.recv().await {
            Ok(ClientEvent::Notice(message)) => info!(%message, "server notice"),
            Ok(ClientEvent::TaskListUpdated(tasks)) => {
                for task in &tasks {
                    info!(task_id = %task.id, name = %task.name, status = %task.status, "task");
                }
                debug!(markup = %render_task_list(&tasks), "task list");
            }
            Ok(ClientEvent::DownloadRequested { path, url }) => {
                info!(%path, %url, "download ready")
            }
            Ok(ClientEvent::Error(message)) => warn!(%message, "client error"),
            Ok(event) => info!(event = event.name(), "{event:?}"),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "event log fell behind")
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
