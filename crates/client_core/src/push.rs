//! Server push transport: a single `text/event-stream` connection, re-established when it drops.

use std::time::Duration;

use anyhow::{Context, Result};
use futures::StreamExt;
use reqwest::{header, Client};
use shared::protocol::RawPushEvent;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::ClientSettings;

const DEFAULT_EVENT_NAME: &str = "message";

/// Incremental `text/event-stream` parser. Chunks may split lines and UTF-8 sequences.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
    id: Option<String>,
    last_event_id: Option<String>,
    retry: Option<Duration>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, chunk: &[u8]) -> Vec<RawPushEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=newline).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line);
            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
        }

        events
    }

    fn process_line(&mut self, line: &str) -> Option<RawPushEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            "id" => self.id = Some(value.to_string()),
            "retry" => match value.parse::<u64>() {
                Ok(millis) => self.retry = Some(Duration::from_millis(millis)),
                Err(_) => debug!(value, "ignoring invalid retry field"),
            },
            other => debug!(field = other, "ignoring unknown event-stream field"),
        }
        None
    }

    fn dispatch(&mut self) -> Option<RawPushEvent> {
        let event = self.event.take();
        if let Some(id) = self.id.take() {
            self.last_event_id = Some(id);
        }
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(RawPushEvent {
            id: self.last_event_id.clone(),
            event: event.unwrap_or_else(|| DEFAULT_EVENT_NAME.to_string()),
            data,
        })
    }

    pub fn last_event_id(&self) -> Option<&str> {
        self.last_event_id.as_deref()
    }

    /// Reconnect delay requested by the server, if any.
    pub fn retry(&self) -> Option<Duration> {
        self.retry
    }

    /// Drops any partially received event, keeping the last id and retry hint.
    fn reset_partial(&mut self) {
        self.buffer.clear();
        self.event = None;
        self.data.clear();
        self.id = None;
    }
}

pub struct PushStream {
    http: Client,
    url: Url,
    reconnect_delay: Duration,
}

impl PushStream {
    pub fn new(settings: &ClientSettings) -> Result<Self> {
        Ok(Self {
            http: Client::new(),
            url: settings.stream_url()?,
            reconnect_delay: settings.reconnect_delay,
        })
    }

    /// Runs the connection loop on its own task until `sink` is closed.
    pub fn spawn(self, sink: mpsc::Sender<RawPushEvent>) -> JoinHandle<()> {
        tokio::spawn(self.run(sink))
    }

    async fn run(self, sink: mpsc::Sender<RawPushEvent>) {
        let mut decoder = SseDecoder::new();
        loop {
            match self.connect_once(&mut decoder, &sink).await {
                Ok(()) => info!(url = %self.url, "push stream closed"),
                Err(err) => warn!(url = %self.url, "push stream failed: {err:#}"),
            }
            if sink.is_closed() {
                break;
            }
            decoder.reset_partial();
            let delay = decoder.retry().unwrap_or(self.reconnect_delay);
            debug!(delay_ms = delay.as_millis() as u64, "reconnecting push stream");
            tokio::time::sleep(delay).await;
        }
    }

    async fn connect_once(
        &self,
        decoder: &mut SseDecoder,
        sink: &mpsc::Sender<RawPushEvent>,
    ) -> Result<()> {
        let mut request = self
            .http
            .get(self.url.clone())
            .header(header::ACCEPT, "text/event-stream");
        if let Some(id) = decoder.last_event_id() {
            request = request.header("Last-Event-ID", id);
        }
        let response = request
            .send()
            .await
            .with_context(|| format!("failed to connect push stream: {}", self.url))?
            .error_for_status()?;
        info!(url = %self.url, "push stream connected");

        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.context("push stream receive failed")?;
            for event in decoder.feed(&chunk) {
                if sink.send(event).await.is_err() {
                    return Ok(());
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/push_tests.rs"]
mod tests;
