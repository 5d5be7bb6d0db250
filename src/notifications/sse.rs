//! Server-sent events transport

use std::collections::VecDeque;

use async_trait::async_trait;
use reqwest::header::ACCEPT;

use super::{NotificationConnection, NotificationError, NotificationTransport};

/// Connects to a `text/event-stream` endpoint
#[derive(Debug, Clone)]
pub struct SseTransport {
    url: String,
    client: reqwest::Client,
}

impl SseTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl NotificationTransport for SseTransport {
    async fn connect(&self) -> Result<Box<dyn NotificationConnection>, NotificationError> {
        let response = self
            .client
            .get(&self.url)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| NotificationError::Connect(e.to_string()))?;

        if !response.status().is_success() {
            return Err(NotificationError::Connect(format!(
                "status {}",
                response.status()
            )));
        }

        Ok(Box::new(SseConnection {
            response,
            buffer: String::new(),
            pending: VecDeque::new(),
        }))
    }
}

struct SseConnection {
    response: reqwest::Response,
    buffer: String,
    pending: VecDeque<String>,
}

#[async_trait]
impl NotificationConnection for SseConnection {
    async fn next(&mut self) -> Result<Option<String>, NotificationError> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Ok(Some(event));
            }
            let chunk = self
                .response
                .chunk()
                .await
                .map_err(|e| NotificationError::Stream(e.to_string()))?;
            match chunk {
                Some(bytes) => {
                    self.buffer.push_str(&String::from_utf8_lossy(&bytes));
                    self.pending.extend(parse_sse_events(&mut self.buffer));
                }
                None => return Ok(None),
            }
        }
    }
}

/// Extract complete events from `buffer`, leaving any partial event behind
///
/// An event's payload is its `data:` lines joined by newlines. Events
/// without data (comments, keep-alives) are dropped.
pub fn parse_sse_events(buffer: &mut String) -> Vec<String> {
    let normalized = buffer.replace("\r\n", "\n");
    let mut events = Vec::new();
    let mut rest = normalized.as_str();

    while let Some(end) = rest.find("\n\n") {
        let block = &rest[..end];
        rest = &rest[end + 2..];

        let data: Vec<&str> = block
            .lines()
            .filter_map(|line| line.strip_prefix("data:"))
            .map(|value| value.strip_prefix(' ').unwrap_or(value))
            .collect();
        if !data.is_empty() {
            events.push(data.join("\n"));
        }
    }

    *buffer = rest.to_string();
    events
}
