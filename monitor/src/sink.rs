//! Notification delivery.
//!
//! The engine hands fully formed [`Notification`]s to a [`NotificationSink`]
//! together with a [`ThreadKey`] naming the day the message belongs to. How
//! threads are created, cached or rendered is entirely the sink's concern.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::types::Timestamp;

/// HTTP request timeout for the webhook sink.
const REQUEST_TIMEOUT_SECS: u64 = 15;

/// What a notification reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Death,
    PvpKill,
    DeathLoop,
    Build,
    Loot,
    Raid,
    AdminAccess,
    CheatFlag,
    Connect,
    Disconnect,
    DaySummary,
}

/// One labelled value inside a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub value: String,
}

/// A structured, pre-formatted message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<Field>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Timestamp>,
}

impl Notification {
    #[must_use]
    pub fn new(kind: NotificationKind, title: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            description: None,
            fields: Vec::new(),
            timestamp: None,
        }
    }

    #[must_use]
    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    #[must_use]
    pub fn field(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.fields.push(Field {
            name: name.into(),
            value: value.to_string(),
        });
        self
    }

    #[must_use]
    pub fn at(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Value of the first field called `name`.
    #[must_use]
    pub fn field_value(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value.as_str())
    }
}

/// Logical conversation thread: one per calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadKey(String);

impl ThreadKey {
    /// The thread for `date`, keyed by its ISO form.
    #[must_use]
    pub fn for_date(date: NaiveDate) -> Self {
        Self(date.format("%Y-%m-%d").to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ThreadKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors from delivering a notification.
#[derive(Error, Debug)]
pub enum SinkError {
    /// HTTP transport failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The receiver answered with a non-success status.
    #[error("rejected: {status} - {message}")]
    Rejected { status: u16, message: String },

    /// Serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The source id is not a valid header value.
    #[error("invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),
}

/// Destination for notifications.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Delivers `message` into `thread`.
    async fn send(&self, thread: &ThreadKey, message: &Notification) -> Result<(), SinkError>;
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    thread: &'a ThreadKey,
    source: &'a str,
    message: &'a Notification,
}

/// Posts each notification as JSON to a webhook URL.
#[derive(Debug)]
pub struct WebhookSink {
    client: Client,
    url: String,
    source_id: String,
}

impl WebhookSink {
    /// Creates a sink posting to `url`, tagging requests with `source_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(url: impl Into<String>, source_id: impl Into<String>) -> Result<Self, SinkError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
            source_id: source_id.into(),
        })
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    async fn send(&self, thread: &ThreadKey, message: &Notification) -> Result<(), SinkError> {
        let body = serde_json::to_string(&WebhookPayload {
            thread,
            source: &self.source_id,
            message,
        })?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("X-Source-Id", HeaderValue::from_str(&self.source_id)?);

        debug!(url = %self.url, thread = %thread, kind = ?message.kind, "Posting notification");

        let response = self
            .client
            .post(&self.url)
            .headers(headers)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let message = response.text().await.unwrap_or_default();
        Err(SinkError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

/// Writes notifications to the log instead of delivering them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn send(&self, thread: &ThreadKey, message: &Notification) -> Result<(), SinkError> {
        let fields = serde_json::to_string(&message.fields)?;
        info!(
            thread = %thread,
            kind = ?message.kind,
            title = %message.title,
            description = message.description.as_deref().unwrap_or(""),
            fields = %fields,
            "Notification"
        );
        Ok(())
    }
}

/// Collects notifications in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    sent: Mutex<Vec<(ThreadKey, Notification)>>,
    failing: Mutex<bool>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent send fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap_or_else(PoisonError::into_inner) = failing;
    }

    /// Everything delivered so far.
    #[must_use]
    pub fn sent(&self) -> Vec<(ThreadKey, Notification)> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Delivered notifications of one kind.
    #[must_use]
    pub fn of_kind(&self, kind: NotificationKind) -> Vec<Notification> {
        self.sent()
            .into_iter()
            .filter(|(_, n)| n.kind == kind)
            .map(|(_, n)| n)
            .collect()
    }

    /// Drains and returns everything delivered so far.
    pub fn take(&self) -> Vec<(ThreadKey, Notification)> {
        std::mem::take(&mut *self.sent.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

#[async_trait]
impl NotificationSink for MemorySink {
    async fn send(&self, thread: &ThreadKey, message: &Notification) -> Result<(), SinkError> {
        if *self.failing.lock().unwrap_or_else(PoisonError::into_inner) {
            return Err(SinkError::Rejected {
                status: 503,
                message: "sink unavailable".to_string(),
            });
        }
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((thread.clone(), message.clone()));
        Ok(())
    }
}
