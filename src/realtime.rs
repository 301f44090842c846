//! Fire-and-forget notification of applied edits to the real-time
//! collaboration service.
//!
//! Notifications run on the tokio runtime, are bounded by a timeout, and only
//! ever log their failures. A patch never waits for them.

use log::{debug, warn};
use serde::Serialize;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::config::{Config, RealtimeConfig};
use crate::document::DocumentId;
use crate::patch::CellEdit;

#[derive(Debug, Serialize, PartialEq)]
struct BatchEdit<'a> {
    row: i64,
    col: i64,
    value: &'a str,
}

#[derive(Debug, Serialize, PartialEq)]
struct BatchEditRequest<'a> {
    edits: Vec<BatchEdit<'a>>,
}

#[derive(Clone)]
pub struct RealtimeNotifier {
    target: Option<RealtimeConfig>,
    client: reqwest::Client,
    timeout: Duration,
}

impl RealtimeNotifier {
    pub fn new(target: Option<RealtimeConfig>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .no_proxy()
            .build()
            .unwrap_or_default();
        RealtimeNotifier {
            target,
            client,
            timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.realtime.clone(), config.realtime_timeout)
    }

    pub fn disabled() -> Self {
        Self::new(None, Duration::from_secs(2))
    }

    pub fn is_enabled(&self) -> bool {
        self.target.is_some()
    }

    pub fn batch_edit_url(&self, document: DocumentId) -> Option<String> {
        self.target
            .as_ref()
            .map(|t| format!("{}/spreadsheets/{}/batch_edit", t.base_url, document))
    }

    /// Posts `edits` for `document` in the background.
    ///
    /// Returns the spawned task, or `None` when nothing was sent: notifications
    /// are disabled, no edit has valid coordinates, or there is no tokio
    /// runtime to run on.
    pub fn notify_batch_edits(
        &self,
        document: DocumentId,
        edits: &[CellEdit],
    ) -> Option<JoinHandle<()>> {
        let target = self.target.as_ref()?;
        let url = self.batch_edit_url(document)?;

        let payload = BatchEditRequest {
            edits: edits
                .iter()
                .filter(|e| e.row >= 0 && e.col >= 0)
                .map(|e| BatchEdit {
                    row: e.row,
                    col: e.col,
                    value: &e.value,
                })
                .collect(),
        };
        if payload.edits.is_empty() {
            return None;
        }
        let body = match serde_json::to_vec(&payload) {
            Ok(body) => body,
            Err(e) => {
                warn!("realtime bridge: failed to encode edits: {}", e);
                return None;
            }
        };

        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                debug!("realtime bridge: no runtime, dropping notification for {}", document);
                return None;
            }
        };

        let request = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header("X-Internal-Secret", target.secret.as_str())
            .body(body);
        let timeout = self.timeout;

        Some(handle.spawn(async move {
            match tokio::time::timeout(timeout, request.send()).await {
                Ok(Ok(response)) if response.status().is_success() => {
                    debug!("realtime bridge: notified document {}", document);
                }
                Ok(Ok(response)) => {
                    warn!("realtime bridge: non-2xx response: {}", response.status());
                }
                Ok(Err(e)) => warn!("realtime bridge: request failed: {}", e),
                Err(_) => warn!("realtime bridge: timed out after {:?}", timeout),
            }
        }))
    }
}
