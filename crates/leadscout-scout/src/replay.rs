//! A `ThreadSource` backed by a JSON capture file, replaying a previously
//! recorded surface. Used for demos and for exercising the orchestrator
//! end-to-end without a live browser session.

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::source::{
    names_match, ExtractedMessage, SourceError, ThreadHandle, ThreadSource,
};

#[derive(Debug, Deserialize)]
struct Capture {
    /// How many threads become visible per scroll, mimicking the lazy list
    /// of the live surface.
    #[serde(default = "default_page_size")]
    page_size: usize,
    threads: Vec<CapturedThread>,
}

fn default_page_size() -> usize {
    10
}

#[derive(Debug, Deserialize)]
struct CapturedThread {
    counterparty_id: String,
    display_name: String,
    #[serde(default)]
    profile_ref: String,
    #[serde(default)]
    messages: Vec<ExtractedMessage>,
}

/// Replays a capture file, revealing threads one page at a time.
#[derive(Debug)]
pub struct ReplaySource {
    capture: Capture,
    visible: Mutex<usize>,
}

impl ReplaySource {
    pub fn from_file(path: &Path) -> Result<Self, SourceError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, SourceError> {
        let capture: Capture = serde_json::from_str(raw)?;
        let visible = capture.page_size.min(capture.threads.len()).max(
            // An empty capture is still a valid (exhausted) surface.
            if capture.threads.is_empty() { 0 } else { 1 },
        );
        Ok(Self {
            capture,
            visible: Mutex::new(visible),
        })
    }

    fn find(&self, handle: &ThreadHandle) -> Option<&CapturedThread> {
        self.capture
            .threads
            .iter()
            .find(|t| t.counterparty_id == handle.counterparty_id)
    }
}

#[async_trait]
impl ThreadSource for ReplaySource {
    async fn list_handles(&self) -> Result<Vec<ThreadHandle>, SourceError> {
        let visible = *self.visible.lock().unwrap_or_else(|e| e.into_inner());
        Ok(self
            .capture
            .threads
            .iter()
            .take(visible)
            .map(|t| ThreadHandle {
                counterparty_id: t.counterparty_id.clone(),
                display_name: t.display_name.clone(),
                profile_ref: t.profile_ref.clone(),
            })
            .collect())
    }

    async fn open_and_wait_for_load(
        &self,
        handle: &ThreadHandle,
        expected_name: &str,
        _timeout: Duration,
    ) -> Result<bool, SourceError> {
        match self.find(handle) {
            Some(thread) => Ok(names_match(expected_name, &thread.display_name)),
            None => Err(SourceError::Unrecognized(format!(
                "no captured thread for {}",
                handle.counterparty_id
            ))),
        }
    }

    async fn read_messages(
        &self,
        handle: &ThreadHandle,
    ) -> Result<Vec<ExtractedMessage>, SourceError> {
        match self.find(handle) {
            Some(thread) => Ok(thread.messages.clone()),
            None => Err(SourceError::Unrecognized(format!(
                "no captured thread for {}",
                handle.counterparty_id
            ))),
        }
    }

    async fn advance_or_load_more(&self) -> Result<bool, SourceError> {
        let mut visible = self.visible.lock().unwrap_or_else(|e| e.into_inner());
        if *visible >= self.capture.threads.len() {
            return Ok(false);
        }
        *visible = (*visible + self.capture.page_size).min(self.capture.threads.len());
        Ok(true)
    }
}
