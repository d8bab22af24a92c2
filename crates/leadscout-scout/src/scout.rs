use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use leadscout_bus::BusPublisher;
use leadscout_engine::{merge, project_lead, IncomingBatch};
use leadscout_provider::IntentClassifier;
use leadscout_schema::{
    BusMessage, Intent, Message, ScrapeMode, ScrapeSession, SessionStatus,
};
use leadscout_store::{Store, StoreError};
use rand::Rng;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::source::{ExtractedMessage, ThreadHandle, ThreadSource};

#[derive(Debug, Clone)]
pub struct ScoutConfig {
    /// How the operator's own messages are labeled on the surface.
    pub self_name: String,
    /// Attempts per handle before it is skipped.
    pub max_attempts: u32,
    /// Consecutive no-new-handle passes before the list counts as exhausted.
    pub max_no_progress: u32,
    /// Randomized pacing bounds between handles, in milliseconds.
    pub pace_min_ms: u64,
    pub pace_max_ms: u64,
    /// Bounded wait for chat-load confirmation.
    pub load_timeout: Duration,
    /// Concurrent classification calls within one handle's batch.
    pub classify_concurrency: usize,
}

impl Default for ScoutConfig {
    fn default() -> Self {
        Self {
            self_name: "You".to_string(),
            max_attempts: 2,
            max_no_progress: 3,
            pace_min_ms: 2000,
            pace_max_ms: 5000,
            load_timeout: Duration::from_secs(5),
            classify_concurrency: 4,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("cannot start a scrape while the session is {0:?}")]
    NotStartable(SessionStatus),
    #[error("nothing to resume; session is {0:?}")]
    NotResumable(SessionStatus),
    #[error("no scrape is running")]
    NotRunning,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Side-effect-free snapshot for the Status command.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub state: SessionStatus,
    pub mode: Option<ScrapeMode>,
    pub handles_processed: u32,
    pub positive_count: u32,
}

/// The scrape orchestrator. Commands acknowledge immediately; the loop runs
/// in a spawned task and reports progress on the bus.
#[derive(Clone)]
pub struct Scout {
    inner: Arc<ScoutInner>,
}

struct ScoutInner {
    source: Arc<dyn ThreadSource>,
    classifier: Arc<dyn IntentClassifier>,
    store: Arc<Store>,
    bus: BusPublisher,
    config: ScoutConfig,
    control: Mutex<Control>,
}

#[derive(Default)]
struct Control {
    cancel: Option<CancellationToken>,
    task: Option<JoinHandle<()>>,
}

impl Scout {
    /// Build a scout over the given collaborators. A session left in
    /// `scraping` by a crashed process has lost its context and is
    /// downgraded to `stopped` so it can be resumed.
    pub async fn new(
        source: Arc<dyn ThreadSource>,
        classifier: Arc<dyn IntentClassifier>,
        store: Arc<Store>,
        bus: BusPublisher,
        config: ScoutConfig,
    ) -> Result<Self, CommandError> {
        let mut session = store.load_session().await?;
        if session.status == SessionStatus::Scraping {
            warn!("found orphaned scraping session, downgrading to stopped");
            session.status = SessionStatus::Stopped;
            store.save_session(&session).await?;
        }

        Ok(Self {
            inner: Arc::new(ScoutInner {
                source,
                classifier,
                store,
                bus,
                config,
                control: Mutex::new(Control::default()),
            }),
        })
    }

    /// Begin a fresh scraping pass. Legal only from idle or completed.
    /// `rescan` clears the dedup skip-list while keeping stored data.
    pub async fn start(&self, mode: ScrapeMode, rescan: bool) -> Result<(), CommandError> {
        let mut control = self.inner.control.lock().await;
        let mut session = self.inner.store.load_session().await?;
        if !session.can_start() {
            return Err(CommandError::NotStartable(session.status));
        }

        if rescan {
            session.resume_cursor.clear();
        }
        session.status = SessionStatus::Scraping;
        session.mode = Some(mode);
        session.handles_processed = 0;
        session.positive_count = 0;
        self.inner.store.save_session(&session).await?;

        let trace_id = Uuid::new_v4();
        let _ = self
            .inner
            .bus
            .publish(BusMessage::ScrapeStarted { trace_id, mode, rescan })
            .await;
        info!(?mode, rescan, "scrape started");

        self.spawn_loop(&mut control, mode, session);
        Ok(())
    }

    /// Pick up a stopped pass where it left off, reusing mode and cursor.
    pub async fn resume(&self) -> Result<(), CommandError> {
        let mut control = self.inner.control.lock().await;
        let mut session = self.inner.store.load_session().await?;
        if !session.can_resume() {
            return Err(CommandError::NotResumable(session.status));
        }
        let mode = session
            .mode
            .ok_or(CommandError::NotResumable(session.status))?;

        session.status = SessionStatus::Scraping;
        self.inner.store.save_session(&session).await?;

        let _ = self
            .inner
            .bus
            .publish(BusMessage::ScrapeResumed {
                trace_id: Uuid::new_v4(),
                mode,
            })
            .await;
        info!(?mode, "scrape resumed");

        self.spawn_loop(&mut control, mode, session);
        Ok(())
    }

    /// Cooperative stop: the flag is observed at the top of each iteration
    /// and between handles, so the in-flight handle finishes persisting.
    pub async fn stop(&self) -> Result<(), CommandError> {
        let control = self.inner.control.lock().await;
        let running = control
            .task
            .as_ref()
            .map(|task| !task.is_finished())
            .unwrap_or(false);
        match &control.cancel {
            Some(token) if running && !token.is_cancelled() => {
                token.cancel();
                info!("stop requested");
                Ok(())
            }
            _ => Err(CommandError::NotRunning),
        }
    }

    /// Current state, mode and progress counters. No side effects.
    pub async fn status(&self) -> Result<StatusReport, CommandError> {
        let session = self.inner.store.load_session().await?;
        Ok(StatusReport {
            state: session.status,
            mode: session.mode,
            handles_processed: session.handles_processed,
            positive_count: session.positive_count,
        })
    }

    fn spawn_loop(&self, control: &mut Control, mode: ScrapeMode, session: ScrapeSession) {
        let token = CancellationToken::new();
        let inner = self.inner.clone();
        let loop_token = token.clone();
        let task = tokio::spawn(async move {
            run_loop(inner, mode, session, loop_token).await;
        });
        control.cancel = Some(token);
        control.task = Some(task);
    }
}

enum HandleFailure {
    /// Retries exhausted or nothing usable to merge; the handle is marked
    /// seen and the loop advances.
    Skipped(String),
    /// The store rejected the write; the handle is left unmarked so the
    /// next run retries it.
    Persistence(StoreError),
}

struct HandleOutcome {
    new_messages: u32,
    has_positive_intent: bool,
}

async fn run_loop(
    inner: Arc<ScoutInner>,
    mode: ScrapeMode,
    mut session: ScrapeSession,
    token: CancellationToken,
) {
    let mut no_progress = 0u32;

    loop {
        if token.is_cancelled() {
            finish(&inner, &mut session, SessionStatus::Stopped).await;
            return;
        }

        let handles = match inner.source.list_handles().await {
            Ok(handles) => handles,
            Err(e) => {
                error!(error = %e, "listing handles failed, stopping session");
                let _ = inner
                    .bus
                    .publish(BusMessage::log(format!("extraction failed: {e}")))
                    .await;
                finish(&inner, &mut session, SessionStatus::Stopped).await;
                return;
            }
        };

        if handles.is_empty() {
            // Not the natural end of a list: the surface showed us nothing
            // at all, so leave the session resumable.
            warn!("no thread handles observable, stopping session");
            let _ = inner
                .bus
                .publish(BusMessage::log("no conversations found on surface"))
                .await;
            finish(&inner, &mut session, SessionStatus::Stopped).await;
            return;
        }

        let unseen: Vec<ThreadHandle> = handles
            .into_iter()
            .filter(|h| !session.resume_cursor.contains(&h.counterparty_id))
            .collect();

        if unseen.is_empty() {
            no_progress += 1;
            if no_progress < inner.config.max_no_progress {
                // Keep scrolling; handles may still be rendering in.
                if let Err(e) = inner.source.advance_or_load_more().await {
                    error!(error = %e, "advance failed, stopping session");
                    finish(&inner, &mut session, SessionStatus::Stopped).await;
                    return;
                }
                pace(&inner.config).await;
                continue;
            }
            // Several stalled passes: one more probe decides between a
            // load-more affordance and the natural end of the list.
            match inner.source.advance_or_load_more().await {
                Ok(true) => {
                    no_progress = 0;
                    pace(&inner.config).await;
                    continue;
                }
                Ok(false) => {
                    finish(&inner, &mut session, SessionStatus::Completed).await;
                    return;
                }
                Err(e) => {
                    error!(error = %e, "advance failed, stopping session");
                    finish(&inner, &mut session, SessionStatus::Stopped).await;
                    return;
                }
            }
        }
        no_progress = 0;

        for handle in unseen {
            if token.is_cancelled() {
                finish(&inner, &mut session, SessionStatus::Stopped).await;
                return;
            }

            match process_handle(&inner, &handle, mode).await {
                Ok(outcome) => {
                    session.resume_cursor.insert(handle.counterparty_id.clone());
                    session.handles_processed += 1;
                    if outcome.has_positive_intent {
                        session.positive_count += 1;
                    }
                    if let Err(e) = inner.store.save_session(&session).await {
                        error!(error = %e, "failed to persist session progress");
                    }
                    let _ = inner
                        .bus
                        .publish(BusMessage::HandleProcessed {
                            counterparty_id: handle.counterparty_id.clone(),
                            new_messages: outcome.new_messages,
                            has_positive_intent: outcome.has_positive_intent,
                        })
                        .await;
                }
                Err(HandleFailure::Skipped(reason)) => {
                    warn!(
                        counterparty_id = %handle.counterparty_id,
                        reason = %reason,
                        "skipping handle"
                    );
                    session.resume_cursor.insert(handle.counterparty_id.clone());
                    if let Err(e) = inner.store.save_session(&session).await {
                        error!(error = %e, "failed to persist session progress");
                    }
                    let _ = inner
                        .bus
                        .publish(BusMessage::HandleSkipped {
                            counterparty_id: handle.counterparty_id.clone(),
                            reason,
                        })
                        .await;
                }
                Err(HandleFailure::Persistence(e)) => {
                    // Handle stays out of the cursor so the next run
                    // retries it; the session itself keeps going.
                    error!(
                        counterparty_id = %handle.counterparty_id,
                        error = %e,
                        "persistence failed for handle"
                    );
                    let _ = inner
                        .bus
                        .publish(BusMessage::log(format!(
                            "persistence failed for {}: {e}",
                            handle.counterparty_id
                        )))
                        .await;
                }
            }

            pace(&inner.config).await;
        }

        if let Err(e) = inner.source.advance_or_load_more().await {
            error!(error = %e, "advance failed, stopping session");
            finish(&inner, &mut session, SessionStatus::Stopped).await;
            return;
        }
    }
}

/// Extract, classify and persist a single handle, with bounded retries.
/// One handle at a time: the read-merge-write against the store must never
/// interleave with another handle's.
async fn process_handle(
    inner: &ScoutInner,
    handle: &ThreadHandle,
    mode: ScrapeMode,
) -> Result<HandleOutcome, HandleFailure> {
    let config = &inner.config;

    let mut extracted: Option<Vec<ExtractedMessage>> = None;
    for attempt in 1..=config.max_attempts {
        // Leads mode reads the visible summary without opening the thread.
        if mode == ScrapeMode::Conversations {
            match inner
                .source
                .open_and_wait_for_load(handle, &handle.display_name, config.load_timeout)
                .await
            {
                Ok(true) => {}
                Ok(false) => {
                    warn!(
                        counterparty_id = %handle.counterparty_id,
                        attempt,
                        "load confirmation timed out"
                    );
                    continue;
                }
                Err(e) => {
                    warn!(
                        counterparty_id = %handle.counterparty_id,
                        attempt,
                        error = %e,
                        "open failed"
                    );
                    continue;
                }
            }
        }

        match inner.source.read_messages(handle).await {
            Ok(messages) if !messages.is_empty() => {
                extracted = Some(messages);
                break;
            }
            Ok(_) => {
                warn!(
                    counterparty_id = %handle.counterparty_id,
                    attempt,
                    "extraction yielded no messages"
                );
            }
            Err(e) => {
                warn!(
                    counterparty_id = %handle.counterparty_id,
                    attempt,
                    error = %e,
                    "extraction failed"
                );
            }
        }
    }

    let extracted = extracted.ok_or_else(|| {
        HandleFailure::Skipped(format!(
            "no readable messages after {} attempts",
            config.max_attempts
        ))
    })?;

    let batch = match mode {
        ScrapeMode::Conversations => extracted,
        // Leads mode only judges the visible preview: the last message the
        // counterparty sent.
        ScrapeMode::Leads => extracted
            .into_iter()
            .filter(|m| m.sender != config.self_name)
            .last()
            .into_iter()
            .collect(),
    };
    if batch.is_empty() {
        return Err(HandleFailure::Skipped(
            "no counterparty messages to classify".to_string(),
        ));
    }

    let classified = classify_batch(inner, batch).await;

    let existing = inner
        .store
        .get_conversation(&handle.counterparty_id)
        .await
        .map_err(HandleFailure::Persistence)?;
    let before = existing.as_ref().map(|c| c.messages.len()).unwrap_or(0);

    let merged = merge(
        existing.as_ref(),
        IncomingBatch {
            counterparty_id: handle.counterparty_id.clone(),
            profile_ref: handle.profile_ref.clone(),
            messages: classified,
        },
        &config.self_name,
    );
    let new_messages = (merged.messages.len() - before) as u32;

    inner
        .store
        .put_conversation(&merged)
        .await
        .map_err(HandleFailure::Persistence)?;

    if let Some(lead) = project_lead(&merged, &config.self_name) {
        inner
            .store
            .upsert_lead(&lead)
            .await
            .map_err(HandleFailure::Persistence)?;
        let _ = inner
            .bus
            .publish(BusMessage::LeadUpserted {
                counterparty_id: lead.counterparty_id.clone(),
                positive_message_count: lead.positive_message_count,
            })
            .await;
    }

    Ok(HandleOutcome {
        new_messages,
        has_positive_intent: merged.has_positive_intent,
    })
}

/// Classify a batch with bounded concurrency, preserving order. Own messages
/// are never sent to the provider; a failed call degrades that message to
/// neutral instead of discarding it.
async fn classify_batch(inner: &ScoutInner, batch: Vec<ExtractedMessage>) -> Vec<Message> {
    let self_name = inner.config.self_name.clone();
    stream::iter(batch.into_iter().map(|m| {
        let classifier = inner.classifier.clone();
        let bus = inner.bus.clone();
        let self_name = self_name.clone();
        async move {
            let intent = if m.sender == self_name {
                Intent::Unset
            } else {
                match classifier.classify(&m.text).await {
                    Ok(c) => c.intent,
                    Err(e) => {
                        warn!(error = %e, "classification failed, degrading to neutral");
                        let _ = bus
                            .publish(BusMessage::log(format!("classification failed: {e}")))
                            .await;
                        Intent::Neutral
                    }
                }
            };
            Message {
                sender: m.sender,
                text: m.text,
                timestamp: m.timestamp,
                intent,
            }
        }
    }))
    .buffered(inner.config.classify_concurrency.max(1))
    .collect()
    .await
}

async fn finish(inner: &Arc<ScoutInner>, session: &mut ScrapeSession, status: SessionStatus) {
    session.status = status;
    if let Err(e) = inner.store.save_session(session).await {
        error!(error = %e, "failed to persist terminal session state");
    }

    let trace_id = Uuid::new_v4();
    let event = match status {
        SessionStatus::Completed => BusMessage::ScrapeCompleted {
            trace_id,
            handles_processed: session.handles_processed,
            positive_count: session.positive_count,
        },
        _ => BusMessage::ScrapeStopped {
            trace_id,
            handles_processed: session.handles_processed,
        },
    };
    let _ = inner.bus.publish(event).await;
    info!(?status, handles = session.handles_processed, "scrape finished");
}

/// Non-uniform delay between handles, so the pass does not tick like a
/// metronome against the target surface.
async fn pace(config: &ScoutConfig) {
    let ms = if config.pace_max_ms <= config.pace_min_ms {
        config.pace_min_ms
    } else {
        rand::thread_rng().gen_range(config.pace_min_ms..=config.pace_max_ms)
    };
    if ms > 0 {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}
