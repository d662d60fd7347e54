//! Capture session management.
//!
//! One session at a time. Every session ends in `Stopped` or
//! `Failed(reason)`, and its host stream is released exactly once.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use veil_bridge::{CaptureBridge, StatusEvent};
use veil_common::error::{VeilError, VeilResult};
use veil_overlay::OverlayManager;

use crate::stream::StreamHandle;

/// Identifier of one capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// State of a capture session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "lowercase")]
pub enum SessionState {
    /// No session has run yet.
    Idle,
    /// Waiting for the host to acquire the stream.
    Requesting,
    /// Stream held, overlay exclusion asserted.
    Active,
    /// Stream release in flight.
    Stopping,
    Stopped,
    /// Ended without a clean stop. The reason is the host's error string
    /// or the error kind.
    Failed(String),
}

impl SessionState {
    /// Requesting, Active or Stopping.
    pub fn is_live(&self) -> bool {
        matches!(
            self,
            SessionState::Requesting | SessionState::Active | SessionState::Stopping
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Stopped | SessionState::Failed(_))
    }
}

/// Published view of the current (or last) session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub id: Option<SessionId>,
    pub source_id: Option<String>,
    #[serde(flatten)]
    pub state: SessionState,
}

impl SessionSnapshot {
    fn idle() -> Self {
        Self {
            id: None,
            source_id: None,
            state: SessionState::Idle,
        }
    }
}

#[derive(Debug)]
struct SessionRecord {
    id: SessionId,
    source_id: String,
    state: SessionState,
    stream: Option<StreamHandle>,
    cancel_requested: bool,
    /// Status event that arrived while the request was still in flight.
    pending_status: Option<StatusEvent>,
}

impl SessionRecord {
    /// Terminal outcome owed to a cancel or to a status event seen while
    /// `Requesting`. A cancel wins.
    fn interruption(&self) -> Option<SessionState> {
        if self.cancel_requested {
            return Some(SessionState::Stopped);
        }
        self.pending_status.as_ref().map(status_outcome)
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: Some(self.id),
            source_id: Some(self.source_id.clone()),
            state: self.state.clone(),
        }
    }
}

enum EndAction {
    Done(SessionState),
    Wait(SessionId),
    Release(SessionId, Option<StreamHandle>),
}

/// Drives the capture lifecycle over a [`CaptureBridge`] and keeps the
/// overlay's exclusion in step with it.
pub struct CaptureController {
    bridge: CaptureBridge,
    overlay: Arc<OverlayManager>,
    session: Mutex<Option<SessionRecord>>,
    state_tx: watch::Sender<SessionSnapshot>,
    next_id: AtomicU64,
}

impl CaptureController {
    pub fn new(bridge: CaptureBridge, overlay: Arc<OverlayManager>) -> Self {
        let (state_tx, _) = watch::channel(SessionSnapshot::idle());
        Self {
            bridge,
            overlay,
            session: Mutex::new(None),
            state_tx,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn bridge(&self) -> &CaptureBridge {
        &self.bridge
    }

    pub fn overlay(&self) -> &Arc<OverlayManager> {
        &self.overlay
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        self.state_tx.borrow().state.clone()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state_tx.borrow().clone()
    }

    /// Observe every state transition.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state_tx.subscribe()
    }

    /// Start sharing `source_id`.
    ///
    /// Fails with `SessionAlreadyActive` while another session is live. A
    /// host refusal leaves the session in `Failed(reason)` and is returned.
    /// If [`end_capture`](Self::end_capture) arrives while the request is in
    /// flight, the acquired stream is released immediately and the session
    /// ends `Stopped`.
    ///
    /// The request runs on a task owned by the controller, so dropping the
    /// returned future does not leave the session stuck in `Requesting`.
    pub async fn begin_capture(self: &Arc<Self>, source_id: &str) -> VeilResult<SessionId> {
        let id = {
            let mut session = self.lock();
            if let Some(current) = session.as_ref().filter(|s| s.state.is_live()) {
                tracing::warn!(
                    session = %current.id,
                    state = ?current.state,
                    "Capture already in progress"
                );
                return Err(VeilError::SessionAlreadyActive);
            }
            let id = SessionId(self.next_id.fetch_add(1, Ordering::Relaxed));
            let record = SessionRecord {
                id,
                source_id: source_id.to_string(),
                state: SessionState::Requesting,
                stream: None,
                cancel_requested: false,
                pending_status: None,
            };
            self.publish(&record);
            *session = Some(record);
            id
        };

        tracing::info!(session = %id, source = source_id, "Requesting capture");

        let controller = Arc::clone(self);
        let source_id = source_id.to_string();
        let request = tokio::spawn(async move { controller.settle_request(id, &source_id).await });

        match request.await {
            Ok(result) => result.map(|()| id),
            Err(e) => {
                tracing::error!(session = %id, error = %e, "Capture request task failed");
                self.sweep_late_acquisition(id);
                self.finish(id, SessionState::Failed("RequestAborted".to_string()));
                Err(VeilError::Other(anyhow::anyhow!("capture request task failed: {e}")))
            }
        }
    }

    /// Acquire the stream, assert exclusion and publish `Active`, unless the
    /// session was cancelled or its source went away in the meantime.
    async fn settle_request(&self, id: SessionId, source_id: &str) -> VeilResult<()> {
        if let Err(e) = self.bridge.begin_capture(source_id).await {
            if matches!(e, VeilError::HostUnavailable { .. }) {
                self.sweep_late_acquisition(id);
            }
            tracing::warn!(session = %id, error = %e, "Capture request failed");
            self.finish(id, SessionState::Failed(e.reason()));
            return Err(e);
        }
        let handle = StreamHandle::acquired(id, source_id);

        if let Some(outcome) = self.interrupted(id) {
            tracing::info!(session = %id, outcome = ?outcome, "Capture interrupted while requesting");
            self.set_state(id, SessionState::Stopping);
            self.release(id, Some(handle), outcome).await;
            return Ok(());
        }

        // Exclusion must be confirmed before the session is observable as Active.
        if let Err(e) = self.overlay.enter_capture().await {
            tracing::warn!(session = %id, error = %e, "Overlay hidden for this session");
        }

        let leftover = {
            let mut session = self.lock();
            match session.as_mut() {
                Some(record) if record.id == id => match record.interruption() {
                    None => {
                        record.state = SessionState::Active;
                        record.stream = Some(handle);
                        self.publish(record);
                        None
                    }
                    Some(outcome) => {
                        record.state = SessionState::Stopping;
                        self.publish(record);
                        Some((handle, outcome))
                    }
                },
                _ => Some((handle, SessionState::Stopped)),
            }
        };

        if let Some((handle, outcome)) = leftover {
            tracing::info!(session = %id, outcome = ?outcome, "Capture interrupted before activation");
            self.overlay.leave_capture().await;
            self.release(id, Some(handle), outcome).await;
            return Ok(());
        }

        tracing::info!(session = %id, source = source_id, "Capture active");
        Ok(())
    }

    /// Stop the current session and return its terminal state.
    ///
    /// With no live session this is a no-op. Concurrent callers all wait
    /// for the same release.
    pub async fn end_capture(&self) -> VeilResult<SessionState> {
        let action = {
            let mut session = self.lock();
            match session.as_mut() {
                None => EndAction::Done(SessionState::Idle),
                Some(record) => match record.state {
                    SessionState::Requesting => {
                        record.cancel_requested = true;
                        EndAction::Wait(record.id)
                    }
                    SessionState::Stopping => EndAction::Wait(record.id),
                    SessionState::Active => {
                        record.state = SessionState::Stopping;
                        self.publish(record);
                        EndAction::Release(record.id, record.stream.take())
                    }
                    ref other => EndAction::Done(other.clone()),
                },
            }
        };

        match action {
            EndAction::Done(state) => {
                tracing::debug!(state = ?state, "No live capture session to end");
                Ok(state)
            }
            EndAction::Wait(id) => self.wait_for_end(id).await,
            EndAction::Release(id, handle) => {
                tracing::info!(session = %id, "Stopping capture");
                self.overlay.leave_capture().await;
                Ok(self.release(id, handle, SessionState::Stopped).await)
            }
        }
    }

    /// Apply a `screen-share-status` notification.
    ///
    /// Only events for the current session's source are acted on. An event
    /// that arrives while the request is still in flight is kept and applied
    /// as soon as the stream is confirmed.
    pub async fn handle_status(&self, event: StatusEvent) {
        let taken = {
            let mut session = self.lock();
            match session.as_mut() {
                Some(record) if record.source_id == event.source_id() => match record.state {
                    SessionState::Active => {
                        record.state = SessionState::Stopping;
                        self.publish(record);
                        Some((record.id, record.stream.take()))
                    }
                    SessionState::Requesting => {
                        tracing::info!(session = %record.id, ?event, "Status arrived before activation");
                        if record.pending_status.is_none() {
                            record.pending_status = Some(event);
                        }
                        return;
                    }
                    _ => None,
                },
                _ => None,
            }
        };

        let Some((id, handle)) = taken else {
            tracing::debug!(source = event.source_id(), "Ignoring status for inactive source");
            return;
        };

        match &event {
            StatusEvent::SourceLost { source_id } => {
                tracing::warn!(session = %id, source = %source_id, "Captured source went away");
            }
            StatusEvent::StreamEnded { source_id, .. } => {
                tracing::warn!(session = %id, source = %source_id, "Stream ended");
            }
        }

        self.overlay.leave_capture().await;
        self.release(id, handle, status_outcome(&event)).await;
    }

    /// Feed host status notifications into [`handle_status`](Self::handle_status).
    ///
    /// The listener holds a weak reference and exits once the controller
    /// is dropped or the bridge closes.
    pub fn spawn_status_listener(self: &Arc<Self>) -> VeilResult<JoinHandle<()>> {
        let mut events = self.bridge.status_events()?;
        let controller: Weak<Self> = Arc::downgrade(self);

        Ok(tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let Some(controller) = controller.upgrade() else {
                    break;
                };
                controller.handle_status(event).await;
            }
            tracing::debug!("Status listener stopped");
        }))
    }

    // Internal helpers

    fn lock(&self) -> MutexGuard<'_, Option<SessionRecord>> {
        self.session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish(&self, record: &SessionRecord) {
        tracing::debug!(session = %record.id, state = ?record.state, "Session state");
        self.state_tx.send_replace(record.snapshot());
    }

    fn set_state(&self, id: SessionId, state: SessionState) {
        let mut session = self.lock();
        if let Some(record) = session.as_mut().filter(|r| r.id == id) {
            record.state = state;
            self.publish(record);
        }
    }

    fn finish(&self, id: SessionId, state: SessionState) {
        self.set_state(id, state);
    }

    fn interrupted(&self, id: SessionId) -> Option<SessionState> {
        self.lock()
            .as_ref()
            .filter(|r| r.id == id)
            .and_then(SessionRecord::interruption)
    }

    /// Release `handle` and move the session to its terminal state.
    ///
    /// `outcome` is used when the release succeeds. A failed release turns a
    /// clean stop into `Failed`; an already-failed outcome keeps its reason.
    async fn release(
        &self,
        id: SessionId,
        handle: Option<StreamHandle>,
        outcome: SessionState,
    ) -> SessionState {
        let state = match handle {
            Some(handle) => match handle.release(&self.bridge).await {
                Ok(duration_secs) => {
                    tracing::info!(session = %id, duration_secs, "Capture stream released");
                    outcome
                }
                Err(e) => {
                    tracing::warn!(session = %id, error = %e, "Stream release failed");
                    match outcome {
                        SessionState::Failed(reason) => SessionState::Failed(reason),
                        _ => SessionState::Failed(e.reason()),
                    }
                }
            },
            None => {
                tracing::error!(session = %id, "Active session had no stream handle");
                SessionState::Failed("NoStreamHandle".to_string())
            }
        };
        self.finish(id, state.clone());
        state
    }

    async fn wait_for_end(&self, id: SessionId) -> VeilResult<SessionState> {
        let mut updates = self.state_tx.subscribe();
        let snapshot = updates
            .wait_for(|s| s.id != Some(id) || !s.state.is_live())
            .await
            .map_err(|_| VeilError::Other(anyhow::anyhow!("session state channel closed")))?;
        Ok(snapshot.state.clone())
    }

    /// A timed-out request may still complete on the host. Queue a release
    /// behind it so a late acquisition is not left running.
    fn sweep_late_acquisition(&self, id: SessionId) {
        let bridge = self.bridge.clone();
        tokio::spawn(async move {
            match bridge.end_capture().await {
                Ok(()) => tracing::debug!(session = %id, "Late acquisition swept"),
                Err(e) => tracing::debug!(session = %id, error = %e, "Sweep after timeout failed"),
            }
        });
    }
}

/// Terminal state a host status event leads to.
fn status_outcome(event: &StatusEvent) -> SessionState {
    match event {
        StatusEvent::SourceLost { .. } => SessionState::Stopped,
        StatusEvent::StreamEnded { reason, .. } => {
            SessionState::Failed(reason.clone().unwrap_or_else(|| "StreamEnded".to_string()))
        }
    }
}
