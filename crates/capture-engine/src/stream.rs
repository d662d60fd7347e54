//! Move-only token for a host-acquired stream.

use veil_bridge::CaptureBridge;
use veil_common::clock::SessionClock;
use veil_common::error::VeilResult;

use crate::session::SessionId;

/// Proof that the host holds a stream for this session.
///
/// Not `Clone`. [`StreamHandle::release`] consumes it, so a stream can be
/// released at most once.
#[derive(Debug)]
#[must_use = "a stream handle must be released"]
pub struct StreamHandle {
    session: SessionId,
    source_id: String,
    clock: SessionClock,
    released: bool,
}

impl StreamHandle {
    pub(crate) fn acquired(session: SessionId, source_id: impl Into<String>) -> Self {
        Self {
            session,
            source_id: source_id.into(),
            clock: SessionClock::start(),
            released: false,
        }
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    /// Wall-clock time the host confirmed the stream (RFC 3339).
    pub fn started_at(&self) -> &str {
        self.clock.epoch_wall()
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.clock.elapsed_secs()
    }

    /// Ask the host to release the stream. Returns the session duration.
    pub async fn release(mut self, bridge: &CaptureBridge) -> VeilResult<f64> {
        self.released = true;
        let elapsed = self.clock.elapsed_secs();
        bridge.end_capture().await?;
        Ok(elapsed)
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        if !self.released {
            tracing::error!(
                session = %self.session,
                source = %self.source_id,
                "Stream handle dropped without release"
            );
        }
    }
}
