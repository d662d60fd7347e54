//! Chat transcript shown in the overlay.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use veil_common::error::{VeilError, VeilResult};

use crate::service::AssistantService;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
    pub at: DateTime<Utc>,
}

impl ChatTurn {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            at: Utc::now(),
        }
    }
}

/// Transcript plus the service answering it.
///
/// Independent of capture state; the overlay shows it whether or not a
/// share is running.
pub struct AssistantSession {
    service: Box<dyn AssistantService>,
    transcript: Vec<ChatTurn>,
}

impl AssistantSession {
    pub fn new(service: Box<dyn AssistantService>, greeting: &str) -> Self {
        let mut transcript = Vec::new();
        if !greeting.trim().is_empty() {
            transcript.push(ChatTurn::new(Role::Assistant, greeting));
        }
        Self {
            service,
            transcript,
        }
    }

    pub fn transcript(&self) -> &[ChatTurn] {
        &self.transcript
    }

    /// Append the user's message, ask the service, append its reply.
    ///
    /// Blank input is rejected and not recorded. When the service fails the
    /// user turn stays in the transcript and the error is returned.
    pub async fn send(&mut self, message: &str) -> VeilResult<&ChatTurn> {
        let message = message.trim();
        if message.is_empty() {
            return Err(VeilError::assistant("message is empty"));
        }

        self.transcript.push(ChatTurn::new(Role::User, message));
        tracing::debug!(turns = self.transcript.len(), "Asking assistant");

        let reply = self.service.send(message).await.map_err(|e| {
            tracing::warn!(error = %e, "Assistant did not answer");
            e
        })?;

        self.transcript.push(ChatTurn::new(Role::Assistant, reply));
        Ok(&self.transcript[self.transcript.len() - 1])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use crate::service::ScriptedAssistant;

    struct Unreachable;

    #[async_trait::async_trait]
    impl AssistantService for Unreachable {
        async fn send(&self, _message: &str) -> VeilResult<String> {
            Err(VeilError::assistant("connection refused"))
        }
    }

    #[tokio::test]
    async fn transcript_opens_with_greeting_and_records_turns() {
        let mut session = AssistantSession::new(
            Box::new(ScriptedAssistant::new(Duration::ZERO)),
            "Hi there!",
        );
        assert_eq!(session.transcript().len(), 1);
        assert_eq!(session.transcript()[0].role, Role::Assistant);

        let reply = session.send("  summarise this diff  ").await.unwrap();
        assert_eq!(reply.role, Role::Assistant);

        let turns = session.transcript();
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[1].role, Role::User);
        assert_eq!(turns[1].content, "summarise this diff");
    }

    #[tokio::test]
    async fn blank_input_is_not_sent() {
        let mut session = AssistantSession::new(Box::new(Unreachable), "");
        assert!(session.send(" \n\t").await.is_err());
        assert!(session.transcript().is_empty());
    }

    #[tokio::test]
    async fn service_failure_keeps_the_question() {
        let mut session = AssistantSession::new(Box::new(Unreachable), "hello");
        let result = session.send("are you there?").await;
        assert!(matches!(result, Err(VeilError::Assistant { .. })));
        assert_eq!(session.transcript().len(), 2);
        assert_eq!(session.transcript()[1].role, Role::User);
    }
}
