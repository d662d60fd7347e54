//! Assistant backends.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use veil_common::config::AssistantConfig;
use veil_common::error::{VeilError, VeilResult};

/// A request/response assistant.
#[async_trait::async_trait]
pub trait AssistantService: Send + Sync {
    async fn send(&self, message: &str) -> VeilResult<String>;
}

#[derive(Debug, Serialize)]
struct AskRequest<'a> {
    message: &'a str,
}

#[derive(Debug, Deserialize)]
struct AskResponse {
    reply: String,
}

/// JSON over HTTP: `POST {"message": ...}` answered with `{"reply": ...}`.
pub struct HttpAssistant {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpAssistant {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> VeilResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VeilError::assistant(format!("http client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait::async_trait]
impl AssistantService for HttpAssistant {
    async fn send(&self, message: &str) -> VeilResult<String> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&AskRequest { message })
            .send()
            .await
            .map_err(|e| VeilError::assistant(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VeilError::assistant(format!(
                "endpoint returned {}: {}",
                status.as_u16(),
                body.trim()
            )));
        }

        let AskResponse { reply } = response
            .json()
            .await
            .map_err(|e| VeilError::assistant(format!("malformed reply: {e}")))?;
        Ok(reply)
    }
}

/// Offline responder that echoes the message after a short delay.
pub struct ScriptedAssistant {
    delay: Duration,
}

impl ScriptedAssistant {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for ScriptedAssistant {
    fn default() -> Self {
        Self::new(Duration::from_millis(1000))
    }
}

#[async_trait::async_trait]
impl AssistantService for ScriptedAssistant {
    async fn send(&self, message: &str) -> VeilResult<String> {
        tokio::time::sleep(self.delay).await;
        Ok(format!(
            "I received your message: \"{message}\". This panel stays out of any screen \
             you share. This is a simulated response."
        ))
    }
}

/// Pick the backend named by `config`.
pub fn service_from_config(config: &AssistantConfig) -> VeilResult<Box<dyn AssistantService>> {
    match config.endpoint.as_deref().map(str::trim) {
        Some(endpoint) if !endpoint.is_empty() => {
            tracing::info!(endpoint, "Using HTTP assistant");
            Ok(Box::new(HttpAssistant::new(
                endpoint,
                Duration::from_millis(config.timeout_ms.max(1)),
            )?))
        }
        _ => {
            tracing::info!("No assistant endpoint configured; using scripted replies");
            Ok(Box::new(ScriptedAssistant::default()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one HTTP response and return the raw request.
    async fn serve_once(status: &'static str, body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/ask", listener.local_addr().unwrap());
        let task = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request);
                if n == 0 || (text.contains("\r\n\r\n") && text.ends_with('}')) {
                    break;
                }
            }
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            String::from_utf8(request).unwrap()
        });
        (url, task)
    }

    #[tokio::test]
    async fn http_assistant_posts_message_and_reads_reply() {
        let (url, server) = serve_once("200 OK", r#"{"reply":"hello back"}"#).await;
        let assistant = HttpAssistant::new(url, Duration::from_secs(5)).unwrap();

        let reply = assistant.send("hello").await.unwrap();
        assert_eq!(reply, "hello back");

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /ask"));
        assert!(request.ends_with(r#"{"message":"hello"}"#));
    }

    #[tokio::test]
    async fn http_errors_surface_as_assistant_errors() {
        let (url, _server) = serve_once("503 Service Unavailable", r#"{"error":"busy"}"#).await;
        let assistant = HttpAssistant::new(url, Duration::from_secs(5)).unwrap();

        let result = assistant.send("hello").await;
        assert!(matches!(result, Err(VeilError::Assistant { message }) if message.contains("503")));
    }

    #[tokio::test]
    async fn scripted_assistant_echoes() {
        let assistant = ScriptedAssistant::new(Duration::ZERO);
        let reply = assistant.send("where is the build log?").await.unwrap();
        assert!(reply.contains("\"where is the build log?\""));
    }

    #[test]
    fn blank_endpoint_falls_back_to_scripted() {
        let config = AssistantConfig {
            endpoint: Some("  ".to_string()),
            ..AssistantConfig::default()
        };
        assert!(service_from_config(&config).is_ok());
    }
}
