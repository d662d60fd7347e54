//! Ask the assistant one question.

use veil_assistant::{service_from_config, AssistantSession};
use veil_common::config::AppConfig;

pub async fn run(config: &AppConfig, message: String) -> anyhow::Result<()> {
    let service = service_from_config(&config.assistant)?;
    let mut session = AssistantSession::new(service, &config.assistant.greeting);

    let reply = session.send(&message).await?;
    println!("{}", reply.content);
    Ok(())
}
