//! `chat` command handler: one prompt, one answer.

use anyhow::Result;
use bridge_core::{ChatMessage, ChatRequest};

use crate::bootstrap::CliContext;

pub async fn execute(
    ctx: &CliContext,
    model: String,
    prompt: &[String],
    system: Option<String>,
) -> Result<()> {
    let request = build_request(model, prompt, system);
    let response = ctx.runtime.chat(request).await?;

    println!("{}", response.content.trim_end());
    eprintln!(
        "\n[{}: {} prompt + {} completion tokens]",
        response.model, response.tokens.prompt, response.tokens.completion
    );
    Ok(())
}

fn build_request(model: String, prompt: &[String], system: Option<String>) -> ChatRequest {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = system.filter(|s| !s.trim().is_empty()) {
        messages.push(ChatMessage::new("system", system));
    }
    messages.push(ChatMessage::user(prompt.join(" ")));
    ChatRequest {
        model,
        messages,
        options: None,
    }
}
