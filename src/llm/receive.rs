//! Response side of the chat-completion exchange.

use serde::Deserialize;

use super::GenerationError;

#[derive(Deserialize, Debug)]
pub struct ChatResponse {
    pub choices: Vec<Choice>,
}

#[derive(Deserialize, Debug)]
pub struct Choice {
    pub message: ResponseMessage,
}

#[derive(Deserialize, Debug)]
pub struct ResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
}

/// Pulls `choices[0].message.content` out of a raw body, trimmed.
pub fn extract_line(body: &str) -> Result<String, GenerationError> {
    let response: ChatResponse = serde_json::from_str(body)?;

    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or(GenerationError::MissingChoice)?;

    let content = choice
        .message
        .content
        .ok_or_else(|| GenerationError::Parse("message content is missing".to_string()))?;

    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(GenerationError::EmptyContent);
    }

    Ok(trimmed.to_string())
}
