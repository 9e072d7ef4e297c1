//! The persona prompt pair re-sent verbatim on every generation call.

use serde::{Deserialize, Serialize};

use super::send::Message;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a harsh, rude and short-tempered street NPC. \
When someone bumps into you, react with one or two cutting, dismissive and irritated sentences. \
Do not be polite, do not ramble, be direct. Do not swear.";

pub const DEFAULT_USER_PROMPT: &str = "A drunk just bumped into you. \
Give them a harsh, irritated reply in one or two sentences.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub system_prompt: String,
    pub user_prompt: String,
}

impl Default for GenerationRequest {
    fn default() -> Self {
        Self::new(DEFAULT_SYSTEM_PROMPT, DEFAULT_USER_PROMPT)
    }
}

impl GenerationRequest {
    pub fn new(system_prompt: impl Into<String>, user_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
        }
    }

    pub fn messages(&self) -> Vec<Message> {
        vec![
            Message {
                role: "system".to_string(),
                content: self.system_prompt.clone(),
            },
            Message {
                role: "user".to_string(),
                content: self.user_prompt.clone(),
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_keep_system_then_user_order() {
        let request = GenerationRequest::new("persona", "scenario");
        let messages = request.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[0].content, "persona");
        assert_eq!(messages[1].role, "user");
        assert_eq!(messages[1].content, "scenario");
    }

    #[test]
    fn default_prompts_describe_the_npc() {
        let request = GenerationRequest::default();
        assert!(request.system_prompt.contains("street NPC"));
        assert!(request.user_prompt.contains("bumped into you"));
    }
}
