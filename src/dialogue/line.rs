use serde::{Deserialize, Serialize};
use std::fmt;

/// One line of NPC text. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DialogueLine(String);

impl DialogueLine {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Trims generator output; `None` when nothing printable is left.
    pub fn from_generated(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for DialogueLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DialogueLine {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DialogueLine {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for DialogueLine {
    fn from(text: String) -> Self {
        Self(text)
    }
}

impl PartialEq<&str> for DialogueLine {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}
