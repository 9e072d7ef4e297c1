//! Canned lines used when every dynamic source comes up empty.

use rand::Rng;
use thiserror::Error;

use super::DialogueLine;

pub const DEFAULT_FALLBACK_LINES: [&str; 5] = [
    "Hey! Watch where you're going!",
    "Open your eyes!",
    "Where do you think you're looking?",
    "Get out of my way!",
    "Say sorry!",
];

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("fallback pool needs at least one non-empty line")]
    Empty,
}

/// Never empty, so [`pick`](Self::pick) cannot fail.
#[derive(Debug, Clone)]
pub struct StaticFallbackPool {
    lines: Vec<DialogueLine>,
}

impl Default for StaticFallbackPool {
    fn default() -> Self {
        Self {
            lines: DEFAULT_FALLBACK_LINES.iter().map(|s| DialogueLine::new(*s)).collect(),
        }
    }
}

impl StaticFallbackPool {
    /// Blank entries are dropped; an empty result is rejected.
    pub fn new<I, S>(lines: I) -> Result<Self, PoolError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let lines: Vec<DialogueLine> = lines
            .into_iter()
            .filter_map(|s| DialogueLine::from_generated(s.as_ref()))
            .collect();

        if lines.is_empty() {
            return Err(PoolError::Empty);
        }
        Ok(Self { lines })
    }

    pub fn pick(&self) -> DialogueLine {
        self.pick_with(&mut rand::thread_rng())
    }

    pub fn pick_with<R: Rng + ?Sized>(&self, rng: &mut R) -> DialogueLine {
        let idx = rng.gen_range(0..self.lines.len());
        self.lines[idx].clone()
    }

    pub fn contains(&self, text: &str) -> bool {
        self.lines.iter().any(|line| line.as_str() == text)
    }

    pub fn lines(&self) -> &[DialogueLine] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
