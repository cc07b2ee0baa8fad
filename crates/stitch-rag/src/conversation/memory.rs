//! Token-bounded conversation memory

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use unicode_segmentation::UnicodeSegmentation;

/// Approximate token count: `ceil(words * 4 / 3)` over Unicode words
pub fn estimate_tokens(text: &str) -> usize {
    let words = text.unicode_words().count();
    (words * 4 + 2) / 3
}

/// One question/answer exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub question: String,
    pub answer: String,
    /// Estimated tokens of question and answer together
    pub tokens: usize,
    pub created_at: DateTime<Utc>,
}

impl Turn {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        let question = question.into();
        let answer = answer.into();
        let tokens = estimate_tokens(&question) + estimate_tokens(&answer);
        Self {
            question,
            answer,
            tokens,
            created_at: Utc::now(),
        }
    }
}

/// Chronological turns whose total estimated tokens stay within a budget.
///
/// Appending evicts the oldest turns until the total fits again; a single
/// turn larger than the budget is evicted immediately.
#[derive(Debug, Clone)]
pub struct ConversationMemory {
    max_tokens: usize,
    turns: VecDeque<Turn>,
    total_tokens: usize,
}

impl ConversationMemory {
    pub fn new(max_tokens: usize) -> Self {
        Self {
            max_tokens,
            turns: VecDeque::new(),
            total_tokens: 0,
        }
    }

    /// Append a turn and return how many old turns were evicted
    pub fn append(&mut self, turn: Turn) -> usize {
        self.total_tokens += turn.tokens;
        self.turns.push_back(turn);

        let mut evicted = 0;
        while self.total_tokens > self.max_tokens {
            match self.turns.pop_front() {
                Some(old) => {
                    self.total_tokens -= old.tokens;
                    evicted += 1;
                }
                None => break,
            }
        }

        if evicted > 0 {
            tracing::debug!(
                "Evicted {} turn(s) from conversation memory ({} / {} tokens)",
                evicted,
                self.total_tokens,
                self.max_tokens
            );
        }
        evicted
    }

    /// Retained turns, oldest first
    pub fn history(&self) -> Vec<Turn> {
        self.turns.iter().cloned().collect()
    }

    pub fn total_tokens(&self) -> usize {
        self.total_tokens
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
        self.total_tokens = 0;
    }
}

impl Default for ConversationMemory {
    fn default() -> Self {
        Self::new(3097)
    }
}
