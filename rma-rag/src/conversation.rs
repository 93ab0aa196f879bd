//! Conversation turns and generated answers.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::document::RetrievalResult;

/// Who authored a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The researcher asking questions.
    User,
    /// The assistant's earlier replies.
    Assistant,
}

impl Role {
    /// Label used when rendering history into a prompt.
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

/// One message of prior conversation. The pipeline only reads history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// Who said it.
    pub role: Role,
    /// What was said.
    pub content: String,
}

impl ConversationTurn {
    /// A user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    /// An assistant turn.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// The verbatim text returned by the generation provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedAnswer {
    /// The answer text.
    pub text: String,
}

impl GeneratedAnswer {
    /// Wrap model output.
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// The answer text.
    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for GeneratedAnswer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// An answer together with the passages it was grounded on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundedAnswer {
    /// The generated answer.
    pub answer: GeneratedAnswer,
    /// The chunks that were retrieved for the question, in rank order.
    pub retrieval: RetrievalResult,
    /// Characters of assembled context the answer was generated from.
    #[serde(default)]
    pub context_chars: usize,
}

impl GroundedAnswer {
    /// Whether any retrieved passage reached the prompt.
    ///
    /// `false` means the answer was produced in degraded, non-grounded mode:
    /// either retrieval found nothing or no chunk fit the context budget.
    pub fn is_grounded(&self) -> bool {
        self.context_chars > 0
    }
}
