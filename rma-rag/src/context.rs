//! Context assembly from ranked chunks.

use crate::document::RetrievalResult;

/// Separator placed between chunks in an assembled context.
pub const CONTEXT_DELIMITER: &str = "\n\n";

/// Concatenate retrieved chunks into a single context block.
///
/// Chunks are taken in rank order, preferring enriched text over raw text,
/// joined by [`CONTEXT_DELIMITER`]. Assembly stops before the first chunk that
/// would push the output past `max_chars` characters; chunks are never cut.
/// An empty result yields an empty string.
///
/// If the top-ranked chunk alone exceeds `max_chars` the output is empty and
/// callers fall back to degraded, non-grounded generation.
pub fn assemble(result: &RetrievalResult, max_chars: usize) -> String {
    let mut context = String::new();
    let mut used = 0usize;
    let delimiter_len = CONTEXT_DELIMITER.chars().count();

    for (index, entry) in result.iter().enumerate() {
        let text = entry.chunk.context_text();
        let separator = if index == 0 { 0 } else { delimiter_len };
        let next = used + separator + text.chars().count();
        if next > max_chars {
            break;
        }
        if index > 0 {
            context.push_str(CONTEXT_DELIMITER);
        }
        context.push_str(text);
        used = next;
    }

    context
}

/// [`assemble`] bound to a fixed character budget.
#[derive(Debug, Clone, Copy)]
pub struct ContextAssembler {
    max_chars: usize,
}

impl ContextAssembler {
    /// Create an assembler with the given budget.
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }

    /// The character budget.
    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    /// Assemble `result` within the budget.
    pub fn assemble(&self, result: &RetrievalResult) -> String {
        assemble(result, self.max_chars)
    }
}
