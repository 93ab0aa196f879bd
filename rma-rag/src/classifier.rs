//! Methodology classification of free-text recommendation answers.
//!
//! The generation provider answers "which research approach fits my project?"
//! in prose. [`classify`] extracts a [`MethodologyLabel`] with a fixed
//! priority of rules:
//!
//! 1. a `# Recommendation:` heading, inspecting the rest of that line;
//! 2. the word "recommend" co-occurring with a methodology term;
//! 3. term frequency across the whole text.
//!
//! Text that mentions no methodology term is [`MethodologyLabel::Unclassified`].

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::RagError;

static RECOMMENDATION_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)#[ \t]*recommendation:([^\r\n]*)")
        .expect("recommendation heading pattern is valid")
});

const MIXED: &str = "mixed methods";
const QUALITATIVE: &str = "qualitative";
const QUANTITATIVE: &str = "quantitative";

/// A research methodology recommended by an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MethodologyLabel {
    /// Numeric data, statistical analysis, hypothesis testing.
    Quantitative,
    /// Interpretive analysis of meaning, themes, lived experience.
    Qualitative,
    /// A design integrating quantitative and qualitative strands.
    #[serde(rename = "Mixed Methods")]
    MixedMethods,
    /// No methodology could be inferred.
    Unclassified,
}

impl MethodologyLabel {
    /// The display name stored by the project collaborator.
    pub fn as_str(&self) -> &'static str {
        match self {
            MethodologyLabel::Quantitative => "Quantitative",
            MethodologyLabel::Qualitative => "Qualitative",
            MethodologyLabel::MixedMethods => "Mixed Methods",
            MethodologyLabel::Unclassified => "Unclassified",
        }
    }
}

impl fmt::Display for MethodologyLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MethodologyLabel {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "quantitative" => Ok(MethodologyLabel::Quantitative),
            "qualitative" => Ok(MethodologyLabel::Qualitative),
            "mixed methods" | "mixed-methods" | "mixed" => Ok(MethodologyLabel::MixedMethods),
            "unclassified" => Ok(MethodologyLabel::Unclassified),
            other => Err(RagError::InvalidQuery(format!("unknown methodology label '{other}'"))),
        }
    }
}

/// Classify a recommendation answer. Pure and deterministic.
pub fn classify(answer_text: &str) -> MethodologyLabel {
    if let Some(label) = from_heading(answer_text) {
        return label;
    }

    let lower = answer_text.to_lowercase();
    if let Some(label) = from_recommendation(&lower) {
        return label;
    }

    let mixed = lower.matches(MIXED).count();
    let qualitative = lower.matches(QUALITATIVE).count();
    let quantitative = lower.matches(QUANTITATIVE).count();

    if mixed == 0 && qualitative == 0 && quantitative == 0 {
        return MethodologyLabel::Unclassified;
    }
    if mixed > qualitative && mixed > quantitative {
        MethodologyLabel::MixedMethods
    } else if qualitative > quantitative {
        MethodologyLabel::Qualitative
    } else {
        // Ties between qualitative and quantitative land here too.
        MethodologyLabel::Quantitative
    }
}

fn from_heading(text: &str) -> Option<MethodologyLabel> {
    let captures = RECOMMENDATION_HEADING.captures(text)?;
    let rest = captures.get(1)?.as_str().to_lowercase();
    if rest.contains(QUANTITATIVE) {
        Some(MethodologyLabel::Quantitative)
    } else if rest.contains(QUALITATIVE) {
        Some(MethodologyLabel::Qualitative)
    } else if rest.contains(MIXED) {
        Some(MethodologyLabel::MixedMethods)
    } else {
        None
    }
}

fn from_recommendation(lower: &str) -> Option<MethodologyLabel> {
    if !lower.contains("recommend") {
        return None;
    }
    if lower.contains(MIXED) {
        Some(MethodologyLabel::MixedMethods)
    } else if lower.contains(QUALITATIVE) {
        Some(MethodologyLabel::Qualitative)
    } else if lower.contains(QUANTITATIVE) {
        Some(MethodologyLabel::Quantitative)
    } else {
        None
    }
}
