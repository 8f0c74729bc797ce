//! Query intent classification from fixed keyword sets.
//!
//! A query mentioning technical vocabulary gets more knowledge assessments in
//! its results; behavioral vocabulary shifts the mix toward personality and
//! competency assessments. A query matching both gets an even split, and a
//! query matching neither passes through without quota shaping.

use crate::model::types::Intent;

pub const TECHNICAL_KEYWORDS: &[&str] = &[
    "java",
    "python",
    "sql",
    "developer",
    "programming",
    "coding",
    "framework",
    "engineer",
    "technical",
];

pub const BEHAVIORAL_KEYWORDS: &[&str] = &[
    "collaboration",
    "communication",
    "teamwork",
    "personality",
    "behavior",
    "leadership",
    "stakeholder",
];

/// Classify a query by case-insensitive substring match against the keyword
/// sets. Substring (not word-boundary) matching is intentional: "javascript"
/// counts as technical via "java", and "behavioral" via "behavior".
pub fn classify(query: &str) -> Intent {
    let lowered = query.to_lowercase();
    let technical = TECHNICAL_KEYWORDS.iter().any(|kw| lowered.contains(kw));
    let behavioral = BEHAVIORAL_KEYWORDS.iter().any(|kw| lowered.contains(kw));

    match (technical, behavioral) {
        (true, true) => Intent::Mixed,
        (true, false) => Intent::Technical,
        (false, true) => Intent::Behavioral,
        (false, false) => Intent::General,
    }
}
