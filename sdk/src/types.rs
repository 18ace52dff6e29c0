//! Shared domain types
//!
//! Enumerations that cross the boundary between persistence, the pipeline
//! and the chat front end. Each has a stable lowercase wire form used both in
//! SQLite columns and in LLM JSON output.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What a stored preference is about
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PreferenceItem {
    Movie,
    Genre,
    Director,
    Actor,
}

impl PreferenceItem {
    pub fn as_str(&self) -> &'static str {
        match self {
            PreferenceItem::Movie => "movie",
            PreferenceItem::Genre => "genre",
            PreferenceItem::Director => "director",
            PreferenceItem::Actor => "actor",
        }
    }

    /// True for the kinds that resolve against the person catalog
    pub fn is_person(&self) -> bool {
        matches!(self, PreferenceItem::Director | PreferenceItem::Actor)
    }
}

/// Polarity of a stored preference
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PreferenceType {
    Like,
    Dislike,
}

impl PreferenceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PreferenceType::Like => "like",
            PreferenceType::Dislike => "dislike",
        }
    }
}

/// Kind of a persisted conversation message
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Human,
    Ai,
    System,
    Tool,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Human => "human",
            MessageKind::Ai => "ai",
            MessageKind::System => "system",
            MessageKind::Tool => "tool",
        }
    }
}

/// Error returned when a wire string does not name a known variant
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseKindError {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! wire_enum {
    ($ty:ty, $label:literal, [$($variant:expr),+ $(,)?]) => {
        impl FromStr for $ty {
            type Err = ParseKindError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let normalized = s.trim().to_ascii_lowercase();
                [$($variant),+]
                    .into_iter()
                    .find(|v| v.as_str() == normalized)
                    .ok_or_else(|| ParseKindError {
                        kind: $label,
                        value: s.to_string(),
                    })
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

wire_enum!(
    PreferenceItem,
    "preference item",
    [
        PreferenceItem::Movie,
        PreferenceItem::Genre,
        PreferenceItem::Director,
        PreferenceItem::Actor,
    ]
);

wire_enum!(
    PreferenceType,
    "preference type",
    [PreferenceType::Like, PreferenceType::Dislike]
);

wire_enum!(
    MessageKind,
    "message kind",
    [
        MessageKind::Human,
        MessageKind::Ai,
        MessageKind::System,
        MessageKind::Tool,
    ]
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preference_item_parse() {
        assert_eq!("genre".parse::<PreferenceItem>(), Ok(PreferenceItem::Genre));
        assert_eq!(" Actor ".parse::<PreferenceItem>(), Ok(PreferenceItem::Actor));
        let err = "soundtrack".parse::<PreferenceItem>().unwrap_err();
        assert_eq!(err.value, "soundtrack");
        assert_eq!(err.to_string(), "unknown preference item 'soundtrack'");
    }

    #[test]
    fn test_preference_type_parse() {
        assert_eq!("LIKE".parse::<PreferenceType>(), Ok(PreferenceType::Like));
        assert!("meh".parse::<PreferenceType>().is_err());
    }

    #[test]
    fn test_message_kind_display_matches_serde() {
        for kind in [
            MessageKind::Human,
            MessageKind::Ai,
            MessageKind::System,
            MessageKind::Tool,
        ] {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind));
        }
    }

    #[test]
    fn test_person_kinds() {
        assert!(PreferenceItem::Actor.is_person());
        assert!(PreferenceItem::Director.is_person());
        assert!(!PreferenceItem::Genre.is_person());
    }
}
