//! Preference capture
//!
//! Pulls likes and dislikes out of a free-text statement, resolves each one
//! to a catalog identity and stores the survivors. Anything that cannot be
//! classified or resolved is dropped. The tool contributes no text to the
//! answer; the stored rows are its only output.

use super::{allowed_params, bare_subject, request_query, MovieTool, ToolKind, TOOL_FAILURE_TEXT};
use crate::catalog::genres::{canonical_genre, GENRE_NAMES};
use crate::catalog::CatalogClient;
use crate::db::{NewPreference, PreferenceRepository};
use crate::llm::router::LLMRouter;
use async_trait::async_trait;
use sdk::{PreferenceItem, PreferenceType};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

fn instructions() -> String {
    format!(
        "You extract a user's movie preferences from their message.\n\
Return a JSON object {{\"preferences\": [{{\"item_name\": \"...\", \"preference_item\": \"...\", \"preference_type\": \"...\"}}]}}.\n\
- \"item_name\": the movie title, genre or person name as written\n\
- \"preference_item\": one of \"movie\", \"genre\", \"director\", \"actor\"\n\
- \"preference_type\": \"like\" or \"dislike\"\n\
Known genres: {}.\n\
Only include items whose kind is clear. Return an empty list when there are none.",
        GENRE_NAMES.join(", ")
    )
}

/// A preference as the model stated it, before resolution
#[derive(Debug, Clone, PartialEq)]
struct Candidate {
    item_name: String,
    item: PreferenceItem,
    polarity: PreferenceType,
}

fn field<'a>(entry: &'a Value, key: &str) -> Option<&'a str> {
    entry.get(key).and_then(Value::as_str).map(str::trim)
}

/// Validate raw model output; malformed entries are logged and skipped
fn candidates(raw: Map<String, Value>) -> Vec<Candidate> {
    let params = allowed_params(ToolKind::UserPreferencesManager, raw, &["preferences"]);
    let Some(Value::Array(entries)) = params.get("preferences") else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| {
            let item_name = field(entry, "item_name").filter(|s| !s.is_empty())?;
            let item = match field(entry, "preference_item")?.parse::<PreferenceItem>() {
                Ok(item) => item,
                Err(e) => {
                    warn!("Skipping preference '{}': {}", item_name, e);
                    return None;
                }
            };
            let polarity = match field(entry, "preference_type")?.parse::<PreferenceType>() {
                Ok(polarity) => polarity,
                Err(e) => {
                    warn!("Skipping preference '{}': {}", item_name, e);
                    return None;
                }
            };
            Some(Candidate {
                item_name: item_name.to_string(),
                item,
                polarity,
            })
        })
        .collect()
}

pub struct UserPreferencesTool {
    router: Arc<LLMRouter>,
    catalog: Arc<CatalogClient>,
    preferences: PreferenceRepository,
}

impl UserPreferencesTool {
    pub fn new(
        router: Arc<LLMRouter>,
        catalog: Arc<CatalogClient>,
        preferences: PreferenceRepository,
    ) -> Self {
        Self {
            router,
            catalog,
            preferences,
        }
    }

    /// Catalog identity of a candidate; `None` drops it
    async fn resolve(&self, candidate: Candidate) -> Option<NewPreference> {
        let lookup = match candidate.item {
            PreferenceItem::Genre => {
                if canonical_genre(&candidate.item_name).is_none() {
                    debug!("'{}' is not a catalog genre", candidate.item_name);
                    return None;
                }
                Ok(None)
            }
            PreferenceItem::Movie => self.catalog.resolve_movie_id(&candidate.item_name).await.map(Some),
            PreferenceItem::Director | PreferenceItem::Actor => self
                .catalog
                .resolve_person_id(&candidate.item_name)
                .await
                .map(Some),
        };

        let catalog_id = match lookup {
            Ok(None) => None,
            Ok(Some(Some(id))) => Some(id),
            Ok(Some(None)) => {
                debug!("No catalog match for '{}'", candidate.item_name);
                return None;
            }
            Err(e) => {
                warn!("Could not resolve '{}': {}", candidate.item_name, e);
                return None;
            }
        };

        Some(NewPreference {
            item_name: candidate.item_name,
            item: candidate.item,
            polarity: candidate.polarity,
            catalog_id,
        })
    }
}

#[async_trait]
impl MovieTool for UserPreferencesTool {
    fn kind(&self) -> ToolKind {
        ToolKind::UserPreferencesManager
    }

    fn description(&self) -> &'static str {
        "Remembers what the user likes or dislikes: movies, genres, directors, actors. Call it \
whenever the user states a preference; the question must be the user's statement as written. \
Returns nothing."
    }

    async fn invoke(&self, question: &str, context: &str, user_id: i64) -> String {
        let kind = self.kind();
        let statement = bare_subject(question);
        let Some(raw) = request_query(&self.router, kind, &instructions(), statement, context).await
        else {
            return TOOL_FAILURE_TEXT.to_string();
        };

        let mut resolved = Vec::new();
        for candidate in candidates(raw) {
            if let Some(pref) = self.resolve(candidate).await {
                resolved.push(pref);
            }
        }

        match self.preferences.create_many(user_id, &resolved).await {
            Ok(count) => {
                info!("Stored {} preferences for user {}", count, user_id);
                String::new()
            }
            Err(e) => {
                warn!("Failed to store preferences for user {}: {:#}", user_id, e);
                TOOL_FAILURE_TEXT.to_string()
            }
        }
    }
}
