//! Structured person search
//!
//! The model answers with `{"params": {...}, "fields": [...]}`: filters over
//! the person collection, and the output fields the question needs. Both
//! halves are allow-listed; `name` is always projected so the answer can say
//! who was found.

use super::{
    allowed_params, apply_params, phrase_answer, request_query, value_strings, MovieTool,
    ToolKind, CATALOG_ERROR_TEXT, TOOL_FAILURE_TEXT,
};
use crate::catalog::{CatalogClient, CatalogQuery};
use crate::llm::router::LLMRouter;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{info, warn};

const ALLOWED_PARAMS: &[&str] = &[
    "id",
    "movies.id",
    "sex",
    "growth",
    "birthday",
    "death",
    "age",
    "birthPlace.value",
    "deathPlace.value",
    "spouses.id",
    "children.id",
    "spouses.divorced",
    "spouses.sex",
    "countAwards",
    "profession.value",
    "movies.rating",
    "movies.enProfession",
    "updatedAt",
    "createdAt",
];

const ALLOWED_FIELDS: &[&str] = &[
    "id",
    "name",
    "enName",
    "photo",
    "sex",
    "growth",
    "birthday",
    "death",
    "age",
    "birthPlace",
    "deathPlace",
    "spouses",
    "countAwards",
    "profession",
    "facts",
    "movies",
];

const INSTRUCTIONS: &str = "You turn a question about film people into a person search.\n\
Return a JSON object {\"params\": {...}, \"fields\": [...]}.\n\
\"params\" filters the search. Supported keys: id, movies.id, sex (\"Мужской\" or \"Женский\"), \
growth (cm, number or range), birthday and death (date ranges \"dd.mm.yyyy-dd.mm.yyyy\"), \
age (number or range), birthPlace.value, deathPlace.value, spouses.id, children.id, \
spouses.divorced, spouses.sex, countAwards (number or range), profession.value \
(e.g. \"Актер\", \"Режиссер\"), movies.rating, movies.enProfession (e.g. \"actor\", \"director\"), \
updatedAt, createdAt. Prefix a value with \"!\" to exclude it.\n\
\"fields\" lists what the answer needs, any of: id, name, enName, photo, sex, growth, birthday, \
death, age, birthPlace, deathPlace, spouses, countAwards, profession, facts, movies.";

const FIELD_NOTES: &str = "Person records as JSON with only the requested fields.";

pub struct PeopleSearchTool {
    router: Arc<LLMRouter>,
    catalog: Arc<CatalogClient>,
}

impl PeopleSearchTool {
    pub fn new(router: Arc<LLMRouter>, catalog: Arc<CatalogClient>) -> Self {
        Self { router, catalog }
    }

    fn build_query(&self, raw: Map<String, Value>) -> CatalogQuery {
        let kind = self.kind();

        let params = match raw.get("params") {
            Some(Value::Object(params)) => allowed_params(kind, params.clone(), ALLOWED_PARAMS),
            _ => Map::new(),
        };

        let mut fields = vec!["name".to_string()];
        for field in raw.get("fields").map(value_strings).unwrap_or_default() {
            if !ALLOWED_FIELDS.contains(&field.as_str()) {
                warn!("{}: dropping unsupported field '{}'", kind, field);
            } else if !fields.contains(&field) {
                fields.push(field);
            }
        }

        let base = CatalogQuery::new()
            .with("page", "1")
            .with("limit", self.catalog.people_limit().to_string())
            .with_all("selectFields", fields);
        apply_params(base, &params)
    }
}

#[async_trait]
impl MovieTool for PeopleSearchTool {
    fn kind(&self) -> ToolKind {
        ToolKind::PeopleSearch
    }

    fn description(&self) -> &'static str {
        "Finds actors, directors and other film people by attributes: profession, age, \
birthday, place of birth, height, awards, filmography. Use it when the person's name is not \
known. Returns the requested facts about each person found."
    }

    async fn invoke(&self, question: &str, context: &str, _user_id: i64) -> String {
        let kind = self.kind();
        let Some(raw) = request_query(&self.router, kind, INSTRUCTIONS, question, context).await
        else {
            return TOOL_FAILURE_TEXT.to_string();
        };

        let query = self.build_query(raw);
        let people = match self.catalog.search_people(&query).await {
            Ok(people) => people,
            Err(e) => {
                warn!("Person search failed: {}", e);
                return CATALOG_ERROR_TEXT.to_string();
            }
        };
        info!("Person search returned {} results", people.len());

        if people.is_empty() {
            return "No people matching the request were found.".to_string();
        }
        let info = serde_json::to_string_pretty(&people).unwrap_or_default();
        phrase_answer(&self.router, kind, FIELD_NOTES, question, &info).await
    }
}
