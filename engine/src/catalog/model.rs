//! Typed views of catalog documents.
//!
//! The catalog returns sparse documents: any field may be missing or `null`
//! depending on the projection and on how complete the record is. Every field
//! here is optional or defaults, so a partial document still deserializes.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt::Write;

/// Treat an explicit `null` the same as a missing field
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// `{ "name": ... }` entries used for genres and countries
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Named {
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Ratings {
    pub kp: Option<f64>,
    pub imdb: Option<f64>,
    pub film_critics: Option<f64>,
    pub russian_film_critics: Option<f64>,
    #[serde(rename = "await")]
    pub awaiting: Option<f64>,
}

/// Vote counts. The catalog sends some of them as strings and some as
/// numbers, so they stay as raw JSON values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Votes {
    pub kp: Option<Value>,
    pub imdb: Option<Value>,
    pub film_critics: Option<Value>,
}

/// Reference to another title, as found in `similarMovies`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkedMovie {
    pub id: i64,
    pub name: Option<String>,
}

/// Cast or crew entry, as found in `persons`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Credit {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub en_profession: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Movie {
    pub id: i64,
    pub name: Option<String>,
    pub en_name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub year: Option<i64>,
    pub description: Option<String>,
    pub short_description: Option<String>,
    pub movie_length: Option<i64>,
    pub series_length: Option<i64>,
    pub total_series_length: Option<i64>,
    #[serde(deserialize_with = "nullable")]
    pub is_series: bool,
    pub rating_mpaa: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub rating: Ratings,
    #[serde(deserialize_with = "nullable")]
    pub votes: Votes,
    #[serde(deserialize_with = "nullable")]
    pub genres: Vec<Named>,
    #[serde(deserialize_with = "nullable")]
    pub countries: Vec<Named>,
    #[serde(deserialize_with = "nullable")]
    pub similar_movies: Vec<LinkedMovie>,
    #[serde(deserialize_with = "nullable")]
    pub persons: Vec<Credit>,
}

impl Movie {
    /// Best available title for display
    pub fn title(&self) -> &str {
        self.name
            .as_deref()
            .or(self.en_name.as_deref())
            .unwrap_or("Unknown Title")
    }
}

/// A user review
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Review {
    #[serde(deserialize_with = "nullable")]
    pub review: String,
    #[serde(deserialize_with = "nullable")]
    pub user_rating: i64,
}

/// `{"docs": [...]}` envelope of list endpoints
#[derive(Debug, Deserialize)]
pub(crate) struct Page<T> {
    #[serde(default = "Vec::new")]
    pub docs: Vec<T>,
}

fn or_na<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "N/A".to_string())
}

fn votes_text(value: &Option<Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => "N/A".to_string(),
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn join_names(items: &[Named]) -> String {
    items
        .iter()
        .map(|n| n.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Render a movie as the plain-text card used in tool prompts, in the
/// semantic index and in recommendation briefs.
pub fn describe_movie(movie: &Movie) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "Title: {}", movie.title());
    let _ = writeln!(
        out,
        "Year: {}",
        movie
            .year
            .map(|y| y.to_string())
            .unwrap_or_else(|| "Unknown Year".to_string())
    );
    let _ = writeln!(
        out,
        "Type: {}",
        capitalize(movie.kind.as_deref().unwrap_or("Unknown type"))
    );
    let _ = writeln!(out, "Country: {}", join_names(&movie.countries));
    let _ = writeln!(out, "Genres: {}", join_names(&movie.genres));

    if movie.is_series {
        let _ = writeln!(
            out,
            "Episode Length: {} minutes | Total Series Length: {}",
            or_na(movie.series_length),
            or_na(movie.total_series_length)
        );
    } else {
        let _ = writeln!(
            out,
            "Duration: {} minutes",
            movie
                .movie_length
                .map(|m| m.to_string())
                .unwrap_or_else(|| "Unknown length".to_string())
        );
    }

    let _ = writeln!(
        out,
        "MPAA Rating: {}",
        movie.rating_mpaa.as_deref().unwrap_or("No MPAA rating")
    );
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Description: {}",
        movie
            .description
            .as_deref()
            .unwrap_or("No description available.")
    );
    let _ = writeln!(out);

    let r = &movie.rating;
    let v = &movie.votes;
    let _ = writeln!(out, "Ratings:");
    let _ = writeln!(out, "- Kinopoisk: {} ({} votes)", or_na(r.kp), votes_text(&v.kp));
    let _ = writeln!(out, "- IMDb: {} ({} votes)", or_na(r.imdb), votes_text(&v.imdb));
    let _ = writeln!(
        out,
        "- Film Critics: {} ({} votes)",
        or_na(r.film_critics),
        votes_text(&v.film_critics)
    );
    let _ = writeln!(
        out,
        "- Russian Film Critics: {} / 100",
        or_na(r.russian_film_critics)
    );
    let _ = write!(out, "- Awaiting Audience Rating: {}", or_na(r.awaiting));

    out
}

/// Keep the `top_k` most helpful reviews and join their texts.
///
/// Helpfulness is the catalog's `userRating`; ties keep the catalog's order
/// (newest first).
pub fn top_reviews(mut reviews: Vec<Review>, top_k: usize) -> String {
    reviews.sort_by(|a, b| b.user_rating.cmp(&a.user_rating));
    reviews
        .into_iter()
        .take(top_k)
        .map(|r| r.review)
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}
