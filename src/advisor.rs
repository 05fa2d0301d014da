//! Assembly and validation of the request handed to the external suggestion
//! generator, plus parsing of what it sends back.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::Write as _;

use crate::error::ValidationError;

/// Upper bound on liked titles after favorites are merged in.
pub const MAX_LIKED_TITLES: usize = 10;
pub const MIN_COUNT: i64 = 1;
pub const MAX_COUNT: i64 = 10;
pub const MAX_MOOD_TEXT_CHARS: usize = 500;

fn default_count() -> i64 {
    3
}

fn default_true() -> bool {
    true
}

/// What the suggestion form submits.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionForm {
    #[serde(default)]
    pub liked_movies: Vec<String>,
    #[serde(default)]
    pub genre_preferences: Vec<String>,
    #[serde(default)]
    pub moods: Vec<String>,
    #[serde(default)]
    pub mood_text: String,
    #[serde(default)]
    pub decade: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default = "default_count")]
    pub count: i64,
    #[serde(default = "default_true")]
    pub include_favorites: bool,
}

impl Default for SuggestionForm {
    fn default() -> Self {
        Self {
            liked_movies: Vec::new(),
            genre_preferences: Vec::new(),
            moods: Vec::new(),
            mood_text: String::new(),
            decade: None,
            language: None,
            count: default_count(),
            include_favorites: true,
        }
    }
}

/// A validated request, ready for the generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionRequest {
    pub liked_movies: Vec<String>,
    pub genre_preferences: Vec<String>,
    pub moods: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mood_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decade: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub count: u8,
}

/// Trims, drops blanks and removes case-insensitive repeats, keeping the first
/// spelling seen.
fn clean<I>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    values
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && seen.insert(v.to_lowercase()))
        .collect()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Builds the generator request from the form and the user's favorites
/// ("Title (Year)" labels). Every failed rule is reported, not just the first.
pub fn assemble(
    form: SuggestionForm,
    favorite_labels: &[String],
) -> Result<SuggestionRequest, ValidationError> {
    let favorites = if form.include_favorites {
        favorite_labels.to_vec()
    } else {
        Vec::new()
    };
    let mut liked_movies = clean(form.liked_movies.into_iter().chain(favorites));
    liked_movies.truncate(MAX_LIKED_TITLES);

    let moods = clean(form.moods);
    let mood_text = non_blank(Some(form.mood_text));

    let mut errors = ValidationError::default();
    if liked_movies.is_empty() && moods.is_empty() && mood_text.is_none() {
        errors.push(
            "likedMovies",
            "Add a movie you liked, pick a mood, or describe what you are in the mood for",
        );
    }
    if !(MIN_COUNT..=MAX_COUNT).contains(&form.count) {
        errors.push(
            "count",
            format!("Ask for between {} and {} suggestions", MIN_COUNT, MAX_COUNT),
        );
    }
    if mood_text
        .as_deref()
        .is_some_and(|t| t.chars().count() > MAX_MOOD_TEXT_CHARS)
    {
        errors.push(
            "moodText",
            format!("Keep the description under {} characters", MAX_MOOD_TEXT_CHARS),
        );
    }
    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(SuggestionRequest {
        liked_movies,
        genre_preferences: clean(form.genre_preferences),
        moods,
        mood_text,
        decade: non_blank(form.decade),
        language: non_blank(form.language),
        count: u8::try_from(form.count).unwrap_or(MAX_COUNT as u8),
    })
}

/// The plain-text prompt for the generator. Lines whose input is empty are
/// left out.
pub fn render_prompt(request: &SuggestionRequest) -> String {
    let mut out = String::new();
    let n = request.count;
    let has_moods = !request.moods.is_empty();

    let _ = writeln!(
        out,
        "You are a professional movie recommendation engine. Suggest exactly {} real films that match ALL of these criteria.",
        n
    );
    out.push_str("\n1. CORE MATCHING (must follow):\n");
    if !request.liked_movies.is_empty() {
        let _ = writeln!(out, "   - Prioritize movies similar to: {}", request.liked_movies.join(", "));
    }
    if !request.genre_preferences.is_empty() {
        let _ = writeln!(out, "   - Only suggest genres from: {}", request.genre_preferences.join(", "));
    }
    if has_moods {
        let _ = writeln!(out, "   - Tone must match these moods: {}", request.moods.join(", "));
    }

    out.push_str("\n2. CONTEXT (optional):\n");
    if let Some(text) = &request.mood_text {
        let _ = writeln!(out, "   - User description: \"{}\"", text);
    }
    if let Some(decade) = &request.decade {
        let _ = writeln!(out, "   - Decade preference: {}", decade);
    }
    if let Some(language) = &request.language {
        let _ = writeln!(out, "   - Language preference: {}", language);
    }

    out.push_str("\n3. STRICT RULES:\n");
    out.push_str("   - Never suggest genres outside the user's preferences\n");
    out.push_str("   - Never suggest movies the user already listed\n");
    out.push_str("   - Never invent movies; every title must exist in TMDB\n");
    if has_moods {
        if request.moods.iter().any(|m| m.eq_ignore_ascii_case("funny")) {
            out.push_str("   - \"Funny\" was picked: prioritize comedies\n");
        }
        if request.moods.iter().any(|m| m.eq_ignore_ascii_case("feel-good")) {
            out.push_str("   - \"Feel-Good\" was picked: avoid dark or depressing films\n");
        }
    }

    out.push_str("\n4. OUTPUT FORMAT:\n");
    out.push_str(
        "   Reply with JSON only: {\"suggestions\": [{\"title\": string, \"year\": number, \"genres\": [string], \"reason\": string}]}\n",
    );
    out.push_str("   - title: the exact title; year: the release year\n");
    out.push_str("   - genres: the 2-3 main genres\n");
    out.push_str("   - reason: one sentence tying the film to the user's input\n");
    let _ = write!(out, "\nNow suggest {} movies following ALL rules above.", n);
    out
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieSuggestion {
    pub title: String,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub reason: String,
}

#[derive(Deserialize)]
struct SuggestionsPayload {
    suggestions: Vec<MovieSuggestion>,
}

/// Reads the generator's reply, with or without a markdown code fence.
pub fn parse_suggestions(raw: &str) -> Result<Vec<MovieSuggestion>, serde_json::Error> {
    let trimmed = raw.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .map(|rest| rest.strip_suffix("```").unwrap_or(rest))
        .unwrap_or(trimmed)
        .trim();
    let payload: SuggestionsPayload = serde_json::from_str(unfenced)?;
    Ok(payload.suggestions)
}
