//! Keyword-based event categorization for sources without a taxonomy.

use std::sync::LazyLock;

use citypulse_events_models::EventCategory;
use regex::Regex;

/// Checked in order; the first match wins.
static RULES: LazyLock<Vec<(Regex, EventCategory)>> = LazyLock::new(|| {
    [
        (
            r"(?i)\b(festival|carnival|fair|lễ hội|le hoi|tết|countdown|fireworks)\b",
            EventCategory::Festival,
        ),
        (
            r"(?i)\b(sports?|football|soccer|v\.?league|match|marathon|basketball|tournament|stadium|race|vs\.?)\b",
            EventCategory::Sports,
        ),
        (
            r"(?i)\b(concerts?|music|live show|tour|dj|hòa nhạc|liveshow)\b",
            EventCategory::Concert,
        ),
        (
            r"(?i)\b(conference|summit|expo|exhibition|forum|workshop|hội nghị|hội thảo)\b",
            EventCategory::Conference,
        ),
        (
            r"(?i)\b(community|charity|market|parade|meetup|volunteer)\b",
            EventCategory::Community,
        ),
    ]
    .into_iter()
    .map(|(pattern, category)| (Regex::new(pattern).expect("valid regex"), category))
    .collect()
});

/// Categorizes an event from free text such as its title, genre, or
/// description. Returns [`EventCategory::Other`] when nothing matches.
#[must_use]
pub fn classify(texts: &[&str]) -> EventCategory {
    for (re, category) in RULES.iter() {
        if texts.iter().any(|text| re.is_match(text)) {
            return *category;
        }
    }
    EventCategory::Other
}

/// Maps a Ticketmaster segment name to a category, falling back to
/// keyword matching on `fallback_texts`.
#[must_use]
pub fn from_ticketing_segment(segment: Option<&str>, fallback_texts: &[&str]) -> EventCategory {
    let keyword = classify(fallback_texts);
    match segment.map(str::to_ascii_lowercase).as_deref() {
        Some("sports") => EventCategory::Sports,
        Some("music") if keyword == EventCategory::Festival => EventCategory::Festival,
        Some("music") => EventCategory::Concert,
        _ => keyword,
    }
}
