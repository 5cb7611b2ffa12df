//! The closed interest taxonomy and the deterministic keyword classifier.
//!
//! The keyword table is consulted wherever structured data already exists,
//! so unambiguous pages never spend a completion-API call.

/// The closed category set. Classifier output is constrained to these.
pub const CATEGORIES: &[&str] = &[
    "Music",
    "Art",
    "Food & Drink",
    "Sports",
    "Fitness",
    "Yoga",
    "Tech",
    "Outdoors",
    "Community",
    "Comedy",
    "Nightlife",
    "Theater",
    "Film",
    "Literature",
    "Wellness",
    "Markets",
    "Family",
    "Education",
];

/// Category assigned when nothing else matches.
pub const FALLBACK_CATEGORY: &str = "Community";

/// Only surfaced when the caller explicitly asked for it.
pub const SENSITIVE_CATEGORY: &str = "Comedy";

const KEYWORDS: &[(&str, &[&str])] = &[
    ("Music", &["concert", "band", "dj ", "live music", "album", "orchestra", "choir", "vinyl", "jazz", "symphony", "open mic"]),
    ("Art", &["gallery", "exhibit", "art show", "painting", "sculpture", "mural", "artist talk", "vernissage"]),
    ("Food & Drink", &["tasting", "food truck", "brunch", "dinner", "wine", "beer", "brewery", "cocktail", "pop-up kitchen", "restaurant week"]),
    ("Sports", &["tournament", "league", "pickup game", "5k", "10k", "marathon", "match", "race day", "softball", "basketball", "soccer"]),
    ("Fitness", &["workout", "bootcamp", "crossfit", "spin class", "pilates", "hiit", "run club"]),
    ("Yoga", &["yoga", "vinyasa", "asana", "meditation and movement"]),
    ("Tech", &["hackathon", "meetup for developers", "startup", "demo day", "tech talk", "coding", "programming", "ai ", "web3"]),
    ("Outdoors", &["hike", "trail", "kayak", "camping", "birdwatch", "stargazing", "nature walk", "beach cleanup"]),
    ("Comedy", &["comedy", "stand-up", "standup", "improv", "open mic comedy"]),
    ("Nightlife", &["club night", "rooftop party", "rave", "late night", "dance party", "happy hour"]),
    ("Theater", &["theater", "theatre", "play ", "musical", "broadway", "stage production", "ballet", "opera"]),
    ("Film", &["screening", "film festival", "movie night", "documentary", "premiere", "cinema"]),
    ("Literature", &["book club", "author reading", "poetry", "book signing", "literary", "storytelling night"]),
    ("Wellness", &["meditation", "sound bath", "breathwork", "mindfulness", "retreat", "self-care"]),
    ("Markets", &["farmers market", "flea market", "craft fair", "night market", "bazaar", "vendor fair", "swap meet"]),
    ("Family", &["kids", "family-friendly", "all ages", "children", "story time", "petting zoo"]),
    ("Education", &["workshop", "seminar", "lecture", "class ", "course", "masterclass", "panel discussion"]),
    ("Community", &["volunteer", "fundraiser", "town hall", "neighborhood", "block party", "community garden", "charity"]),
];

/// Classify free text into zero or more taxonomy categories by keyword
/// matching. Deterministic; no network.
pub fn classify(text: &str) -> Vec<String> {
    let haystack = text.to_lowercase();
    let mut matched = Vec::new();
    for (category, keywords) in KEYWORDS {
        if keywords.iter().any(|k| haystack.contains(k)) {
            matched.push((*category).to_string());
        }
    }
    matched
}

/// Classify, falling back to [`FALLBACK_CATEGORY`] when nothing matches.
pub fn classify_or_fallback(text: &str) -> Vec<String> {
    let matched = classify(text);
    if matched.is_empty() {
        vec![FALLBACK_CATEGORY.to_string()]
    } else {
        matched
    }
}

/// Map a free-form category string onto the closed taxonomy, if possible.
pub fn canonical_category(raw: &str) -> Option<&'static str> {
    let needle = raw.trim().to_lowercase();
    CATEGORIES
        .iter()
        .find(|c| c.to_lowercase() == needle)
        .copied()
}
