// src/domain/relevance.rs

//! Keyword classifier that decides whether an ingested listing is worth
//! keeping (architecture, design and consultancy work).

pub const INCLUDE_KEYWORDS: &[&str] = &[
    "architect",
    "architecture",
    "architectural",
    "design",
    "consultancy",
    "consultant",
    "supervision",
    "engineering design",
    "structural",
    "building",
    "hospital",
    "school",
    "campus",
    "office",
    "housing",
    "infrastructure",
    "layout",
    "survey",
    "mapping",
    "master plan",
    "feasibility",
    "dpr",
    "detailed project report",
    "urban",
    "complex",
    "terminal",
    "hall",
    "park",
    "stadium",
    "facility",
    "center",
];

pub const EXCLUDE_KEYWORDS: &[&str] = &[
    "supply",
    "delivery",
    "purchase",
    "repair",
    "maintenance",
    "vehicle",
    "road",
    "bridge",
    "culvert",
    "pipeline",
    "water supply",
    "drainage",
    "medicine",
    "drug",
    "equipment",
    "machinery",
    "printing",
    "it support",
    "software",
    "hardware",
    "stationery",
    "agriculture",
    "fertilizer",
    "river",
    "sand",
    "gravel",
    "cement",
    "pavement",
    "asphalt",
];

const STRONG_CONTEXTS: &[&str] = &[
    "building", "hospital", "school", "campus", "office", "complex", "hall", "housing",
    "facility", "center",
];

const HIGH_CONFIDENCE: &[&str] = &[
    "dpr",
    "feasibility",
    "master plan",
    "architect",
    "consult",
    "supervision",
    "design",
];

/// Include/exclude substring lists. Matching is on lowercased text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelevanceRules {
    include: Vec<String>,
    exclude: Vec<String>,
}

impl Default for RelevanceRules {
    fn default() -> Self {
        RelevanceRules {
            include: INCLUDE_KEYWORDS.iter().map(|s| s.to_string()).collect(),
            exclude: EXCLUDE_KEYWORDS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl RelevanceRules {
    /// Empty lists fall back to the built-in ones.
    pub fn new(include: &[String], exclude: &[String]) -> Self {
        let defaults = RelevanceRules::default();
        let norm = |v: &[String]| -> Vec<String> {
            v.iter()
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect()
        };
        let include = norm(include);
        let exclude = norm(exclude);
        RelevanceRules {
            include: if include.is_empty() { defaults.include } else { include },
            exclude: if exclude.is_empty() { defaults.exclude } else { exclude },
        }
    }

    fn any_include(&self, text: &str) -> bool {
        self.include.iter().any(|k| text.contains(k.as_str()))
    }

    fn any_exclude(&self, text: &str) -> bool {
        self.exclude.iter().any(|k| text.contains(k.as_str()))
    }

    /// Title-only check.
    pub fn is_architecture_related(&self, title: &str) -> bool {
        let text = title.trim().to_lowercase();
        if text.is_empty() || !self.any_include(&text) || self.any_exclude(&text) {
            return false;
        }
        if STRONG_CONTEXTS.iter().any(|c| text.contains(c)) {
            return true;
        }
        if HIGH_CONFIDENCE.iter().any(|c| text.contains(c)) {
            return true;
        }
        self.include.iter().filter(|k| text.contains(k.as_str())).count() >= 2
    }

    /// Title first; failing that, title plus context (organization, notes)
    /// must hit an include keyword and no exclude keyword.
    pub fn is_relevant_tender(&self, title: &str, context: &str) -> bool {
        if self.is_architecture_related(title) {
            return true;
        }
        let combined = format!(
            "{} {}",
            title.trim().to_lowercase(),
            context.trim().to_lowercase()
        );
        let combined = combined.trim();
        if combined.is_empty() || self.any_exclude(combined) {
            return false;
        }
        self.any_include(combined)
    }
}
