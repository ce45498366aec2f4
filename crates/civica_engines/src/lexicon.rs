#![forbid(unsafe_code)]

use std::collections::BTreeSet;

use civica_kernel_contracts::complaint::{CategoryTag, Polarity, PriorityTier};

/// Scoring weight applied per matched priority keyword.
pub const PRIORITY_WEIGHT_URGENT: u32 = 3;
pub const PRIORITY_WEIGHT_HIGH: u32 = 2;
pub const PRIORITY_WEIGHT_MEDIUM: u32 = 1;
pub const PRIORITY_WEIGHT_LOW: u32 = 1;

const ROADS_KEYWORDS: &[&str] = &[
    "road",
    "street",
    "pothole",
    "footpath",
    "bridge",
    "construction",
    "traffic",
    "signal",
    "pavement",
];

const WATER_KEYWORDS: &[&str] = &[
    "water",
    "pipe",
    "leak",
    "supply",
    "drainage",
    "sewage",
    "flood",
    "contamination",
    "tap",
];

const ELECTRICITY_KEYWORDS: &[&str] = &[
    "power",
    "electricity",
    "light",
    "streetlight",
    "outage",
    "voltage",
    "transformer",
    "wire",
    "electric",
];

const SANITATION_KEYWORDS: &[&str] = &[
    "garbage",
    "waste",
    "trash",
    "cleaning",
    "dump",
    "sewage",
    "hygiene",
    "sanitation",
    "dirty",
];

const SAFETY_KEYWORDS: &[&str] = &[
    "safety",
    "dangerous",
    "accident",
    "crime",
    "security",
    "emergency",
    "threat",
    "unsafe",
    "risk",
];

const NOISE_KEYWORDS: &[&str] = &[
    "noise",
    "loud",
    "disturbance",
    "sound",
    "nuisance",
    "party",
    "construction",
    "vehicle",
    "horn",
];

const URGENT_PRIORITY_TOKENS: &[&str] = &[
    "urgent",
    "emergency",
    "immediate",
    "dangerous",
    "critical",
    "severe",
    "accident",
];

const HIGH_PRIORITY_TOKENS: &[&str] = &[
    "important",
    "serious",
    "significant",
    "major",
    "risk",
    "safety",
];

const MEDIUM_PRIORITY_TOKENS: &[&str] = &["moderate", "issue", "problem", "concern", "repair"];

const LOW_PRIORITY_TOKENS: &[&str] = &["minor", "small", "slight", "routine", "regular"];

const NEGATION_TOKENS: &[&str] = &["not", "no", "never", "without", "lack", "missing"];

const DURATION_TOKENS: &[&str] = &["days", "weeks", "months", "long", "since", "still"];

const NEGATIVE_SENTIMENT_TOKENS: &[&str] = &[
    "no", "not", "never", "cannot", "bad", "worse", "worst", "terrible",
];

const POSITIVE_SENTIMENT_TOKENS: &[&str] = &[
    "good",
    "better",
    "best",
    "great",
    "excellent",
    "perfect",
];

const URGENCY_HIGH_TERMS: &[&str] = &[
    "immediate",
    "urgent",
    "emergency",
    "critical",
    "dangerous",
    "severe",
];

const URGENCY_MEDIUM_TERMS: &[&str] = &[
    "important",
    "needed",
    "required",
    "necessary",
    "significant",
];

const URGENCY_LOW_TERMS: &[&str] = &["would like", "could", "maybe", "perhaps", "sometime"];

const IMPACT_HIGH_TERMS: &[&str] = &[
    "everyone",
    "community",
    "children",
    "elderly",
    "disabled",
    "public",
];

const IMPACT_MEDIUM_TERMS: &[&str] = &["people", "residents", "neighbors", "local"];

const IMPACT_LOW_TERMS: &[&str] = &["me", "my", "personal", "individual"];

const CATEGORY_KEYWORDS: &[(CategoryTag, &[&str])] = &[
    (CategoryTag::RoadsInfrastructure, ROADS_KEYWORDS),
    (CategoryTag::WaterSupply, WATER_KEYWORDS),
    (CategoryTag::Electricity, ELECTRICITY_KEYWORDS),
    (CategoryTag::Sanitation, SANITATION_KEYWORDS),
    (CategoryTag::PublicSafety, SAFETY_KEYWORDS),
    (CategoryTag::NoisePollution, NOISE_KEYWORDS),
];

/// A dimension of the keyword tables. Surface words may overlap across
/// dimensions; term roles within one dimension are disjoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LexiconDimension {
    Category,
    Priority,
    Sentiment,
    Impact,
}

/// Step-function tiers used by the urgency and impact scales.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StepBand {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LexiconTag {
    Category(CategoryTag),
    Priority(PriorityTier),
    Sentiment(Polarity),
    Impact(StepBand),
}

/// Read-only keyword tables. No mutation, no failure modes; a word with no
/// entry in a dimension resolves to the empty set.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lexicon;

impl Lexicon {
    pub fn mvp_v1() -> Self {
        Self
    }

    /// Category keyword lists in the load-bearing declaration order.
    pub fn category_keywords(&self) -> &'static [(CategoryTag, &'static [&'static str])] {
        CATEGORY_KEYWORDS
    }

    pub fn priority_tokens(&self, tier: PriorityTier) -> &'static [&'static str] {
        match tier {
            PriorityTier::Urgent => URGENT_PRIORITY_TOKENS,
            PriorityTier::High => HIGH_PRIORITY_TOKENS,
            PriorityTier::Medium => MEDIUM_PRIORITY_TOKENS,
            PriorityTier::Low => LOW_PRIORITY_TOKENS,
        }
    }

    pub fn priority_weight(&self, tier: PriorityTier) -> u32 {
        match tier {
            PriorityTier::Urgent => PRIORITY_WEIGHT_URGENT,
            PriorityTier::High => PRIORITY_WEIGHT_HIGH,
            PriorityTier::Medium => PRIORITY_WEIGHT_MEDIUM,
            PriorityTier::Low => PRIORITY_WEIGHT_LOW,
        }
    }

    pub fn negation_tokens(&self) -> &'static [&'static str] {
        NEGATION_TOKENS
    }

    pub fn duration_tokens(&self) -> &'static [&'static str] {
        DURATION_TOKENS
    }

    pub fn sentiment_tokens(&self, polarity: Polarity) -> &'static [&'static str] {
        match polarity {
            Polarity::Negative => NEGATIVE_SENTIMENT_TOKENS,
            Polarity::Positive => POSITIVE_SENTIMENT_TOKENS,
            Polarity::Neutral => &[],
        }
    }

    pub fn urgency_terms(&self, band: StepBand) -> &'static [&'static str] {
        match band {
            StepBand::High => URGENCY_HIGH_TERMS,
            StepBand::Medium => URGENCY_MEDIUM_TERMS,
            StepBand::Low => URGENCY_LOW_TERMS,
        }
    }

    pub fn impact_terms(&self, band: StepBand) -> &'static [&'static str] {
        match band {
            StepBand::High => IMPACT_HIGH_TERMS,
            StepBand::Medium => IMPACT_MEDIUM_TERMS,
            StepBand::Low => IMPACT_LOW_TERMS,
        }
    }

    /// Exact-word lookup across one dimension.
    pub fn lookup(&self, dimension: LexiconDimension, word: &str) -> BTreeSet<LexiconTag> {
        let word = word.to_ascii_lowercase();
        let mut tags = BTreeSet::new();
        match dimension {
            LexiconDimension::Category => {
                for (category, keywords) in self.category_keywords() {
                    if keywords.contains(&word.as_str()) {
                        tags.insert(LexiconTag::Category(*category));
                    }
                }
            }
            LexiconDimension::Priority => {
                for tier in [
                    PriorityTier::Urgent,
                    PriorityTier::High,
                    PriorityTier::Medium,
                    PriorityTier::Low,
                ] {
                    if self.priority_tokens(tier).contains(&word.as_str()) {
                        tags.insert(LexiconTag::Priority(tier));
                    }
                }
            }
            LexiconDimension::Sentiment => {
                for polarity in [Polarity::Negative, Polarity::Positive] {
                    if self.sentiment_tokens(polarity).contains(&word.as_str()) {
                        tags.insert(LexiconTag::Sentiment(polarity));
                    }
                }
            }
            LexiconDimension::Impact => {
                for band in [StepBand::High, StepBand::Medium, StepBand::Low] {
                    if self.impact_terms(band).contains(&word.as_str()) {
                        tags.insert(LexiconTag::Impact(band));
                    }
                }
            }
        }
        tags
    }
}
