#![forbid(unsafe_code)]

use civica_kernel_contracts::complaint::{
    CategoryTag, ClassificationResult, Polarity, PriorityTier,
};

use crate::lexicon::{Lexicon, StepBand};

pub const URGENCY_SCORE_HIGH: u8 = 10;
pub const URGENCY_SCORE_MEDIUM: u8 = 5;
pub const URGENCY_SCORE_LOW: u8 = 2;
pub const URGENCY_SCORE_DEFAULT: u8 = 3;

pub const IMPACT_SCORE_HIGH: u8 = 10;
pub const IMPACT_SCORE_MEDIUM: u8 = 6;
pub const IMPACT_SCORE_LOW: u8 = 3;
pub const IMPACT_SCORE_DEFAULT: u8 = 5;

/// Sentiment/urgency/impact tuple for one complaint text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentimentAnalysis {
    pub sentiment: Polarity,
    pub urgency: u8,
    pub impact: u8,
}

/// Deterministic keyword scoring over normalized complaint text. Every
/// operation is total: malformed or empty input falls back to the
/// documented defaults, never an error.
#[derive(Debug, Clone)]
pub struct ClassifierRuntime {
    lexicon: Lexicon,
}

impl ClassifierRuntime {
    pub fn new(lexicon: Lexicon) -> Self {
        Self { lexicon }
    }

    pub fn mvp_v1() -> Self {
        Self::new(Lexicon::mvp_v1())
    }

    /// Category with the strictly highest keyword-hit sum. Keywords match as
    /// substrings within tokens ("streetlight" counts for "light"). Ties keep
    /// the first-declared category; an all-zero scoreboard yields `General`.
    pub fn categorize(&self, text: &str) -> CategoryTag {
        let tokens = tokenize(text);

        let mut best = CategoryTag::General;
        let mut best_score = 0u32;
        for (category, keywords) in self.lexicon.category_keywords() {
            let score: u32 = keywords
                .iter()
                .map(|keyword| tokens.iter().filter(|token| token.contains(keyword)).count() as u32)
                .sum();
            if score > best_score {
                best = *category;
                best_score = score;
            }
        }
        best
    }

    /// Weighted exact-token tier scoring with contextual adjustments. The
    /// resolution order urgent/high/medium/low is a fixed tie-break and must
    /// not be reordered.
    pub fn priority(&self, text: &str) -> PriorityTier {
        let tokens = tokenize(text);

        let mut scores = [0u32; 4];
        for (slot, tier) in [
            PriorityTier::Urgent,
            PriorityTier::High,
            PriorityTier::Medium,
            PriorityTier::Low,
        ]
        .into_iter()
        .enumerate()
        {
            let weight = self.lexicon.priority_weight(tier);
            scores[slot] = self
                .lexicon
                .priority_tokens(tier)
                .iter()
                .filter(|keyword| tokens.iter().any(|token| token == *keyword))
                .count() as u32
                * weight;
        }

        let has_negation = self
            .lexicon
            .negation_tokens()
            .iter()
            .any(|keyword| tokens.iter().any(|token| token == keyword));
        let has_duration = self
            .lexicon
            .duration_tokens()
            .iter()
            .any(|keyword| tokens.iter().any(|token| token == keyword));

        if has_negation {
            scores[1] += 1;
        }
        if has_duration {
            scores[0] += 1;
        }

        if scores[0] > 0 {
            PriorityTier::Urgent
        } else if scores[1] > 1 {
            PriorityTier::High
        } else if scores[2] > 0 {
            PriorityTier::Medium
        } else if scores[3] > 0 {
            PriorityTier::Low
        } else {
            PriorityTier::Medium
        }
    }

    /// Token-bucket sentiment plus the urgency and impact step functions.
    /// Urgency and impact scan the whole lower-cased text for substrings,
    /// deliberately untokenized so multi-word terms like "would like" fire.
    pub fn sentiment(&self, text: &str) -> SentimentAnalysis {
        let tokens = tokenize(text);

        let mut negative = 0u32;
        let mut positive = 0u32;
        for token in &tokens {
            if self
                .lexicon
                .sentiment_tokens(Polarity::Negative)
                .contains(&token.as_str())
            {
                negative += 1;
            } else if self
                .lexicon
                .sentiment_tokens(Polarity::Positive)
                .contains(&token.as_str())
            {
                positive += 1;
            }
        }

        let sentiment = if negative > positive {
            Polarity::Negative
        } else if positive > negative {
            Polarity::Positive
        } else {
            Polarity::Neutral
        };

        let lowered = text.to_lowercase();
        let urgency = step_score(
            &lowered,
            |band| self.lexicon.urgency_terms(band),
            [
                URGENCY_SCORE_HIGH,
                URGENCY_SCORE_MEDIUM,
                URGENCY_SCORE_LOW,
                URGENCY_SCORE_DEFAULT,
            ],
        );
        let impact = step_score(
            &lowered,
            |band| self.lexicon.impact_terms(band),
            [
                IMPACT_SCORE_HIGH,
                IMPACT_SCORE_MEDIUM,
                IMPACT_SCORE_LOW,
                IMPACT_SCORE_DEFAULT,
            ],
        );

        SentimentAnalysis {
            sentiment,
            urgency,
            impact,
        }
    }

    pub fn classify(&self, text: &str) -> ClassificationResult {
        let analysis = self.sentiment(text);
        ClassificationResult {
            category: self.categorize(text),
            priority: self.priority(text),
            sentiment: analysis.sentiment,
            urgency: analysis.urgency,
            impact: analysis.impact,
        }
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(|token| token.to_string())
        .collect()
}

/// First matching band in high/medium/low order wins; the last score is the
/// no-match default.
fn step_score(
    lowered_text: &str,
    terms: impl Fn(StepBand) -> &'static [&'static str],
    scores: [u8; 4],
) -> u8 {
    for (slot, band) in [StepBand::High, StepBand::Medium, StepBand::Low]
        .into_iter()
        .enumerate()
    {
        if terms(band)
            .iter()
            .any(|term| lowered_text.contains(term))
        {
            return scores[slot];
        }
    }
    scores[3]
}
