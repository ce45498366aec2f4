#![forbid(unsafe_code)]

use civica_kernel_contracts::complaint::{
    ComplaintDraft, ComplaintId, ComplaintRecord, ComplaintStatus,
};
use civica_kernel_contracts::{ContractViolation, UnixTimeMs, Validate};
use rand::Rng;
use regex::Regex;

use crate::classifier::ClassifierRuntime;

pub const COMPLAINT_ID_PREFIX: &str = "CMP";
pub const COMPLAINT_ID_SUFFIX_CHARS: usize = 5;

const BASE36_ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

const LOCATION_PATTERNS: &[&str] = &[
    r"(?i)near\s+([^,.]+)",
    r"(?i)at\s+([^,.]+)",
    r"(?i)in\s+([^,.]+)",
    r"(?i)location[:\s]+([^,.]+)",
    r"(?i)area[:\s]+([^,.]+)",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblerConfig {
    pub fallback_location: String,
}

impl AssemblerConfig {
    pub fn mvp_v1() -> Self {
        Self {
            fallback_location: "Not specified".to_string(),
        }
    }
}

/// Builds canonical complaint records from intake drafts: classification,
/// id assignment, location resolution, and the unconditional Submitted
/// status. Collision probability of the generated id is accepted as
/// negligible and is not checked against existing records.
#[derive(Debug, Clone)]
pub struct ComplaintAssembler {
    config: AssemblerConfig,
    classifier: ClassifierRuntime,
    location_patterns: Vec<Regex>,
}

impl ComplaintAssembler {
    pub fn new(config: AssemblerConfig, classifier: ClassifierRuntime) -> Self {
        let location_patterns = LOCATION_PATTERNS
            .iter()
            .map(|pattern| {
                Regex::new(pattern).expect("static location pattern must compile")
            })
            .collect();
        Self {
            config,
            classifier,
            location_patterns,
        }
    }

    pub fn mvp_v1() -> Self {
        Self::new(AssemblerConfig::mvp_v1(), ClassifierRuntime::mvp_v1())
    }

    /// Classification always runs on the raw text, never the translation.
    /// Explicit category/priority overrides take precedence over classified
    /// values; the analysis tuple keeps the classifier's own verdict.
    pub fn assemble(
        &self,
        draft: &ComplaintDraft,
        now: UnixTimeMs,
    ) -> Result<ComplaintRecord, ContractViolation> {
        draft.validate()?;

        let analysis = self.classifier.classify(&draft.raw_text);
        let category = draft.category_override.unwrap_or(analysis.category);
        let priority = draft.priority_override.unwrap_or(analysis.priority);

        let location = draft
            .location
            .clone()
            .filter(|v| !v.trim().is_empty())
            .or_else(|| self.extract_location(&draft.raw_text))
            .unwrap_or_else(|| self.config.fallback_location.clone());

        let record = ComplaintRecord {
            id: generate_complaint_id(now)?,
            original_text: draft.raw_text.clone(),
            translated_text: draft.translated_text.clone(),
            category,
            priority,
            location,
            language: draft.language.clone(),
            method: draft.method,
            submitted_at: now,
            status: ComplaintStatus::Submitted,
            analysis,
        };
        record.validate()?;
        Ok(record)
    }

    /// First matching pattern wins; the capture runs up to the next comma or
    /// period.
    fn extract_location(&self, text: &str) -> Option<String> {
        for pattern in &self.location_patterns {
            if let Some(captures) = pattern.captures(text) {
                if let Some(matched) = captures.get(1) {
                    let trimmed = matched.as_str().trim();
                    if !trimmed.is_empty() {
                        return Some(trimmed.to_string());
                    }
                }
            }
        }
        None
    }
}

/// `CMP-<base36 millis>-<random base36 suffix>`, upper-cased.
fn generate_complaint_id(now: UnixTimeMs) -> Result<ComplaintId, ContractViolation> {
    let mut rng = rand::thread_rng();
    let mut suffix = String::with_capacity(COMPLAINT_ID_SUFFIX_CHARS);
    for _ in 0..COMPLAINT_ID_SUFFIX_CHARS {
        let idx = rng.gen_range(0..BASE36_ALPHABET.len());
        suffix.push(BASE36_ALPHABET[idx] as char);
    }
    let id = format!("{COMPLAINT_ID_PREFIX}-{}-{suffix}", base36(now.0)).to_ascii_uppercase();
    ComplaintId::new(id)
}

fn base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(BASE36_ALPHABET[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    String::from_utf8(digits).expect("base36 digits are ASCII")
}
