#![forbid(unsafe_code)]

use crate::{ContractViolation, SchemaVersion, UnixTimeMs, Validate};

pub const COMPLAINT_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

pub const MAX_COMPLAINT_TEXT_CHARS: usize = 8192;
pub const MAX_LOCATION_CHARS: usize = 128;
pub const MAX_LANGUAGE_TAG_CHARS: usize = 16;
pub const MAX_COMPLAINT_ID_CHARS: usize = 64;

pub const URGENCY_SCALE_MAX: u8 = 10;
pub const IMPACT_SCALE_MAX: u8 = 10;

fn validate_token(
    field: &'static str,
    value: &str,
    max_len: usize,
) -> Result<(), ContractViolation> {
    if value.trim().is_empty() {
        return Err(ContractViolation::InvalidValue {
            field,
            reason: "must not be empty",
        });
    }
    if value.len() > max_len {
        return Err(ContractViolation::InvalidValue {
            field,
            reason: "exceeds max length",
        });
    }
    Ok(())
}

fn validate_opt_token(
    field: &'static str,
    value: &Option<String>,
    max_len: usize,
) -> Result<(), ContractViolation> {
    if let Some(v) = value {
        validate_token(field, v, max_len)?;
    }
    Ok(())
}

/// Complaint topic classes. Declaration order is the tie-break order for
/// category scoring and must not be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CategoryTag {
    RoadsInfrastructure,
    WaterSupply,
    Electricity,
    Sanitation,
    PublicSafety,
    NoisePollution,
    General,
}

impl CategoryTag {
    pub fn as_str(self) -> &'static str {
        match self {
            CategoryTag::RoadsInfrastructure => "Roads & Infrastructure",
            CategoryTag::WaterSupply => "Water Supply",
            CategoryTag::Electricity => "Electricity",
            CategoryTag::Sanitation => "Sanitation",
            CategoryTag::PublicSafety => "Public Safety",
            CategoryTag::NoisePollution => "Noise Pollution",
            CategoryTag::General => "General",
        }
    }

    pub fn parse(value: &str) -> Result<Self, ContractViolation> {
        match value {
            "Roads & Infrastructure" => Ok(CategoryTag::RoadsInfrastructure),
            "Water Supply" => Ok(CategoryTag::WaterSupply),
            "Electricity" => Ok(CategoryTag::Electricity),
            "Sanitation" => Ok(CategoryTag::Sanitation),
            "Public Safety" => Ok(CategoryTag::PublicSafety),
            "Noise Pollution" => Ok(CategoryTag::NoisePollution),
            "General" => Ok(CategoryTag::General),
            _ => Err(ContractViolation::InvalidValue {
                field: "category",
                reason: "unknown category tag",
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PriorityTier {
    Urgent,
    High,
    Medium,
    Low,
}

impl PriorityTier {
    pub fn as_str(self) -> &'static str {
        match self {
            PriorityTier::Urgent => "Urgent",
            PriorityTier::High => "High",
            PriorityTier::Medium => "Medium",
            PriorityTier::Low => "Low",
        }
    }

    pub fn parse(value: &str) -> Result<Self, ContractViolation> {
        match value {
            "Urgent" => Ok(PriorityTier::Urgent),
            "High" => Ok(PriorityTier::High),
            "Medium" => Ok(PriorityTier::Medium),
            "Low" => Ok(PriorityTier::Low),
            _ => Err(ContractViolation::InvalidValue {
                field: "priority",
                reason: "unknown priority tier",
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Polarity {
    Negative,
    Neutral,
    Positive,
}

impl Polarity {
    pub fn as_str(self) -> &'static str {
        match self {
            Polarity::Negative => "negative",
            Polarity::Neutral => "neutral",
            Polarity::Positive => "positive",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComplaintStatus {
    Submitted,
    Pending,
    InProgress,
    Resolved,
    Rejected,
}

impl ComplaintStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ComplaintStatus::Submitted => "Submitted",
            ComplaintStatus::Pending => "Pending",
            ComplaintStatus::InProgress => "InProgress",
            ComplaintStatus::Resolved => "Resolved",
            ComplaintStatus::Rejected => "Rejected",
        }
    }

    pub fn parse(value: &str) -> Result<Self, ContractViolation> {
        match value {
            "Submitted" => Ok(ComplaintStatus::Submitted),
            "Pending" => Ok(ComplaintStatus::Pending),
            "InProgress" => Ok(ComplaintStatus::InProgress),
            "Resolved" => Ok(ComplaintStatus::Resolved),
            "Rejected" => Ok(ComplaintStatus::Rejected),
            _ => Err(ContractViolation::InvalidValue {
                field: "status",
                reason: "unknown complaint status",
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntakeMethod {
    Voice,
    Manual,
}

impl IntakeMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            IntakeMethod::Voice => "voice",
            IntakeMethod::Manual => "manual",
        }
    }

    pub fn parse(value: &str) -> Result<Self, ContractViolation> {
        match value {
            "voice" => Ok(IntakeMethod::Voice),
            "manual" => Ok(IntakeMethod::Manual),
            _ => Err(ContractViolation::InvalidValue {
                field: "method",
                reason: "unknown intake method",
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComplaintId(String);

impl ComplaintId {
    pub fn new(v: impl Into<String>) -> Result<Self, ContractViolation> {
        let v = Self(v.into());
        v.validate()?;
        Ok(v)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for ComplaintId {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_token("complaint_id", &self.0, MAX_COMPLAINT_ID_CHARS)?;
        if !self.0.is_ascii() {
            return Err(ContractViolation::InvalidValue {
                field: "complaint_id",
                reason: "must be ASCII",
            });
        }
        Ok(())
    }
}

/// Output of the classifier over one complaint text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassificationResult {
    pub category: CategoryTag,
    pub priority: PriorityTier,
    pub sentiment: Polarity,
    pub urgency: u8,
    pub impact: u8,
}

impl Validate for ClassificationResult {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.urgency > URGENCY_SCALE_MAX {
            return Err(ContractViolation::InvalidRange {
                field: "classification.urgency",
                min: 0.0,
                max: URGENCY_SCALE_MAX as f64,
                got: self.urgency as f64,
            });
        }
        if self.impact > IMPACT_SCALE_MAX {
            return Err(ContractViolation::InvalidRange {
                field: "classification.impact",
                min: 0.0,
                max: IMPACT_SCALE_MAX as f64,
                got: self.impact as f64,
            });
        }
        Ok(())
    }
}

/// Caller-supplied intake fields before classification and id assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComplaintDraft {
    pub raw_text: String,
    pub translated_text: Option<String>,
    pub location: Option<String>,
    pub language: String,
    pub method: IntakeMethod,
    pub category_override: Option<CategoryTag>,
    pub priority_override: Option<PriorityTier>,
}

impl ComplaintDraft {
    pub fn v1(
        raw_text: impl Into<String>,
        translated_text: Option<String>,
        location: Option<String>,
        language: impl Into<String>,
        method: IntakeMethod,
    ) -> Result<Self, ContractViolation> {
        let draft = Self {
            raw_text: raw_text.into(),
            translated_text,
            location,
            language: language.into(),
            method,
            category_override: None,
            priority_override: None,
        };
        draft.validate()?;
        Ok(draft)
    }

    pub fn with_overrides(
        mut self,
        category: Option<CategoryTag>,
        priority: Option<PriorityTier>,
    ) -> Self {
        self.category_override = category;
        self.priority_override = priority;
        self
    }
}

impl Validate for ComplaintDraft {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_token("draft.raw_text", &self.raw_text, MAX_COMPLAINT_TEXT_CHARS)?;
        validate_opt_token(
            "draft.translated_text",
            &self.translated_text,
            MAX_COMPLAINT_TEXT_CHARS,
        )?;
        validate_opt_token("draft.location", &self.location, MAX_LOCATION_CHARS)?;
        validate_token("draft.language", &self.language, MAX_LANGUAGE_TAG_CHARS)?;
        Ok(())
    }
}

/// Canonical complaint record. Created once at submission; `status` is the
/// only field mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComplaintRecord {
    pub id: ComplaintId,
    pub original_text: String,
    pub translated_text: Option<String>,
    pub category: CategoryTag,
    pub priority: PriorityTier,
    pub location: String,
    pub language: String,
    pub method: IntakeMethod,
    pub submitted_at: UnixTimeMs,
    pub status: ComplaintStatus,
    pub analysis: ClassificationResult,
}

impl Validate for ComplaintRecord {
    fn validate(&self) -> Result<(), ContractViolation> {
        self.id.validate()?;
        validate_token(
            "complaint.original_text",
            &self.original_text,
            MAX_COMPLAINT_TEXT_CHARS,
        )?;
        validate_opt_token(
            "complaint.translated_text",
            &self.translated_text,
            MAX_COMPLAINT_TEXT_CHARS,
        )?;
        validate_token("complaint.location", &self.location, MAX_LOCATION_CHARS)?;
        validate_token("complaint.language", &self.language, MAX_LANGUAGE_TAG_CHARS)?;
        self.analysis.validate()?;
        Ok(())
    }
}
