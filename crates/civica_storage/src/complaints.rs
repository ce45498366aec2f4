#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use civica_kernel_contracts::complaint::{
    CategoryTag, ComplaintId, ComplaintRecord, ComplaintStatus, PriorityTier,
};
use civica_kernel_contracts::{ContractViolation, UnixTimeMs, Validate};

#[derive(Debug, Clone, PartialEq)]
pub enum StorageError {
    DuplicateKey { table: &'static str, key: String },
    NotFound { table: &'static str, key: String },
    ContractViolation(ContractViolation),
}

impl From<ContractViolation> for StorageError {
    fn from(v: ContractViolation) -> Self {
        StorageError::ContractViolation(v)
    }
}

/// AND-combined optional filters; absent fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComplaintSearchQuery {
    pub category: Option<CategoryTag>,
    pub priority: Option<PriorityTier>,
    pub status: Option<ComplaintStatus>,
    pub location: Option<String>,
    pub submitted_after: Option<UnixTimeMs>,
    pub submitted_before: Option<UnixTimeMs>,
    pub term: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComplaintStats {
    pub total: u64,
    pub pending: u64,
    pub resolved: u64,
    pub by_category: BTreeMap<CategoryTag, u64>,
    pub by_priority: BTreeMap<PriorityTier, u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdateOutcome {
    pub previous: ComplaintStatus,
    pub record: ComplaintRecord,
}

/// In-memory complaint table. Records are created once and never deleted
/// here; `status` is the only mutable column.
#[derive(Debug, Clone, Default)]
pub struct ComplaintStore {
    complaints: BTreeMap<ComplaintId, ComplaintRecord>,
}

impl ComplaintStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, record: ComplaintRecord) -> Result<(), StorageError> {
        record.validate()?;
        if self.complaints.contains_key(&record.id) {
            return Err(StorageError::DuplicateKey {
                table: "complaints",
                key: record.id.as_str().to_string(),
            });
        }
        self.complaints.insert(record.id.clone(), record);
        Ok(())
    }

    pub fn get(&self, id: &ComplaintId) -> Option<&ComplaintRecord> {
        self.complaints.get(id)
    }

    pub fn update_status(
        &mut self,
        id: &ComplaintId,
        status: ComplaintStatus,
    ) -> Result<StatusUpdateOutcome, StorageError> {
        let record = self
            .complaints
            .get_mut(id)
            .ok_or_else(|| StorageError::NotFound {
                table: "complaints",
                key: id.as_str().to_string(),
            })?;
        let previous = record.status;
        record.status = status;
        Ok(StatusUpdateOutcome {
            previous,
            record: record.clone(),
        })
    }

    /// Newest-first; ties on submission time fall back to id order for a
    /// deterministic listing.
    pub fn search(&self, query: &ComplaintSearchQuery) -> Vec<ComplaintRecord> {
        let term = query.term.as_ref().map(|t| t.to_lowercase());
        let mut results: Vec<ComplaintRecord> = self
            .complaints
            .values()
            .filter(|record| {
                if let Some(category) = query.category {
                    if record.category != category {
                        return false;
                    }
                }
                if let Some(priority) = query.priority {
                    if record.priority != priority {
                        return false;
                    }
                }
                if let Some(status) = query.status {
                    if record.status != status {
                        return false;
                    }
                }
                if let Some(location) = &query.location {
                    if &record.location != location {
                        return false;
                    }
                }
                if let Some(after) = query.submitted_after {
                    if record.submitted_at < after {
                        return false;
                    }
                }
                if let Some(before) = query.submitted_before {
                    if record.submitted_at > before {
                        return false;
                    }
                }
                if let Some(term) = &term {
                    let in_original = record.original_text.to_lowercase().contains(term);
                    let in_translated = record
                        .translated_text
                        .as_ref()
                        .map(|t| t.to_lowercase().contains(term))
                        .unwrap_or(false);
                    if !in_original && !in_translated {
                        return false;
                    }
                }
                true
            })
            .cloned()
            .collect();
        results.sort_by(|a, b| {
            b.submitted_at
                .cmp(&a.submitted_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        results
    }

    pub fn stats(&self) -> ComplaintStats {
        let mut stats = ComplaintStats::default();
        for record in self.complaints.values() {
            stats.total += 1;
            match record.status {
                ComplaintStatus::Pending => stats.pending += 1,
                ComplaintStatus::Resolved => stats.resolved += 1,
                _ => {}
            }
            *stats.by_category.entry(record.category).or_insert(0) += 1;
            *stats.by_priority.entry(record.priority).or_insert(0) += 1;
        }
        stats
    }

    pub fn len(&self) -> usize {
        self.complaints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.complaints.is_empty()
    }
}
