#![forbid(unsafe_code)]

use std::collections::BTreeSet;

use crate::complaint::{CategoryTag, ComplaintRecord, PriorityTier};
use crate::{ContractViolation, SchemaVersion, Validate};

pub const SUBSCRIPTION_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

pub const MAX_CONNECTION_ID_CHARS: usize = 128;
pub const MAX_LOCATION_FILTER_CHARS: usize = 128;
pub const MAX_FILTER_SET_ENTRIES: usize = 64;

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

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new(v: impl Into<String>) -> Result<Self, ContractViolation> {
        let v = Self(v.into());
        v.validate()?;
        Ok(v)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for ConnectionId {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_token("connection_id", &self.0, MAX_CONNECTION_ID_CHARS)?;
        if !self.0.is_ascii() {
            return Err(ContractViolation::InvalidValue {
                field: "connection_id",
                reason: "must be ASCII",
            });
        }
        Ok(())
    }
}

/// One connection's declared interest filter. An empty set matches every
/// value of that dimension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub categories: BTreeSet<CategoryTag>,
    pub priorities: BTreeSet<PriorityTier>,
    pub locations: BTreeSet<String>,
    pub notify_on_new_complaints: bool,
    pub notify_on_status_change: bool,
}

impl Subscription {
    /// The registration default: receive everything.
    pub fn default_all() -> Self {
        Self {
            categories: BTreeSet::new(),
            priorities: BTreeSet::new(),
            locations: BTreeSet::new(),
            notify_on_new_complaints: true,
            notify_on_status_change: true,
        }
    }

    /// Partial update: only supplied fields replace, others are preserved.
    pub fn apply(&mut self, patch: &SubscriptionPatch) {
        if let Some(categories) = &patch.categories {
            self.categories = categories.clone();
        }
        if let Some(priorities) = &patch.priorities {
            self.priorities = priorities.clone();
        }
        if let Some(locations) = &patch.locations {
            self.locations = locations.clone();
        }
        if let Some(v) = patch.notify_on_new_complaints {
            self.notify_on_new_complaints = v;
        }
        if let Some(v) = patch.notify_on_status_change {
            self.notify_on_status_change = v;
        }
    }
}

impl Validate for Subscription {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.categories.len() > MAX_FILTER_SET_ENTRIES
            || self.priorities.len() > MAX_FILTER_SET_ENTRIES
            || self.locations.len() > MAX_FILTER_SET_ENTRIES
        {
            return Err(ContractViolation::InvalidValue {
                field: "subscription",
                reason: "filter set exceeds max entries",
            });
        }
        for location in &self.locations {
            validate_token(
                "subscription.locations",
                location,
                MAX_LOCATION_FILTER_CHARS,
            )?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionPatch {
    pub categories: Option<BTreeSet<CategoryTag>>,
    pub priorities: Option<BTreeSet<PriorityTier>>,
    pub locations: Option<BTreeSet<String>>,
    pub notify_on_new_complaints: Option<bool>,
    pub notify_on_status_change: Option<bool>,
}

impl Validate for SubscriptionPatch {
    fn validate(&self) -> Result<(), ContractViolation> {
        if let Some(locations) = &self.locations {
            if locations.len() > MAX_FILTER_SET_ENTRIES {
                return Err(ContractViolation::InvalidValue {
                    field: "subscription_patch.locations",
                    reason: "filter set exceeds max entries",
                });
            }
            for location in locations {
                validate_token(
                    "subscription_patch.locations",
                    location,
                    MAX_LOCATION_FILTER_CHARS,
                )?;
            }
        }
        if let Some(categories) = &self.categories {
            if categories.len() > MAX_FILTER_SET_ENTRIES {
                return Err(ContractViolation::InvalidValue {
                    field: "subscription_patch.categories",
                    reason: "filter set exceeds max entries",
                });
            }
        }
        if let Some(priorities) = &self.priorities {
            if priorities.len() > MAX_FILTER_SET_ENTRIES {
                return Err(ContractViolation::InvalidValue {
                    field: "subscription_patch.priorities",
                    reason: "filter set exceeds max entries",
                });
            }
        }
        Ok(())
    }
}

/// Complaint-lifecycle events fanned out to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComplaintEvent {
    NewComplaint(ComplaintRecord),
    StatusChanged(ComplaintRecord),
}

impl ComplaintEvent {
    pub fn record(&self) -> &ComplaintRecord {
        match self {
            ComplaintEvent::NewComplaint(record) => record,
            ComplaintEvent::StatusChanged(record) => record,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ComplaintEvent::NewComplaint(_) => "new_complaint",
            ComplaintEvent::StatusChanged(_) => "status_update",
        }
    }
}

impl Validate for ComplaintEvent {
    fn validate(&self) -> Result<(), ContractViolation> {
        self.record().validate()
    }
}

/// Lifecycle of one managed connection, local or upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Open,
    Closing,
    Erroring,
}
