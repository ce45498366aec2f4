#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use civica_engines::assembler::ComplaintAssembler;
use civica_kernel_contracts::complaint::{
    CategoryTag, ComplaintDraft, ComplaintId, ComplaintRecord, ComplaintStatus, IntakeMethod,
    PriorityTier,
};
use civica_kernel_contracts::subscription::{ComplaintEvent, ConnectionId, SubscriptionPatch};
use civica_kernel_contracts::UnixTimeMs;
use civica_os::collaborators::{ComplaintSink, EventPublisher, SinkError};
use civica_os::intake::{ComplaintIntakeConfig, ComplaintIntakeOutcome, ComplaintIntakeWiring};
use civica_os::status::{StatusChangeConfig, StatusChangeOutcome, StatusChangeWiring};
use civica_storage::{ComplaintSearchQuery, ComplaintStore, StorageError};
use tracing::debug;

pub mod relay;
pub mod router;

use router::{NotificationRouter, RouterConfig};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterError {
    InvalidRequest(String),
    NotFound(String),
    Internal(String),
}

pub fn now_unix_ms() -> UnixTimeMs {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0);
    UnixTimeMs(millis)
}

/// Persistence collaborator backed by the in-memory store, shared between
/// the intake and status wirings.
#[derive(Debug, Clone, Default)]
pub struct SharedComplaintStore {
    store: Arc<Mutex<ComplaintStore>>,
}

impl SharedComplaintStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_store(&self) -> std::sync::MutexGuard<'_, ComplaintStore> {
        match self.store.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn with_store<T>(&self, f: impl FnOnce(&ComplaintStore) -> T) -> T {
        f(&self.lock_store())
    }
}

impl ComplaintSink for SharedComplaintStore {
    fn insert_complaint(&mut self, record: &ComplaintRecord) -> Result<(), SinkError> {
        self.lock_store()
            .insert(record.clone())
            .map_err(|err| match err {
                StorageError::NotFound { key, .. } => SinkError::NotFound { key },
                StorageError::DuplicateKey { key, .. } => SinkError::Unavailable {
                    reason: format!("duplicate complaint id {key}"),
                },
                StorageError::ContractViolation(violation) => SinkError::Unavailable {
                    reason: format!("record failed storage contract: {violation:?}"),
                },
            })
    }

    fn apply_status(
        &mut self,
        id: &ComplaintId,
        status: ComplaintStatus,
    ) -> Result<ComplaintRecord, SinkError> {
        self.lock_store()
            .update_status(id, status)
            .map(|outcome| outcome.record)
            .map_err(|err| match err {
                StorageError::NotFound { key, .. } => SinkError::NotFound { key },
                StorageError::DuplicateKey { key, .. } => SinkError::Unavailable {
                    reason: format!("duplicate complaint id {key}"),
                },
                StorageError::ContractViolation(violation) => SinkError::Unavailable {
                    reason: format!("record failed storage contract: {violation:?}"),
                },
            })
    }
}

/// Broadcast entry point handed to the wirings: publication is a
/// synchronous enqueue into the router's per-connection queues.
#[derive(Debug, Clone)]
pub struct RouterPublisher {
    router: NotificationRouter,
}

impl RouterPublisher {
    pub fn new(router: NotificationRouter) -> Self {
        Self { router }
    }
}

impl EventPublisher for RouterPublisher {
    fn publish(&self, event: ComplaintEvent) {
        let report = self.router.broadcast(&event);
        debug!(
            kind = event.kind(),
            matched = report.matched,
            delivered = report.delivered,
            "event published"
        );
    }
}

// ---------------------------------------------------------------------------
// Wire-facing DTOs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AnalysisPayload {
    pub sentiment: String,
    pub urgency: u8,
    pub impact: u8,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ComplaintPayload {
    pub id: String,
    pub original_text: String,
    pub translated_text: Option<String>,
    pub category: String,
    pub priority: String,
    pub location: String,
    pub language: String,
    pub method: String,
    pub submitted_at_ms: u64,
    pub status: String,
    pub analysis: AnalysisPayload,
}

impl ComplaintPayload {
    pub fn from_record(record: &ComplaintRecord) -> Self {
        Self {
            id: record.id.as_str().to_string(),
            original_text: record.original_text.clone(),
            translated_text: record.translated_text.clone(),
            category: record.category.as_str().to_string(),
            priority: record.priority.as_str().to_string(),
            location: record.location.clone(),
            language: record.language.clone(),
            method: record.method.as_str().to_string(),
            submitted_at_ms: record.submitted_at.0,
            status: record.status.as_str().to_string(),
            analysis: AnalysisPayload {
                sentiment: record.analysis.sentiment.as_str().to_string(),
                urgency: record.analysis.urgency,
                impact: record.analysis.impact,
            },
        }
    }
}

/// Outbound event frame written to each subscriber socket.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct EventMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub complaint: ComplaintPayload,
}

impl EventMessage {
    pub fn from_event(event: &ComplaintEvent) -> Self {
        Self {
            kind: event.kind().to_string(),
            complaint: ComplaintPayload::from_record(event.record()),
        }
    }
}

/// Partial preference update as received from a client. Absent fields keep
/// their current values.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct PreferenceUpdateMessage {
    pub categories: Option<Vec<String>>,
    pub priorities: Option<Vec<String>>,
    pub locations: Option<Vec<String>>,
    pub notify_on_new_complaints: Option<bool>,
    pub notify_on_status_change: Option<bool>,
}

impl PreferenceUpdateMessage {
    pub fn to_patch(&self) -> Result<SubscriptionPatch, AdapterError> {
        let categories = match &self.categories {
            Some(raw) => {
                let mut parsed = std::collections::BTreeSet::new();
                for value in raw {
                    let tag = CategoryTag::parse(value).map_err(|_| {
                        AdapterError::InvalidRequest(format!("unknown category {value:?}"))
                    })?;
                    parsed.insert(tag);
                }
                Some(parsed)
            }
            None => None,
        };
        let priorities = match &self.priorities {
            Some(raw) => {
                let mut parsed = std::collections::BTreeSet::new();
                for value in raw {
                    let tier = PriorityTier::parse(value).map_err(|_| {
                        AdapterError::InvalidRequest(format!("unknown priority {value:?}"))
                    })?;
                    parsed.insert(tier);
                }
                Some(parsed)
            }
            None => None,
        };
        let locations = self
            .locations
            .as_ref()
            .map(|raw| raw.iter().cloned().collect());

        Ok(SubscriptionPatch {
            categories,
            priorities,
            locations,
            notify_on_new_complaints: self.notify_on_new_complaints,
            notify_on_status_change: self.notify_on_status_change,
        })
    }
}

/// Inbound client frames on the notification socket.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "subscribe")]
    Subscribe { preferences: PreferenceUpdateMessage },
    #[serde(rename = "unsubscribe")]
    Unsubscribe,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SubmitComplaintRequest {
    pub text: String,
    pub translated_text: Option<String>,
    pub location: Option<String>,
    pub language: Option<String>,
    pub method: Option<String>,
    pub category: Option<String>,
    pub priority: Option<String>,
}

impl SubmitComplaintRequest {
    pub fn to_draft(&self) -> Result<ComplaintDraft, AdapterError> {
        let language = self.language.clone().unwrap_or_else(|| "en".to_string());
        let method = match &self.method {
            Some(raw) => IntakeMethod::parse(raw)
                .map_err(|_| AdapterError::InvalidRequest(format!("unknown method {raw:?}")))?,
            None => IntakeMethod::Manual,
        };
        let category_override = match &self.category {
            Some(raw) => Some(CategoryTag::parse(raw).map_err(|_| {
                AdapterError::InvalidRequest(format!("unknown category {raw:?}"))
            })?),
            None => None,
        };
        let priority_override = match &self.priority {
            Some(raw) => Some(PriorityTier::parse(raw).map_err(|_| {
                AdapterError::InvalidRequest(format!("unknown priority {raw:?}"))
            })?),
            None => None,
        };

        let draft = ComplaintDraft::v1(
            self.text.clone(),
            self.translated_text.clone(),
            self.location.clone(),
            language,
            method,
        )
        .map_err(|violation| {
            AdapterError::InvalidRequest(format!("complaint draft invalid: {violation:?}"))
        })?;
        Ok(draft.with_overrides(category_override, priority_override))
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SubmitComplaintResponse {
    pub status: String,
    pub complaint: Option<ComplaintPayload>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct StatusUpdateRequest {
    pub status: String,
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct SearchQueryParams {
    pub category: Option<String>,
    pub priority: Option<String>,
    pub status: Option<String>,
    pub location: Option<String>,
    pub term: Option<String>,
    pub submitted_after_ms: Option<u64>,
    pub submitted_before_ms: Option<u64>,
}

impl SearchQueryParams {
    pub fn to_query(&self) -> Result<ComplaintSearchQuery, AdapterError> {
        let category = match &self.category {
            Some(raw) => Some(CategoryTag::parse(raw).map_err(|_| {
                AdapterError::InvalidRequest(format!("unknown category {raw:?}"))
            })?),
            None => None,
        };
        let priority = match &self.priority {
            Some(raw) => Some(PriorityTier::parse(raw).map_err(|_| {
                AdapterError::InvalidRequest(format!("unknown priority {raw:?}"))
            })?),
            None => None,
        };
        let status = match &self.status {
            Some(raw) => Some(ComplaintStatus::parse(raw).map_err(|_| {
                AdapterError::InvalidRequest(format!("unknown status {raw:?}"))
            })?),
            None => None,
        };

        Ok(ComplaintSearchQuery {
            category,
            priority,
            status,
            location: self.location.clone(),
            submitted_after: self.submitted_after_ms.map(UnixTimeMs),
            submitted_before: self.submitted_before_ms.map(UnixTimeMs),
            term: self.term.clone(),
        })
    }
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct StatsResponse {
    pub total: u64,
    pub pending: u64,
    pub resolved: u64,
    pub by_category: BTreeMap<String, u64>,
    pub by_priority: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AdapterHealthResponse {
    pub status: String,
    pub connected_clients: usize,
    pub stored_complaints: usize,
}

// ---------------------------------------------------------------------------
// Application runtime
// ---------------------------------------------------------------------------

/// Everything the HTTP binary needs behind one lock: the intake and
/// status-change wirings share the store seam and publish through the
/// router. The router itself stays outside the lock so socket tasks never
/// contend with request handling.
pub struct AppRuntime {
    intake: ComplaintIntakeWiring<SharedComplaintStore, RouterPublisher>,
    status: StatusChangeWiring<SharedComplaintStore, RouterPublisher>,
    store: SharedComplaintStore,
}

impl AppRuntime {
    pub fn new(router: NotificationRouter) -> Self {
        let store = SharedComplaintStore::new();
        let publisher = RouterPublisher::new(router);
        Self {
            intake: ComplaintIntakeWiring::new(
                ComplaintIntakeConfig::mvp_v1(true),
                ComplaintAssembler::mvp_v1(),
                store.clone(),
                publisher.clone(),
            ),
            status: StatusChangeWiring::new(
                StatusChangeConfig::mvp_v1(true),
                store.clone(),
                publisher,
            ),
            store,
        }
    }

    pub fn submit_complaint(
        &mut self,
        request: &SubmitComplaintRequest,
    ) -> Result<ComplaintPayload, AdapterError> {
        let draft = request.to_draft()?;
        let outcome = self
            .intake
            .run_intake(&draft, now_unix_ms())
            .map_err(|violation| {
                AdapterError::Internal(format!("intake wiring drift: {violation:?}"))
            })?;
        match outcome {
            ComplaintIntakeOutcome::Accepted(record) => Ok(ComplaintPayload::from_record(&record)),
            ComplaintIntakeOutcome::Refused { message, .. } => {
                Err(AdapterError::InvalidRequest(message))
            }
            ComplaintIntakeOutcome::NotInvokedDisabled => {
                Err(AdapterError::Internal("complaint intake disabled".to_string()))
            }
        }
    }

    pub fn update_status(
        &mut self,
        id: &str,
        request: &StatusUpdateRequest,
    ) -> Result<ComplaintPayload, AdapterError> {
        let id = ComplaintId::new(id)
            .map_err(|_| AdapterError::InvalidRequest("malformed complaint id".to_string()))?;
        let status = ComplaintStatus::parse(&request.status).map_err(|_| {
            AdapterError::InvalidRequest(format!("unknown status {:?}", request.status))
        })?;

        let outcome = self
            .status
            .run_status_change(&id, status)
            .map_err(|violation| {
                AdapterError::Internal(format!("status wiring drift: {violation:?}"))
            })?;
        match outcome {
            StatusChangeOutcome::Applied(record) => Ok(ComplaintPayload::from_record(&record)),
            StatusChangeOutcome::Refused { message, .. } => Err(AdapterError::NotFound(message)),
            StatusChangeOutcome::NotInvokedDisabled => {
                Err(AdapterError::Internal("status updates disabled".to_string()))
            }
        }
    }

    pub fn search(&self, params: &SearchQueryParams) -> Result<Vec<ComplaintPayload>, AdapterError> {
        let query = params.to_query()?;
        Ok(self.store.with_store(|store| {
            store
                .search(&query)
                .iter()
                .map(ComplaintPayload::from_record)
                .collect()
        }))
    }

    pub fn stats(&self) -> StatsResponse {
        self.store.with_store(|store| {
            let stats = store.stats();
            StatsResponse {
                total: stats.total,
                pending: stats.pending,
                resolved: stats.resolved,
                by_category: stats
                    .by_category
                    .iter()
                    .map(|(category, count)| (category.as_str().to_string(), *count))
                    .collect(),
                by_priority: stats
                    .by_priority
                    .iter()
                    .map(|(priority, count)| (priority.as_str().to_string(), *count))
                    .collect(),
            }
        })
    }

    pub fn stored_complaints(&self) -> usize {
        self.store.with_store(|store| store.len())
    }
}

/// Process-unique connection ids for notification sockets.
#[derive(Debug, Default)]
pub struct ConnectionIdMint {
    next: AtomicU64,
}

impl ConnectionIdMint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mint(&self) -> ConnectionId {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        ConnectionId::new(format!("conn_{n:08x}"))
            .expect("minted connection id must satisfy contract")
    }
}

pub fn default_router() -> NotificationRouter {
    NotificationRouter::new(RouterConfig::mvp_v1())
}
