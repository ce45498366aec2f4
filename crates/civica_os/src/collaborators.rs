#![forbid(unsafe_code)]

use civica_kernel_contracts::complaint::{ComplaintId, ComplaintRecord, ComplaintStatus};
use civica_kernel_contracts::subscription::ComplaintEvent;

/// Collaborator-side failure surface. The core never retries persistence;
/// it maps these onto refusals and carries on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    NotFound { key: String },
    Unavailable { reason: String },
}

/// Persistence collaborator: accepts finished complaint records for storage
/// and applies the status-only mutation of the update workflow.
pub trait ComplaintSink {
    fn insert_complaint(&mut self, record: &ComplaintRecord) -> Result<(), SinkError>;

    fn apply_status(
        &mut self,
        id: &ComplaintId,
        status: ComplaintStatus,
    ) -> Result<ComplaintRecord, SinkError>;
}

/// Transport collaborator's broadcast entry point. Delivery is best-effort;
/// failures are the publisher's concern and never flow back into intake.
pub trait EventPublisher {
    fn publish(&self, event: ComplaintEvent);
}
