#![forbid(unsafe_code)]

use civica_kernel_contracts::complaint::{ComplaintId, ComplaintRecord, ComplaintStatus};
use civica_kernel_contracts::subscription::ComplaintEvent;
use civica_kernel_contracts::{ContractViolation, ReasonCodeId, Validate};

use crate::collaborators::{ComplaintSink, EventPublisher, SinkError};

pub mod reason_codes {
    use civica_kernel_contracts::ReasonCodeId;

    // Status-change wiring reason-code namespace.
    pub const STATUS_APPLIED: ReasonCodeId = ReasonCodeId(0x4353_0001);
    pub const STATUS_UNKNOWN_COMPLAINT: ReasonCodeId = ReasonCodeId(0x4353_00F1);
    pub const STATUS_PERSISTENCE_FAILED: ReasonCodeId = ReasonCodeId(0x4353_00F2);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChangeConfig {
    pub updates_enabled: bool,
}

impl StatusChangeConfig {
    pub fn mvp_v1(updates_enabled: bool) -> Self {
        Self { updates_enabled }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatusChangeOutcome {
    NotInvokedDisabled,
    Refused {
        reason_code: ReasonCodeId,
        message: String,
    },
    Applied(ComplaintRecord),
}

/// Status is the only field mutated after submission; the mutation flows
/// through the persistence seam and is re-announced as a status-changed
/// event on success.
#[derive(Debug, Clone)]
pub struct StatusChangeWiring<S, P>
where
    S: ComplaintSink,
    P: EventPublisher,
{
    config: StatusChangeConfig,
    sink: S,
    publisher: P,
}

impl<S, P> StatusChangeWiring<S, P>
where
    S: ComplaintSink,
    P: EventPublisher,
{
    pub fn new(config: StatusChangeConfig, sink: S, publisher: P) -> Self {
        Self {
            config,
            sink,
            publisher,
        }
    }

    pub fn run_status_change(
        &mut self,
        id: &ComplaintId,
        status: ComplaintStatus,
    ) -> Result<StatusChangeOutcome, ContractViolation> {
        id.validate()?;

        if !self.config.updates_enabled {
            return Ok(StatusChangeOutcome::NotInvokedDisabled);
        }

        let record = match self.sink.apply_status(id, status) {
            Ok(record) => record,
            Err(SinkError::NotFound { key }) => {
                return Ok(StatusChangeOutcome::Refused {
                    reason_code: reason_codes::STATUS_UNKNOWN_COMPLAINT,
                    message: format!("no complaint stored under {key}"),
                })
            }
            Err(SinkError::Unavailable { reason }) => {
                return Ok(StatusChangeOutcome::Refused {
                    reason_code: reason_codes::STATUS_PERSISTENCE_FAILED,
                    message: reason,
                })
            }
        };
        record.validate()?;
        if record.status != status {
            return Err(ContractViolation::InvalidValue {
                field: "status_change.record",
                reason: "persisted status drifted from requested status",
            });
        }

        self.publisher
            .publish(ComplaintEvent::StatusChanged(record.clone()));
        Ok(StatusChangeOutcome::Applied(record))
    }
}
