#![forbid(unsafe_code)]

use civica_engines::assembler::ComplaintAssembler;
use civica_kernel_contracts::complaint::{ComplaintDraft, ComplaintRecord};
use civica_kernel_contracts::subscription::ComplaintEvent;
use civica_kernel_contracts::{ContractViolation, ReasonCodeId, UnixTimeMs, Validate};

use crate::collaborators::{ComplaintSink, EventPublisher, SinkError};

pub mod reason_codes {
    use civica_kernel_contracts::ReasonCodeId;

    // Intake wiring reason-code namespace.
    pub const INTAKE_ACCEPTED: ReasonCodeId = ReasonCodeId(0x4349_0001);
    pub const INTAKE_ASSEMBLY_FAILED: ReasonCodeId = ReasonCodeId(0x4349_00F1);
    pub const INTAKE_PERSISTENCE_FAILED: ReasonCodeId = ReasonCodeId(0x4349_00F2);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComplaintIntakeConfig {
    pub intake_enabled: bool,
}

impl ComplaintIntakeConfig {
    pub fn mvp_v1(intake_enabled: bool) -> Self {
        Self { intake_enabled }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ComplaintIntakeOutcome {
    NotInvokedDisabled,
    Refused {
        reason_code: ReasonCodeId,
        message: String,
    },
    Accepted(ComplaintRecord),
}

/// Intake orchestration: assemble, persist, then announce. The classifier
/// runs inside the assembler; a persistence refusal is final (no retry) and
/// nothing is announced for a record that was not stored.
#[derive(Debug, Clone)]
pub struct ComplaintIntakeWiring<S, P>
where
    S: ComplaintSink,
    P: EventPublisher,
{
    config: ComplaintIntakeConfig,
    assembler: ComplaintAssembler,
    sink: S,
    publisher: P,
}

impl<S, P> ComplaintIntakeWiring<S, P>
where
    S: ComplaintSink,
    P: EventPublisher,
{
    pub fn new(
        config: ComplaintIntakeConfig,
        assembler: ComplaintAssembler,
        sink: S,
        publisher: P,
    ) -> Self {
        Self {
            config,
            assembler,
            sink,
            publisher,
        }
    }

    pub fn run_intake(
        &mut self,
        draft: &ComplaintDraft,
        now: UnixTimeMs,
    ) -> Result<ComplaintIntakeOutcome, ContractViolation> {
        draft.validate()?;

        if !self.config.intake_enabled {
            return Ok(ComplaintIntakeOutcome::NotInvokedDisabled);
        }

        let record = match self.assembler.assemble(draft, now) {
            Ok(record) => record,
            Err(_) => {
                return Ok(ComplaintIntakeOutcome::Refused {
                    reason_code: reason_codes::INTAKE_ASSEMBLY_FAILED,
                    message: "complaint assembly failed contract validation".to_string(),
                })
            }
        };
        record.validate()?;

        if let Err(err) = self.sink.insert_complaint(&record) {
            let message = match err {
                SinkError::NotFound { key } => {
                    format!("persistence collaborator rejected record {key}")
                }
                SinkError::Unavailable { reason } => reason,
            };
            return Ok(ComplaintIntakeOutcome::Refused {
                reason_code: reason_codes::INTAKE_PERSISTENCE_FAILED,
                message,
            });
        }

        self.publisher
            .publish(ComplaintEvent::NewComplaint(record.clone()));
        Ok(ComplaintIntakeOutcome::Accepted(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use civica_kernel_contracts::complaint::{CategoryTag, ComplaintId, ComplaintStatus, IntakeMethod};
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, Default)]
    struct StubSink {
        stored: Arc<Mutex<Vec<ComplaintRecord>>>,
        fail_insert: bool,
    }

    impl ComplaintSink for StubSink {
        fn insert_complaint(&mut self, record: &ComplaintRecord) -> Result<(), SinkError> {
            if self.fail_insert {
                return Err(SinkError::Unavailable {
                    reason: "store offline".to_string(),
                });
            }
            self.stored.lock().unwrap().push(record.clone());
            Ok(())
        }

        fn apply_status(
            &mut self,
            id: &ComplaintId,
            _status: ComplaintStatus,
        ) -> Result<ComplaintRecord, SinkError> {
            Err(SinkError::NotFound {
                key: id.as_str().to_string(),
            })
        }
    }

    #[derive(Debug, Clone, Default)]
    struct StubPublisher {
        events: Arc<Mutex<Vec<ComplaintEvent>>>,
    }

    impl EventPublisher for StubPublisher {
        fn publish(&self, event: ComplaintEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    fn draft(text: &str) -> ComplaintDraft {
        ComplaintDraft::v1(text, None, None, "en", IntakeMethod::Manual).unwrap()
    }

    fn wiring(
        enabled: bool,
        fail_insert: bool,
    ) -> (
        ComplaintIntakeWiring<StubSink, StubPublisher>,
        Arc<Mutex<Vec<ComplaintRecord>>>,
        Arc<Mutex<Vec<ComplaintEvent>>>,
    ) {
        let sink = StubSink {
            fail_insert,
            ..Default::default()
        };
        let publisher = StubPublisher::default();
        let stored = sink.stored.clone();
        let events = publisher.events.clone();
        (
            ComplaintIntakeWiring::new(
                ComplaintIntakeConfig::mvp_v1(enabled),
                ComplaintAssembler::mvp_v1(),
                sink,
                publisher,
            ),
            stored,
            events,
        )
    }

    #[test]
    fn at_intake_01_accepted_record_is_stored_then_announced() {
        let (mut wiring, stored, events) = wiring(true, false);
        let out = wiring
            .run_intake(&draft("water leak near the temple"), UnixTimeMs(5_000))
            .unwrap();

        let record = match out {
            ComplaintIntakeOutcome::Accepted(record) => record,
            other => panic!("expected accepted intake, got {other:?}"),
        };
        assert_eq!(record.category, CategoryTag::WaterSupply);
        assert_eq!(stored.lock().unwrap().len(), 1);

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        match &events[0] {
            ComplaintEvent::NewComplaint(published) => assert_eq!(published.id, record.id),
            other => panic!("expected new-complaint event, got {other:?}"),
        }
    }

    #[test]
    fn at_intake_02_disabled_wiring_returns_not_invoked() {
        let (mut wiring, stored, events) = wiring(false, false);
        let out = wiring
            .run_intake(&draft("water leak"), UnixTimeMs(5_000))
            .unwrap();
        assert_eq!(out, ComplaintIntakeOutcome::NotInvokedDisabled);
        assert!(stored.lock().unwrap().is_empty());
        assert!(events.lock().unwrap().is_empty());
    }

    #[test]
    fn at_intake_03_persistence_failure_refuses_and_suppresses_event() {
        let (mut wiring, stored, events) = wiring(true, true);
        let out = wiring
            .run_intake(&draft("water leak"), UnixTimeMs(5_000))
            .unwrap();
        match out {
            ComplaintIntakeOutcome::Refused { reason_code, .. } => {
                assert_eq!(reason_code, reason_codes::INTAKE_PERSISTENCE_FAILED)
            }
            other => panic!("expected refusal, got {other:?}"),
        }
        assert!(stored.lock().unwrap().is_empty());
        assert!(events.lock().unwrap().is_empty());
    }

    #[test]
    fn at_intake_04_invalid_draft_fails_closed() {
        let (mut wiring, _, events) = wiring(true, false);
        let bad = ComplaintDraft {
            raw_text: "  ".to_string(),
            translated_text: None,
            location: None,
            language: "en".to_string(),
            method: IntakeMethod::Manual,
            category_override: None,
            priority_override: None,
        };
        assert!(wiring.run_intake(&bad, UnixTimeMs(5_000)).is_err());
        assert!(events.lock().unwrap().is_empty());
    }
}
