#![forbid(unsafe_code)]

pub mod common;
pub mod complaint;
pub mod subscription;

pub use common::{ContractViolation, ReasonCodeId, SchemaVersion, UnixTimeMs, Validate};
