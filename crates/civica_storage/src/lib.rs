#![forbid(unsafe_code)]

pub mod complaints;

pub use complaints::{
    ComplaintSearchQuery, ComplaintStats, ComplaintStore, StatusUpdateOutcome, StorageError,
};
