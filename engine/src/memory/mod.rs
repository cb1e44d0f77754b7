//! Bounded working memory
//!
//! A [`MemoryLedger`] holds the messages sent to the model, mirrored to an
//! append-only [`TapeStore`] so nothing the model removes is ever lost. The
//! [`PressurePolicy`] turns ledger metrics into the dashboard the model sees.

pub mod estimator;
pub mod ledger;
pub mod message;
pub mod pressure;
pub mod tape;

pub use estimator::{CharRatioEstimator, TokenEstimator, DEFAULT_CHARS_PER_TOKEN};
pub use ledger::{MemoryLedger, MessageEntry, SummaryOutcome};
pub use message::{normalize, MessageSource};
pub use pressure::{EntryOverview, PressurePolicy, PressureSnapshot, CRITICAL_FACTOR};
pub use tape::{epoch_seconds, RecalledMessage, TapeRecord, TapeStore};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error(
        "Invalid range {start_id}-{end_id}: both ids must be active and in order \
         (positions {start_pos:?}, {end_pos:?})"
    )]
    InvalidRange {
        start_id: u64,
        end_id: u64,
        start_pos: Option<usize>,
        end_pos: Option<usize>,
    },

    #[error("No message with visible_id={0} on the tape")]
    NotFound(u64),

    #[error("Tape unreadable: {0}")]
    TapeUnreadable(String),
}
