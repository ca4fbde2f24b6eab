//! Errors raised on the object side while building a frame.
//!
//! The renderer-facing surface never returns these; a failed build degrades to
//! an empty source list.

use thiserror::Error;

use rti_api_core::ChannelKind;

use crate::channels::ChannelToken;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum InstancingError {
    /// Slot does not belong to the cycle being built.
    #[error("unknown source slot {slot} (cycle {cycle})")]
    UnknownSource { slot: usize, cycle: u64 },

    #[error("birth id {0} emitted twice in one cycle")]
    DuplicateBirthId(i64),

    #[error("channel token {token:?} is declared {declared:?}, value is {actual:?}")]
    ChannelKindConflict {
        token: ChannelToken,
        declared: Option<ChannelKind>,
        actual: ChannelKind,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Upstream data could not be produced (e.g. simulation not ready).
    #[error("generator failed: {0}")]
    Generator(String),
}

pub type InstancingResult<T> = Result<T, InstancingError>;
