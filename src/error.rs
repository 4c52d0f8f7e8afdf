//! Scheduler error types.

use compact_str::CompactString;
use thiserror::Error;

use crate::{
    ram::Ram,
    stage::StageKind,
};

/// Errors raised while planning or dispatching batches.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScheduleError {
    #[error("no host can fit {threads} threads of {script} ({ram})")]
    CapacityShortfall {
        script: CompactString,
        threads: u32,
        ram: Ram,
    },

    #[error("no extraction fraction of {target} fits the fleet")]
    NoFeasibleFraction { target: CompactString },

    #[error("access to {0} was denied")]
    AccessDenied(CompactString),

    /// Durations and buffer produce a window that starts before the batch.
    #[error("{stage} would start at {start}ms, durations are inconsistent with the buffer")]
    InconsistentTiming { stage: StageKind, start: f64 },

    #[error("buffer of {0}ms does not separate the stages")]
    InvalidBuffer(f64),

    #[error("failed to launch {script} x{threads} on {host}: {reason}")]
    DispatchFailure {
        host: CompactString,
        script: CompactString,
        threads: u32,
        reason: String,
    },

    #[error("host {0} is not part of the pool")]
    UnknownHost(CompactString),
}

pub type ScheduleResult<T> = Result<T, ScheduleError>;
