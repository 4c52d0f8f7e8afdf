//! Relative timing of the four stages of a batch.
//!
//! Every stage is launched at batch time 0 and told to wait until its
//! window starts. Windows are laid out so the stages land in the order
//! hack, weaken1, grow, weaken2, each one buffer apart:
//!
//! ```text
//!  0                                  longest      span
//!  |----------- weaken1 ----------------|            |
//!           |------------ weaken2 ---------------------|
//!                             |--- hack ---|  (span - 3 buffer)
//!                |------------ grow -----------|     (span - buffer)
//! ```

use core::fmt;

use decorum::N64;
use tracing::trace;

use crate::{
    api::NodeInspector,
    error::{
        ScheduleError,
        ScheduleResult,
    },
    stage::{
        StageKind,
        Stages,
    },
};

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Window {
    pub start: f64,
    pub end: f64,
}

impl Window {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

impl fmt::Display for Window {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{:.0}ms -> {:.0}ms", self.start, self.end)
    }
}

pub type StageWindows = Stages<Window>;

impl Stages<Window> {
    pub fn span(&self) -> f64 {
        self.weaken2.end
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StageDurations {
    pub hack: f64,
    pub grow: f64,
    pub weaken: f64,
}

impl StageDurations {
    pub fn of_target(
        game: &impl NodeInspector,
        target: &str,
    ) -> StageDurations {
        StageDurations {
            hack: game.stage_duration(target, StageKind::Hack),
            grow: game.stage_duration(target, StageKind::Grow),
            weaken: game.stage_duration(target, StageKind::Weaken1),
        }
    }

    pub fn longest(&self) -> f64 {
        [self.hack, self.grow, self.weaken]
            .into_iter()
            .max_by_key(|&d| N64::from_inner(d))
            .unwrap_or(0.)
    }
}

fn check_input(
    kind: StageKind,
    value: f64,
) -> ScheduleResult<()> {
    if value.is_finite() && 0. <= value {
        Ok(())
    }
    else {
        Err(ScheduleError::InconsistentTiming {
            stage: kind,
            start: value,
        })
    }
}

/// Lays out the windows of one batch.
///
/// Fails instead of clamping when a stage would have to start before the
/// batch is launched.
pub fn stage_windows(
    durations: StageDurations,
    buffer: f64,
) -> ScheduleResult<StageWindows> {
    check_input(StageKind::Hack, durations.hack)?;
    check_input(StageKind::Grow, durations.grow)?;
    check_input(StageKind::Weaken1, durations.weaken)?;
    if !buffer.is_finite() || buffer <= 0. {
        return Err(ScheduleError::InvalidBuffer(buffer));
    }

    let longest = durations.longest();
    let span = longest + buffer * 2.;

    let hack_end = span - buffer * 3.;
    let grow_end = span - buffer;

    let windows = Stages {
        hack: Window {
            start: hack_end - durations.hack,
            end: hack_end,
        },
        weaken1: Window {
            start: 0.,
            end: longest,
        },
        grow: Window {
            start: grow_end - durations.grow,
            end: grow_end,
        },
        weaken2: Window {
            start: span - durations.weaken,
            end: span,
        },
    };

    for (kind, window) in windows.iter() {
        if window.start < 0. {
            return Err(ScheduleError::InconsistentTiming {
                stage: kind,
                start: window.start,
            });
        }
    }

    trace!(
        hack = %windows.hack,
        weaken1 = %windows.weaken1,
        grow = %windows.grow,
        weaken2 = %windows.weaken2,
        "stage windows"
    );

    Ok(windows)
}
