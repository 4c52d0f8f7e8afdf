use compact_str::CompactString;
use itertools::Itertools as _;
use smallvec::SmallVec;

use crate::{
    api::ScriptArg,
    ram::Ram,
    stage::StageKind,
    timing::Window,
};

#[derive(Clone, Debug, PartialEq)]
pub struct StageTag {
    pub kind: StageKind,
    pub target: CompactString,
    pub window: Window,
}

#[derive(Clone, Debug, PartialEq)]
pub struct WorkUnit {
    pub script: CompactString,
    pub threads: u32,
    pub ram_per_thread: Ram,
    pub args: SmallVec<[ScriptArg; 2]>,
    pub host: Option<CompactString>,
    pub stage: Option<StageTag>,
}

impl WorkUnit {
    pub fn new(
        script: &str,
        ram_per_thread: Ram,
        threads: u32,
    ) -> WorkUnit {
        WorkUnit {
            script: script.into(),
            threads,
            ram_per_thread,
            args: SmallVec::new(),
            host: None,
            stage: None,
        }
    }

    /// A unit of one batch stage. The stage scripts take the target and the
    /// delay before they start.
    pub fn for_stage(
        kind: StageKind,
        target: &str,
        window: Window,
        threads: u32,
    ) -> WorkUnit {
        let mut unit = WorkUnit::new(kind.script(), kind.ram_per_thread(), threads);
        unit.args.push(ScriptArg::from(target));
        unit.args.push(ScriptArg::Num(window.start));
        unit.stage = Some(StageTag {
            kind,
            target: target.into(),
            window,
        });

        unit
    }

    pub fn with_threads(
        &self,
        threads: u32,
    ) -> WorkUnit {
        WorkUnit {
            threads,
            ..self.clone()
        }
    }

    pub fn assigned_to(
        mut self,
        host: &str,
    ) -> WorkUnit {
        self.host = Some(host.into());
        self
    }

    pub fn ram(&self) -> Ram {
        self.ram_per_thread * self.threads
    }

    pub fn kind(&self) -> Option<StageKind> {
        self.stage.as_ref().map(|s| s.kind)
    }

    /// Units on the same host doing the same thing can be launched as one.
    pub fn is_mergeable_with(
        &self,
        other: &WorkUnit,
    ) -> bool {
        if self.host.is_none() || self.host != other.host {
            return false;
        }

        match (&self.stage, &other.stage) {
            (Some(a), Some(b)) => a == b,
            (None, None) => {
                self.script == other.script
                    && self.args == other.args
                    && self.ram_per_thread == other.ram_per_thread
            },
            _ => false,
        }
    }
}

/// Merges mergeable units by summing their threads. The first unit of each
/// group keeps its position.
pub fn merge_units(units: impl IntoIterator<Item = WorkUnit>) -> Vec<WorkUnit> {
    let mut merged: Vec<WorkUnit> = vec![];

    for unit in units {
        match merged.iter_mut().find(|m| m.is_mergeable_with(&unit)) {
            Some(existing) => existing.threads += unit.threads,
            None => merged.push(unit),
        }
    }

    merged
}

pub fn describe(units: &[WorkUnit]) -> String {
    units
        .iter()
        .map(|u| {
            format!(
                "{}x{}@{}",
                u.kind().map_or_else(|| u.script.to_string(), |k| k.to_string()),
                u.threads,
                u.host.as_deref().unwrap_or("?"),
            )
        })
        .join(" ")
}
