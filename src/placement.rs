use binary_heap_plus::BinaryHeap;
use compact_str::CompactString;
use smallvec::SmallVec;
use tracing::{
    debug,
    warn,
};

use crate::{
    api::{
        HostInspector,
        ProcessHandle,
        ProcessLauncher,
    },
    config::RollbackPolicy,
    error::{
        ScheduleError,
        ScheduleResult,
    },
    pool::{
        ascending_free,
        HostCapacity,
        ResourcePool,
    },
    unit::{
        describe,
        merge_units,
        WorkUnit,
    },
};

#[derive(Debug, Default)]
pub struct Placement {
    pub placed: Vec<WorkUnit>,
    pub shortfalls: Vec<ScheduleError>,
}

impl Placement {
    pub fn is_complete(&self) -> bool {
        self.shortfalls.is_empty()
    }

    pub fn release(
        &self,
        pool: &mut ResourcePool,
    ) {
        release_units(pool, &self.placed);
    }
}

fn release_units(
    pool: &mut ResourcePool,
    units: &[WorkUnit],
) {
    for unit in units {
        if let Some(host) = &unit.host {
            pool.release_amount(host, unit.ram());
        }
    }
}

fn shortfall(
    unit: &WorkUnit,
    threads: u32,
) -> ScheduleError {
    ScheduleError::CapacityShortfall {
        script: unit.script.clone(),
        threads,
        ram: unit.ram_per_thread * threads,
    }
}

/// Puts each unit whole on the smallest host it fits on. Reservations are
/// made as units are placed, so later units see the earlier ones.
pub fn place_each(
    pool: &mut ResourcePool,
    units: impl IntoIterator<Item = WorkUnit>,
) -> ScheduleResult<Placement> {
    let mut placement = Placement::default();

    for unit in units {
        if unit.threads == 0 {
            continue;
        }

        let ram = unit.ram();
        let host = match pool.smallest_fitting(ram) {
            Some(h) => CompactString::from(h.get_name()),
            None => {
                placement.shortfalls.push(shortfall(&unit, unit.threads));
                continue;
            },
        };

        pool.reserve_speculative(&host, ram)?;
        placement.placed.push(unit.assigned_to(&host));
    }

    Ok(placement)
}

/// Spreads `total` threads of `template` over the pool, filling the smallest
/// hosts first. Each host touched gets one unit using all of its room.
///
/// Returns the placed units and the number of threads that did not fit.
pub fn fill_threads(
    pool: &mut ResourcePool,
    template: &WorkUnit,
    total: u32,
) -> ScheduleResult<(Vec<WorkUnit>, u32)> {
    let per_thread = template.ram_per_thread;
    let mut units = vec![];
    let mut remaining = total;

    if remaining == 0 || per_thread.is_zero() {
        return Ok((units, remaining));
    }

    // min-heap: reverse the pool ordering
    let mut candidates = BinaryHeap::new_by(|a: &HostCapacity, b: &HostCapacity| {
        ascending_free(b, a)
    });
    candidates.extend(
        pool.hosts()
            .filter(|h| 0 < h.effective_free().threads_of(per_thread))
            .cloned(),
    );

    while 0 < remaining {
        let host = match candidates.pop() {
            Some(h) => h,
            None => break,
        };

        let threads = host.effective_free().threads_of(per_thread).min(remaining);
        let unit = template.with_threads(threads).assigned_to(host.get_name());

        pool.reserve_speculative(host.get_name(), unit.ram())?;
        remaining -= threads;
        units.push(unit);
    }

    if 0 < remaining {
        debug!(script = %template.script, remaining, "fill ran out of hosts");
    }

    Ok((units, remaining))
}

#[derive(Clone, Debug, PartialEq)]
pub struct Launched {
    pub unit: WorkUnit,
    pub process: ProcessHandle,
}

#[derive(Debug, Default)]
pub struct Dispatched {
    pub launched: SmallVec<[Launched; 4]>,
    pub failures: Vec<ScheduleError>,
}

/// Launches placed units after merging the ones sharing a host.
///
/// Each launched unit's reservation is swapped for the usage the game
/// reports afterwards. A failed launch is handled according to `policy`;
/// with [`RollbackPolicy::Abort`] everything launched by this call is
/// killed, every reservation of the call is released and the failure is
/// returned.
pub fn dispatch<G>(
    game: &G,
    pool: &mut ResourcePool,
    units: impl IntoIterator<Item = WorkUnit>,
    policy: RollbackPolicy,
) -> ScheduleResult<Dispatched>
where
    G: HostInspector + ProcessLauncher,
{
    let units = merge_units(units.into_iter().filter(|u| 0 < u.threads));
    let mut dispatched = Dispatched::default();

    debug!(units = %describe(&units), "dispatching");

    for (i, unit) in units.iter().enumerate() {
        let host = match &unit.host {
            Some(h) => h.clone(),
            None => {
                warn!(script = %unit.script, "skipping unplaced unit");
                continue;
            },
        };

        match game.launch(&host, &unit.script, unit.threads, &unit.args) {
            Ok(process) => {
                pool.release_amount(&host, unit.ram());
                if let Some(raw) = game.host(&host) {
                    pool.commit_after_dispatch(raw, false);
                }

                dispatched.launched.push(Launched {
                    unit: unit.clone(),
                    process,
                });
            },
            Err(e) => {
                let failure = ScheduleError::DispatchFailure {
                    host: host.clone(),
                    script: unit.script.clone(),
                    threads: unit.threads,
                    reason: e.0,
                };
                warn!(%failure, ?policy, "launch failed");

                match policy {
                    RollbackPolicy::Keep => {},
                    RollbackPolicy::ReleaseFailed => pool.release_amount(&host, unit.ram()),
                    RollbackPolicy::Abort => {
                        for launched in dispatched.launched.iter() {
                            game.kill(launched.process);
                        }
                        release_units(pool, &units[i..]);
                        refresh_hosts(game, pool, dispatched.launched.iter().map(|l| &l.unit));

                        return Err(failure);
                    },
                }

                dispatched.failures.push(failure);
            },
        }
    }

    Ok(dispatched)
}

fn refresh_hosts<'a, G>(
    game: &G,
    pool: &mut ResourcePool,
    units: impl Iterator<Item = &'a WorkUnit>,
) where
    G: HostInspector,
{
    let hosts = units
        .filter_map(|u| u.host.as_deref())
        .filter_map(|h| game.host(h))
        .collect::<Vec<_>>();

    pool.refresh(hosts);
}
