//! The per-target batch loop.

use compact_str::CompactString;
use futures::future::join_all;
use tracing::{
    debug,
    info,
    warn,
};

use crate::{
    api::Game,
    config::BatcherConfig,
    error::{
        ScheduleError,
        ScheduleResult,
    },
    placement::{
        dispatch,
        fill_threads,
        place_each,
    },
    pool::ResourcePool,
    search::{
        optimal_fraction,
        SearchOutcome,
    },
    sizing::{
        grow_within_budget,
        offset_threads,
        prep_threads,
        security_delta_thousandths,
        TargetSnapshot,
    },
    stage::StageKind,
    timing::{
        stage_windows,
        StageDurations,
        StageWindows,
    },
    unit::WorkUnit,
};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BatchPlan {
    pub outcome: SearchOutcome,
    pub windows: StageWindows,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BatcherState {
    Rooting,
    Preparing,
    Searching,
    Executing(BatchPlan),
    Done,
}

pub struct Batcher {
    target: CompactString,
    config: BatcherConfig,
    state: BatcherState,
    pool: ResourcePool,
    batches: u64,
    prep_rounds: u64,
}

impl Batcher {
    pub fn new(
        target: &str,
        config: BatcherConfig,
    ) -> Batcher {
        Batcher {
            target: target.into(),
            pool: ResourcePool::new(&config),
            config,
            state: BatcherState::Rooting,
            batches: 0,
            prep_rounds: 0,
        }
    }

    pub fn get_target(&self) -> &str {
        &self.target
    }

    pub fn get_state(&self) -> BatcherState {
        self.state
    }

    pub fn get_batches(&self) -> u64 {
        self.batches
    }

    pub fn get_prep_rounds(&self) -> u64 {
        self.prep_rounds
    }

    fn limit_reached(&self) -> bool {
        self.config
            .max_batches
            .map_or(false, |max| max <= self.batches)
    }

    fn refresh_pool(
        &mut self,
        game: &impl Game,
    ) {
        self.pool = ResourcePool::from_hosts(&self.config, game.list_hosts());
    }

    fn windows(
        &self,
        game: &impl Game,
    ) -> ScheduleResult<StageWindows> {
        stage_windows(
            StageDurations::of_target(game, &self.target),
            self.config.buffer_ms,
        )
    }

    #[tracing::instrument(level = "debug", skip(self, game), fields(node = %self.target))]
    pub async fn step(
        &mut self,
        game: &impl Game,
    ) -> ScheduleResult<()> {
        use BatcherState::*;

        let state = self.state;
        self.state = match state {
            Rooting => {
                self.root(game)?;
                Preparing
            },
            Preparing => self.prepare_round(game).await?,
            Searching => self.search(game).await?,
            Executing(plan) => self.execute(game, plan).await?,
            Done => Done,
        };

        Ok(())
    }

    /// Steps until the batch limit is reached or an error stops the target.
    /// Returns the number of batches launched.
    pub async fn run(
        &mut self,
        game: &impl Game,
    ) -> ScheduleResult<u64> {
        while self.state != BatcherState::Done {
            self.step(game).await?;
        }

        Ok(self.batches)
    }

    pub async fn prepare(
        &mut self,
        game: &impl Game,
    ) -> ScheduleResult<()> {
        while matches!(self.state, BatcherState::Rooting | BatcherState::Preparing) {
            self.step(game).await?;
        }

        Ok(())
    }

    fn root(
        &mut self,
        game: &impl Game,
    ) -> ScheduleResult<()> {
        for host in game.list_hosts().iter().filter(|h| !h.has_admin_access) {
            if game.ensure_access(&host.name) {
                info!(host = %host.name, "rooted");
            }
        }

        if !game.ensure_access(&self.target) {
            return Err(ScheduleError::AccessDenied(self.target.clone()));
        }

        Ok(())
    }

    async fn prepare_round(
        &mut self,
        game: &impl Game,
    ) -> ScheduleResult<BatcherState> {
        let snapshot = TargetSnapshot::read(game, &self.target);
        if snapshot.is_prepared() {
            info!(node = %self.target, rounds = self.prep_rounds, "prepared");
            return Ok(BatcherState::Searching);
        }

        let wanted = prep_threads(game, &snapshot, self.config.prep_security_tolerance);
        let windows = self.windows(game)?;
        self.refresh_pool(game);

        let unit = |kind| WorkUnit::for_stage(kind, &self.target, *windows.get_ref(kind), 0);

        let (mut units, weakens1_left) =
            fill_threads(&mut self.pool, &unit(StageKind::Weaken1), wanted.weaken1)?;

        // grow only as much as its weaken can follow
        let budget = self
            .pool
            .total_threads_for(game.ram_cost_per_thread(StageKind::Weaken2));
        let grow = grow_within_budget(game, wanted.grow, budget);
        let weaken2 = offset_threads(
            grow,
            security_delta_thousandths(game, StageKind::Grow),
            security_delta_thousandths(game, StageKind::Weaken2),
        );

        let (grows, grows_left) = fill_threads(&mut self.pool, &unit(StageKind::Grow), grow)?;
        let (weakens, weakens_left) =
            fill_threads(&mut self.pool, &unit(StageKind::Weaken2), weaken2)?;
        units.extend(grows);
        units.extend(weakens);

        if 0 < weakens1_left + grows_left + weakens_left {
            debug!(weakens1_left, grows_left, weakens_left, "prep round did not fit");
        }

        let dispatched = match dispatch(game, &mut self.pool, units, self.config.rollback) {
            Ok(d) => d.launched.len(),
            Err(e) => {
                warn!(%e, "prep round aborted");
                0
            },
        };

        self.prep_rounds += 1;
        debug!(
            round = self.prep_rounds,
            security = snapshot.current_security,
            value = snapshot.current_value,
            wanted = %wanted,
            grow,
            weaken2,
            dispatched,
            "prep round"
        );

        game.sleep(windows.span() + self.config.buffer_ms).await;

        Ok(BatcherState::Preparing)
    }

    async fn search(
        &mut self,
        game: &impl Game,
    ) -> ScheduleResult<BatcherState> {
        if self.limit_reached() {
            return Ok(BatcherState::Done);
        }

        let snapshot = TargetSnapshot::read(game, &self.target);
        if !snapshot.is_prepared() {
            warn!(
                security = snapshot.current_security,
                value = snapshot.current_value,
                "target drifted, preparing again"
            );
            return Ok(BatcherState::Preparing);
        }

        let windows = self.windows(game)?;
        self.refresh_pool(game);

        match optimal_fraction(game, &snapshot, &mut self.pool, self.config.search_threshold) {
            Some(outcome) if 0 < outcome.threads.hack => {
                Ok(BatcherState::Executing(BatchPlan {
                    outcome,
                    windows,
                }))
            },
            _ => {
                let e = ScheduleError::NoFeasibleFraction {
                    target: self.target.clone(),
                };
                debug!(%e, free = %self.pool.total_free(), "waiting");
                game.sleep(windows.span() + self.config.batch_buffer_ms).await;
                Ok(BatcherState::Searching)
            },
        }
    }

    async fn execute(
        &mut self,
        game: &impl Game,
        plan: BatchPlan,
    ) -> ScheduleResult<BatcherState> {
        let threads = plan.outcome.threads;
        let units = StageKind::ALL.map(|kind| {
            WorkUnit::for_stage(kind, &self.target, *plan.windows.get_ref(kind), threads.get(kind))
        });

        // a skipped batch waits as long as a launched one would
        let wait = plan.windows.span() + self.config.batch_buffer_ms;

        let placement = place_each(&mut self.pool, units)?;
        if !placement.is_complete() {
            for shortfall in placement.shortfalls.iter() {
                warn!(%shortfall, "batch skipped");
            }
            placement.release(&mut self.pool);
            game.sleep(wait).await;

            return Ok(BatcherState::Searching);
        }

        match dispatch(game, &mut self.pool, placement.placed, self.config.rollback) {
            Ok(dispatched) => {
                for failure in dispatched.failures.iter() {
                    warn!(%failure, "batch launched partially");
                }
            },
            Err(e) => {
                warn!(%e, "batch aborted");
                game.sleep(wait).await;

                return Ok(BatcherState::Searching);
            },
        }

        self.batches += 1;

        let span = plan.windows.span();
        let per_minute = game.max_value(&self.target) * plan.outcome.fraction / span * 60_000.;
        info!(
            node = %self.target,
            batch = self.batches,
            fraction = plan.outcome.fraction,
            threads = %threads,
            span,
            per_minute,
            "batch launched"
        );

        game.sleep(wait).await;

        Ok(BatcherState::Searching)
    }
}

/// Batches every target at once, each with its own pool.
///
/// The batchers do not coordinate, so overlapping fleets may be
/// overcommitted; such launches fail and the affected batch is skipped.
pub async fn run_targets(
    game: &impl Game,
    targets: &[CompactString],
    config: &BatcherConfig,
) -> Vec<(CompactString, ScheduleResult<u64>)> {
    let runs = targets.iter().map(|target| async move {
        let mut batcher = Batcher::new(target, config.clone());
        (target.clone(), batcher.run(game).await)
    });

    join_all(runs).await
}
