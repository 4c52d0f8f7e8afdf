//! Free RAM of the fleet, as seen by one scheduling session.

use core::cmp::Ordering;
use std::collections::HashMap;

use compact_str::CompactString;
use tracing::{
    debug,
    trace,
};

use crate::{
    api::RawHostInfo,
    config::{
        BatcherConfig,
        HostSubset,
    },
    error::{
        ScheduleError,
        ScheduleResult,
    },
    ram::Ram,
};

pub const HOME: &str = "home";

pub type HostOrdering = fn(&HostCapacity, &HostCapacity) -> Ordering;
pub type HostFilter = Box<dyn Fn(&HostCapacity) -> bool>;

#[derive(Clone, Debug, PartialEq)]
pub struct HostCapacity {
    name: CompactString,
    max_ram: Ram,
    used_ram: Ram,
    speculative: Ram,
    has_admin_access: bool,
    is_player_owned: bool,
}

impl HostCapacity {
    /// Builds the capacity entry of a host, keeping `home_reserve` of home's
    /// RAM out of reach.
    pub fn from_raw(
        raw: RawHostInfo,
        home_reserve: f64,
    ) -> HostCapacity {
        let max_ram = if raw.name == HOME {
            raw.max_ram.scaled_down(home_reserve)
        }
        else {
            raw.max_ram
        };

        HostCapacity {
            name: raw.name,
            max_ram,
            used_ram: raw.used_ram,
            speculative: Ram::ZERO,
            has_admin_access: raw.has_admin_access,
            is_player_owned: raw.is_player_owned,
        }
    }

    pub fn get_name(&self) -> &str {
        &self.name
    }

    pub fn get_max_ram(&self) -> Ram {
        self.max_ram
    }

    pub fn get_used_ram(&self) -> Ram {
        self.used_ram
    }

    pub fn get_speculative(&self) -> Ram {
        self.speculative
    }

    pub fn has_admin_access(&self) -> bool {
        self.has_admin_access
    }

    pub fn is_player_owned(&self) -> bool {
        self.is_player_owned
    }

    pub fn is_home(&self) -> bool {
        self.name == HOME
    }

    /// Free RAM after confirmed usage and speculative reservations, never
    /// below zero.
    pub fn effective_free(&self) -> Ram {
        self.max_ram - self.used_ram - self.speculative
    }
}

pub fn ascending_free(
    a: &HostCapacity,
    b: &HostCapacity,
) -> Ordering {
    a.effective_free()
        .cmp(&b.effective_free())
        .then_with(|| a.name.cmp(&b.name))
}

/// Admin access, at least `min_free` effective free RAM, and membership in
/// `subset`.
pub fn inclusion_rule(
    subset: HostSubset,
    min_free: Ram,
) -> HostFilter {
    Box::new(move |host: &HostCapacity| {
        let in_subset = match subset {
            HostSubset::All => true,
            HostSubset::Home => host.is_home(),
            HostSubset::Purchased => host.is_player_owned() && !host.is_home(),
            HostSubset::Network => !host.is_player_owned() && !host.is_home(),
        };

        in_subset && host.has_admin_access() && min_free <= host.effective_free()
    })
}

pub struct ResourcePool {
    hosts: HashMap<CompactString, HostCapacity>,
    ordered: Vec<CompactString>,
    ordering: HostOrdering,
    inclusion: HostFilter,
    home_reserve: f64,
}

impl ResourcePool {
    pub fn with_rules(
        ordering: HostOrdering,
        inclusion: HostFilter,
        home_reserve: f64,
    ) -> ResourcePool {
        ResourcePool {
            hosts: HashMap::new(),
            ordered: vec![],
            ordering,
            inclusion,
            home_reserve,
        }
    }

    pub fn new(config: &BatcherConfig) -> ResourcePool {
        ResourcePool::with_rules(
            ascending_free,
            inclusion_rule(config.subset, config.min_free()),
            config.home_reserve,
        )
    }

    pub fn from_hosts(
        config: &BatcherConfig,
        hosts: impl IntoIterator<Item = RawHostInfo>,
    ) -> ResourcePool {
        let mut pool = ResourcePool::new(config);
        pool.refresh(hosts);
        pool
    }

    fn rebuild_view(&mut self) {
        let mut view = self
            .hosts
            .values()
            .filter(|h| (self.inclusion)(h))
            .collect::<Vec<_>>();
        view.sort_by(|a, b| (self.ordering)(a, b));

        self.ordered = view.into_iter().map(|h| h.name.clone()).collect();
    }

    /// Merges raw host data into the pool. Known hosts keep their
    /// speculative reservations.
    pub fn refresh(
        &mut self,
        hosts: impl IntoIterator<Item = RawHostInfo>,
    ) {
        for raw in hosts {
            self.upsert(raw, false);
        }

        self.rebuild_view();
        debug!(hosts = self.ordered.len(), free = %self.total_free(), "pool refreshed");
    }

    fn upsert(
        &mut self,
        raw: RawHostInfo,
        clear_speculative: bool,
    ) {
        let mut fresh = HostCapacity::from_raw(raw, self.home_reserve);

        if let Some(old) = self.hosts.get(&fresh.name) {
            if !clear_speculative {
                fresh.speculative = old.speculative;
            }
        }

        self.hosts.insert(fresh.name.clone(), fresh);
    }

    pub fn reserve_speculative(
        &mut self,
        host: &str,
        amount: Ram,
    ) -> ScheduleResult<()> {
        let entry = self
            .hosts
            .get_mut(host)
            .ok_or_else(|| ScheduleError::UnknownHost(host.into()))?;
        entry.speculative += amount;
        trace!(host, %amount, free = %entry.effective_free(), "reserved");

        self.rebuild_view();
        Ok(())
    }

    pub fn release_speculative(
        &mut self,
        host: &str,
    ) {
        if let Some(entry) = self.hosts.get_mut(host) {
            entry.speculative = Ram::ZERO;
            self.rebuild_view();
        }
    }

    /// Undoes one reservation of `amount`.
    pub fn release_amount(
        &mut self,
        host: &str,
        amount: Ram,
    ) {
        if let Some(entry) = self.hosts.get_mut(host) {
            entry.speculative = entry.speculative - amount;
            trace!(host, %amount, free = %entry.effective_free(), "released");
            self.rebuild_view();
        }
    }

    pub fn commit_after_dispatch(
        &mut self,
        raw: RawHostInfo,
        clear_speculative: bool,
    ) {
        self.upsert(raw, clear_speculative);
        self.rebuild_view();
    }

    pub fn smallest_fitting(
        &self,
        min_free: Ram,
    ) -> Option<&HostCapacity> {
        // min_by_key keeps the first of equal keys, so ties follow the view
        // ordering
        self.hosts()
            .filter(|h| min_free <= h.effective_free())
            .min_by_key(|h| h.effective_free())
    }

    pub fn largest_free_block(&self) -> Ram {
        self.hosts()
            .map(HostCapacity::effective_free)
            .max()
            .unwrap_or(Ram::ZERO)
    }

    /// Threads of `per_thread` the whole pool can run, counting whole
    /// threads per host.
    pub fn total_threads_for(
        &self,
        per_thread: Ram,
    ) -> u64 {
        self.hosts()
            .map(|h| h.effective_free().threads_of(per_thread) as u64)
            .sum()
    }

    pub fn total_free(&self) -> Ram {
        self.hosts().map(HostCapacity::effective_free).sum()
    }

    pub fn hosts(&self) -> impl Iterator<Item = &HostCapacity> + '_ {
        self.ordered.iter().filter_map(|name| self.hosts.get(name))
    }

    pub fn get(
        &self,
        host: &str,
    ) -> Option<&HostCapacity> {
        self.hosts.get(host)
    }

    pub fn is_eligible(
        &self,
        host: &str,
    ) -> bool {
        self.ordered.iter().any(|name| *name == host)
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }
}
