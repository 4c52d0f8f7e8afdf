use clap::{
    Args,
    ValueEnum,
};

use crate::ram::Ram;

/// Which hosts may run batch scripts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum HostSubset {
    #[default]
    All,
    Home,
    Purchased,
    Network,
}

/// What to do when a launch fails after other units of the same call were
/// already placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum RollbackPolicy {
    /// Leave every reservation in place.
    Keep,
    /// Release the failed unit's reservation only.
    ReleaseFailed,
    /// Kill what was launched and release everything of the call.
    #[default]
    Abort,
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct BatcherConfig {
    /// Gap between two stage completions, in milliseconds.
    #[arg(long, default_value_t = 50., value_parser = positive_ms)]
    pub buffer_ms: f64,

    /// Extra wait after a batch's last weaken lands, in milliseconds.
    #[arg(long, default_value_t = 100.)]
    pub batch_buffer_ms: f64,

    /// Resolution of the extraction fraction search.
    #[arg(long, default_value_t = 0.01)]
    pub search_threshold: f64,

    /// Hosts with less free RAM than this (GB) are ignored.
    #[arg(long, default_value_t = 1.)]
    pub min_free_gb: f64,

    /// Fraction of home's RAM left untouched.
    #[arg(long, default_value_t = 0.1)]
    pub home_reserve: f64,

    /// During preparation, grow only once security is within this factor of
    /// the minimum.
    #[arg(long, default_value_t = 1.1)]
    pub prep_security_tolerance: f64,

    #[arg(long, value_enum, default_value_t = HostSubset::All)]
    pub subset: HostSubset,

    #[arg(long, value_enum, default_value_t = RollbackPolicy::Abort)]
    pub rollback: RollbackPolicy,

    /// Stop after this many batches.
    #[arg(long)]
    pub max_batches: Option<u64>,
}

fn positive_ms(arg: &str) -> Result<f64, String> {
    match arg.parse::<f64>() {
        Ok(ms) if ms.is_finite() && 0. < ms => Ok(ms),
        Ok(_) => Err(format!("{} is not a positive duration", arg)),
        Err(e) => Err(e.to_string()),
    }
}

impl BatcherConfig {
    pub fn min_free(&self) -> Ram {
        Ram::from_gb(self.min_free_gb)
    }
}

impl Default for BatcherConfig {
    fn default() -> BatcherConfig {
        BatcherConfig {
            buffer_ms: 50.,
            batch_buffer_ms: 100.,
            search_threshold: 0.01,
            min_free_gb: 1.,
            home_reserve: 0.1,
            prep_security_tolerance: 1.1,
            subset: HostSubset::All,
            rollback: RollbackPolicy::Abort,
            max_batches: None,
        }
    }
}
