pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod netscript;
pub mod orchestrator;
pub mod placement;
pub mod pool;
pub mod ram;
pub mod search;
pub mod sizing;
pub mod stage;
pub mod targets;
pub mod timing;
pub mod unit;
mod utils;

#[cfg(test)]
mod testing;

use clap::{
    error::ErrorKind::DisplayHelp,
    Parser,
    Subcommand,
};
use itertools::Itertools as _;
use js_sys::Array;
use tracing::Level;
use wasm_bindgen::prelude::*;

pub use crate::{
    api::Game,
    config::BatcherConfig,
    error::{
        ScheduleError,
        ScheduleResult,
    },
    logging::LogBuffer,
    netscript::{
        NsWrapper,
        NS,
    },
    orchestrator::Batcher,
    pool::ResourcePool,
};

#[wasm_bindgen]
pub async fn execute_command(
    ns: &NS,
    args: Array,
) {
    let logs = LogBuffer::default();
    let ns = NsWrapper::new(ns, logs.clone());

    let mut strargs = vec!["run batchoxide.js".to_owned()];
    let strargs_iter = args.iter().filter_map(|a| {
        a.as_string()
            .or_else(|| a.as_f64().map(|n| n.to_string()))
    });
    strargs.extend(strargs_iter);

    // if the message was matched, process the message
    let cli = match Cli::try_parse_from(strargs) {
        Ok(cli) => cli,

        Err(e) if e.kind() == DisplayHelp => {
            let error_msg = format!("\n{}", clap::Error::raw(e.kind(), e));

            ns.tprint(&error_msg);
            return;
        },

        Err(e) => {
            ns.tprint(&format!("unable to process message:\n{}", e));
            return;
        },
    };

    let _guard = logging::capture(cli.log_level, logs);

    match cli.mode {
        AppMode::Batch { target, all, config } => {
            let targets = targets::pick_targets(&ns, target.as_deref(), all);
            if targets.is_empty() {
                ns.tprint("no target worth batching");
            }

            for (target, result) in orchestrator::run_targets(&ns, &targets, &config).await {
                match result {
                    Ok(batches) => ns.tprint(&format!("{}: {} batches launched", target, batches)),
                    Err(e) => ns.tprint(&format!("{}: {}", target, e)),
                }
            }
        },

        AppMode::Prep { target, config } => {
            let mut batcher = Batcher::new(&target, config);
            match batcher.prepare(&ns).await {
                Ok(()) => ns.tprint(&format!(
                    "{}: prepared after {} rounds",
                    target,
                    batcher.get_prep_rounds()
                )),
                Err(e) => ns.tprint(&format!("{}: {}", target, e)),
            }
        },

        AppMode::Targets { count } => {
            let targets = targets::best_targets(&ns, count);
            ns.tprint(&format!("best targets: {}", targets.iter().join(", ")));
        },
    }

    ns.flush_logs();
}

#[derive(Parser, Debug, PartialEq)]
struct Cli {
    /// Most verbose level written to the script log.
    #[arg(long, global = true, default_value_t = Level::INFO)]
    log_level: Level,

    #[command(subcommand)]
    mode: AppMode,
}

#[derive(Subcommand, Debug, PartialEq)]
enum AppMode {
    /// Prepare a target, then batch it until stopped. Without a target, the
    /// best one is picked.
    Batch {
        target: Option<String>,
        /// Batch the N best targets side by side.
        #[arg(long, value_name = "N", conflicts_with = "target")]
        all: Option<usize>,
        #[command(flatten)]
        config: BatcherConfig,
    },
    /// Only bring a target to minimum security and maximum money.
    Prep {
        target: String,
        #[command(flatten)]
        config: BatcherConfig,
    },
    /// List the best rooted targets.
    Targets {
        #[arg(long, short = 'n', default_value_t = 5)]
        count: usize,
    },
}
