#![allow(async_fn_in_trait)]

use compact_str::CompactString;
use thiserror::Error;

use crate::{
    ram::Ram,
    stage::StageKind,
};

#[derive(Clone, Debug, PartialEq)]
pub struct RawHostInfo {
    pub name: CompactString,
    pub max_ram: Ram,
    pub used_ram: Ram,
    pub has_admin_access: bool,
    pub is_player_owned: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ProcessHandle(pub u32);

#[derive(Clone, Debug, Error, PartialEq)]
#[error("{0}")]
pub struct LaunchFailure(pub String);

#[derive(Clone, Debug, PartialEq)]
pub enum ScriptArg {
    Str(CompactString),
    Num(f64),
    Bool(bool),
}

impl From<&str> for ScriptArg {
    fn from(s: &str) -> ScriptArg {
        ScriptArg::Str(s.into())
    }
}

impl From<f64> for ScriptArg {
    fn from(n: f64) -> ScriptArg {
        ScriptArg::Num(n)
    }
}

impl From<bool> for ScriptArg {
    fn from(b: bool) -> ScriptArg {
        ScriptArg::Bool(b)
    }
}

pub trait NodeInspector {
    fn max_value(
        &self,
        target: &str,
    ) -> f64;

    fn current_value(
        &self,
        target: &str,
    ) -> f64;

    fn min_security(
        &self,
        target: &str,
    ) -> f64;

    fn current_security(
        &self,
        target: &str,
    ) -> f64;

    /// Milliseconds one run of `kind` takes against `target` right now.
    fn stage_duration(
        &self,
        target: &str,
        kind: StageKind,
    ) -> f64;

    /// Hack threads needed to take `amount` money from `target`.
    fn threads_to_extract(
        &self,
        target: &str,
        amount: f64,
    ) -> f64;

    /// Grow threads needed to multiply the money of `target` by `multiplier`.
    fn threads_to_grow_by(
        &self,
        target: &str,
        multiplier: f64,
    ) -> f64;

    fn extraction_per_thread(
        &self,
        target: &str,
    ) -> f64;

    fn required_level(
        &self,
        target: &str,
    ) -> u32;

    fn player_level(&self) -> u32;

    fn security_delta_per_thread(
        &self,
        kind: StageKind,
    ) -> f64 {
        kind.security_delta_thousandths() as f64 / 1000.
    }

    fn ram_cost_per_thread(
        &self,
        kind: StageKind,
    ) -> Ram {
        kind.ram_per_thread()
    }
}

pub trait HostInspector {
    fn list_hosts(&self) -> Vec<RawHostInfo>;

    fn host(
        &self,
        name: &str,
    ) -> Option<RawHostInfo>;
}

pub trait AccessControl {
    /// Gains admin access to `host` if possible. Returns whether the host is
    /// accessible afterwards.
    fn ensure_access(
        &self,
        host: &str,
    ) -> bool;
}

pub trait ProcessLauncher {
    fn launch(
        &self,
        host: &str,
        script: &str,
        threads: u32,
        args: &[ScriptArg],
    ) -> Result<ProcessHandle, LaunchFailure>;

    fn kill(
        &self,
        process: ProcessHandle,
    ) -> bool;
}

pub trait Clock {
    async fn sleep(
        &self,
        millis: f64,
    );
}

pub trait Game:
    NodeInspector + HostInspector + AccessControl + ProcessLauncher + Clock
{
}

impl<T> Game for T where
    T: NodeInspector + HostInspector + AccessControl + ProcessLauncher + Clock
{
}
