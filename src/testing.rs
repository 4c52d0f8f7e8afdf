use std::{
    cell::RefCell,
    collections::HashMap,
};

use compact_str::CompactString;
use decorum::N64;

use crate::{
    api::{
        AccessControl,
        Clock,
        HostInspector,
        LaunchFailure,
        NodeInspector,
        ProcessHandle,
        ProcessLauncher,
        RawHostInfo,
        ScriptArg,
    },
    ram::Ram,
    stage::{
        StageKind,
        GROW_TIME_MUL,
        WEAKEN_TIME_MUL,
    },
};

pub const HACK_TIME: f64 = 1000.;
pub const EXTRACTION_PER_THREAD: f64 = 0.002;
pub const GROW_THREADS_PER_MULTIPLIER: f64 = 20.;
pub const OTHER_SCRIPT_GB: f64 = 4.;

pub fn raw_host(
    name: &str,
    max_gb: f64,
    used_gb: f64,
) -> RawHostInfo {
    RawHostInfo {
        name: name.into(),
        max_ram: Ram::from_gb(max_gb),
        used_ram: Ram::from_gb(used_gb),
        has_admin_access: true,
        is_player_owned: false,
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FakeProcess {
    pub pid: u32,
    pub host: CompactString,
    pub script: CompactString,
    pub threads: u32,
    pub args: Vec<ScriptArg>,
    pub ram: Ram,
}

impl FakeProcess {
    fn kind(&self) -> Option<StageKind> {
        StageKind::ALL
            .into_iter()
            .find(|k| k.script() == self.script)
    }

    fn target(&self) -> Option<&str> {
        match self.args.first() {
            Some(ScriptArg::Str(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    fn lands_at(&self) -> f64 {
        let delay = match self.args.get(1) {
            Some(ScriptArg::Num(n)) => *n,
            _ => 0.,
        };

        delay + self.kind().map_or(0., duration_of)
    }
}

fn duration_of(kind: StageKind) -> f64 {
    match kind {
        StageKind::Hack => HACK_TIME,
        StageKind::Grow => HACK_TIME * GROW_TIME_MUL,
        StageKind::Weaken1 | StageKind::Weaken2 => HACK_TIME * WEAKEN_TIME_MUL,
    }
}

fn script_ram(script: &str) -> Ram {
    StageKind::ALL
        .into_iter()
        .find(|k| k.script() == script)
        .map_or(Ram::from_gb(OTHER_SCRIPT_GB), StageKind::ram_per_thread)
}

#[derive(Clone, Debug)]
struct FakeTarget {
    max_value: f64,
    money: f64,
    min_security: f64,
    security: f64,
    required_level: u32,
}

#[derive(Debug)]
struct State {
    hosts: Vec<RawHostInfo>,
    targets: HashMap<CompactString, FakeTarget>,
    processes: Vec<FakeProcess>,
    next_pid: u32,
    failing: Vec<CompactString>,
    locked: Vec<CompactString>,
    player_level: u32,
    slept: Vec<f64>,
    launches: u32,
}

#[derive(Debug)]
pub struct FakeGame {
    state: RefCell<State>,
}

impl FakeGame {
    pub fn new() -> FakeGame {
        FakeGame {
            state: RefCell::new(State {
                hosts: vec![],
                targets: HashMap::new(),
                processes: vec![],
                next_pid: 1,
                failing: vec![],
                locked: vec![],
                player_level: 100,
                slept: vec![],
                launches: 0,
            }),
        }
    }

    pub fn with_host(
        self,
        raw: RawHostInfo,
    ) -> FakeGame {
        self.add_host(raw);
        self
    }

    pub fn add_host(
        &self,
        raw: RawHostInfo,
    ) {
        let mut state = self.state.borrow_mut();
        state.hosts.retain(|h| h.name != raw.name);
        state.hosts.push(raw);
    }

    pub fn with_target(
        self,
        name: &str,
        max_value: f64,
        min_security: f64,
    ) -> FakeGame {
        self.add_host(raw_host(name, 0., 0.));
        self.state.borrow_mut().targets.insert(
            name.into(),
            FakeTarget {
                max_value,
                money: max_value,
                min_security,
                security: min_security,
                required_level: 1,
            },
        );
        self
    }

    fn update_target(
        &self,
        name: &str,
        f: impl FnOnce(&mut FakeTarget),
    ) {
        if let Some(t) = self.state.borrow_mut().targets.get_mut(name) {
            f(t);
        }
    }

    pub fn set_money(
        &self,
        name: &str,
        money: f64,
    ) {
        self.update_target(name, |t| t.money = money);
    }

    pub fn set_security(
        &self,
        name: &str,
        security: f64,
    ) {
        self.update_target(name, |t| t.security = security);
    }

    pub fn set_required_level(
        &self,
        name: &str,
        level: u32,
    ) {
        self.update_target(name, |t| t.required_level = level);
    }

    pub fn fail_launches_on(
        &self,
        host: &str,
    ) {
        self.state.borrow_mut().failing.push(host.into());
    }

    /// The host loses admin access and cannot regain it.
    pub fn lock(
        &self,
        host: &str,
    ) {
        let mut state = self.state.borrow_mut();
        state.locked.push(host.into());
        for h in state.hosts.iter_mut().filter(|h| h.name == host) {
            h.has_admin_access = false;
        }
    }

    pub fn running(&self) -> Vec<FakeProcess> {
        self.state.borrow().processes.clone()
    }

    pub fn slept(&self) -> Vec<f64> {
        self.state.borrow().slept.clone()
    }

    pub fn launches(&self) -> u32 {
        self.state.borrow().launches
    }

    fn adjust_used(
        state: &mut State,
        host: &str,
        f: impl FnOnce(Ram) -> Ram,
    ) {
        if let Some(h) = state.hosts.iter_mut().find(|h| h.name == host) {
            h.used_ram = f(h.used_ram);
        }
    }

    fn land(
        target: &mut FakeTarget,
        kind: StageKind,
        threads: u32,
    ) {
        let t = threads as f64;

        match kind {
            StageKind::Hack => {
                target.money -= target.money * (EXTRACTION_PER_THREAD * t).min(1.);
                target.security += 0.002 * t;
            },
            StageKind::Grow => {
                let grown = (target.money + t) * (1. + t / GROW_THREADS_PER_MULTIPLIER);
                target.money = grown.min(target.max_value);
                target.security += 0.004 * t;
            },
            StageKind::Weaken1 | StageKind::Weaken2 => {
                target.security = (target.security - 0.05 * t).max(target.min_security);
            },
        }
    }
}

impl NodeInspector for FakeGame {
    fn max_value(
        &self,
        target: &str,
    ) -> f64 {
        self.state.borrow().targets.get(target).map_or(0., |t| t.max_value)
    }

    fn current_value(
        &self,
        target: &str,
    ) -> f64 {
        self.state.borrow().targets.get(target).map_or(0., |t| t.money)
    }

    fn min_security(
        &self,
        target: &str,
    ) -> f64 {
        self.state.borrow().targets.get(target).map_or(0., |t| t.min_security)
    }

    fn current_security(
        &self,
        target: &str,
    ) -> f64 {
        self.state.borrow().targets.get(target).map_or(0., |t| t.security)
    }

    fn stage_duration(
        &self,
        _target: &str,
        kind: StageKind,
    ) -> f64 {
        duration_of(kind)
    }

    fn threads_to_extract(
        &self,
        target: &str,
        amount: f64,
    ) -> f64 {
        amount / (self.current_value(target) * EXTRACTION_PER_THREAD)
    }

    fn threads_to_grow_by(
        &self,
        _target: &str,
        multiplier: f64,
    ) -> f64 {
        ((multiplier - 1.) * GROW_THREADS_PER_MULTIPLIER).max(0.)
    }

    fn extraction_per_thread(
        &self,
        _target: &str,
    ) -> f64 {
        EXTRACTION_PER_THREAD
    }

    fn required_level(
        &self,
        target: &str,
    ) -> u32 {
        self.state.borrow().targets.get(target).map_or(1, |t| t.required_level)
    }

    fn player_level(&self) -> u32 {
        self.state.borrow().player_level
    }
}

impl HostInspector for FakeGame {
    fn list_hosts(&self) -> Vec<RawHostInfo> {
        self.state.borrow().hosts.clone()
    }

    fn host(
        &self,
        name: &str,
    ) -> Option<RawHostInfo> {
        self.state
            .borrow()
            .hosts
            .iter()
            .find(|h| h.name == name)
            .cloned()
    }
}

impl AccessControl for FakeGame {
    fn ensure_access(
        &self,
        host: &str,
    ) -> bool {
        let mut state = self.state.borrow_mut();
        if state.locked.iter().any(|h| *h == host) {
            return false;
        }

        match state.hosts.iter_mut().find(|h| h.name == host) {
            Some(h) => {
                h.has_admin_access = true;
                true
            },
            None => false,
        }
    }
}

impl ProcessLauncher for FakeGame {
    fn launch(
        &self,
        host: &str,
        script: &str,
        threads: u32,
        args: &[ScriptArg],
    ) -> Result<ProcessHandle, LaunchFailure> {
        let mut state = self.state.borrow_mut();

        if state.failing.iter().any(|h| *h == host) {
            return Err(LaunchFailure("exec refused".into()));
        }
        if threads == 0 {
            return Err(LaunchFailure("zero threads".into()));
        }

        let ram = script_ram(script) * threads;
        let fits = match state.hosts.iter().find(|h| h.name == host) {
            Some(h) => h.used_ram + ram <= h.max_ram,
            None => return Err(LaunchFailure(format!("no host {}", host))),
        };
        if !fits {
            return Err(LaunchFailure(format!("not enough RAM on {}", host)));
        }

        FakeGame::adjust_used(&mut state, host, |used| used + ram);

        let pid = state.next_pid;
        state.next_pid += 1;
        state.launches += 1;
        state.processes.push(FakeProcess {
            pid,
            host: host.into(),
            script: script.into(),
            threads,
            args: args.to_vec(),
            ram,
        });

        Ok(ProcessHandle(pid))
    }

    fn kill(
        &self,
        process: ProcessHandle,
    ) -> bool {
        let mut state = self.state.borrow_mut();

        match state.processes.iter().position(|p| p.pid == process.0) {
            Some(i) => {
                let p = state.processes.remove(i);
                FakeGame::adjust_used(&mut state, &p.host, |used| used - p.ram);
                true
            },
            None => false,
        }
    }
}

impl Clock for FakeGame {
    async fn sleep(
        &self,
        millis: f64,
    ) {
        let mut state = self.state.borrow_mut();
        state.slept.push(millis);

        let mut finished = std::mem::take(&mut state.processes);
        finished.sort_by_key(|p| N64::from_inner(p.lands_at()));

        for p in finished {
            FakeGame::adjust_used(&mut state, &p.host, |used| used - p.ram);

            if let (Some(kind), Some(name)) = (p.kind(), p.target()) {
                if let Some(target) = state.targets.get_mut(name) {
                    FakeGame::land(target, kind, p.threads);
                }
            }
        }
    }
}
