use std::collections::VecDeque;

use compact_str::CompactString;
use wasm_bindgen::{
    prelude::*,
    JsValue,
};

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
    logging::LogBuffer,
    pool::HOME,
    ram::Ram,
    stage::{
        StageKind,
        GROW_TIME_MUL,
        WEAKEN_TIME_MUL,
    },
    utils::read_attribute,
};

// thank you github.com/paulcdejean
#[wasm_bindgen]
extern "C" {
    pub type NS;

    #[wasm_bindgen(method)]
    fn tprint(
        this: &NS,
        print: &str,
    );

    #[wasm_bindgen(method)]
    fn print(
        this: &NS,
        print: &str,
    );

    #[wasm_bindgen(method)]
    async fn sleep(
        this: &NS,
        millis: f64,
    );

    #[wasm_bindgen(method)]
    fn scan(
        this: &NS,
        scan: Option<&str>,
    ) -> Vec<JsValue>;

    #[wasm_bindgen(method)]
    fn serverExists(
        this: &NS,
        host: &str,
    ) -> bool;

    #[wasm_bindgen(method)]
    fn getServer(
        this: &NS,
        host: Option<&str>,
    ) -> Server;

    #[wasm_bindgen(method)]
    fn hasRootAccess(
        this: &NS,
        host: &str,
    ) -> bool;

    #[wasm_bindgen(catch, method)]
    fn nuke(
        this: &NS,
        host: &str,
    ) -> Result<(), JsValue>;

    #[wasm_bindgen(catch, method)]
    fn brutessh(
        this: &NS,
        hostname: &str,
    ) -> Result<(), JsValue>;

    #[wasm_bindgen(catch, method)]
    fn ftpcrack(
        this: &NS,
        hostname: &str,
    ) -> Result<(), JsValue>;

    #[wasm_bindgen(catch, method)]
    fn relaysmtp(
        this: &NS,
        hostname: &str,
    ) -> Result<(), JsValue>;

    #[wasm_bindgen(catch, method)]
    fn httpworm(
        this: &NS,
        hostname: &str,
    ) -> Result<(), JsValue>;

    #[wasm_bindgen(catch, method)]
    fn sqlinject(
        this: &NS,
        hostname: &str,
    ) -> Result<(), JsValue>;

    #[wasm_bindgen(catch, method, variadic)]
    fn exec(
        this: &NS,
        script_name: &str,
        host: &str,
        num_threads: u32,
        args: Box<[JsValue]>,
    ) -> Result<u32, JsValue>;

    #[wasm_bindgen(method)]
    fn kill(
        this: &NS,
        pid: u32,
    ) -> bool;

    #[wasm_bindgen(method)]
    fn getScriptRam(
        this: &NS,
        script: &str,
        host: &str,
    ) -> f64;

    #[wasm_bindgen(method)]
    fn getHackingLevel(this: &NS) -> u32;

    #[wasm_bindgen(method)]
    fn getHackTime(
        this: &NS,
        host: &str,
    ) -> f64;

    #[wasm_bindgen(method)]
    fn getServerMaxRam(
        this: &NS,
        host: &str,
    ) -> f64;

    #[wasm_bindgen(method)]
    fn getServerUsedRam(
        this: &NS,
        host: &str,
    ) -> f64;

    #[wasm_bindgen(method)]
    fn getServerSecurityLevel(
        this: &NS,
        host: &str,
    ) -> f64;

    #[wasm_bindgen(method)]
    fn getServerMinSecurityLevel(
        this: &NS,
        host: &str,
    ) -> f64;

    #[wasm_bindgen(method)]
    fn getServerMaxMoney(
        this: &NS,
        host: &str,
    ) -> f64;

    #[wasm_bindgen(catch, method)]
    fn getServerMoneyAvailable(
        this: &NS,
        host: &str,
    ) -> Result<f64, JsValue>;

    #[wasm_bindgen(method)]
    fn getServerRequiredHackingLevel(
        this: &NS,
        host: &str,
    ) -> u32;

    #[wasm_bindgen(method)]
    fn hackAnalyze(
        this: &NS,
        host: &str,
    ) -> f64;

    #[wasm_bindgen(method)]
    fn hackAnalyzeThreads(
        this: &NS,
        host: &str,
        amount: f64,
    ) -> f64;

    #[wasm_bindgen(method)]
    fn growthAnalyze(
        this: &NS,
        host: &str,
        growth_factor: f64,
        cores: Option<u32>,
    ) -> f64;

    pub type Server;
}

/// The game's scripting API behind the scheduler traits.
pub struct NsWrapper<'a> {
    ns: &'a NS,
    logs: LogBuffer,
}

impl<'a> NsWrapper<'a> {
    pub fn new(
        ns: &'a NS,
        logs: LogBuffer,
    ) -> NsWrapper<'a> {
        NsWrapper {
            ns,
            logs,
        }
    }

    /// Prints what was logged since the last flush to the script log.
    pub fn flush_logs(&self) {
        let logged = self.logs.drain();
        let logged = logged.trim_end();

        if !logged.is_empty() {
            self.ns.print(logged);
        }
    }

    pub fn tprint(
        &self,
        text: &str,
    ) {
        self.ns.tprint(text);
    }

    pub fn print(
        &self,
        text: &str,
    ) {
        self.ns.print(text);
    }

    pub fn scan(
        &self,
        host: Option<&str>,
    ) -> Vec<String> {
        self.ns
            .scan(host)
            .into_iter()
            .filter_map(|m| m.as_string())
            .collect::<Vec<_>>()
    }

    /// Every host name reachable from home, breadth first.
    pub fn get_hostnames(&self) -> Vec<CompactString> {
        let mut traversed: Vec<CompactString> = vec![];
        let mut pending = VecDeque::new();
        pending.push_front(CompactString::from(HOME));

        while let Some(host) = pending.pop_back() {
            for child in self.scan(Some(host.as_str())) {
                // don't consider hosts that are already found
                let found_already = traversed.iter().chain(pending.iter()).any(|t| *t == child);
                if found_already || host == child {
                    continue;
                }

                pending.push_front(child.into());
            }

            traversed.push(host);
        }

        traversed
    }

    pub fn is_player_owned(
        &self,
        host: &str,
    ) -> bool {
        let server = self.ns.getServer(Some(host));
        read_attribute(&server, "purchasedByPlayer", JsValue::as_bool).unwrap_or(false)
    }

    pub fn get_host_info(
        &self,
        host: &str,
    ) -> RawHostInfo {
        RawHostInfo {
            name: host.into(),
            max_ram: Ram::from_gb(self.ns.getServerMaxRam(host)),
            used_ram: Ram::from_gb(self.ns.getServerUsedRam(host)),
            has_admin_access: self.ns.hasRootAccess(host),
            is_player_owned: host != HOME && self.is_player_owned(host),
        }
    }

    /// Runs every port opener the player owns, then nukes.
    pub fn nuke(
        &self,
        host: &str,
    ) -> bool {
        // missing programs throw, which is fine
        let _ = self.ns.brutessh(host);
        let _ = self.ns.ftpcrack(host);
        let _ = self.ns.relaysmtp(host);
        let _ = self.ns.httpworm(host);
        let _ = self.ns.sqlinject(host);

        self.ns.nuke(host).is_ok()
    }
}

impl NodeInspector for NsWrapper<'_> {
    fn max_value(
        &self,
        target: &str,
    ) -> f64 {
        self.ns.getServerMaxMoney(target)
    }

    fn current_value(
        &self,
        target: &str,
    ) -> f64 {
        self.ns.getServerMoneyAvailable(target).unwrap_or(0.)
    }

    fn min_security(
        &self,
        target: &str,
    ) -> f64 {
        self.ns.getServerMinSecurityLevel(target)
    }

    fn current_security(
        &self,
        target: &str,
    ) -> f64 {
        self.ns.getServerSecurityLevel(target)
    }

    fn stage_duration(
        &self,
        target: &str,
        kind: StageKind,
    ) -> f64 {
        use StageKind::*;

        let hack_time = self.ns.getHackTime(target);
        match kind {
            Hack => hack_time,
            Grow => hack_time * GROW_TIME_MUL,
            Weaken1 | Weaken2 => hack_time * WEAKEN_TIME_MUL,
        }
    }

    fn threads_to_extract(
        &self,
        target: &str,
        amount: f64,
    ) -> f64 {
        self.ns.hackAnalyzeThreads(target, amount)
    }

    fn threads_to_grow_by(
        &self,
        target: &str,
        multiplier: f64,
    ) -> f64 {
        if multiplier <= 1. {
            return 0.;
        }

        self.ns.growthAnalyze(target, multiplier, None)
    }

    fn extraction_per_thread(
        &self,
        target: &str,
    ) -> f64 {
        self.ns.hackAnalyze(target)
    }

    fn required_level(
        &self,
        target: &str,
    ) -> u32 {
        self.ns.getServerRequiredHackingLevel(target)
    }

    fn player_level(&self) -> u32 {
        self.ns.getHackingLevel()
    }

    fn ram_cost_per_thread(
        &self,
        kind: StageKind,
    ) -> Ram {
        match Ram::from_gb(self.ns.getScriptRam(kind.script(), HOME)) {
            // script missing from home
            r if r.is_zero() => kind.ram_per_thread(),
            r => r,
        }
    }
}

impl HostInspector for NsWrapper<'_> {
    fn list_hosts(&self) -> Vec<RawHostInfo> {
        self.get_hostnames()
            .iter()
            .map(|h| self.get_host_info(h))
            .collect()
    }

    fn host(
        &self,
        name: &str,
    ) -> Option<RawHostInfo> {
        if self.ns.serverExists(name) {
            Some(self.get_host_info(name))
        }
        else {
            None
        }
    }
}

impl AccessControl for NsWrapper<'_> {
    fn ensure_access(
        &self,
        host: &str,
    ) -> bool {
        self.ns.hasRootAccess(host) || self.nuke(host)
    }
}

fn to_js(arg: &ScriptArg) -> JsValue {
    match arg {
        ScriptArg::Str(s) => JsValue::from_str(s),
        ScriptArg::Num(n) => JsValue::from_f64(*n),
        ScriptArg::Bool(b) => JsValue::from_bool(*b),
    }
}

impl ProcessLauncher for NsWrapper<'_> {
    fn launch(
        &self,
        host: &str,
        script: &str,
        threads: u32,
        args: &[ScriptArg],
    ) -> Result<ProcessHandle, LaunchFailure> {
        let args = args.iter().map(to_js).collect::<Vec<_>>().into_boxed_slice();

        match self.ns.exec(script, host, threads, args) {
            // exec reports failure with a zero pid
            Ok(0) => Err(LaunchFailure(format!("exec returned no pid on {}", host))),
            Ok(pid) => Ok(ProcessHandle(pid)),
            Err(e) => Err(LaunchFailure(
                e.as_string().unwrap_or_else(|| format!("{:?}", e)),
            )),
        }
    }

    fn kill(
        &self,
        process: ProcessHandle,
    ) -> bool {
        self.ns.kill(process.0)
    }
}

impl Clock for NsWrapper<'_> {
    async fn sleep(
        &self,
        millis: f64,
    ) {
        self.flush_logs();
        self.ns.sleep(millis).await;
    }
}
