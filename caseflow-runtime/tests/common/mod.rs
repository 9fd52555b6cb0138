//! Shared fixtures for runtime integration tests
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use caseflow_logic_api::{FunctionSpec, Logic, LogicError, LogicManifest, Value};
use caseflow_runtime::{LoadError, LoadedLogic, LogicLoader, version};

pub const EXT: &str = "logic";

/// Shared record of lifecycle hooks, e.g. `"load foo 0.0.1"`
pub type HookLog = Arc<Mutex<Vec<String>>>;

/// Blocks a gated load or unload hook until opened
#[derive(Default)]
pub struct Gate {
    open: Mutex<bool>,
    changed: Condvar,
}

impl Gate {
    pub fn open(&self) {
        *self.open.lock().unwrap() = true;
        self.changed.notify_all();
    }

    fn wait(&self) {
        let mut open = self.open.lock().unwrap();
        while !*open {
            open = self.changed.wait(open).unwrap();
        }
    }
}

/// Loader whose entry file contents script the outcome
///
/// The first line of the entry file is the unit name to report, or one of
/// `broken` (fail), `panic` (panic), `gated <name>` (load waits for `gate`)
/// or `hold-unload <name>` (the unit's unload hook waits for `unload_gate`).
#[derive(Default)]
pub struct ScriptedLoader {
    pub loads: AtomicUsize,
    pub started: AtomicUsize,
    pub log: HookLog,
    pub gate: Gate,
    pub unload_gate: Arc<Gate>,
    pub delay: Option<Duration>,
}

impl ScriptedLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.log().iter().filter(|e| e.as_str() == entry).count()
    }
}

impl LogicLoader for ScriptedLoader {
    fn extension(&self) -> &str {
        EXT
    }

    fn load(&self, entry: &Path) -> Result<LoadedLogic, LoadError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let script = fs::read_to_string(entry).map_err(|_| LoadError::EntryMissing {
            path: entry.to_path_buf(),
        })?;
        let script = script.lines().next().unwrap_or_default().trim().to_string();

        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }

        let mut unload_gate = None;
        let name = match script.split_once(' ') {
            Some(("gated", name)) => {
                self.gate.wait();
                name.to_string()
            }
            Some(("hold-unload", name)) => {
                unload_gate = Some(Arc::clone(&self.unload_gate));
                name.to_string()
            }
            _ if script == "broken" => {
                return Err(LoadError::NullInstance {
                    path: entry.to_path_buf(),
                });
            }
            _ if script == "panic" => panic!("loader exploded"),
            _ => script.clone(),
        };

        let version = entry
            .parent()
            .and_then(Path::parent)
            .and_then(version::parse_dir_path)
            .map(|(_, v)| v)
            .unwrap_or_default();

        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(LoadedLogic::new(
            Box::new(Scripted {
                name,
                version,
                log: Arc::clone(&self.log),
                unload_gate,
            }),
            entry,
        ))
    }
}

/// Unit produced by [`ScriptedLoader`]
pub struct Scripted {
    name: String,
    version: String,
    log: HookLog,
    unload_gate: Option<Arc<Gate>>,
}

impl Logic for Scripted {
    fn manifest(&self) -> LogicManifest {
        LogicManifest {
            name: self.name.clone(),
            version: self.version.clone(),
            functions: vec![FunctionSpec::new("version", "Report the loaded version")],
            ..Default::default()
        }
    }

    fn on_load(&self) -> Result<(), LogicError> {
        self.log
            .lock()
            .unwrap()
            .push(format!("load {} {}", self.name, self.version));
        Ok(())
    }

    fn on_unload(&self) -> Result<(), LogicError> {
        self.log
            .lock()
            .unwrap()
            .push(format!("unload {} {}", self.name, self.version));
        if let Some(gate) = &self.unload_gate {
            gate.wait();
        }
        Ok(())
    }

    fn invoke(&self, function: &str, _args: Value) -> Result<Value, LogicError> {
        match function {
            "version" => Ok(Value::String(self.version.clone())),
            other => Err(LogicError::UnknownFunction(other.to_string())),
        }
    }
}

/// Write `<root>/<name>-<version>/lib/<name>.logic` in place
pub fn install(root: &Path, name: &str, version: &str, script: &str) -> PathBuf {
    let entry = version::entry_file_path(root, name, version, EXT);
    fs::create_dir_all(entry.parent().unwrap()).unwrap();
    fs::write(&entry, script).unwrap();
    version::version_dir(root, name, version)
}

/// Build the version directory under a hidden name and rename it into place
pub fn install_atomic(root: &Path, name: &str, version: &str, script: &str) -> PathBuf {
    let staging = root.join(format!(".incoming-{name}-{version}"));
    let entry = staging.join("lib").join(format!("{name}.{EXT}"));
    fs::create_dir_all(entry.parent().unwrap()).unwrap();
    fs::write(&entry, script).unwrap();
    let target = version::version_dir(root, name, version);
    fs::rename(&staging, &target).unwrap();
    target
}

/// Let the plugin root's mtime move past the last load
pub fn settle() {
    thread::sleep(Duration::from_millis(100));
}

/// Poll `check` until it holds or five seconds pass
pub fn wait_until(mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        thread::sleep(Duration::from_millis(20));
    }
    check()
}
