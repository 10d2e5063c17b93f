use std::env;
use std::ffi::OsString;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::str::FromStr;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::circuit::Circuit;
use crate::error::{Error, Result};
use crate::results::AnalysisResult;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Runs a netlist file and returns the path of the result file it produced.
pub trait SimulatorBackend {
    fn run(&self, netlist: &Path, timeout: Duration) -> Result<PathBuf>;
}

/// Strategy for finding the simulator executable.
pub trait ExecutableLocator {
    fn locate(&self) -> Result<PathBuf>;
}

/// A fixed executable path.
#[derive(Debug, Clone)]
pub struct ExplicitPath(pub PathBuf);

impl ExecutableLocator for ExplicitPath {
    fn locate(&self) -> Result<PathBuf> {
        if self.0.is_file() {
            Ok(self.0.clone())
        } else {
            Err(Error::SimulatorNotFound(format!("no executable at {}", self.0.display())))
        }
    }
}

/// Searches the directories of a `PATH`-style list for the first candidate name.
#[derive(Debug, Clone)]
pub struct SearchPath {
    candidates: Vec<String>,
    path: Option<OsString>,
}

impl SearchPath {
    /// Search the process `PATH`
    pub fn new<I, S>(candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        SearchPath {
            candidates: candidates.into_iter().map(Into::into).collect(),
            path: None,
        }
    }

    pub fn ltspice() -> Self {
        Self::new(["ltspice", "LTspice", "XVIIx64"])
    }

    pub fn ngspice() -> Self {
        Self::new(["ngspice"])
    }

    /// Search `path` instead of the process `PATH`
    pub fn in_path(mut self, path: impl Into<OsString>) -> Self {
        self.path = Some(path.into());
        self
    }
}

impl ExecutableLocator for SearchPath {
    fn locate(&self) -> Result<PathBuf> {
        let path = self.path.clone().or_else(|| env::var_os("PATH")).unwrap_or_default();

        for dir in env::split_paths(&path) {
            for name in &self.candidates {
                let plain = dir.join(name);
                let with_suffix = dir.join(format!("{}{}", name, env::consts::EXE_SUFFIX));
                if let Some(found) = [plain, with_suffix].into_iter().find(|p| p.is_file()) {
                    debug!("Found simulator executable {}", found.display());
                    return Ok(found);
                }
            }
        }

        Err(Error::SimulatorNotFound(format!(
            "none of [{}] found on PATH",
            self.candidates.join(", ")
        )))
    }
}

/// Command-line conventions of a simulator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dialect {
    /// `-b -Run <netlist>`, run from the netlist's directory
    LtSpice,
    /// `-b -r <raw> <netlist>`
    Ngspice,
    /// Argument template; `{netlist}` and `{raw}` are substituted in every argument.
    Custom(Vec<String>),
}

impl Dialect {
    pub fn arguments(&self, netlist: &Path, raw: &Path) -> Vec<OsString> {
        match self {
            Dialect::LtSpice => vec!["-b".into(), "-Run".into(), netlist.into()],
            Dialect::Ngspice => vec!["-b".into(), "-r".into(), raw.into(), netlist.into()],
            Dialect::Custom(template) => {
                let netlist = netlist.to_string_lossy();
                let raw = raw.to_string_lossy();
                template
                    .iter()
                    .map(|arg| arg.replace("{netlist}", &netlist).replace("{raw}", &raw).into())
                    .collect()
            }
        }
    }
}

impl FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ltspice" => Ok(Dialect::LtSpice),
            "ngspice" => Ok(Dialect::Ngspice),
            _ => Err(format!("Invalid simulator dialect: {}", s)),
        }
    }
}

/// Backend that spawns the simulator as a child process.
///
/// The result file is expected next to the netlist with a `.raw` extension.
/// A stale result from an earlier run is removed before the process starts.
pub struct ProcessBackend {
    locator: Box<dyn ExecutableLocator>,
    dialect: Dialect,
    poll_interval: Duration,
}

impl ProcessBackend {
    pub fn new(locator: impl ExecutableLocator + 'static, dialect: Dialect) -> Self {
        ProcessBackend {
            locator: Box::new(locator),
            dialect,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn dialect(&self) -> &Dialect {
        &self.dialect
    }
}

impl SimulatorBackend for ProcessBackend {
    fn run(&self, netlist: &Path, timeout: Duration) -> Result<PathBuf> {
        let executable = self.locator.locate()?;
        let netlist = absolute(netlist)?;
        fs::metadata(&netlist).map_err(|e| Error::io(&netlist, e))?;

        let raw = netlist.with_extension("raw");
        if raw.exists() {
            fs::remove_file(&raw).map_err(|e| Error::io(&raw, e))?;
        }

        let args = self.dialect.arguments(&netlist, &raw);
        let mut command = Command::new(&executable);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if self.dialect == Dialect::LtSpice {
            if let Some(dir) = netlist.parent() {
                command.current_dir(dir);
            }
        }
        // Own process group; a timeout kills the whole group.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        info!("Running {} on {}", executable.display(), netlist.display());
        debug!("Simulator arguments: {:?}", args);
        let start = Instant::now();

        let child = command.spawn().map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::SimulatorNotFound(format!("{}: {}", executable.display(), e)),
            _ => Error::io(&executable, e),
        })?;

        let finished = wait_with_timeout(child, timeout, self.poll_interval)
            .map_err(|e| Error::io(&executable, e))?;
        let Some(finished) = finished else {
            warn!("Simulation of {} timed out after {:?}", netlist.display(), timeout);
            return Err(Error::SimulationTimeout { netlist, timeout });
        };

        if !finished.status.success() {
            return Err(Error::SimulationFailed {
                executable,
                status: finished.status.code(),
                stderr: String::from_utf8_lossy(&finished.stderr).trim().to_string(),
            });
        }

        if !raw.is_file() {
            let log = fs::read(netlist.with_extension("log"))
                .map(|bytes| decode_log(&bytes))
                .unwrap_or_default();
            return Err(Error::MissingResult { path: raw, log });
        }

        info!("Simulation completed in {:.3}s", start.elapsed().as_secs_f64());
        Ok(raw)
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = env::current_dir().map_err(|e| Error::io(path, e))?;
    Ok(cwd.join(path))
}

/// LTspice writes its log as UTF-16LE.
fn decode_log(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[1] == 0 {
        let units: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        String::from_utf8_lossy(bytes).into_owned()
    }
}

struct Finished {
    status: ExitStatus,
    stderr: Vec<u8>,
}

fn drain<R: Read + Send + 'static>(mut reader: R) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buffer = Vec::new();
        let _ = reader.read_to_end(&mut buffer);
        buffer
    })
}

fn join_output(handle: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    handle.map(|h| h.join().unwrap_or_default()).unwrap_or_default()
}

/// Kill the child together with its process group.
#[cfg(unix)]
fn kill_process_tree(child: &mut Child) {
    if let Ok(pgid) = libc::pid_t::try_from(child.id()) {
        // SAFETY: the child has not been reaped yet, so its pid still names its own group.
        unsafe {
            libc::kill(-pgid, libc::SIGKILL);
        }
    }
    let _ = child.kill();
}

#[cfg(not(unix))]
fn kill_process_tree(child: &mut Child) {
    let _ = child.kill();
}

/// Wait for `child`. Once `timeout` has passed its whole process group is
/// killed, the child reaped and the output threads joined; returns `None`.
fn wait_with_timeout(mut child: Child, timeout: Duration, poll_interval: Duration) -> io::Result<Option<Finished>> {
    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);
    let start = Instant::now();

    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if start.elapsed() >= timeout {
            kill_process_tree(&mut child);
            child.wait()?;
            join_output(stdout);
            join_output(stderr);
            return Ok(None);
        }
        thread::sleep(poll_interval);
    };

    let output = join_output(stdout);
    if !output.is_empty() {
        debug!("Simulator output:\n{}", String::from_utf8_lossy(&output).trim_end());
    }
    let stderr = join_output(stderr);

    Ok(Some(Finished { status, stderr }))
}

/// Simulator run configuration
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    pub timeout: Duration,
    /// Keep the temporary directory used by [`Simulator::run_circuit`].
    pub keep_files: bool,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        SimulatorConfig {
            timeout: DEFAULT_TIMEOUT,
            keep_files: false,
        }
    }
}

/// Drives a backend and decodes what it produces.
pub struct Simulator {
    backend: Box<dyn SimulatorBackend>,
    config: SimulatorConfig,
}

impl Simulator {
    pub fn new(backend: impl SimulatorBackend + 'static) -> Self {
        Self::with_config(backend, SimulatorConfig::default())
    }

    pub fn with_config(backend: impl SimulatorBackend + 'static, config: SimulatorConfig) -> Self {
        Simulator {
            backend: Box::new(backend),
            config,
        }
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Simulate an existing netlist file.
    pub fn run_netlist(&self, netlist: impl AsRef<Path>) -> Result<AnalysisResult> {
        let raw = self.backend.run(netlist.as_ref(), self.config.timeout)?;
        AnalysisResult::from_file(raw)
    }

    /// Render `circuit` into a temporary directory, simulate it and decode the result.
    pub fn run_circuit(&self, circuit: &Circuit) -> Result<AnalysisResult> {
        let dir = tempfile::Builder::new()
            .prefix("ohmspice-")
            .tempdir()
            .map_err(|e| Error::io(env::temp_dir(), e))?;
        let netlist = circuit.save(dir.path().join(file_stem(circuit.name())))?;

        let result = self.run_netlist(&netlist);
        if self.config.keep_files {
            let kept = dir.keep();
            info!("Keeping simulation files in {}", kept.display());
        }
        result
    }
}

fn file_stem(name: &str) -> String {
    let stem: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if stem.is_empty() {
        "circuit".to_string()
    } else {
        stem
    }
}
