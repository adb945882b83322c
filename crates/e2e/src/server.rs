//! Server management - probing, launching and owning the application server
//!
//! `ensure_ready` leaves an already-running server alone. Only when nothing
//! answers on the endpoint does it spawn the server, and the resulting
//! [`ServerProcessHandle`] is the sole owner of that child process.

use std::fmt;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::net::TcpStream;
use tokio::process::Child;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, error, info, warn};

use qatrain_common::ServerSettings;

use crate::error::{E2eError, E2eResult};
use crate::launch::LaunchSpec;

/// Time a server gets to exit after SIGTERM before it is killed
const TERMINATE_GRACE: Duration = Duration::from_millis(500);

/// TCP endpoint the server listens on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Result of a reachability check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe {
    Reachable,
    Unreachable(String),
}

impl Probe {
    pub fn is_reachable(&self) -> bool {
        matches!(self, Probe::Reachable)
    }
}

/// Where and how long to wait for the server
#[derive(Debug, Clone)]
pub struct Readiness {
    pub endpoint: Endpoint,

    /// Budget for the "is it already up" check
    pub probe_timeout: Duration,

    /// Budget for a cold start after launching
    pub startup_timeout: Duration,

    pub poll_interval: Duration,

    /// When set, the server also has to answer this URL with a success status
    pub health_url: Option<String>,
}

impl Readiness {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            probe_timeout: Duration::from_secs(1),
            startup_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_millis(250),
            health_url: None,
        }
    }

    pub fn from_settings(settings: &ServerSettings) -> E2eResult<Self> {
        let (host, port) = settings.endpoint()?;
        let health_url = settings.health_path.as_deref().map(|path| {
            format!(
                "{}/{}",
                settings.base_url.trim_end_matches('/'),
                path.trim_start_matches('/')
            )
        });
        Ok(Self {
            endpoint: Endpoint::new(host, port),
            probe_timeout: settings.probe_timeout(),
            startup_timeout: settings.startup_timeout(),
            poll_interval: settings.poll_interval(),
            health_url,
        })
    }

    /// One reachability check bounded by `budget`
    pub async fn probe(&self, budget: Duration) -> Probe {
        let tcp = probe_tcp(&self.endpoint, budget).await;
        match self.health_url.as_deref() {
            Some(url) if tcp.is_reachable() => probe_http(url, budget).await,
            _ => tcp,
        }
    }
}

/// Attempt a single TCP connection to `endpoint`
pub async fn probe_tcp(endpoint: &Endpoint, budget: Duration) -> Probe {
    match timeout(budget, TcpStream::connect((endpoint.host.as_str(), endpoint.port))).await {
        Ok(Ok(_)) => Probe::Reachable,
        Ok(Err(e)) => Probe::Unreachable(e.to_string()),
        Err(_) => Probe::Unreachable(format!("no connection within {budget:?}")),
    }
}

async fn probe_http(url: &str, budget: Duration) -> Probe {
    let client = match reqwest::Client::builder().timeout(budget).build() {
        Ok(client) => client,
        Err(e) => return Probe::Unreachable(format!("health client: {e}")),
    };
    match client.get(url).send().await {
        Ok(resp) if resp.status().is_success() => Probe::Reachable,
        Ok(resp) => Probe::Unreachable(format!("health check returned {}", resp.status())),
        Err(e) => Probe::Unreachable(format!("health check failed: {e}")),
    }
}

/// How `ensure_ready` reached a reachable server
#[derive(Debug)]
pub enum Bootstrap {
    /// Something was already listening; nothing was spawned
    AlreadyRunning,
    /// The server was launched and is owned through the handle
    Launched(ServerProcessHandle),
}

impl Bootstrap {
    pub fn is_launched(&self) -> bool {
        matches!(self, Bootstrap::Launched(_))
    }

    pub fn into_handle(self) -> Option<ServerProcessHandle> {
        match self {
            Bootstrap::AlreadyRunning => None,
            Bootstrap::Launched(handle) => Some(handle),
        }
    }
}

/// Make sure the server answers on `readiness.endpoint`, launching it if needed.
///
/// The "already running" check is TCP only. The health URL, when set, gates
/// readiness of a server launched here.
///
/// A launched server that does not become reachable within the startup
/// budget is terminated and the run fails with [`E2eError::ServerStartup`].
pub async fn ensure_ready(readiness: &Readiness, launch: &LaunchSpec) -> E2eResult<Bootstrap> {
    let endpoint = &readiness.endpoint;

    // An open port is an existing server, healthy or not
    match probe_tcp(endpoint, readiness.probe_timeout).await {
        Probe::Reachable => {
            info!(%endpoint, "server already running");
            return Ok(Bootstrap::AlreadyRunning);
        }
        Probe::Unreachable(reason) => {
            debug!(%endpoint, %reason, "server not reachable, launching");
        }
    }

    let handle = ServerProcessHandle::spawn(launch, endpoint)?;

    match wait_until_reachable(readiness, &handle).await {
        Probe::Reachable => {
            info!(%endpoint, pid = ?handle.pid(), "server is ready");
            Ok(Bootstrap::Launched(handle))
        }
        Probe::Unreachable(reason) => {
            error!(%endpoint, %reason, "server failed to start");
            if let Err(e) = handle.terminate().await {
                warn!(%endpoint, error = %e, "failed to stop server after startup failure");
            }
            Err(E2eError::ServerStartup {
                endpoint: endpoint.to_string(),
                reason,
            })
        }
    }
}

async fn wait_until_reachable(readiness: &Readiness, handle: &ServerProcessHandle) -> Probe {
    let deadline = Instant::now() + readiness.startup_timeout;
    let mut last_reason = String::from("not probed");

    loop {
        if let Some(status) = handle.exit_status() {
            return Probe::Unreachable(format!(
                "server process exited ({status}) before becoming reachable"
            ));
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Probe::Unreachable(format!(
                "not reachable within {:?}: {last_reason}",
                readiness.startup_timeout
            ));
        }

        match readiness.probe(remaining.min(readiness.probe_timeout)).await {
            Probe::Reachable => return Probe::Reachable,
            Probe::Unreachable(reason) => last_reason = reason,
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        sleep(readiness.poll_interval.min(remaining)).await;
    }
}

/// Exclusive ownership of a server process launched by this run.
///
/// Dropping the handle stops the process as well; [`terminate`] does the
/// same and waits for it.
///
/// [`terminate`]: ServerProcessHandle::terminate
pub struct ServerProcessHandle {
    pid: Option<u32>,
    endpoint: Endpoint,
    stop: Option<oneshot::Sender<()>>,
    watcher: Option<JoinHandle<()>>,
    exited: watch::Receiver<Option<String>>,
}

impl fmt::Debug for ServerProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerProcessHandle")
            .field("pid", &self.pid)
            .field("endpoint", &self.endpoint)
            .field("exited", &*self.exited.borrow())
            .finish()
    }
}

impl ServerProcessHandle {
    /// Spawn the server described by `spec`
    pub fn spawn(spec: &LaunchSpec, endpoint: &Endpoint) -> E2eResult<Self> {
        info!(
            program = %spec.program.display(),
            args = ?spec.display_args(),
            %endpoint,
            "launching server"
        );

        let mut cmd = spec.command();
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| E2eError::ServerStartup {
            endpoint: endpoint.to_string(),
            reason: format!("failed to spawn {}: {e}", spec.program.display()),
        })?;

        let pid = child.id();
        if let Some(stdout) = child.stdout.take() {
            forward_output(stdout, pid, "stdout");
        }
        if let Some(stderr) = child.stderr.take() {
            forward_output(stderr, pid, "stderr");
        }

        let (stop_tx, stop_rx) = oneshot::channel();
        let (exit_tx, exit_rx) = watch::channel(None);
        let watcher = tokio::spawn(watch_process(child, pid, stop_rx, exit_tx));

        Ok(Self {
            pid,
            endpoint: endpoint.clone(),
            stop: Some(stop_tx),
            watcher: Some(watcher),
            exited: exit_rx,
        })
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Exit status text once the process has exited
    pub fn exit_status(&self) -> Option<String> {
        self.exited.borrow().clone()
    }

    /// Stop the server and wait for it to exit.
    ///
    /// Succeeds when the process had already exited on its own.
    pub async fn terminate(mut self) -> E2eResult<()> {
        info!(pid = ?self.pid, endpoint = %self.endpoint, "stopping server");
        if let Some(stop) = self.stop.take() {
            // The watcher is gone when the process already exited
            let _ = stop.send(());
        }
        if let Some(watcher) = self.watcher.take() {
            watcher
                .await
                .map_err(|e| E2eError::Process(format!("server watcher failed: {e}")))?;
        }
        Ok(())
    }
}

enum WatchEvent {
    Exited(std::io::Result<ExitStatus>),
    Stop,
}

/// Owns the child: logs unexpected exits, stops it on request or when the
/// handle is dropped
async fn watch_process(
    mut child: Child,
    pid: Option<u32>,
    stop: oneshot::Receiver<()>,
    exited: watch::Sender<Option<String>>,
) {
    let event = tokio::select! {
        status = child.wait() => WatchEvent::Exited(status),
        _ = stop => WatchEvent::Stop,
    };

    let status = match event {
        WatchEvent::Exited(Ok(status)) => {
            warn!(?pid, %status, "server process exited unexpectedly");
            status.to_string()
        }
        WatchEvent::Exited(Err(e)) => {
            error!(?pid, error = %e, "failed to wait on server process");
            format!("wait failed: {e}")
        }
        WatchEvent::Stop => {
            let status = stop_child(&mut child).await;
            debug!(?pid, %status, "server process stopped");
            status
        }
    };
    exited.send_replace(Some(status));
}

async fn stop_child(child: &mut Child) -> String {
    // Try graceful shutdown first
    #[cfg(unix)]
    {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        if let Some(pid) = child.id() {
            if kill(Pid::from_raw(pid as i32), Signal::SIGTERM).is_ok() {
                if let Ok(Ok(status)) = timeout(TERMINATE_GRACE, child.wait()).await {
                    return status.to_string();
                }
            }
        }
    }

    if let Err(e) = child.kill().await {
        warn!(error = %e, "failed to kill server process");
    }
    match child.wait().await {
        Ok(status) => status.to_string(),
        Err(e) => format!("wait failed: {e}"),
    }
}

fn forward_output<R>(stream: R, pid: Option<u32>, name: &'static str)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => debug!(target: "qatrain::server", ?pid, stream = name, "{line}"),
                Ok(None) => break,
                Err(e) => {
                    debug!(target: "qatrain::server", ?pid, stream = name, error = %e, "output closed");
                    break;
                }
            }
        }
    });
}
