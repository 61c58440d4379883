use std::cmp::Ordering;
use std::fmt::Display;
use std::future::Future;
use std::net::Ipv4Addr;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::process::Command;
use tokio::task::JoinSet;
use tracing::{debug, warn};

pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(1000);
/// Extra time allowed for the ping process itself to start and exit.
const PROCESS_GRACE: Duration = Duration::from_millis(500);

/// Advisory round-trip time of a relay, as shown in the Ping column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Latency {
    #[default]
    Pending,
    Millis(u64),
    Timeout,
    Unavailable,
}

impl Latency {
    fn sort_rank(&self) -> (u8, u64) {
        match self {
            Self::Millis(ms) => (0, *ms),
            Self::Unavailable => (1, 0),
            Self::Timeout => (1, 1),
            Self::Pending => (2, 0),
        }
    }
}

/// Measured values first, then failures, unprobed rows last.
impl Ord for Latency {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_rank().cmp(&other.sort_rank())
    }
}

impl PartialOrd for Latency {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Display for Latency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => f.write_str("-"),
            Self::Millis(ms) => write!(f, "{ms}"),
            Self::Timeout => f.write_str("Timeout"),
            Self::Unavailable => f.write_str("N/A"),
        }
    }
}

pub trait Prober {
    /// Sends a single echo request. Never fails: problems resolve to
    /// `Timeout` or `Unavailable`.
    fn probe(&self, ip: &str) -> impl Future<Output = Latency> + Send;
}

/// ICMP echo through the system `ping` binary.
#[derive(Debug, Clone, Copy)]
pub struct PingProber {
    timeout: Duration,
}

impl PingProber {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for PingProber {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_TIMEOUT)
    }
}

impl Prober for PingProber {
    fn probe(&self, ip: &str) -> impl Future<Output = Latency> + Send {
        let timeout = self.timeout;
        let ip = ip.to_string();
        async move {
            // never hand anything but an address to ping
            let Ok(addr) = ip.parse::<Ipv4Addr>() else {
                debug!(msg = "Not probing invalid address", ip);
                return Latency::Unavailable;
            };

            let mut command = Command::new("ping");
            command
                .args(ping_args(addr, timeout))
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::null())
                .kill_on_drop(true);
            #[cfg(windows)]
            {
                const CREATE_NO_WINDOW: u32 = 0x0800_0000;
                command.creation_flags(CREATE_NO_WINDOW);
            }

            match tokio::time::timeout(timeout + PROCESS_GRACE, command.output()).await {
                Err(_) => Latency::Timeout,
                Ok(Err(err)) => {
                    debug!(msg = "Failed to run ping", ip, ?err);
                    Latency::Unavailable
                }
                Ok(Ok(output)) if output.status.success() => {
                    parse_round_trip(&String::from_utf8_lossy(&output.stdout))
                        .map_or(Latency::Timeout, Latency::Millis)
                }
                Ok(Ok(_)) => Latency::Timeout,
            }
        }
    }
}

#[cfg(windows)]
fn ping_args(addr: Ipv4Addr, timeout: Duration) -> Vec<String> {
    vec![
        String::from("-n"),
        String::from("1"),
        String::from("-w"),
        timeout.as_millis().to_string(),
        addr.to_string(),
    ]
}

#[cfg(not(windows))]
fn ping_args(addr: Ipv4Addr, timeout: Duration) -> Vec<String> {
    let secs = timeout.as_secs_f64().ceil().max(1.0);
    vec![
        String::from("-c"),
        String::from("1"),
        String::from("-W"),
        format!("{secs:.0}"),
        addr.to_string(),
    ]
}

/// Reads the round trip from the first `=<n>ms`, `<<n>ms` or `=<n> ms` token.
/// The label before it is localized (`time`, `Zeit`, `temps`), so it is not
/// looked at.
fn parse_round_trip(output: &str) -> Option<u64> {
    output.lines().find_map(|line| {
        line.match_indices(['=', '<']).find_map(|(idx, _)| {
            let rest = line[idx + 1..].trim_start();
            let number: String = rest
                .chars()
                .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
                .collect();
            if number.is_empty() || !rest[number.len()..].trim_start().starts_with("ms") {
                return None;
            }
            let ms: f64 = number.replace(',', ".").parse().ok()?;
            Some(ms.round() as u64)
        })
    })
}

#[derive(Debug, Default)]
struct ProbeGeneration {
    id: u64,
    cells: Vec<ArcSwap<Latency>>,
}

/// Latency per row of the current relay list. Every refresh starts a new
/// generation; results tagged with an older generation are dropped.
#[derive(Debug, Default)]
pub struct LatencyBoard {
    current: ArcSwap<ProbeGeneration>,
    last_id: AtomicU64,
}

impl LatencyBoard {
    pub fn reset(&self, rows: usize) -> u64 {
        let id = self.last_id.fetch_add(1, AtomicOrdering::SeqCst) + 1;
        let cells = (0..rows).map(|_| ArcSwap::from_pointee(Latency::Pending)).collect();
        self.current.store(Arc::new(ProbeGeneration { id, cells }));
        id
    }

    pub fn generation(&self) -> u64 {
        self.current.load().id
    }

    pub fn record(&self, generation: u64, row: usize, latency: Latency) -> bool {
        let current = self.current.load();
        if current.id != generation {
            debug!(msg = "Dropping stale probe result", generation, current = current.id, row);
            return false;
        }
        match current.cells.get(row) {
            Some(cell) => {
                cell.store(Arc::new(latency));
                true
            }
            None => false,
        }
    }

    pub fn snapshot(&self) -> Vec<Latency> {
        self.current
            .load()
            .cells
            .iter()
            .map(|cell| *cell.load_full())
            .collect()
    }
}

/// Probes launched for one generation of rows. Dropping it aborts whatever
/// is still in flight.
#[derive(Debug)]
pub struct ProbeRun {
    generation: u64,
    tasks: JoinSet<()>,
}

impl ProbeRun {
    pub fn spawn<P>(board: Arc<LatencyBoard>, prober: Arc<P>, ips: Vec<String>) -> Self
    where
        P: Prober + Send + Sync + 'static,
    {
        let generation = board.reset(ips.len());
        let mut tasks = JoinSet::new();
        for (row, ip) in ips.into_iter().enumerate() {
            let board = Arc::clone(&board);
            let prober = Arc::clone(&prober);
            tasks.spawn(async move {
                let latency = prober.probe(&ip).await;
                board.record(generation, row, latency);
            });
        }
        debug!(msg = "Launched latency probes", generation, probes = tasks.len());
        Self { generation, tasks }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn cancel(&mut self) {
        self.tasks.abort_all();
    }

    pub async fn wait(mut self) {
        while let Some(result) = self.tasks.join_next().await {
            if let Err(err) = result {
                if !err.is_cancelled() {
                    warn!(msg = "Latency probe panicked", ?err);
                }
            }
        }
    }
}
