//! Live status per server: the structured `live-details` endpoint first, raw RCON text as fallback.
//!
//! Fetch cycles for a server start at most once per throttle window. Calls inside the window get
//! the previous snapshot back untouched. Concurrent callers racing inside the window are not
//! coalesced, they simply read the same cached value.

use crate::{
    error::ClientError,
    parser,
    rcon::{
        CommandDispatcher,
        CommandResult,
        GET_DAY,
        GET_TIME,
        LIST_PLAYERS,
    },
    transport::{
        LiveDetailsResponse,
        LiveDetailsSource,
    },
    ServerRef,
    StatsConfig,
};
use chrono::Utc;
use std::{
    collections::{
        HashMap,
        HashSet,
    },
    sync::{
        Arc,
        Mutex,
        MutexGuard,
        PoisonError,
    },
};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

mod poller;
mod snapshot;

pub use poller::StatsPoller;
pub use snapshot::{
    status_text,
    LiveStatsSnapshot,
    StatsSource,
};

/// Bookkeeping for one tracked server. Created on first observation, removed by pruning.
#[derive(Debug, Default)]
struct ServerEntry {
    last_fetch_at: Option<Instant>,
    snapshot: Option<LiveStatsSnapshot>,
    consecutive_errors: u32,
    degraded: bool,
}

enum Cycle {
    Throttled(Option<LiveStatsSnapshot>),
    Started { previous: Option<Instant>, started: Instant },
}

/// What one fetch cycle produced before bookkeeping.
struct Collected {
    snapshot: LiveStatsSnapshot,
    clean: bool,
}

pub struct StatsAggregator {
    details: Arc<dyn LiveDetailsSource>,
    dispatcher: Arc<CommandDispatcher>,
    config: StatsConfig,
    entries: Mutex<HashMap<String, ServerEntry>>,
}

impl std::fmt::Debug for StatsAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatsAggregator")
            .field("config", &self.config)
            .field("entries", &self.entries)
            .finish_non_exhaustive()
    }
}

impl StatsAggregator {
    pub fn new(details: Arc<dyn LiveDetailsSource>, dispatcher: Arc<CommandDispatcher>, config: StatsConfig) -> Self {
        Self {
            details,
            dispatcher,
            config,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &StatsConfig {
        &self.config
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, ServerEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current live status of `server`.
    ///
    /// Returns `None` without any network activity for servers that are not running. Inside the
    /// throttle window the previous snapshot is returned, which is `None` while the very first
    /// cycle for the server is still in flight.
    #[instrument(level = "debug", skip(self, server), fields(server = %server.name))]
    pub async fn fetch_live_stats(&self, server: &ServerRef) -> Option<LiveStatsSnapshot> {
        if !server.is_running() {
            return None;
        }
        match self.begin(&server.name) {
            Cycle::Throttled(snapshot) => snapshot,
            Cycle::Started { .. } => {
                let collected = self.collect(server).await;
                Some(self.record(&server.name, collected))
            }
        }
    }

    /// Like [`Self::fetch_live_stats`], but stops with [`ClientError::Cancelled`] once `token` fires.
    /// A cancelled cycle leaves no trace, the next call starts a fresh one.
    pub async fn fetch_live_stats_cancellable(
        &self,
        server: &ServerRef,
        token: &CancellationToken,
    ) -> Result<Option<LiveStatsSnapshot>, ClientError> {
        if token.is_cancelled() {
            return Err(ClientError::Cancelled);
        }
        if !server.is_running() {
            return Ok(None);
        }
        let (previous, started) = match self.begin(&server.name) {
            Cycle::Throttled(snapshot) => return Ok(snapshot),
            Cycle::Started { previous, started } => (previous, started),
        };

        tokio::select! {
            biased;
            _ = token.cancelled() => {
                self.abandon(&server.name, previous, started);
                Err(ClientError::Cancelled)
            }
            collected = self.collect(server) => Ok(Some(self.record(&server.name, collected))),
        }
    }

    fn begin(&self, name: &str) -> Cycle {
        let now = Instant::now();
        let mut entries = self.entries();
        let entry = entries.entry(name.to_string()).or_default();
        if let Some(last) = entry.last_fetch_at {
            if now.duration_since(last) < self.config.throttle_window {
                trace!(server = name, "throttled, serving previous snapshot");
                return Cycle::Throttled(entry.snapshot.clone());
            }
        }
        let previous = entry.last_fetch_at.replace(now);
        Cycle::Started { previous, started: now }
    }

    fn abandon(&self, name: &str, previous: Option<Instant>, started: Instant) {
        let mut entries = self.entries();
        if let Some(entry) = entries.get_mut(name) {
            if entry.last_fetch_at == Some(started) {
                entry.last_fetch_at = previous;
            }
        }
    }

    async fn collect(&self, server: &ServerRef) -> Collected {
        if server.transport.has_live_details() {
            match self.details.live_details(&server.name).await {
                Ok(response) => match structured_snapshot(response) {
                    Ok(snapshot) => return Collected { snapshot, clean: true },
                    Err(err) => debug!(server = %server.name, %err, "live details unusable, falling back to RCON"),
                },
                Err(err) => debug!(server = %server.name, %err, "live details unavailable, falling back to RCON"),
            }
        }
        self.collect_from_rcon(server).await
    }

    async fn collect_from_rcon(&self, server: &ServerRef) -> Collected {
        let (players, day, time) = tokio::join!(
            self.dispatcher.dispatch(server, LIST_PLAYERS),
            self.dispatcher.dispatch(server, GET_DAY),
            self.dispatcher.dispatch(server, GET_TIME),
        );
        let results = [(LIST_PLAYERS, &players), (GET_DAY, &day), (GET_TIME, &time)];

        if results.iter().all(|(_, result)| result.is_transport_failure()) {
            let error = results
                .iter()
                .map(|(command, result)| format!("{command}: {}", result.message))
                .collect::<Vec<_>>()
                .join("; ");
            warn!(server = %server.name, %error, "server unreachable over RCON");
            return Collected {
                snapshot: LiveStatsSnapshot::unavailable(error),
                clean: false,
            };
        }

        let mut rcon_errors = Vec::new();
        for (command, result) in results.iter().filter(|(_, result)| !result.success) {
            warn!(server = %server.name, command, message = %result.message, "RCON command failed");
            rcon_errors.push(format!("{command}: {}", result.message));
        }

        let snapshot = LiveStatsSnapshot {
            players: succeeded(&players).map(parser::parse_player_count).unwrap_or(0),
            current_day: succeeded(&day).map(parser::parse_day).unwrap_or(parser::DEFAULT_DAY),
            current_time: parser::parse_game_time(succeeded(&time).unwrap_or_default()),
            version: None,
            map: None,
            cached: results.iter().any(|(_, result)| result.cached),
            error: None,
            status: status_text(rcon_errors.len()),
            source: StatsSource::Rcon,
            rcon_errors,
            last_updated: Utc::now(),
        };
        let clean = snapshot.rcon_errors.is_empty();
        Collected { snapshot, clean }
    }

    /// Stores the snapshot and updates the error bookkeeping.
    fn record(&self, name: &str, collected: Collected) -> LiveStatsSnapshot {
        let Collected { mut snapshot, clean } = collected;
        let mut entries = self.entries();
        let entry = entries.entry(name.to_string()).or_default();

        if let Some(previous) = &entry.snapshot {
            snapshot.last_updated = snapshot.last_updated.max(previous.last_updated);
        }

        if clean {
            if entry.degraded {
                info!(server = name, "stats recovered");
            }
            entry.consecutive_errors = 0;
            entry.degraded = false;
        } else {
            entry.consecutive_errors = entry.consecutive_errors.saturating_add(1);
            if !entry.degraded && entry.consecutive_errors >= self.config.warn_after_errors {
                entry.degraded = true;
                warn!(
                    server = name,
                    errors = entry.consecutive_errors,
                    "stats degraded after consecutive failed fetches"
                );
            }
        }

        entry.snapshot = Some(snapshot.clone());
        snapshot
    }

    pub fn consecutive_errors(&self, name: &str) -> u32 {
        self.entries().get(name).map_or(0, |entry| entry.consecutive_errors)
    }

    /// True once the consecutive error count reached `warn_after_errors`.
    pub fn is_degraded(&self, name: &str) -> bool {
        self.consecutive_errors(name) >= self.config.warn_after_errors.max(1)
    }

    /// Last recorded snapshot, without fetching.
    pub fn snapshot(&self, name: &str) -> Option<LiveStatsSnapshot> {
        self.entries().get(name).and_then(|entry| entry.snapshot.clone())
    }

    pub fn forget(&self, name: &str) {
        if self.entries().remove(name).is_some() {
            debug!(server = name, "stopped tracking server");
        }
    }

    /// Drops bookkeeping for every server not in `names`.
    pub fn retain<'a>(&self, names: impl IntoIterator<Item = &'a str>) {
        let keep = names.into_iter().collect::<HashSet<_>>();
        self.entries().retain(|name, _| keep.contains(name.as_str()));
    }

    pub fn tracked(&self) -> Vec<String> {
        let mut names = self.entries().keys().cloned().collect::<Vec<_>>();
        names.sort();
        names
    }
}

/// Text of a successful command, `None` if it failed.
fn succeeded(result: &CommandResult) -> Option<&str> {
    result.success.then(|| result.response.as_deref().unwrap_or_default())
}

fn structured_snapshot(response: LiveDetailsResponse) -> Result<LiveStatsSnapshot, ClientError> {
    if !response.success {
        let reason = response.message.unwrap_or_else(|| "live details reported failure".to_string());
        return Err(ClientError::validation(reason));
    }
    let details = match response.details {
        Some(details) if !details.is_empty() => details,
        _ => return Err(ClientError::empty("live details carried no data")),
    };

    Ok(LiveStatsSnapshot {
        players: details.players.unwrap_or(0),
        current_day: details.day.unwrap_or(parser::DEFAULT_DAY).max(parser::DEFAULT_DAY),
        current_time: parser::parse_game_time(details.game_time.as_deref().unwrap_or_default()),
        version: parser::parse_version(&details),
        map: parser::parse_map(&details),
        cached: false,
        error: None,
        status: status_text(0),
        source: StatsSource::Structured,
        rcon_errors: Vec::new(),
        last_updated: Utc::now(),
    })
}
