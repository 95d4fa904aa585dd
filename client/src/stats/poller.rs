use super::{
    LiveStatsSnapshot,
    StatsAggregator,
};
use crate::ServerRef;
use std::{
    collections::HashMap,
    sync::Arc,
    time::Duration,
};
use tokio::{
    sync::watch,
    time::MissedTickBehavior,
};
use tokio_util::sync::{
    CancellationToken,
    DropGuard,
};

struct PollTask {
    server: watch::Sender<ServerRef>,
    snapshots: watch::Receiver<Option<LiveStatsSnapshot>>,
    _guard: DropGuard,
}

/// One scheduled fetch task per tracked server, independent of whoever renders the results.
///
/// Every server publishes into its own `watch` channel. Dropping the poller stops all tasks.
pub struct StatsPoller {
    aggregator: Arc<StatsAggregator>,
    interval: Duration,
    order: Vec<String>,
    tasks: HashMap<String, PollTask>,
    token: CancellationToken,
    _guard: DropGuard,
}

impl StatsPoller {
    pub fn new(aggregator: Arc<StatsAggregator>) -> Self {
        let interval = aggregator.config().poll_interval;
        Self::with_interval(aggregator, interval)
    }

    pub fn with_interval(aggregator: Arc<StatsAggregator>, interval: Duration) -> Self {
        let token = CancellationToken::new();
        Self {
            aggregator,
            interval,
            order: Vec::new(),
            tasks: HashMap::new(),
            _guard: token.clone().drop_guard(),
            token,
        }
    }

    /// Makes the set of polled servers match `servers`: new ones get a task, known ones pick up
    /// their new status, missing ones are stopped and pruned from the aggregator.
    #[instrument(level = "debug", skip_all, fields(servers = servers.len()))]
    pub fn sync(&mut self, servers: &[ServerRef]) {
        self.order = servers.iter().map(|server| server.name.clone()).collect();

        self.tasks.retain(|name, _| {
            let keep = servers.iter().any(|server| &server.name == name);
            if !keep {
                debug!(server = %name, "stopping stats task");
            }
            keep
        });
        self.aggregator.retain(self.order.iter().map(String::as_str));

        for server in servers {
            match self.tasks.get(&server.name) {
                Some(task) => {
                    task.server.send_if_modified(|current| {
                        if current == server {
                            return false;
                        }
                        *current = server.clone();
                        true
                    });
                }
                None => {
                    let task = self.spawn(server.clone());
                    self.tasks.insert(server.name.clone(), task);
                }
            }
        }
    }

    fn spawn(&self, server: ServerRef) -> PollTask {
        debug!(server = %server.name, "starting stats task");
        let (server_tx, server_rx) = watch::channel(server);
        let (snapshot_tx, snapshot_rx) = watch::channel(None);
        let token = self.token.child_token();
        let guard = token.clone().drop_guard();
        let aggregator = self.aggregator.clone();
        let interval = self.interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let server = server_rx.borrow().clone();
                if !server.is_running() {
                    snapshot_tx.send_if_modified(|snapshot| snapshot.take().is_some());
                    continue;
                }
                match aggregator.fetch_live_stats_cancellable(&server, &token).await {
                    Ok(Some(snapshot)) => {
                        snapshot_tx.send_replace(Some(snapshot));
                    }
                    Ok(None) => {}
                    Err(_) => break,
                }
            }
            trace!("stats task stopped");
        });

        PollTask {
            server: server_tx,
            snapshots: snapshot_rx,
            _guard: guard,
        }
    }

    pub fn subscribe(&self, name: &str) -> Option<watch::Receiver<Option<LiveStatsSnapshot>>> {
        self.tasks.get(name).map(|task| task.snapshots.clone())
    }

    /// Latest snapshot per server, in the order of the last [`Self::sync`].
    pub fn latest(&self) -> Vec<(String, Option<LiveStatsSnapshot>)> {
        self.order
            .iter()
            .filter_map(|name| {
                let task = self.tasks.get(name)?;
                Some((name.clone(), task.snapshots.borrow().clone()))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        rcon::CommandDispatcher,
        testing::{
            FakeLiveDetails,
            FakeRcon,
        },
        transport::{
            LiveDetails,
            LiveDetailsResponse,
            RconRoute,
        },
        ServerStatus,
        StatsConfig,
        TransportKind,
    };
    use pretty_assertions::assert_eq;

    fn aggregator(details: &Arc<FakeLiveDetails>) -> Arc<StatsAggregator> {
        let dispatcher = Arc::new(CommandDispatcher::new(
            FakeRcon::new(RconRoute::Native),
            FakeRcon::new(RconRoute::Container),
            10,
        ));
        Arc::new(StatsAggregator::new(details.clone(), dispatcher, StatsConfig::default()))
    }

    fn players(count: u32) -> LiveDetailsResponse {
        LiveDetailsResponse {
            success: true,
            details: Some(LiveDetails {
                players: Some(count),
                ..Default::default()
            }),
            message: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn publishes_snapshots_per_server() {
        let details = FakeLiveDetails::new();
        details.respond(|| Ok(players(4)));
        let mut poller = StatsPoller::new(aggregator(&details));
        poller.sync(&[ServerRef::running("TheIsland", TransportKind::Native)]);

        let mut snapshots = poller.subscribe("TheIsland").unwrap();
        snapshots.changed().await.unwrap();
        assert_eq!(snapshots.borrow().as_ref().map(|s| s.players), Some(4));
        assert_eq!(poller.latest().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn polls_once_per_interval() {
        let details = FakeLiveDetails::new();
        details.respond(|| Ok(players(1)));
        let mut poller = StatsPoller::with_interval(aggregator(&details), Duration::from_secs(5));
        poller.sync(&[ServerRef::running("TheIsland", TransportKind::Native)]);

        let mut snapshots = poller.subscribe("TheIsland").unwrap();
        snapshots.changed().await.unwrap();
        assert_eq!(details.calls(), 1);

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(details.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn sync_stops_and_prunes_removed_servers() {
        let details = FakeLiveDetails::new();
        details.respond(|| Ok(players(1)));
        let aggregator = aggregator(&details);
        let mut poller = StatsPoller::new(aggregator.clone());
        poller.sync(&[
            ServerRef::running("TheIsland", TransportKind::Native),
            ServerRef::running("Ragnarok", TransportKind::ClusterServer),
        ]);
        poller.subscribe("Ragnarok").unwrap().changed().await.unwrap();
        poller.subscribe("TheIsland").unwrap().changed().await.unwrap();

        poller.sync(&[ServerRef::running("TheIsland", TransportKind::Native)]);

        assert_eq!(poller.len(), 1);
        assert!(poller.subscribe("Ragnarok").is_none());
        assert_eq!(aggregator.tracked(), vec!["TheIsland".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_servers_clear_their_snapshot() {
        let details = FakeLiveDetails::new();
        details.respond(|| Ok(players(2)));
        let mut poller = StatsPoller::new(aggregator(&details));
        poller.sync(&[ServerRef::running("TheIsland", TransportKind::Native)]);
        let mut snapshots = poller.subscribe("TheIsland").unwrap();
        snapshots.changed().await.unwrap();

        poller.sync(&[ServerRef::new("TheIsland", TransportKind::Native, ServerStatus::Stopped)]);
        snapshots.changed().await.unwrap();

        assert_eq!(*snapshots.borrow(), None);
        assert_eq!(details.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_poller_stops_its_tasks() {
        let details = FakeLiveDetails::new();
        details.respond(|| Ok(players(2)));
        let mut poller = StatsPoller::new(aggregator(&details));
        poller.sync(&[ServerRef::running("TheIsland", TransportKind::Native)]);
        let mut snapshots = poller.subscribe("TheIsland").unwrap();
        snapshots.changed().await.unwrap();

        drop(poller);

        assert!(snapshots.changed().await.is_err());
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(details.calls(), 1);
    }
}
