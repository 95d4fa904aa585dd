use crate::{
    cli::{
        Command,
        ServerArgs,
    },
    console,
    output,
};
use ark_console_client::{
    logs::{
        ConnectionState,
        LogEntry,
        LogHandler,
    },
    CommandDispatcher,
    Config,
    LogStreamClient,
    ManagerApi,
    ServerRef,
    StatsAggregator,
    StatsPoller,
};
use ark_console_config::Args;
use color_eyre::Result;
use eyre::{
    bail,
    Context as _,
};
use std::{
    process::ExitCode,
    sync::Arc,
};

pub struct App {
    args: Args,
    config: Config,
}

impl App {
    pub fn new(args: Args) -> Result<Self> {
        let config = Config::new(args.clone()).context("Failed to load configuration")?;
        config.validate()?;
        debug!(api_url = %config.api_url, servers = config.servers.len(), "configuration loaded");
        Ok(Self { args, config })
    }

    fn api(&self) -> Result<ManagerApi> {
        Ok(ManagerApi::from_config(&self.config)?)
    }

    fn dispatcher(&self) -> Result<CommandDispatcher> {
        Ok(CommandDispatcher::from_api(&self.api()?, &self.config.rcon))
    }

    /// The configured entry for the server, or a running one of the given kind.
    fn server(&self, args: &ServerArgs) -> ServerRef {
        let mut server = self
            .config
            .server(&args.server)
            .cloned()
            .unwrap_or_else(|| ServerRef::running(&args.server, args.transport.unwrap_or_default()));
        if let Some(transport) = args.transport {
            server.transport = transport;
        }
        server
    }

    pub async fn run(self, command: Command) -> Result<ExitCode> {
        match command {
            Command::Status { once } => self.status(once).await?,
            Command::Rcon { server, command } => return self.rcon(&server, &command.join(" ")).await,
            Command::Console { server } => {
                let server = self.server(&server);
                console::run(&self.dispatcher()?, &server).await?;
            }
            Command::Logs { server, file } => return self.logs(&server, file.as_deref()).await,
            Command::LogFiles { server } => {
                let server = self.server(&server);
                let files = self.api()?.list_log_files(&server.name).await?;
                if files.is_empty() {
                    println!("{} has no log files", server.name);
                } else {
                    println!("{}", output::log_files_table(&files));
                }
            }
            Command::Config { save } => {
                if save {
                    let mut stored = Config::stored(&self.args).context("Failed to load stored configuration")?;
                    if stored.update_from_args(&self.args)? {
                        println!("Saved {}", stored.config_file().display());
                    } else {
                        println!("Nothing to save, {} is up to date", stored.config_file().display());
                    }
                }
                println!("Config file: {}", self.config.config_file().display());
                println!("Data directory: {}", self.config.data_dir().display());
                println!("API: {}", self.config.api_url);
                println!("Log stream: {}", self.config.log_stream_base()?);
                println!("Servers: {}", self.config.servers.len());
            }
        }
        Ok(ExitCode::SUCCESS)
    }

    async fn status(&self, once: bool) -> Result<()> {
        let servers = &self.config.servers;
        if servers.is_empty() {
            bail!("no servers configured, add them under `servers:` in {}", self.config.config_file().display());
        }

        let api = Arc::new(self.api()?);
        let dispatcher = Arc::new(CommandDispatcher::from_api(&api, &self.config.rcon));
        let aggregator = Arc::new(StatsAggregator::new(api, dispatcher, self.config.stats));

        if once {
            let mut rows = Vec::with_capacity(servers.len());
            for server in servers {
                let snapshot = aggregator.fetch_live_stats(server).await;
                rows.push((server.name.clone(), snapshot, aggregator.is_degraded(&server.name)));
            }
            println!("{}", output::stats_table(&rows));
            return Ok(());
        }

        let mut poller = StatsPoller::new(aggregator.clone());
        poller.sync(servers);
        let period = self.config.stats.poll_interval;
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                _ = ticker.tick() => {}
            }
            let rows = poller
                .latest()
                .into_iter()
                .map(|(name, snapshot)| {
                    let degraded = aggregator.is_degraded(&name);
                    (name, snapshot, degraded)
                })
                .collect::<Vec<_>>();
            println!("{}", output::stats_table(&rows));
        }
        Ok(())
    }

    async fn rcon(&self, server: &ServerArgs, command: &str) -> Result<ExitCode> {
        let server = self.server(server);
        let result = self.dispatcher()?.send_command(&server, command).await;
        if result.fell_back {
            debug!(transport = ?result.transport, "command answered by the fallback route");
        }
        if result.success {
            println!("{}", result.output());
            Ok(ExitCode::SUCCESS)
        } else {
            eprintln!("{}", result.output());
            Ok(ExitCode::FAILURE)
        }
    }

    async fn logs(&self, server: &ServerArgs, file: Option<&str>) -> Result<ExitCode> {
        let server = self.server(server);
        let mut client = LogStreamClient::from_config(&self.config, Arc::new(PrintHandler))?;
        let mut state = client.state();
        client.connect(&server.name, file).await?;

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                client.disconnect();
                Ok(ExitCode::SUCCESS)
            }
            _ = state.wait_for(|state| *state == ConnectionState::Disconnected) => Ok(ExitCode::FAILURE),
        }
    }
}

/// Writes stream events to stdout, problems to stderr.
struct PrintHandler;

impl LogHandler for PrintHandler {
    fn on_container_log(&self, entry: &LogEntry) {
        println!("{}", output::log_line(entry, None));
    }

    fn on_ark_log(&self, file: Option<&str>, entry: &LogEntry) {
        println!("{}", output::log_line(entry, file));
    }

    fn on_system_log(&self, entry: &LogEntry) {
        println!("{}", output::log_line(entry, Some("system")));
    }

    fn on_error(&self, error: &str) {
        eprintln!("log stream error: {error}");
    }
}
