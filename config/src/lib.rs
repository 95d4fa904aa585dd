#[macro_use]
extern crate tracing;

mod app_config;
mod args;
mod client_config;
mod server_config;

use app_config::AppConfig;
pub use app_config::{
    get_config_dir,
    get_data_dir,
};
pub use args::{
    version,
    Args,
};
pub use client_config::{
    LogsConfig,
    RconConfig,
    StatsConfig,
};
use color_eyre::Result;
use eyre::{
    bail,
    eyre,
    Context as _,
};
pub use server_config::{
    ServerRef,
    ServerStatus,
    TransportKind,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    collections::HashSet,
    path::{
        Path,
        PathBuf,
    },
    time::Duration,
};
use url::Url;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    #[serde(flatten, skip_serializing)]
    pub app_config: AppConfig,
    pub api_url: Url,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_stream_url: Option<Url>,
    #[serde(default, skip_serializing)]
    pub api_token: Option<String>,
    #[serde(default = "default_request_timeout", with = "client_config::humantime_duration")]
    pub request_timeout: Duration,
    #[serde(default)]
    pub stats: StatsConfig,
    #[serde(default)]
    pub rcon: RconConfig,
    #[serde(default)]
    pub logs: LogsConfig,
    #[serde(default)]
    pub servers: Vec<ServerRef>,
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(10)
}

const DEFAULT_CONFIG: &str = include_str!("default-config.yaml");
const CONFIG_FILE_NAME: &str = "config.yaml";

impl Default for Config {
    fn default() -> Self {
        serde_yml::from_str(DEFAULT_CONFIG).expect("Failed to parse default config")
    }
}

impl Config {
    pub fn new(args: Args) -> Result<Self, config::ConfigError> {
        Self::load(&args, true)
    }

    /// The configuration as stored, without the URL overrides of `args`. Only the config file
    /// location is taken from `args`.
    pub fn stored(args: &Args) -> Result<Self, config::ConfigError> {
        Self::load(args, false)
    }

    fn load(args: &Args, with_overrides: bool) -> Result<Self, config::ConfigError> {
        let data_dir = get_data_dir();
        let config_dir = get_config_dir();
        let config_file = args
            .config_file
            .clone()
            .unwrap_or_else(|| config_dir.join(CONFIG_FILE_NAME));
        let mut builder = config::Config::builder()
            .set_default("data_dir", data_dir.to_string_lossy().to_string())?
            .set_default("config_dir", config_dir.to_string_lossy().to_string())?
            .set_default("config_file", config_file.to_string_lossy().to_string())?
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Yaml))
            .add_source(
                config::File::from(config_file.as_path())
                    .format(config::FileFormat::Yaml)
                    .required(args.config_file.is_some()),
            );

        if with_overrides {
            builder = builder.add_source(args.clone());
        }

        let cfg: Self = builder.build()?.try_deserialize()?;

        Ok(cfg)
    }

    /// Rejects settings the client cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.stats.throttle_window.is_zero() {
            bail!("stats.throttle_window must be greater than zero");
        }
        if self.stats.poll_interval.is_zero() {
            bail!("stats.poll_interval must be greater than zero");
        }
        if self.rcon.history_limit == 0 {
            bail!("rcon.history_limit must be greater than zero");
        }
        if self.logs.buffer_limit == 0 {
            bail!("logs.buffer_limit must be greater than zero");
        }

        let mut seen = HashSet::new();
        for server in &self.servers {
            if !seen.insert(server.name.as_str()) {
                bail!("server {:?} is listed more than once", server.name);
            }
        }
        Ok(())
    }

    /// The base URL log streams connect to. Derived from `api_url` when not configured.
    pub fn log_stream_base(&self) -> Result<Url> {
        if let Some(url) = &self.log_stream_url {
            return Ok(url.clone());
        }

        let mut url = self.api_url.clone();
        let scheme = match url.scheme() {
            "https" => "wss",
            "http" => "ws",
            other => return Err(eyre!("cannot derive a log stream URL from scheme {other:?}")),
        };
        url.set_scheme(scheme)
            .map_err(|_| eyre!("failed to switch {} to {scheme}", self.api_url))?;
        Ok(url)
    }

    pub fn server(&self, name: &str) -> Option<&ServerRef> {
        self.servers.iter().find(|server| server.name == name)
    }

    pub fn data_dir(&self) -> &Path {
        &self.app_config.data_dir
    }

    /// `--config FILE` if given, `config.yaml` in the config directory otherwise.
    pub fn config_file(&self) -> PathBuf {
        self.app_config
            .config_file
            .clone()
            .unwrap_or_else(|| self.app_config.config_dir.join(CONFIG_FILE_NAME))
    }

    pub fn save(&self) -> Result<()> {
        // Only save the parts that have changed from the default.
        let default = Self::default();
        let mut clone = self.clone();

        if self.log_stream_url == default.log_stream_url {
            clone.log_stream_url = None;
        }

        let path = self.config_file();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let content = serde_yml::to_string(&clone).context("Failed to serialize config")?;
        std::fs::write(&path, content).wrap_err_with(|| format!("Failed to write config to {:?}", path))?;
        debug!(?path, "saved configuration");
        Ok(())
    }

    /// Updates the configuration based on optional command-line arguments.
    /// Saves the configuration if any changes were made and reports whether it did.
    ///
    /// Call this on [`Config::stored`]; a configuration from [`Config::new`] already carries the
    /// arguments and never changes.
    ///
    /// # Errors
    /// Returns an error if an URL does not parse or saving the updated configuration fails.
    #[instrument(level = "debug", skip(self, args))]
    pub fn update_from_args(&mut self, args: &Args) -> Result<bool> {
        let mut changed = false;
        if let Some(url) = &args.api_url {
            let url = Url::parse(url).wrap_err_with(|| format!("Invalid API URL {url:?}"))?;
            if self.api_url != url {
                info!(old = %self.api_url, new = %url, "Updating API URL from args");
                self.api_url = url;
                changed = true;
            }
        }

        if let Some(url) = &args.log_stream_url {
            let url = Url::parse(url).wrap_err_with(|| format!("Invalid log stream URL {url:?}"))?;
            if self.log_stream_url.as_ref() != Some(&url) {
                info!(old = ?self.log_stream_url, new = %url, "Updating log stream URL from args");
                self.log_stream_url = Some(url);
                changed = true;
            }
        }

        if changed {
            debug!("Configuration updated from command-line arguments, saving...");
            self.save()?;
        } else {
            debug!("No configuration changes from command-line arguments.");
        }
        Ok(changed)
    }
}
