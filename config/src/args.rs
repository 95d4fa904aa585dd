use std::path::PathBuf;

/// Global options shared by every `ark-console` subcommand.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct Args {
    /// Base URL of the server manager API, overrides the stored configuration.
    #[clap(long, global = true, value_name = "URL", env = "ARK_CONSOLE_API_URL")]
    pub api_url: Option<String>,

    /// Base URL for log streaming. Defaults to the API URL with a ws/wss scheme.
    #[clap(long, global = true, value_name = "URL")]
    pub log_stream_url: Option<String>,

    /// Bearer token sent with every API request. Never written to the config file.
    #[clap(long, global = true, value_name = "TOKEN", env = "ARK_CONSOLE_API_TOKEN", hide_env_values = true)]
    pub api_token: Option<String>,

    /// Read the configuration from this file instead of the default location.
    #[clap(long = "config", global = true, value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Enables debug logging.
    #[clap(short, long, global = true, action)]
    pub verbose: bool,
}

mod config_ext {
    use super::*;
    use config::{
        Map,
        Source,
        Value,
    };
    use std::collections::HashMap;

    impl Source for Args {
        fn clone_into_box(&self) -> Box<dyn Source + Send + Sync> {
            Box::new((*self).clone())
        }

        fn collect(&self) -> Result<Map<String, Value>, config::ConfigError> {
            let mut cache = HashMap::<String, Value>::new();
            if let Some(url) = &self.api_url {
                cache.insert("api_url".to_string(), url.clone().into());
            }
            if let Some(url) = &self.log_stream_url {
                cache.insert("log_stream_url".to_string(), url.clone().into());
            }
            if let Some(token) = &self.api_token {
                cache.insert("api_token".to_string(), token.clone().into());
            }
            Ok(cache)
        }
    }
}

pub fn version() -> String {
    let author = clap::crate_authors!();
    let config_dir_path = crate::get_config_dir().display().to_string();
    let data_dir_path = crate::get_data_dir().display().to_string();

    format!(
        "\
Authors: {author}

Config directory: {config_dir_path}
Data directory: {data_dir_path}"
    )
}
