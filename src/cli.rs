use ark_console_config::{
    version,
    Args,
    TransportKind,
};
use clap::{
    Parser,
    Subcommand,
};

/// Watch and administer ARK servers through the server manager.
#[derive(Parser, Debug)]
#[command(author, version = version(), about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub args: Args,

    #[command(subcommand)]
    pub command: Command,
}

/// Selects how a server not listed in the configuration is reached.
#[derive(clap::Args, Debug, Clone)]
pub struct ServerArgs {
    /// Server name as known to the server manager.
    pub server: String,

    /// Hosting kind of the server: native, container or cluster-server.
    /// Overrides the configured value.
    #[arg(long, value_name = "KIND")]
    pub transport: Option<TransportKind>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Shows live status of the configured servers, refreshed until Ctrl-C.
    Status {
        /// Fetch once and exit.
        #[arg(long, action)]
        once: bool,
    },

    /// Runs one RCON command.
    Rcon {
        #[command(flatten)]
        server: ServerArgs,

        /// The command, e.g. `SaveWorld` or `Broadcast hello`.
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },

    /// Interactive RCON session reading commands from stdin.
    ///
    /// `:history` lists sent commands, `:complete <prefix>` suggests earlier ones,
    /// `:quit` ends the session.
    Console {
        #[command(flatten)]
        server: ServerArgs,
    },

    /// Streams log lines until Ctrl-C.
    Logs {
        #[command(flatten)]
        server: ServerArgs,

        /// Log file to follow instead of the container output.
        #[arg(long, value_name = "NAME")]
        file: Option<String>,
    },

    /// Lists the log files `logs --file` can follow.
    LogFiles {
        #[command(flatten)]
        server: ServerArgs,
    },

    /// Prints the effective configuration; `--save` stores the given URLs as new defaults.
    Config {
        #[arg(long, action)]
        save: bool,
    },
}
