//! Sends administrative commands over the route matching how a server is hosted, with a single
//! fallback to the other route when the first one could not be reached.

use crate::{
    error::ClientError,
    transport::{
        ManagerApi,
        RconRoute,
        RconTransport,
    },
    RconConfig,
    ServerRef,
    TransportKind,
};
use std::sync::{
    Arc,
    Mutex,
    PoisonError,
};
use tokio_util::sync::CancellationToken;

mod history;
mod result;

pub use history::CommandHistory;
pub use result::CommandResult;

/// Commands the status aggregator falls back to when structured details are unavailable.
pub const LIST_PLAYERS: &str = "ListPlayers";
pub const GET_DAY: &str = "getday";
pub const GET_TIME: &str = "gettime";

/// Dispatcher for one console session.
///
/// Concurrent invocations are not serialized, several commands for the same server may be in
/// flight at once.
pub struct CommandDispatcher {
    native: Arc<dyn RconTransport>,
    container: Arc<dyn RconTransport>,
    history: Mutex<CommandHistory>,
}

impl std::fmt::Debug for CommandDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandDispatcher")
            .field("history", &self.history)
            .finish_non_exhaustive()
    }
}

impl CommandDispatcher {
    pub fn new(native: Arc<dyn RconTransport>, container: Arc<dyn RconTransport>, history_limit: usize) -> Self {
        Self {
            native,
            container,
            history: Mutex::new(CommandHistory::new(history_limit)),
        }
    }

    pub fn from_api(api: &ManagerApi, config: &RconConfig) -> Self {
        Self::new(Arc::new(api.native()), Arc::new(api.container()), config.history_limit)
    }

    pub fn primary_route(kind: TransportKind) -> RconRoute {
        if kind.prefers_native() {
            RconRoute::Native
        } else {
            RconRoute::Container
        }
    }

    fn transport(&self, route: RconRoute) -> &dyn RconTransport {
        match route {
            RconRoute::Native => self.native.as_ref(),
            RconRoute::Container => self.container.as_ref(),
        }
    }

    /// Runs `f` against this session's history.
    pub fn with_history<R>(&self, f: impl FnOnce(&mut CommandHistory) -> R) -> R {
        let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut history)
    }

    /// Oldest first.
    pub fn history(&self) -> Vec<String> {
        self.with_history(|history| history.entries().map(ToString::to_string).collect())
    }

    /// Sends `command` and records it in the session history, whatever the outcome.
    ///
    /// Blank commands are rejected without touching the network or the history.
    #[instrument(level = "debug", skip(self, server), fields(server = %server.name))]
    pub async fn send_command(&self, server: &ServerRef, command: &str) -> CommandResult {
        let command = command.trim();
        if command.is_empty() {
            return blank_command();
        }
        self.with_history(|history| history.push(command));
        self.dispatch(server, command).await
    }

    /// Like [`Self::send_command`], but gives up with [`ClientError::Cancelled`] once `token` fires.
    pub async fn send_command_cancellable(
        &self,
        server: &ServerRef,
        command: &str,
        token: &CancellationToken,
    ) -> Result<CommandResult, ClientError> {
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(ClientError::Cancelled),
            result = self.send_command(server, command) => Ok(result),
        }
    }

    /// One primary attempt plus at most one attempt on the alternate route. No history.
    pub(crate) async fn dispatch(&self, server: &ServerRef, command: &str) -> CommandResult {
        let command = command.trim();
        if command.is_empty() {
            return blank_command();
        }

        let transport = self.transport(Self::primary_route(server.transport));
        let primary = transport.route();
        let err = match transport.send(&server.name, command).await {
            Ok(response) => return CommandResult::from_response(primary, response, false),
            Err(err) if err.warrants_fallback() => err,
            Err(err) => {
                debug!(server = %server.name, %primary, %err, "command failed without fallback");
                return CommandResult::from_error(Some(primary), &err, false);
            }
        };

        let transport = self.transport(primary.alternate());
        let alternate = transport.route();
        debug!(server = %server.name, %primary, %alternate, %err, "primary route failed, falling back");
        match transport.send(&server.name, command).await {
            Ok(response) => CommandResult::from_response(alternate, response, true),
            Err(err) => {
                debug!(server = %server.name, %alternate, %err, "fallback route failed");
                CommandResult::from_error(Some(alternate), &err, true)
            }
        }
    }
}

fn blank_command() -> CommandResult {
    CommandResult::from_error(None, &ClientError::validation("command is empty"), false)
}
