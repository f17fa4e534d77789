//! Line-oriented command dispatch.
//!
//! A [`Dispatcher`] owns the registered commands and the connected CLI
//! clients. Each [`Dispatcher::process`] call visits the clients in
//! registration order, takes at most one complete line from each, splits it
//! on whitespace and runs the handler whose name equals `argv[0]`.
//!
//! Handlers are closures over typed state: they receive the dispatcher's
//! context (`&mut C`) and an [`Invocation`] giving access to argv, the
//! invoking client and the command catalog.

use thiserror::Error;
use tracing::{debug, info};

use crate::console::Console;

/// Handler finished normally.
pub const STATUS_OK: i32 = 0;
/// Handler rejected its input (argument count, subcommand).
pub const STATUS_INPUT_ERROR: i32 = 1;
/// No handler matched `argv[0]`.
pub const STATUS_UNKNOWN_COMMAND: i32 = -1;

/// Prompt printed after every command.
pub const DEFAULT_PROMPT: &str = "> ";

/// Errors raised while building the command table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CliError {
    #[error("command \"{0}\" is already registered")]
    DuplicateCommand(String),

    #[error("invalid command name \"{0}\"")]
    InvalidName(String),
}

/// Errors raised by CLI transports.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// One interactive command source (serial console or a network client).
pub trait CliClient: Console + Send {
    /// Next complete input line without its terminator, if one is buffered.
    /// Must not block.
    fn read_line(&mut self) -> Option<String>;

    /// Whether the transport still considers the client connected.
    fn is_connected(&self) -> bool {
        true
    }

    /// Human-readable peer description for logs.
    fn peer(&self) -> String;
}

/// Accepts network CLI clients.
pub trait CliListener: Send {
    /// Start listening.
    fn begin(&mut self) -> Result<(), TransportError>;

    /// Non-blocking accept.
    fn accept(&mut self) -> Option<Box<dyn CliClient>>;
}

/// Where a client came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientKind {
    /// The local serial console; registered once, never removed.
    Local,
    /// An accepted network connection; at most one at a time.
    Remote,
}

/// Catalog entry for a registered command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub name: String,
    /// Argument shape shown by `help`, e.g. `connect_wifi <SSID> <PASSWORD>`.
    pub usage: String,
    pub summary: String,
}

/// Boxed command handler.
pub type CommandHandler<C> = Box<dyn FnMut(&mut C, &mut Invocation<'_>) -> i32 + Send>;

/// A single command invocation as seen by its handler.
pub struct Invocation<'a> {
    argv: &'a [&'a str],
    out: &'a mut dyn Console,
    commands: &'a [CommandSpec],
}

impl<'a> Invocation<'a> {
    pub fn new(argv: &'a [&'a str], out: &'a mut dyn Console, commands: &'a [CommandSpec]) -> Self {
        Self {
            argv,
            out,
            commands,
        }
    }

    /// Number of tokens, command name included.
    pub fn argc(&self) -> usize {
        self.argv.len()
    }

    /// Token `index`; `arg(0)` is the command name.
    pub fn arg(&self, index: usize) -> Option<&'a str> {
        self.argv.get(index).copied()
    }

    /// All registered commands, in registration order.
    pub fn commands(&self) -> &'a [CommandSpec] {
        self.commands
    }

    /// The invoking client.
    pub fn out(&mut self) -> &mut (dyn Console + 'a) {
        &mut *self.out
    }

    pub fn print(&mut self, text: &str) {
        self.out.print(text);
    }

    pub fn println(&mut self, text: &str) {
        self.out.println(text);
    }

    /// Check for exactly `count` arguments after the command name. On
    /// mismatch an input error is written to the client.
    pub fn expect_args(&mut self, count: usize) -> bool {
        let got = self.argc().saturating_sub(1);
        if got == count {
            return true;
        }
        self.out.println(&format!(
            "Input error: command expects {} argument(s), got {}",
            count, got
        ));
        false
    }
}

struct ClientSlot {
    kind: ClientKind,
    client: Box<dyn CliClient>,
}

/// Command table plus connected clients.
pub struct Dispatcher<C> {
    specs: Vec<CommandSpec>,
    handlers: Vec<CommandHandler<C>>,
    clients: Vec<ClientSlot>,
    prompt: String,
}

impl<C> Default for Dispatcher<C> {
    fn default() -> Self {
        Self::new(DEFAULT_PROMPT)
    }
}

impl<C> Dispatcher<C> {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            specs: Vec::new(),
            handlers: Vec::new(),
            clients: Vec::new(),
            prompt: prompt.into(),
        }
    }

    /// Register a command. Names must be unique and contain no whitespace.
    pub fn register<F>(
        &mut self,
        name: &str,
        usage: &str,
        summary: &str,
        handler: F,
    ) -> Result<(), CliError>
    where
        F: FnMut(&mut C, &mut Invocation<'_>) -> i32 + Send + 'static,
    {
        if name.is_empty() || name.contains(char::is_whitespace) {
            return Err(CliError::InvalidName(name.to_string()));
        }
        if self.specs.iter().any(|spec| spec.name == name) {
            return Err(CliError::DuplicateCommand(name.to_string()));
        }

        self.specs.push(CommandSpec {
            name: name.to_string(),
            usage: usage.to_string(),
            summary: summary.to_string(),
        });
        self.handlers.push(Box::new(handler));
        Ok(())
    }

    pub fn commands(&self) -> &[CommandSpec] {
        &self.specs
    }

    /// Register a client and greet it.
    pub fn add_client(&mut self, mut client: Box<dyn CliClient>, kind: ClientKind) {
        info!(peer = %client.peer(), ?kind, "CLI client connected");
        client.println("");
        client.println("Welcome to the CLI, type \"help\" to get available commands.");
        client.print(&self.prompt);
        self.clients.push(ClientSlot { kind, client });
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    pub fn has_remote_client(&self) -> bool {
        self.clients
            .iter()
            .any(|slot| slot.kind == ClientKind::Remote)
    }

    /// Serve one round: drop disconnected network clients, then dispatch at
    /// most one line per client. Returns the number of commands run.
    pub fn process(&mut self, ctx: &mut C) -> usize {
        self.clients.retain(|slot| {
            let keep = slot.kind == ClientKind::Local || slot.client.is_connected();
            if !keep {
                info!(peer = %slot.client.peer(), "CLI client disconnected");
            }
            keep
        });

        let mut dispatched = 0;
        for slot in self.clients.iter_mut() {
            let Some(line) = slot.client.read_line() else {
                continue;
            };
            let argv: Vec<&str> = line.split_whitespace().collect();
            let Some(&name) = argv.first() else {
                slot.client.print(&self.prompt);
                continue;
            };

            let status = match self.specs.iter().position(|spec| spec.name == name) {
                Some(index) => {
                    let handler = &mut self.handlers[index];
                    let mut invocation = Invocation::new(&argv, &mut slot.client, &self.specs);
                    handler(ctx, &mut invocation)
                }
                None => {
                    slot.client.println(&format!(
                        "Unknown command \"{}\", type \"help\" to get available commands.",
                        name
                    ));
                    STATUS_UNKNOWN_COMMAND
                }
            };
            debug!(peer = %slot.client.peer(), command = name, status, "Command dispatched");

            slot.client.print(&self.prompt);
            dispatched += 1;
        }
        dispatched
    }
}
