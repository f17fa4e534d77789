//! Scripted CLI transports.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};

use super::lock;
use crate::cli::{CliClient, CliListener, TransportError};
use crate::console::Console;

#[derive(Debug)]
struct ClientState {
    input: VecDeque<String>,
    output: String,
    connected: bool,
}

/// CLI client fed from a line queue, capturing everything written to it.
#[derive(Debug, Clone)]
pub struct MockClient {
    name: String,
    state: Arc<Mutex<ClientState>>,
}

impl MockClient {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: Arc::new(Mutex::new(ClientState {
                input: VecDeque::new(),
                output: String::new(),
                connected: true,
            })),
        }
    }

    /// Queue one input line (without terminator).
    pub fn push_line(&self, line: &str) {
        lock(&self.state).input.push_back(line.to_string());
    }

    /// Return and clear everything written so far.
    pub fn take_output(&self) -> String {
        std::mem::take(&mut lock(&self.state).output)
    }

    /// Mark the client as disconnected by its transport.
    pub fn disconnect(&self) {
        lock(&self.state).connected = false;
    }
}

impl Console for MockClient {
    fn print(&mut self, text: &str) {
        lock(&self.state).output.push_str(text);
    }
}

impl CliClient for MockClient {
    fn read_line(&mut self) -> Option<String> {
        lock(&self.state).input.pop_front()
    }

    fn is_connected(&self) -> bool {
        lock(&self.state).connected
    }

    fn peer(&self) -> String {
        self.name.clone()
    }
}

#[derive(Debug, Default)]
struct ListenerState {
    pending: VecDeque<MockClient>,
    started: bool,
    fail_begin: bool,
    accept_calls: u32,
}

/// Listener handing out queued clients.
#[derive(Debug, Clone, Default)]
pub struct MockListener {
    state: Arc<Mutex<ListenerState>>,
}

impl MockListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a client for the next `accept`.
    pub fn connect(&self, client: MockClient) {
        lock(&self.state).pending.push_back(client);
    }

    pub fn fail_begin(&self, fail: bool) {
        lock(&self.state).fail_begin = fail;
    }

    pub fn is_started(&self) -> bool {
        lock(&self.state).started
    }

    pub fn pending(&self) -> usize {
        lock(&self.state).pending.len()
    }

    pub fn accept_calls(&self) -> u32 {
        lock(&self.state).accept_calls
    }
}

impl CliListener for MockListener {
    fn begin(&mut self) -> Result<(), TransportError> {
        let mut state = lock(&self.state);
        if state.fail_begin {
            return Err(TransportError::Io(io::Error::new(
                io::ErrorKind::AddrInUse,
                "simulated bind failure",
            )));
        }
        state.started = true;
        Ok(())
    }

    fn accept(&mut self) -> Option<Box<dyn CliClient>> {
        let mut state = lock(&self.state);
        state.accept_calls += 1;
        state
            .pending
            .pop_front()
            .map(|client| Box::new(client) as Box<dyn CliClient>)
    }
}
