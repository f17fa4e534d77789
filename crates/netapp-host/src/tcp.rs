//! Network CLI transport over non-blocking TCP sockets.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};

use netapp_core::{CliClient, CliListener, Console, TransportError};
use tracing::{debug, info, warn};

/// Lines longer than this are cut and delivered in pieces.
pub const MAX_LINE_LEN: usize = 1024;

/// Output not yet accepted by the socket. A client that lets more than this
/// pile up is dropped.
pub const MAX_PENDING_OUTPUT: usize = 8 * 1024 * 1024;

pub struct TcpCliListener {
    addr: SocketAddr,
    listener: Option<TcpListener>,
}

impl TcpCliListener {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            listener: None,
        }
    }

    /// Bound address, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref()?.local_addr().ok()
    }
}

impl CliListener for TcpCliListener {
    fn begin(&mut self) -> Result<(), TransportError> {
        let listener = TcpListener::bind(self.addr).map_err(|source| TransportError::Bind {
            addr: self.addr.to_string(),
            source,
        })?;
        listener.set_nonblocking(true)?;
        info!(addr = %listener.local_addr()?, "CLI listening");
        self.listener = Some(listener);
        Ok(())
    }

    fn accept(&mut self) -> Option<Box<dyn CliClient>> {
        let listener = self.listener.as_ref()?;
        match listener.accept() {
            Ok((stream, peer)) => match TcpCliClient::new(stream, peer) {
                Ok(client) => {
                    info!(%peer, "CLI client connected");
                    Some(Box::new(client))
                }
                Err(e) => {
                    warn!(%peer, error = %e, "Failed to configure CLI client socket");
                    None
                }
            },
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => None,
            Err(e) => {
                warn!(error = %e, "CLI accept failed");
                None
            }
        }
    }
}

/// One connected network CLI client.
pub struct TcpCliClient {
    stream: TcpStream,
    peer: SocketAddr,
    buffer: Vec<u8>,
    pending: Vec<u8>,
    connected: bool,
}

impl TcpCliClient {
    pub fn new(stream: TcpStream, peer: SocketAddr) -> io::Result<Self> {
        stream.set_nonblocking(true)?;
        stream.set_nodelay(true)?;
        Ok(Self {
            stream,
            peer,
            buffer: Vec::new(),
            pending: Vec::new(),
            connected: true,
        })
    }

    fn fill_buffer(&mut self) {
        let mut chunk = [0u8; 256];
        loop {
            match self.stream.read(&mut chunk) {
                Ok(0) => {
                    debug!(peer = %self.peer, "CLI client closed the connection");
                    self.connected = false;
                    return;
                }
                Ok(n) => self.buffer.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    debug!(peer = %self.peer, error = %e, "CLI client read failed");
                    self.connected = false;
                    return;
                }
            }
        }
    }

    /// Take one complete line out of the buffer. Terminator bytes left over
    /// from a `\r\n` pair (or telnet's `\r\0`) are skipped first.
    fn take_line(&mut self) -> Option<String> {
        let start = self
            .buffer
            .iter()
            .position(|b| !matches!(b, b'\n' | b'\0'))
            .unwrap_or(self.buffer.len());
        self.buffer.drain(..start);

        let window = self.buffer.len().min(MAX_LINE_LEN);
        let (end, consumed) = match self.buffer[..window]
            .iter()
            .position(|b| matches!(b, b'\r' | b'\n'))
        {
            Some(end) => (end, end + 1),
            None if self.buffer.len() >= MAX_LINE_LEN => (MAX_LINE_LEN, MAX_LINE_LEN),
            None => return None,
        };

        let line = String::from_utf8_lossy(&self.buffer[..end]).into_owned();
        self.buffer.drain(..consumed);
        Some(line)
    }

    /// Hand pending output to the socket until it would block.
    fn flush_pending(&mut self) {
        while !self.pending.is_empty() {
            match self.stream.write(&self.pending) {
                Ok(0) => {
                    debug!(peer = %self.peer, "CLI client stopped accepting output");
                    self.connected = false;
                    break;
                }
                Ok(n) => {
                    self.pending.drain(..n);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    debug!(peer = %self.peer, error = %e, "CLI client write failed");
                    self.connected = false;
                    break;
                }
            }
        }
        if !self.connected {
            self.pending.clear();
        }
    }

    /// Bytes accepted by `print` but not yet written to the socket.
    pub fn pending_output(&self) -> usize {
        self.pending.len()
    }
}

impl Console for TcpCliClient {
    fn print(&mut self, text: &str) {
        if !self.connected {
            return;
        }
        self.pending.extend_from_slice(text.as_bytes());
        self.flush_pending();
        if self.pending.len() > MAX_PENDING_OUTPUT {
            warn!(peer = %self.peer, bytes = self.pending.len(), "CLI client not reading, dropping it");
            self.pending.clear();
            self.connected = false;
        }
    }
}

impl CliClient for TcpCliClient {
    fn read_line(&mut self) -> Option<String> {
        if self.connected {
            self.flush_pending();
        }
        if let Some(line) = self.take_line() {
            return Some(line);
        }
        if self.connected {
            self.fill_buffer();
        }
        self.take_line()
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn peer(&self) -> String {
        self.peer.to_string()
    }
}
