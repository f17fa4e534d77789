//! Serial console over a pair of byte streams.
//!
//! On a host the "serial port" is the process's stdin/stdout. Input is read
//! by a background thread and handed over line by line, so
//! [`CliClient::read_line`] never blocks the application loop.

use std::io::{self, BufRead, BufReader, Write};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use netapp_core::{CliClient, Console};
use tracing::{debug, warn};

type Writer = Box<dyn Write + Send>;

pub struct StreamConsole {
    name: String,
    lines: Receiver<String>,
    writer: Writer,
    open: bool,
}

impl StreamConsole {
    /// Console on stdin/stdout.
    pub fn stdio() -> Self {
        Self::new("serial", BufReader::new(io::stdin()), Box::new(io::stdout()))
    }

    /// Console reading lines from `reader` and writing to `writer`.
    pub fn new<R>(name: impl Into<String>, reader: R, writer: Writer) -> Self
    where
        R: BufRead + Send + 'static,
    {
        let name = name.into();
        let (tx, rx) = mpsc::channel();
        let thread_name = format!("{}-reader", name);

        let spawned = thread::Builder::new().name(thread_name).spawn(move || {
            for line in reader.lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line.trim_end_matches('\r').to_string()).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "Console input failed");
                        break;
                    }
                }
            }
            debug!("Console input closed");
        });
        if let Err(e) = spawned {
            warn!(error = %e, "Could not start console reader thread");
        }

        Self {
            name,
            lines: rx,
            writer,
            open: true,
        }
    }
}

impl Console for StreamConsole {
    fn print(&mut self, text: &str) {
        let result = self
            .writer
            .write_all(text.as_bytes())
            .and_then(|()| self.writer.flush());
        if let Err(e) = result {
            debug!(console = %self.name, error = %e, "Console write failed");
        }
    }
}

impl CliClient for StreamConsole {
    fn read_line(&mut self) -> Option<String> {
        match self.lines.try_recv() {
            Ok(line) => Some(line),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.open = false;
                None
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.open
    }

    fn peer(&self) -> String {
        self.name.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn next_line(console: &mut StreamConsole) -> Option<String> {
        for _ in 0..200 {
            if let Some(line) = console.read_line() {
                return Some(line);
            }
            thread::sleep(Duration::from_millis(5));
        }
        None
    }

    #[test]
    fn test_reads_lines_without_terminators() {
        let input = Cursor::new(b"help\r\nstatus\n".to_vec());
        let mut console = StreamConsole::new("test", input, Box::new(io::sink()));

        assert_eq!(next_line(&mut console).as_deref(), Some("help"));
        assert_eq!(next_line(&mut console).as_deref(), Some("status"));
    }

    #[test]
    fn test_end_of_input_closes_console() {
        let mut console = StreamConsole::new("test", Cursor::new(Vec::new()), Box::new(io::sink()));

        for _ in 0..200 {
            console.read_line();
            if !console.is_connected() {
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }
        assert!(!console.is_connected());
    }

    #[test]
    fn test_print_writes_through() {
        let buffer = SharedBuffer::default();
        let mut console =
            StreamConsole::new("test", Cursor::new(Vec::new()), Box::new(buffer.clone()));

        console.println("Status:");
        console.print("> ");

        assert_eq!(&*buffer.0.lock().unwrap(), b"Status:\n\r> ");
    }
}
