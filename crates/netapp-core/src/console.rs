//! Text output sinks.
//!
//! Everything user-visible (setup progress, command responses, WiFi progress
//! markers) is written to a [`Console`]. CLI clients are consoles, and so is a
//! plain `String`, which keeps handlers testable without a transport.

/// Line terminator used for every response line.
pub const LINE_END: &str = "\n\r";

/// A sink for human-readable text.
pub trait Console {
    /// Write text without a line terminator.
    fn print(&mut self, text: &str);

    /// Write text followed by [`LINE_END`].
    fn println(&mut self, text: &str) {
        self.print(text);
        self.print(LINE_END);
    }
}

impl Console for String {
    fn print(&mut self, text: &str) {
        self.push_str(text);
    }
}

impl<T: Console + ?Sized> Console for Box<T> {
    fn print(&mut self, text: &str) {
        (**self).print(text);
    }
}
