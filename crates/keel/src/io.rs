//! Output channels for shell execution.
//!
//! The kernel itself never prints. Everything user-visible flows through a
//! [`ShellIo`] implementation supplied by the host: `out` carries command and
//! expression output, `diag` carries warnings and error diagnostics. The
//! default implementation [`StdIo`] maps these to stdout/stderr; tests use
//! [`CollectIo`] to capture both.

use std::io::Write as _;

/// Sink for the two output channels of a running shell.
pub trait ShellIo {
    /// Write command/expression output verbatim. Callers include newlines.
    fn out(&mut self, text: &str);

    /// Emit one diagnostic line (warnings, parse errors, handler faults).
    fn diag(&mut self, message: &str);
}

/// Default `ShellIo` writing `out` to stdout and `diag` to stderr.
#[derive(Debug, Default)]
pub struct StdIo;

impl ShellIo for StdIo {
    fn out(&mut self, text: &str) {
        let mut stdout = std::io::stdout().lock();
        let _ = stdout.write_all(text.as_bytes());
        let _ = stdout.flush();
    }

    fn diag(&mut self, message: &str) {
        eprintln!("keel: {message}");
    }
}

/// `ShellIo` that discards everything.
#[derive(Debug, Default)]
pub struct NullIo;

impl ShellIo for NullIo {
    fn out(&mut self, _text: &str) {}

    fn diag(&mut self, _message: &str) {}
}

/// `ShellIo` that collects both channels into memory.
///
/// Used by tests to assert on exact shell output and on emitted diagnostics.
#[derive(Debug, Default)]
pub struct CollectIo {
    /// Concatenated `out` channel content.
    pub out: String,
    /// One entry per diagnostic line.
    pub diags: Vec<String>,
}

impl CollectIo {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ShellIo for CollectIo {
    fn out(&mut self, text: &str) {
        self.out.push_str(text);
    }

    fn diag(&mut self, message: &str) {
        self.diags.push(message.to_owned());
    }
}
