//! Persistent shell sessions.
//!
//! `ShellSession` keeps one [`Kernel`] plus the interactive block state
//! across `execute()` calls, so multi-line constructs (`if … {` at the
//! prompt, `defunc` bodies) work interactively. Scripts run through
//! [`ShellSession::run_script`] with a replayable line buffer, which is what
//! lets `while` loops repeat. Sessions can be snapshotted to bytes and
//! restored, and dumped to JSON for inspection.

use std::path::{Path, PathBuf};

use crate::{
    blocks::{ExecState, RunState},
    error::{ExprError, StoreError},
    io::ShellIo,
    kernel::Kernel,
    resource::Limits,
    run::{Machine, run_buffer},
    scan::tokenize,
};

/// Default module search path used when `KEEL_MODULE_PATH` is not set in the
/// environment.
pub const DEFAULT_MODULE_PATH: &str = "./framework:~/.keel_framework";

/// Startup script file name, looked up in `$HOME` then the working directory.
pub const STARTUP_SCRIPT: &str = ".keelrc";

/// Whether the session should keep going after a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplFlow {
    Continue,
    /// `exit` was requested with this status code.
    Exit(i32),
}

/// A persistent shell session: one kernel plus interactive control state.
#[derive(Debug)]
pub struct ShellSession {
    kernel: Kernel,
    exec: ExecState,
    line_no: u32,
}

impl ShellSession {
    /// Creates a session with default limits and the well-known startup
    /// variables (`SHELL_VERSION`, `PS1`, `CWD`, `KEEL_MODULE_PATH`) set.
    #[must_use]
    pub fn new() -> Self {
        Self::with_limits(Limits::default())
    }

    #[must_use]
    pub fn with_limits(limits: Limits) -> Self {
        let mut kernel = Kernel::with_limits(limits);
        let version = concat!("keel-", env!("CARGO_PKG_VERSION"));
        let _ = kernel.store.set("SHELL_VERSION", version, false);
        let _ = kernel.store.set("PS1", "keel", false);
        let cwd = std::env::current_dir().map(|p| p.display().to_string()).unwrap_or_default();
        let _ = kernel.store.set("CWD", &cwd, false);
        let module_path = std::env::var("KEEL_MODULE_PATH").unwrap_or_else(|_| DEFAULT_MODULE_PATH.to_owned());
        let _ = kernel.store.set("KEEL_MODULE_PATH", &module_path, false);
        Self { kernel, exec: ExecState::new(), line_no: 0 }
    }

    #[must_use]
    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    pub fn kernel_mut(&mut self) -> &mut Kernel {
        &mut self.kernel
    }

    /// Reads a variable through the session's scope stack.
    #[must_use]
    pub fn get_var(&self, name: &str) -> Option<&str> {
        self.kernel.store.get(name)
    }

    /// Sets a variable in the session's current scope.
    pub fn set_var(&mut self, name: &str, value: &str) -> Result<(), StoreError> {
        self.kernel.store.set(name, value, false)
    }

    /// Feeds one interactive line. Interactive input is not replayable, so a
    /// `while` loop entered here terminates after one pass with a diagnostic.
    pub fn execute(&mut self, line: &str, io: &mut dyn ShellIo) -> ReplFlow {
        self.line_no += 1;
        let line_no = self.line_no;
        let mut machine = Machine { kernel: &mut self.kernel, io, exec: &mut self.exec };
        let _ = machine.process_line(line, line_no, None);
        self.finish_flow()
    }

    /// Runs a buffered sequence of lines (a script) with working `while`
    /// loops.
    pub fn run_lines(&mut self, lines: &[String], io: &mut dyn ShellIo) -> ReplFlow {
        let mut machine = Machine { kernel: &mut self.kernel, io, exec: &mut self.exec };
        run_buffer(&mut machine, lines);
        self.finish_flow()
    }

    /// Reads and runs a script file.
    pub fn run_script(&mut self, path: &Path, io: &mut dyn ShellIo) -> std::io::Result<ReplFlow> {
        let text = std::fs::read_to_string(path)?;
        let lines: Vec<String> = text.lines().map(str::to_owned).collect();
        Ok(self.run_lines(&lines, io))
    }

    /// Runs the startup script if one exists: `$HOME/.keelrc`, else
    /// `./.keelrc`. A missing script is not an error.
    pub fn run_startup(&mut self, io: &mut dyn ShellIo) {
        let mut candidates: Vec<PathBuf> = Vec::new();
        if let Some(home) = std::env::var_os("HOME") {
            candidates.push(Path::new(&home).join(STARTUP_SCRIPT));
        }
        candidates.push(PathBuf::from(STARTUP_SCRIPT));
        for path in candidates {
            if path.is_file() {
                if let Err(err) = self.run_script(&path, io) {
                    io.diag(&format!("error running startup script '{}': {err}", path.display()));
                }
                break;
            }
        }
    }

    /// Evaluates one expression string directly, bypassing line
    /// classification. Useful for hosts and tests.
    pub fn eval_expression(&mut self, expr: &str, io: &mut dyn ShellIo) -> Result<String, ExprError> {
        let tokens = tokenize(expr, 1, &self.kernel.registry);
        let mut machine = Machine { kernel: &mut self.kernel, io, exec: &mut self.exec };
        machine.eval_tokens(&tokens)
    }

    fn finish_flow(&mut self) -> ReplFlow {
        if let Some(exit) = self.exec.exit.take() {
            self.exec.state = RunState::Normal;
            self.exec.blocks.clear();
            return ReplFlow::Exit(exit.code);
        }
        ReplFlow::Continue
    }

    /// Renders the interactive prompt: `PS1` plus a block-state indicator
    /// such as `(if 1)`, `(skip while 2)`, or `(defunc name)`.
    #[must_use]
    pub fn prompt(&self) -> String {
        let ps1 = self.kernel.store.get("PS1").filter(|v| !v.is_empty()).unwrap_or("keel");
        let indicator = if let Some(pending) = &self.exec.pending {
            format!("(defunc {})", pending.func.name)
        } else if let Some(top) = self.exec.blocks.last() {
            let keyword = top.kind.keyword();
            let depth = self.exec.blocks.len();
            if self.exec.state == RunState::BlockSkip {
                format!("(skip {keyword} {depth})")
            } else {
                format!("({keyword} {depth})")
            }
        } else {
            String::new()
        };
        format!("{ps1}{indicator}> ")
    }

    /// Serializes the kernel (variables, operators, functions, aliases) to a
    /// compact binary snapshot.
    pub fn snapshot_bytes(&self) -> Result<Vec<u8>, postcard::Error> {
        postcard::to_allocvec(&self.kernel)
    }

    /// Replaces this session's kernel from a snapshot. Interactive block
    /// state is reset.
    pub fn restore_bytes(&mut self, bytes: &[u8]) -> Result<(), postcard::Error> {
        self.kernel = postcard::from_bytes(bytes)?;
        self.exec = ExecState::new();
        Ok(())
    }

    /// Dumps the kernel state as pretty-printed JSON.
    pub fn state_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.kernel)
    }
}

impl Default for ShellSession {
    fn default() -> Self {
        Self::new()
    }
}
