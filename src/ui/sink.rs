//! Destinations for user-visible build output.
//!
//! The orchestrator owns one `BuildLogger`, which frames messages with the
//! functions in [`super::format`] and hands the finished text to a
//! [`LogSink`]. A failing sink never aborts a build; the failure is reported
//! through `tracing` instead.

use std::cell::RefCell;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use console::style;

use super::format::{format_command, format_error, format_raw, format_task, strip_trailing_whitespace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Error,
}

/// A destination for framed log text. `text` may span several lines.
pub trait LogSink {
    fn write(&mut self, level: LogLevel, text: &str) -> io::Result<()>;
}

/// Prints info to stdout and errors to stderr.
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl LogSink for ConsoleSink {
    fn write(&mut self, level: LogLevel, text: &str) -> io::Result<()> {
        match level {
            LogLevel::Info => writeln!(io::stdout().lock(), "{}", text),
            LogLevel::Error => writeln!(
                io::stderr().lock(),
                "{}",
                style(text).for_stderr().red().bold()
            ),
        }
    }
}

/// Appends to `<build_dir>/buildlog.txt`, stripping trailing whitespace per line.
#[derive(Debug)]
pub struct BuildLogFile {
    file: File,
}

impl BuildLogFile {
    /// Open `path` for appending, creating its parent directory if needed.
    pub fn open(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { file })
    }
}

impl LogSink for BuildLogFile {
    fn write(&mut self, _level: LogLevel, text: &str) -> io::Result<()> {
        writeln!(self.file, "{}", strip_trailing_whitespace(text))
    }
}

/// Records every write in memory. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    lines: Rc<RefCell<Vec<(LogLevel, String)>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<(LogLevel, String)> {
        self.lines.borrow().clone()
    }

    /// All recorded text joined with newlines.
    pub fn text(&self) -> String {
        self.lines
            .borrow()
            .iter()
            .map(|(_, text)| text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl LogSink for MemorySink {
    fn write(&mut self, level: LogLevel, text: &str) -> io::Result<()> {
        self.lines.borrow_mut().push((level, text.to_string()));
        Ok(())
    }
}

/// Fans every write out to several sinks. All sinks are attempted; the first
/// error is returned.
#[derive(Default)]
pub struct TeeSink {
    sinks: Vec<Box<dyn LogSink>>,
}

impl TeeSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl LogSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn push(&mut self, sink: Box<dyn LogSink>) {
        self.sinks.push(sink);
    }
}

impl LogSink for TeeSink {
    fn write(&mut self, level: LogLevel, text: &str) -> io::Result<()> {
        let mut first_err = None;
        for sink in &mut self.sinks {
            if let Err(e) = sink.write(level, text) {
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// The orchestrator's logging front end: task, command, raw and error channels.
pub struct BuildLogger {
    sink: Box<dyn LogSink>,
    cwd: Option<PathBuf>,
}

impl BuildLogger {
    /// Wrap `sink`. Command lines are shortened relative to the process's
    /// current directory at the time of construction.
    pub fn new(sink: Box<dyn LogSink>) -> Self {
        Self {
            sink,
            cwd: std::env::current_dir().ok(),
        }
    }

    /// Wrap `sink`, shortening command lines relative to `cwd` instead.
    pub fn with_cwd(sink: Box<dyn LogSink>, cwd: Option<PathBuf>) -> Self {
        Self { sink, cwd }
    }

    /// Add another destination, e.g. the build log file once it is open.
    pub fn attach(&mut self, extra: Box<dyn LogSink>) {
        let previous = std::mem::replace(&mut self.sink, Box::new(TeeSink::new()));
        let mut tee = TeeSink::new();
        tee.push(previous);
        tee.push(extra);
        self.sink = Box::new(tee);
    }

    pub fn task(&mut self, completed: u32, total: u32, message: &str) {
        let text = format_task(completed, total, message);
        self.emit(LogLevel::Info, &text);
    }

    pub fn command(&mut self, message: &str) {
        let text = format_command(message, self.cwd.as_deref());
        self.emit(LogLevel::Info, &text);
    }

    pub fn raw(&mut self, message: &str) {
        let text = format_raw(message, self.cwd.as_deref());
        self.emit(LogLevel::Info, &text);
    }

    pub fn error(&mut self, message: &str) {
        let text = format_error(message);
        self.emit(LogLevel::Error, &text);
    }

    fn emit(&mut self, level: LogLevel, text: &str) {
        if let Err(e) = self.sink.write(level, text) {
            tracing::warn!(error = %e, "failed to write build log line");
        }
    }
}
