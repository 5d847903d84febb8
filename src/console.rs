// src/console.rs

//! Prefixed, color-tagged output streams for task output.
//!
//! Diagnostics go through `tracing` (see [`crate::logging`]). What the tasks
//! themselves print (copied files, compiler output, emulator output) goes
//! through a [`TaskLogger`], which tags every line with the task's prefix and
//! writes it as one complete line to a shared [`LogSink`].

use std::fmt;
use std::io::Write;
use std::sync::{Arc, Mutex};

/// ANSI foreground colors used for task tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
}

impl Color {
    fn code(self) -> &'static str {
        match self {
            Color::Red => "31",
            Color::Green => "32",
            Color::Yellow => "33",
            Color::Blue => "34",
            Color::Magenta => "35",
            Color::Cyan => "36",
        }
    }
}

/// What a logger asks its sink to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogAction {
    Line(String),
    /// The producer asked for the terminal to be cleared. Sinks may ignore it.
    Clear,
}

/// Destination shared by every [`TaskLogger`].
///
/// Implementations must write each call as one self-contained unit so
/// concurrent tasks never interleave within a line.
pub trait LogSink: Send + Sync + fmt::Debug {
    fn write(&self, prefix: &str, action: LogAction);
}

/// Writes to stdout, holding the stdout lock per line.
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl LogSink for ConsoleSink {
    fn write(&self, prefix: &str, action: LogAction) {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        // A broken stdout leaves nowhere to report to.
        let _ = match action {
            LogAction::Line(line) => writeln!(out, "{prefix} {line}"),
            LogAction::Clear => writeln!(out, "{prefix} ----"),
        };
    }
}

/// Records everything in memory; used by tests.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    entries: Arc<Mutex<Vec<(String, LogAction)>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<(String, LogAction)> {
        self.entries.lock().map(|g| g.clone()).unwrap_or_default()
    }

    /// Just the text lines, without prefixes.
    pub fn lines(&self) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter_map(|(_, action)| match action {
                LogAction::Line(l) => Some(l),
                LogAction::Clear => None,
            })
            .collect()
    }

    pub fn clear_count(&self) -> usize {
        self.entries()
            .iter()
            .filter(|(_, a)| *a == LogAction::Clear)
            .count()
    }
}

impl LogSink for MemorySink {
    fn write(&self, prefix: &str, action: LogAction) {
        if let Ok(mut guard) = self.entries.lock() {
            guard.push((prefix.to_string(), action));
        }
    }
}

/// A named output stream for one task.
#[derive(Clone)]
pub struct TaskLogger {
    prefix: Arc<str>,
    sink: Arc<dyn LogSink>,
}

impl fmt::Debug for TaskLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskLogger")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl TaskLogger {
    pub fn new(tag: &str, color: Option<Color>, sink: Arc<dyn LogSink>) -> Self {
        let prefix = match color {
            Some(c) => format!("\x1b[{}m[{tag}]\x1b[0m", c.code()),
            None => format!("[{tag}]"),
        };
        Self {
            prefix: prefix.into(),
            sink,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Log a line with surrounding whitespace trimmed. Blank lines are dropped.
    pub fn line(&self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        self.sink.write(&self.prefix, LogAction::Line(text.to_string()));
    }

    /// Log possibly multi-line text, one sink write per line.
    pub fn block(&self, text: &str) {
        for line in text.lines() {
            self.line(line);
        }
    }

    pub fn clear(&self) {
        self.sink.write(&self.prefix, LogAction::Clear);
    }
}

/// Convenience for `Option<TaskLogger>` fields, where `None` means silent.
pub(crate) fn log_line(logger: &Option<TaskLogger>, text: &str) {
    if let Some(l) = logger {
        l.line(text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_are_trimmed_and_prefixed() {
        let sink = MemorySink::new();
        let logger = TaskLogger::new("tsc", None, Arc::new(sink.clone()));

        logger.line("  hello world \r");
        logger.line("   ");
        logger.block("a\nb\n");
        logger.clear();

        let entries = sink.entries();
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[0], ("[tsc]".to_string(), LogAction::Line("hello world".into())));
        assert_eq!(sink.lines(), vec!["hello world", "a", "b"]);
        assert_eq!(sink.clear_count(), 1);
    }

    #[test]
    fn colored_prefix_wraps_tag() {
        let logger = TaskLogger::new("sync", Some(Color::Green), Arc::new(MemorySink::new()));
        assert_eq!(logger.prefix(), "\x1b[32m[sync]\x1b[0m");
    }
}
