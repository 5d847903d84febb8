// src/exec/output.rs

//! Child output handling: line pumps, clear-screen detection and readiness
//! markers.

use regex::Regex;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::console::TaskLogger;
use crate::errors::{DevwatchError, Result};

/// Escape sequences terminals interpret as "clear the screen".
const CLEAR_SEQUENCES: [&str; 4] = ["\x1bc", "\x1b[2J", "\x1b[3J", "\x1b[H"];

/// Strip clear-screen sequences from `line`.
///
/// Returns whether any were present, plus the remaining text.
pub fn split_clear(line: &str) -> (bool, String) {
    let mut cleared = false;
    let mut text = line.to_string();
    for seq in CLEAR_SEQUENCES {
        if text.contains(seq) {
            cleared = true;
            text = text.replace(seq, "");
        }
    }
    (cleared, text)
}

/// Read `reader` line by line into `tx` until EOF or the receiver goes away.
///
/// Lines are decoded lossily; invalid UTF-8 never ends the stream.
pub fn spawn_line_pump<R>(reader: R, tx: mpsc::Sender<String>, task: String, stream: &'static str)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    if tx.send(decode_line(&buf)).await.is_err() {
                        break;
                    }
                }
                Err(err) => {
                    debug!(task = %task, stream, error = %err, "output stream read error");
                    break;
                }
            }
        }
        debug!(task = %task, stream, "output stream ended");
    });
}

fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

/// Forward combined output to `logger` and report whether `marker` was seen.
///
/// The returned receiver yields `true` on the first line matching `marker`,
/// or `false` if output ends first. Forwarding keeps going after the match
/// for as long as the child writes anything.
pub fn spawn_output_monitor(
    task: String,
    mut lines: mpsc::Receiver<String>,
    logger: Option<TaskLogger>,
    marker: Regex,
) -> oneshot::Receiver<bool> {
    let (ready_tx, ready_rx) = oneshot::channel();

    tokio::spawn(async move {
        let mut ready_tx = Some(ready_tx);

        while let Some(raw) = lines.recv().await {
            let (cleared, text) = split_clear(&raw);
            debug!(task = %task, "output: {}", text.trim_end());

            if let Some(logger) = &logger {
                if cleared {
                    logger.clear();
                }
                logger.line(&text);
            }

            if ready_tx.is_some() && marker.is_match(&text) {
                debug!(task = %task, "readiness marker seen");
                if let Some(tx) = ready_tx.take() {
                    let _ = tx.send(true);
                }
            }
        }

        if let Some(tx) = ready_tx.take() {
            debug!(task = %task, "output ended before readiness marker");
            let _ = tx.send(false);
        }
    });

    ready_rx
}

/// Compile a literal marker substring into a matcher.
pub fn literal_marker(marker: &str) -> Result<Regex> {
    Regex::new(&regex::escape(marker))
        .map_err(|e| DevwatchError::Config(format!("invalid marker {marker:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::MemorySink;
    use std::sync::Arc;

    #[test]
    fn clear_sequences_are_stripped() {
        assert_eq!(split_clear("plain"), (false, "plain".to_string()));
        assert_eq!(split_clear("\x1bcStarting compilation"), (true, "Starting compilation".to_string()));
        assert_eq!(
            split_clear("\x1b[2J\x1b[3J\x1b[HFound 0 errors."),
            (true, "Found 0 errors.".to_string())
        );
    }

    #[test]
    fn invalid_utf8_is_decoded_lossily() {
        assert_eq!(decode_line(b"caf\xe9\r\n"), "caf\u{fffd}");
        assert_eq!(decode_line(b"no newline"), "no newline");
    }

    #[tokio::test]
    async fn pump_keeps_reading_past_invalid_utf8() {
        let (tx, mut rx) = mpsc::channel(8);
        let input: &'static [u8] = b"caf\xe9\nAll emulators ready\n";
        spawn_line_pump(input, tx, "emu".into(), "stdout");

        assert_eq!(rx.recv().await.as_deref(), Some("caf\u{fffd}"));
        assert_eq!(rx.recv().await.as_deref(), Some("All emulators ready"));
        assert_eq!(rx.recv().await, None);
    }

    #[test]
    fn literal_marker_escapes_regex_syntax() {
        let m = literal_marker("All emulators ready! (1.2)").unwrap();
        assert!(m.is_match("✔  All emulators ready! (1.2) It is now safe"));
        assert!(!m.is_match("All emulators ready! 112"));
    }

    #[tokio::test]
    async fn monitor_reports_marker_and_keeps_forwarding() {
        let sink = MemorySink::new();
        let logger = TaskLogger::new("emu", None, Arc::new(sink.clone()));
        let (tx, rx) = mpsc::channel(8);
        let ready = spawn_output_monitor("emu".into(), rx, Some(logger), literal_marker("ready").unwrap());

        tx.send("booting".into()).await.unwrap();
        tx.send("  ready now  ".into()).await.unwrap();
        tx.send("after".into()).await.unwrap();
        drop(tx);

        assert!(ready.await.unwrap());
        // Give the monitor a moment to drain the remaining line.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(sink.lines(), vec!["booting", "ready now", "after"]);
    }

    #[tokio::test]
    async fn monitor_reports_false_when_output_ends() {
        let (tx, rx) = mpsc::channel(8);
        let ready = spawn_output_monitor("emu".into(), rx, None, literal_marker("ready").unwrap());
        tx.send("crashing".into()).await.unwrap();
        drop(tx);
        assert!(!ready.await.unwrap());
    }
}
