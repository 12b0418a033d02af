use std::{
    io::{BufRead, ErrorKind},
    sync::{
        atomic::{AtomicBool, Ordering::SeqCst},
        mpsc::{self, RecvTimeoutError},
    },
    thread,
    time::Duration,
};

use chrono::Utc;
use crossterm::terminal;
use cubesat_aprs::{SentenceDecoder, APRS_MARKER};

use crate::publish::Publisher;
use crate::store::Archive;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// What happened to one input line
pub enum Outcome {
    /// Not a telemetry sentence
    Skipped,
    /// Decoded and handed to the publisher
    Published,
    /// Decoded without a callsign, nothing to publish
    Discarded,
    /// Decoded but could not be published
    Failed,
}

/// Everything needed to turn one line into a published record
pub struct RelayContext<P: Publisher> {
    decoder: SentenceDecoder,
    topic: String,
    publisher: P,
    archive: Option<Archive>,
}

impl<P: Publisher> RelayContext<P> {
    pub fn new(decoder: SentenceDecoder, topic: String, publisher: P, archive: Option<Archive>) -> Self {
        Self {
            decoder,
            topic,
            publisher,
            archive,
        }
    }

    /// Decode a line and publish the resulting record
    pub fn handle_line(&mut self, line: &str) -> Outcome {
        let line = line.trim();
        if !line.starts_with(APRS_MARKER) {
            return Outcome::Skipped;
        }
        log::info!("Received line: {line}");
        let record = match self.decoder.decode(line) {
            Ok(record) => record,
            Err(e) => {
                log::warn!("{e}");
                return Outcome::Skipped;
            }
        };
        if record.callsign().is_none() {
            log::warn!("No valid APRS data to publish.");
            return Outcome::Discarded;
        }
        let payload = match record.to_json() {
            Ok(payload) => payload,
            Err(e) => {
                log::error!("Could not serialize record: {e}");
                return Outcome::Failed;
            }
        };
        if let Err(e) = self.publisher.publish(&self.topic, payload.as_bytes()) {
            log::error!("Failed to publish to {}: {e}", self.topic);
            return Outcome::Failed;
        }
        echo(&format!("Published to {}: {payload}", self.topic));
        if let Some(archive) = &mut self.archive {
            let tstamp = record.timestamp().unwrap_or_else(Utc::now);
            if let Err(e) = archive.store(tstamp, payload.as_bytes()) {
                log::warn!("Failed to archive record: {e}");
            }
        }
        Outcome::Published
    }
}

/// Print a line to the console, cut to the terminal width
fn echo(message: &str) {
    let width = terminal::size().map(|(w, _)| w as usize).unwrap_or(120);
    match message.char_indices().nth(width.saturating_sub(3)) {
        Some((cut, _)) if message.chars().count() > width => println!("{}...", &message[..cut]),
        _ => println!("{message}"),
    }
}

/// Read lines on a background thread so the main loop can watch for interrupts.
///
/// Invalid UTF-8 is replaced rather than ending the input.
pub fn spawn_reader<R: BufRead + Send + 'static>(reader: R) -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut reader = reader;
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    if tx.send(line.trim_end_matches(['\r', '\n']).to_string()).is_err() {
                        break;
                    }
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    log::error!("Failed to read input: {e}");
                    break;
                }
            }
        }
    });
    rx
}

/// Handle lines until the input ends or `exit` is raised.
///
/// A line that has been received is always handled before the exit flag is
/// checked again.
pub fn run<P: Publisher>(ctx: &mut RelayContext<P>, lines: &mpsc::Receiver<String>, exit: &AtomicBool) {
    while !exit.load(SeqCst) {
        match lines.recv_timeout(POLL_INTERVAL) {
            Ok(line) => {
                ctx.handle_line(&line);
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                log::info!("Input closed");
                break;
            }
        }
    }
}
