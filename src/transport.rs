//! Replay event stream.
//!
//! The replay is a server-sent-events stream. `message` events carry one
//! encoded message, `error` events are reported, `close` ends the replay and
//! anything else is ignored. Streams can come from an HTTP endpoint, a file
//! or stdin, and all of them go through the same parser.
use crate::generator::ScriptGenerator;
use crate::script::Script;
use crate::wire;
use anyhow::{anyhow, Context, Result};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

pub const DEFAULT_EVENT: &str = "message";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub name: String,
    pub data: String,
}

/// Parses events out of a buffered reader.
///
/// Lines are `field: value` pairs; `event` names the event, `data` lines are
/// joined with newlines, lines starting with `:` are comments and a blank
/// line dispatches. Data still pending at end of input is dispatched too.
pub struct EventReader<R> {
    reader: R,
    line: String,
    done: bool,
}

impl<R: BufRead> EventReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: String::new(),
            done: false,
        }
    }
}

impl<R: BufRead> Iterator for EventReader<R> {
    type Item = io::Result<Event>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut name: Option<String> = None;
        let mut data: Option<String> = None;
        loop {
            self.line.clear();
            let read = match self.reader.read_line(&mut self.line) {
                Ok(read) => read,
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            };
            if read == 0 {
                self.done = true;
                return data.map(|data| Ok(dispatch(name, data)));
            }

            let line = self.line.trim_end_matches(['\r', '\n']);
            if line.is_empty() {
                match data.take() {
                    Some(data) => return Some(Ok(dispatch(name, data))),
                    None => {
                        name = None;
                        continue;
                    }
                }
            }
            if line.starts_with(':') {
                continue;
            }
            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };
            match field {
                "event" => name = Some(value.to_string()),
                "data" => match &mut data {
                    Some(buffer) => {
                        buffer.push('\n');
                        buffer.push_str(value);
                    }
                    None => data = Some(value.to_string()),
                },
                _ => tracing::trace!(field, "ignored event field"),
            }
        }
    }
}

fn dispatch(name: Option<String>, data: String) -> Event {
    Event {
        name: name
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| DEFAULT_EVENT.to_string()),
        data,
    }
}

/// Where the replay stream is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplaySource {
    Url(String),
    File(PathBuf),
    Stdin,
}

impl ReplaySource {
    pub fn from_file_arg(path: &Path) -> Self {
        if path.as_os_str() == "-" {
            ReplaySource::Stdin
        } else {
            ReplaySource::File(path.to_path_buf())
        }
    }

    pub fn open(&self) -> Result<Box<dyn BufRead>> {
        match self {
            ReplaySource::Url(url) => {
                tracing::info!(url = %url, "connecting to replay");
                let response = ureq::get(url)
                    .header("Accept", "text/event-stream")
                    .call()
                    .with_context(|| format!("connect to replay {url}"))?;
                Ok(Box::new(BufReader::new(response.into_body().into_reader())))
            }
            ReplaySource::File(path) => {
                let file =
                    File::open(path).with_context(|| format!("open replay {}", path.display()))?;
                Ok(Box::new(BufReader::new(file)))
            }
            ReplaySource::Stdin => Ok(Box::new(BufReader::new(io::stdin()))),
        }
    }
}

/// Counters reported after a replay.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReplaySummary {
    pub messages: usize,
    pub skipped: usize,
    pub error_events: usize,
    pub blocks: usize,
    pub outputs: Vec<PathBuf>,
}

/// Feed a replay stream through `generator` and render `script`.
///
/// Shutdown runs every step even when an earlier one fails: flush the
/// generator into the script, close the script, drop the stream. The first
/// failure is returned afterwards.
pub fn run_replay<I, S>(events: I, generator: ScriptGenerator, script: &mut S) -> Result<ReplaySummary>
where
    I: IntoIterator<Item = io::Result<Event>>,
    S: Script,
{
    let mut generator = generator;
    let mut summary = ReplaySummary::default();
    let mut failure: Option<anyhow::Error> = None;
    let mut closed = false;

    let mut events = events.into_iter();
    for event in events.by_ref() {
        let event = match event {
            Ok(event) => event,
            Err(err) => {
                failure = Some(anyhow!(err).context("read replay stream"));
                break;
            }
        };
        tracing::debug!(event = %event.name, "received event");
        match event.name.as_str() {
            "message" => match wire::decode_event(&event.data) {
                Ok(Some(message)) => {
                    tracing::info!(message = %message.log_id(), "received message");
                    summary.messages += 1;
                    generator.on_message(&message);
                }
                Ok(None) => {
                    tracing::warn!("skipping event with null message");
                    summary.skipped += 1;
                }
                Err(err) => {
                    tracing::error!(error = %err, "skipping undecodable message event");
                    summary.skipped += 1;
                }
            },
            "error" => {
                tracing::error!(data = %event.data, "received error event");
                summary.error_events += 1;
            }
            "close" => {
                tracing::info!("closing");
                closed = true;
                break;
            }
            other => tracing::debug!(event = other, "ignored event"),
        }
    }
    if !closed && failure.is_none() {
        tracing::warn!("replay ended without a close event");
    }

    tracing::info!(actions = generator.live_actions(), "completing actions");
    match generator.close(script) {
        Ok(blocks) => summary.blocks = blocks,
        Err(err) => {
            tracing::error!(error = %err, "failed to close generator");
            failure.get_or_insert(err.context("flush script generator"));
        }
    }
    match script.close() {
        Ok(outputs) => summary.outputs = outputs,
        Err(err) => {
            tracing::error!(error = %err, "failed to close script");
            failure.get_or_insert(err.context("close script"));
        }
    }
    drop(events);
    tracing::info!(
        messages = summary.messages,
        skipped = summary.skipped,
        error_events = summary.error_events,
        blocks = summary.blocks,
        "closed"
    );

    match failure {
        Some(err) => Err(err),
        None => Ok(summary),
    }
}

#[cfg(test)]
#[path = "transport_tests.rs"]
mod tests;
