//! Shared fixtures for coordinator integration tests.
//!
//! `RecordingHost` keeps an in-memory document and records everything the
//! coordinator publishes. `GatedParser` is a scripted parser whose calls can
//! be held and released one by one to force specific interleavings.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use highlight_sync::text::char_len;
use highlight_sync::{
    Edit, HighlightError, HighlightHost, HighlightResult, Layer, LayerParser, ParseCancellation,
    ParseFailure, Region,
};

const WAIT_TIMEOUT: Duration = Duration::from_secs(5);
const POLL_INTERVAL: Duration = Duration::from_millis(2);

/// Poll `condition` until it holds, panicking after a generous timeout.
pub async fn eventually(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + WAIT_TIMEOUT;
    while !condition() {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for: {}", what);
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// A failure as seen by the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedFailure {
    pub generation: u64,
    pub consecutive_failures: u32,
    pub message: String,
    pub internal: bool,
}

#[derive(Default)]
pub struct RecordingHost {
    text: Mutex<String>,
    layers: Mutex<Vec<Layer>>,
    published: Mutex<Vec<Vec<Layer>>>,
    failures: Mutex<Vec<RecordedFailure>>,
}

impl RecordingHost {
    pub fn new(text: &str) -> Arc<Self> {
        let host = Self::default();
        *host.text.lock().unwrap() = text.to_string();
        Arc::new(host)
    }

    /// Apply edits to the host's text, as an editor would before notifying
    pub fn edit(&self, edits: &[Edit]) {
        let mut text = self.text.lock().unwrap();
        for edit in edits {
            edit.apply_to(&mut text);
        }
    }

    pub fn text(&self) -> String {
        self.text.lock().unwrap().clone()
    }

    pub fn layers(&self) -> Vec<Layer> {
        self.layers.lock().unwrap().clone()
    }

    /// Seed the layers shown before the coordinator publishes anything
    pub fn show(&self, layers: Vec<Layer>) {
        *self.layers.lock().unwrap() = layers;
    }

    pub fn publish_count(&self) -> usize {
        self.published.lock().unwrap().len()
    }

    pub fn published(&self) -> Vec<Vec<Layer>> {
        self.published.lock().unwrap().clone()
    }

    pub fn failures(&self) -> Vec<RecordedFailure> {
        self.failures.lock().unwrap().clone()
    }
}

impl HighlightHost for RecordingHost {
    fn current_text(&self) -> String {
        self.text()
    }

    fn current_layers(&self) -> Vec<Layer> {
        self.layers()
    }

    fn replace_layers(&self, layers: Vec<Layer>) {
        self.published.lock().unwrap().push(layers.clone());
        *self.layers.lock().unwrap() = layers;
    }

    fn report_failure(&self, failure: &ParseFailure) {
        self.failures.lock().unwrap().push(RecordedFailure {
            generation: failure.generation,
            consecutive_failures: failure.consecutive_failures,
            message: failure.error.to_string(),
            internal: matches!(failure.error, HighlightError::Internal(_)),
        });
    }
}

/// Layers the gated parser derives from `text`.
///
/// `word` covers runs of ASCII letters, `digit` runs of ASCII digits; both
/// layers are always present, in that order.
pub fn expected_layers(text: &str) -> Vec<Layer> {
    let mut words = Layer::new("word");
    let mut digits = Layer::new("digit");
    let chars: Vec<char> = text.chars().collect();

    let mut i = 0;
    while i < chars.len() {
        let class = |c: char| {
            if c.is_ascii_alphabetic() {
                Some("word")
            } else if c.is_ascii_digit() {
                Some("digit")
            } else {
                None
            }
        };
        match class(chars[i]) {
            Some(kind) => {
                let start = i;
                while i < chars.len() && class(chars[i]) == Some(kind) {
                    i += 1;
                }
                let region = Region::new(start, i, kind);
                if kind == "word" {
                    words.push(region);
                } else {
                    digits.push(region);
                }
            }
            None => i += 1,
        }
    }
    vec![words, digits]
}

#[derive(Default)]
struct GateState {
    gated: bool,
    started: Vec<String>,
    released: HashSet<usize>,
    finished: usize,
    cancelled: usize,
    running: usize,
    max_running: usize,
}

/// Scripted parser for coordinator tests.
///
/// - text containing `!!` fails with a parse error;
/// - text containing `boom` panics;
/// - when gated, call `n` (0-based, in start order) blocks until
///   `release(n)`;
/// - when respecting cancellation, a blocked call gives up as soon as it is
///   cancelled, and a released call checks once more before returning.
pub struct GatedParser {
    respect_cancel: bool,
    state: Mutex<GateState>,
}

impl GatedParser {
    /// Parser that never blocks
    pub fn open() -> Arc<Self> {
        Self::build(false, true)
    }

    /// Parser whose calls block until released
    pub fn gated(respect_cancel: bool) -> Arc<Self> {
        Self::build(true, respect_cancel)
    }

    fn build(gated: bool, respect_cancel: bool) -> Arc<Self> {
        Arc::new(Self {
            respect_cancel,
            state: Mutex::new(GateState {
                gated,
                ..Default::default()
            }),
        })
    }

    pub fn release(&self, call: usize) {
        self.state.lock().unwrap().released.insert(call);
    }

    pub fn started(&self) -> usize {
        self.state.lock().unwrap().started.len()
    }

    pub fn started_texts(&self) -> Vec<String> {
        self.state.lock().unwrap().started.clone()
    }

    pub fn finished(&self) -> usize {
        self.state.lock().unwrap().finished
    }

    pub fn cancelled_calls(&self) -> usize {
        self.state.lock().unwrap().cancelled
    }

    /// Most calls that were ever inside `parse` at the same time.
    ///
    /// A panicking call stays counted as running.
    pub fn max_running(&self) -> usize {
        self.state.lock().unwrap().max_running
    }

    pub async fn wait_started(&self, count: usize) {
        eventually(&format!("{} parse calls to start", count), || {
            self.started() >= count
        })
        .await;
    }

    pub async fn wait_finished(&self, count: usize) {
        eventually(&format!("{} parse calls to finish", count), || {
            self.finished() >= count
        })
        .await;
    }

    fn cancelled(&self) -> HighlightResult<Vec<Layer>> {
        let mut state = self.state.lock().unwrap();
        state.cancelled += 1;
        state.running -= 1;
        Err(HighlightError::Cancelled)
    }
}

impl LayerParser for GatedParser {
    fn name(&self) -> &str {
        "gated"
    }

    fn parse(&self, text: &str, cancel: &ParseCancellation) -> HighlightResult<Vec<Layer>> {
        let call = {
            let mut state = self.state.lock().unwrap();
            state.started.push(text.to_string());
            state.running += 1;
            state.max_running = state.max_running.max(state.running);
            state.started.len() - 1
        };

        loop {
            {
                let state = self.state.lock().unwrap();
                if !state.gated || state.released.contains(&call) {
                    break;
                }
            }
            if self.respect_cancel && cancel.is_cancelled() {
                return self.cancelled();
            }
            std::thread::sleep(Duration::from_millis(1));
        }

        if self.respect_cancel && cancel.is_cancelled() {
            return self.cancelled();
        }

        let result = if text.contains("boom") {
            panic!("parser crashed on {:?}", text);
        } else if text.contains("!!") {
            Err(HighlightError::parse(format!(
                "unexpected '!!' in {} chars of text",
                char_len(text)
            )))
        } else {
            Ok(expected_layers(text))
        };

        let mut state = self.state.lock().unwrap();
        state.finished += 1;
        state.running -= 1;
        result
    }
}
