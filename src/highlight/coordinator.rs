//! Keeps a document's highlight layers in sync with live edits.
//!
//! # Architecture
//!
//! ```text
//! on_edits(edits)
//!       │
//!       ├─► [lock] remap current layers ─► publish to host
//!       │          bump generation, register new parse
//!       │
//!       ├─► cancel previous parse (cooperative)
//!       │
//!       └─► spawn parse task (generation N)
//!               │
//!               ├─► debounce (ends early if cancelled)
//!               ├─► wait for the previous parse to return
//!               ├─► parser.parse(full text) on the blocking pool
//!               │
//!               └─► [lock] still the registered parse (generation N)?
//!                       ├─ yes: adopt layers, publish
//!                       └─ no:  discard silently
//! ```
//!
//! Cancellation only saves work. Correctness comes from the generation
//! check: a parse finishing after a newer edit can never clobber the
//! newer optimistic layers, whether or not it noticed its cancellation.

use std::sync::{Arc, Mutex, MutexGuard};

use arc_swap::ArcSwap;
use tokio::runtime::Handle;
use tokio::sync::watch;

use super::host::{HighlightHost, ParseFailure};
use crate::config::HighlightSettings;
use crate::document::Layer;
use crate::error::{HighlightError, HighlightResult, LockResultExt};
use crate::language::{LayerParser, ParseCancellation};
use crate::text::{Edit, char_len, remap_layers};

const LOG_TARGET: &str = "highlight_sync::coordinator";

/// Whether an authoritative parse is running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsePhase {
    Idle,
    Parsing { generation: u64 },
}

/// The parse currently allowed to publish
struct InFlightParse {
    generation: u64,
    cancel: ParseCancellation,
}

struct CoordinatorState {
    layers: Vec<Layer>,
    generation: u64,
    in_flight: Option<InFlightParse>,
    consecutive_failures: u32,
}

impl CoordinatorState {
    fn phase(&self) -> ParsePhase {
        match &self.in_flight {
            Some(parse) => ParsePhase::Parsing {
                generation: parse.generation,
            },
            None => ParsePhase::Idle,
        }
    }
}

struct Inner {
    parser: Arc<dyn LayerParser>,
    host: Arc<dyn HighlightHost>,
    settings: ArcSwap<HighlightSettings>,
    runtime: Handle,
    state: Mutex<CoordinatorState>,
    phase: watch::Sender<ParsePhase>,
    /// Held for the duration of a parser call; at most one runs at a time
    parse_slot: tokio::sync::Mutex<()>,
}

/// Coordinates optimistic remapping with asynchronous authoritative parses
/// for one document.
///
/// Cloning is cheap; all clones drive the same state.
#[derive(Clone)]
pub struct HighlightCoordinator {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for HighlightCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HighlightCoordinator")
            .field("parser", &self.inner.parser.name())
            .field("phase", &self.phase())
            .finish()
    }
}

impl HighlightCoordinator {
    /// Create a coordinator whose parse tasks run on `runtime`.
    pub fn new(
        parser: Arc<dyn LayerParser>,
        host: Arc<dyn HighlightHost>,
        settings: HighlightSettings,
        runtime: Handle,
    ) -> Self {
        let (phase, _) = watch::channel(ParsePhase::Idle);
        Self {
            inner: Arc::new(Inner {
                parser,
                host,
                settings: ArcSwap::from_pointee(settings),
                runtime,
                state: Mutex::new(CoordinatorState {
                    layers: Vec::new(),
                    generation: 0,
                    in_flight: None,
                    consecutive_failures: 0,
                }),
                phase,
                parse_slot: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// Create a coordinator on the tokio runtime the caller is running in.
    pub fn in_current_runtime(
        parser: Arc<dyn LayerParser>,
        host: Arc<dyn HighlightHost>,
        settings: HighlightSettings,
    ) -> HighlightResult<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| HighlightError::internal(format!("no tokio runtime: {}", e)))?;
        Ok(Self::new(parser, host, settings, runtime))
    }

    /// Name of the underlying parser
    pub fn name(&self) -> &str {
        self.inner.parser.name()
    }

    /// Start over for a freshly loaded document.
    ///
    /// Coordinator state is discarded and reseeded from the layers the host
    /// already shows, which stay visible until the first parse lands.
    pub fn init(&self, full_text: String) {
        let (generation, cancel, previous) = {
            let mut state = self.inner.lock_state("init");
            state.layers = self.inner.host.current_layers();
            state.consecutive_failures = 0;
            self.inner.begin_generation(&mut state)
        };

        if let Some(previous) = previous {
            log::debug!(
                target: LOG_TARGET,
                "init: cancelling parse for generation {}",
                previous.generation
            );
            previous.cancel.cancel();
        }
        self.inner.spawn_parse(generation, full_text, cancel);
    }

    /// Apply a batch of edits the host has just made to its text.
    ///
    /// The layers the host currently displays are remapped and published
    /// immediately; an authoritative parse of the new text is then
    /// scheduled, superseding any parse still running. Empty batches are
    /// ignored.
    ///
    /// Host text and layers are read under the state lock, so the parse
    /// holding the newest generation always sees the newest text.
    pub fn on_edits(&self, edits: &[Edit]) {
        if edits.is_empty() {
            return;
        }

        let (text, generation, cancel, previous) = {
            let mut state = self.inner.lock_state("on_edits");
            let text = self.inner.host.current_text();
            let doc_len = char_len(&text);
            state.layers = remap_layers(&self.inner.host.current_layers(), edits)
                .iter()
                .map(|layer| layer.clamp_to(doc_len))
                .collect();
            self.inner.host.replace_layers(state.layers.clone());
            let (generation, cancel, previous) = self.inner.begin_generation(&mut state);
            (text, generation, cancel, previous)
        };

        if let Some(previous) = previous {
            log::trace!(
                target: LOG_TARGET,
                "Superseded parse for generation {} with {}",
                previous.generation,
                generation
            );
            previous.cancel.cancel();
        }
        self.inner.spawn_parse(generation, text, cancel);
    }

    /// Hand the current layer set to `host`; the authoritative read for rendering.
    pub fn apply(&self, host: &dyn HighlightHost) {
        let state = self.inner.lock_state("apply");
        host.replace_layers(state.layers.clone());
    }

    /// Snapshot of the current layers
    pub fn layers(&self) -> Vec<Layer> {
        self.inner.lock_state("layers").layers.clone()
    }

    /// Generation of the most recent init/edit batch
    pub fn generation(&self) -> u64 {
        self.inner.lock_state("generation").generation
    }

    pub fn phase(&self) -> ParsePhase {
        *self.inner.phase.borrow()
    }

    /// Resolve once no parse is in flight
    pub async fn wait_idle(&self) {
        let mut phase = self.inner.phase.subscribe();
        // The sender lives in `inner`, so the channel cannot close here
        let _ = phase.wait_for(|phase| *phase == ParsePhase::Idle).await;
    }

    /// Resolve once every parse task queued before this call has released
    /// the parser and had its result integrated or discarded.
    ///
    /// After [`shutdown`](Self::shutdown) this waits out a parser call that
    /// ignores cancellation.
    pub async fn wait_drained(&self) {
        let _slot = self.inner.parse_slot.lock().await;
    }

    /// Cancel the in-flight parse, if any. Current layers are kept.
    pub fn shutdown(&self) {
        let previous = {
            let mut state = self.inner.lock_state("shutdown");
            let previous = state.in_flight.take();
            self.inner.phase.send_replace(state.phase());
            previous
        };
        if let Some(previous) = previous {
            log::debug!(
                target: LOG_TARGET,
                "shutdown: cancelling parse for generation {}",
                previous.generation
            );
            previous.cancel.cancel();
        }
    }

    /// Replace settings; they apply from the next scheduled parse
    pub fn update_settings(&self, settings: HighlightSettings) {
        self.inner.settings.store(Arc::new(settings));
    }

    pub fn settings(&self) -> Arc<HighlightSettings> {
        self.inner.settings.load_full()
    }
}

impl Inner {
    fn lock_state(&self, context: &str) -> MutexGuard<'_, CoordinatorState> {
        self.state.lock().recover_poison(context)
    }

    /// Bump the generation and register its parse. Must run under the lock.
    fn begin_generation(
        &self,
        state: &mut CoordinatorState,
    ) -> (u64, ParseCancellation, Option<InFlightParse>) {
        state.generation += 1;
        let generation = state.generation;
        let cancel = ParseCancellation::new();
        let previous = state.in_flight.replace(InFlightParse {
            generation,
            cancel: cancel.clone(),
        });
        self.phase.send_replace(state.phase());
        (generation, cancel, previous)
    }

    fn spawn_parse(self: &Arc<Self>, generation: u64, text: String, cancel: ParseCancellation) {
        let inner = Arc::clone(self);
        let debounce = self.settings.load().debounce();

        self.runtime.spawn(async move {
            if !debounce.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        log::trace!(
                            target: LOG_TARGET,
                            "Parse for generation {} cancelled during debounce",
                            generation
                        );
                        return;
                    }
                    _ = tokio::time::sleep(debounce) => {}
                }
            }

            let _slot = tokio::select! {
                _ = cancel.cancelled() => {
                    log::trace!(
                        target: LOG_TARGET,
                        "Parse for generation {} cancelled while waiting for the parser",
                        generation
                    );
                    return;
                }
                slot = inner.parse_slot.lock() => slot,
            };

            let parser = Arc::clone(&inner.parser);
            let task_cancel = cancel.clone();
            let result =
                match tokio::task::spawn_blocking(move || parser.parse(&text, &task_cancel)).await
                {
                    Ok(result) => result,
                    Err(e) => Err(HighlightError::internal(format!("parse task failed: {}", e))),
                };
            inner.complete(generation, result);
        });
    }

    /// Integrate a finished parse if it is still the latest one
    fn complete(&self, generation: u64, result: HighlightResult<Vec<Layer>>) {
        let failure = {
            let mut state = self.lock_state("complete");
            // Only the registered parse may publish; anything else was
            // superseded by a newer batch or stopped by shutdown
            if state
                .in_flight
                .as_ref()
                .is_none_or(|parse| parse.generation != generation)
            {
                log::debug!(
                    target: LOG_TARGET,
                    "Discarding stale parse result for generation {} (current {})",
                    generation,
                    state.generation
                );
                return;
            }
            state.in_flight = None;

            let failure = match result {
                Ok(layers) => {
                    state.layers = layers;
                    state.consecutive_failures = 0;
                    self.host.replace_layers(state.layers.clone());
                    log::debug!(
                        target: LOG_TARGET,
                        "Adopted parse result for generation {} ({} layers)",
                        generation,
                        state.layers.len()
                    );
                    None
                }
                Err(error) if error.is_cancelled() => {
                    log::trace!(
                        target: LOG_TARGET,
                        "Parse for generation {} cancelled",
                        generation
                    );
                    None
                }
                Err(error) => {
                    state.consecutive_failures += 1;
                    Some(ParseFailure {
                        generation,
                        consecutive_failures: state.consecutive_failures,
                        error,
                    })
                }
            };

            self.phase.send_replace(state.phase());
            failure
        };

        if let Some(failure) = failure {
            let threshold = self.settings.load().failure_report_threshold;
            if failure.consecutive_failures >= threshold {
                self.host.report_failure(&failure);
            } else {
                log::debug!(
                    target: LOG_TARGET,
                    "Parse failed for generation {} ({} in a row, below report threshold): {}",
                    failure.generation,
                    failure.consecutive_failures,
                    failure.error
                );
            }
        }
    }
}
