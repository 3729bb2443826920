//! Toast notification queue
//!
//! Unlock notifications are rendered in synchronized batches: everything
//! pending when the queue goes idle is captured as one batch, shown
//! together, hidden together, and torn down together. An id that has ever
//! shown a toast is recorded (and persisted) so it can never show again,
//! even across reloads.

pub mod presenter;

use std::collections::BTreeSet;
use std::mem;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::store::{load_id_set, save_id_set, ProfileStore, TOASTED_KEY};

pub use presenter::{NullPresenter, PresenterError, TerminalPresenter, ToastPresenter};

/// Shortest time a batch stays fully visible, in milliseconds.
pub const MIN_DISPLAY_MS: u64 = 2_800;
/// Display window for a toast that does not request its own duration.
pub const DEFAULT_TOAST_MS: u64 = 3_000;
/// Delay between the hide transition starting and the batch being removed.
pub const TEARDOWN_MS: u64 = 400;

/// One toast card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    /// Achievement id used for never-show-twice bookkeeping. An empty id
    /// opts out of deduplication.
    pub id: String,
    /// Headline, usually the achievement title.
    pub title: String,
    /// Supporting line, usually the achievement description.
    pub body: String,
    /// Per-card display duration override.
    pub duration_ms: Option<u64>,
}

impl Toast {
    pub fn new(id: impl Into<String>, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            body: body.into(),
            duration_ms: None,
        }
    }

    /// Request a specific display duration for this card.
    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    fn display_window(&self) -> u64 {
        self.duration_ms.unwrap_or(DEFAULT_TOAST_MS)
    }
}

/// Delivery state. A batch in `Visible` or `Fading` blocks the next batch
/// until its teardown finishes; pending cards wait in the queue meanwhile.
enum Phase {
    Idle,
    Visible { batch: Vec<Toast>, hide_at: u64 },
    Fading { batch: Vec<Toast>, remove_at: u64 },
}

/// One pump iteration, decided under the phase lock and acted on after it
/// is released so presenter callbacks never run with the lock held.
enum Step {
    Wait,
    Drain,
    Hide(Vec<Toast>),
    Remove(Vec<Toast>),
}

/// Batching toast pipeline with at-most-once display per id.
///
/// Timing is driven by [`ToastQueue::pump`], which the host calls once per
/// frame or tick with the current clock reading. Presenter callbacks run
/// with no queue lock held, so a presenter may enqueue cards or read queue
/// state from inside a callback; a nested `pump` is a no-op, and `reset`
/// must not be called from a callback.
pub struct ToastQueue {
    store: Arc<dyn ProfileStore>,
    presenter: Arc<dyn ToastPresenter>,
    pending: Mutex<Vec<Toast>>,
    phase: Mutex<Phase>,
    // serializes pump passes and lets reset wait out an in-flight one
    pump_gate: Mutex<()>,
    recent: Mutex<BTreeSet<String>>,
}

impl ToastQueue {
    /// Build a queue over the given store and presenter. Ids that already
    /// showed a toast under this store are loaded so they stay suppressed
    /// across reloads.
    pub fn new(store: Arc<dyn ProfileStore>, presenter: Arc<dyn ToastPresenter>) -> Self {
        let recent = load_id_set(&*store, TOASTED_KEY);
        Self {
            store,
            presenter,
            pending: Mutex::new(Vec::new()),
            phase: Mutex::new(Phase::Idle),
            pump_gate: Mutex::new(()),
            recent: Mutex::new(recent),
        }
    }

    /// Queue a toast for the next batch.
    ///
    /// A card whose id has ever been displayed (in this session or a
    /// persisted earlier one) is dropped silently.
    pub fn enqueue(&self, toast: Toast) {
        if !toast.id.is_empty() && self.recent.lock().contains(&toast.id) {
            log::debug!("toast for {} suppressed; it was already shown once", toast.id);
            return;
        }
        self.pending.lock().push(toast);
    }

    /// Advance the delivery state machine against the current time.
    ///
    /// Idle with pending cards: capture the entire pending queue as one
    /// batch (cards enqueued afterwards start a fresh queue), record and
    /// persist every batched id, and show all cards at once. The batch
    /// hides together after the longest requested duration (floored at
    /// [`MIN_DISPLAY_MS`]) and is removed [`TEARDOWN_MS`] later, after
    /// which the queue immediately drains again.
    pub fn pump(&self, now_ms: u64) {
        // Single-flight: a pump already in progress owns the transition.
        let Some(_running) = self.pump_gate.try_lock() else {
            return;
        };

        loop {
            let step = {
                let mut phase = self.phase.lock();
                match mem::replace(&mut *phase, Phase::Idle) {
                    Phase::Idle => Step::Drain,
                    Phase::Visible { batch, hide_at } => {
                        if now_ms < hide_at {
                            *phase = Phase::Visible { batch, hide_at };
                            Step::Wait
                        } else {
                            // teardown is scheduled from the hide deadline,
                            // not from whenever this pump happened to run
                            *phase = Phase::Fading {
                                batch: batch.clone(),
                                remove_at: hide_at + TEARDOWN_MS,
                            };
                            Step::Hide(batch)
                        }
                    }
                    Phase::Fading { batch, remove_at } => {
                        if now_ms < remove_at {
                            *phase = Phase::Fading { batch, remove_at };
                            Step::Wait
                        } else {
                            Step::Remove(batch)
                        }
                    }
                }
            };

            match step {
                Step::Wait => return,
                Step::Drain => {
                    let batch = self.take_batch();
                    if batch.is_empty() {
                        return;
                    }
                    let window = batch
                        .iter()
                        .map(Toast::display_window)
                        .max()
                        .unwrap_or(DEFAULT_TOAST_MS)
                        .max(MIN_DISPLAY_MS);
                    // published before show, so the presenter already sees
                    // its batch as displayed
                    *self.phase.lock() = Phase::Visible {
                        batch: batch.clone(),
                        hide_at: now_ms + window,
                    };
                    if let Err(e) = self.presenter.show(&batch) {
                        log::warn!("toast batch failed to render: {e}");
                    }
                    return;
                }
                Step::Hide(batch) => {
                    if let Err(e) = self.presenter.hide(&batch) {
                        log::warn!("toast batch failed to start hiding: {e}");
                    }
                }
                Step::Remove(batch) => {
                    if let Err(e) = self.presenter.remove(&batch) {
                        log::warn!("toast batch failed to tear down: {e}");
                    }
                    // phase is Idle; loop once more to pick up anything
                    // queued while this batch was displaying
                }
            }
        }
    }

    /// Capture the pending queue as one batch, recording every id.
    ///
    /// Ids are persisted before anything renders, so a crash or reload
    /// mid-batch cannot re-show already-batched toasts. A card whose id
    /// was already recorded is dropped here even if it slipped past the
    /// enqueue check.
    fn take_batch(&self) -> Vec<Toast> {
        let pending = mem::take(&mut *self.pending.lock());
        let mut batch = Vec::with_capacity(pending.len());
        let mut recorded = false;
        for toast in pending {
            if toast.id.is_empty() {
                batch.push(toast);
                continue;
            }
            if !self.recent.lock().insert(toast.id.clone()) {
                log::debug!("dropping duplicate toast for {} from batch", toast.id);
                continue;
            }
            recorded = true;
            batch.push(toast);
        }
        if recorded {
            self.persist_recent();
        }
        batch
    }

    fn persist_recent(&self) {
        let snapshot = self.recent.lock().clone();
        save_id_set(&*self.store, TOASTED_KEY, &snapshot);
    }

    /// Forget everything: pending cards, the displayed batch, the
    /// shown-once record (memory and store). Returns `false` if the
    /// persisted record could not be removed; memory is cleared anyway.
    pub fn reset(&self) -> bool {
        // waits out an in-flight pump so a cleared batch cannot reappear
        let _running = self.pump_gate.lock();
        self.pending.lock().clear();
        *self.phase.lock() = Phase::Idle;
        self.recent.lock().clear();
        let removed = match self.store.remove(TOASTED_KEY) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("could not clear persisted toast record: {e}");
                false
            }
        };
        if let Err(e) = self.presenter.clear() {
            log::warn!("presenter failed to clear displayed toasts: {e}");
        }
        removed
    }

    /// Cards currently on screen (visible or mid-teardown).
    pub fn displayed(&self) -> Vec<Toast> {
        match &*self.phase.lock() {
            Phase::Idle => Vec::new(),
            Phase::Visible { batch, .. } | Phase::Fading { batch, .. } => batch.clone(),
        }
    }

    /// Number of cards waiting for the next batch.
    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }

    /// True when nothing is displayed and nothing is waiting.
    pub fn is_idle(&self) -> bool {
        matches!(*self.phase.lock(), Phase::Idle) && self.pending.lock().is_empty()
    }

    /// Whether this id has ever been displayed for the current profile.
    pub fn has_shown(&self, id: &str) -> bool {
        self.recent.lock().contains(id)
    }
}
