//! Achievement engine
//!
//! Observes application events, evaluates declarative unlock rules against
//! a bounded event log, and surfaces each unlock exactly once: one
//! transition into the unlocked set, one toast, one chime, one listener
//! callout. Rules never unlock twice, toasts never display twice, and a
//! failing collaborator (store, presenter, audio) degrades to a log line
//! instead of blocking the rest.

pub mod events;
pub mod predicate;
pub mod registry;

use std::collections::BTreeSet;
use std::mem;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use thiserror::Error;

use crate::audio::{NullChime, UnlockChime};
use crate::bus::EventBus;
use crate::clock::{Clock, SystemClock};
use crate::notify::{NullPresenter, Toast, ToastPresenter, ToastQueue};
use crate::store::{load_id_set, save_id_set, ProfileStore, UNLOCKED_KEY};

pub use events::{Event, EventLog, DEFAULT_LOG_CAPACITY};
pub use predicate::{EvalContext, Predicate, PredicateError};
pub use registry::{AchievementMeta, RegisteredAchievement};

use registry::Registry;

/// Event name that pins the session's registration timestamp.
pub const REGISTRATION_EVENT: &str = "profile:registered";

/// Tunables and collaborator handles for [`AchievementEngine`].
///
/// The defaults give a silent, headless engine on the system clock; hosts
/// override only the fields they care about.
pub struct EngineSettings {
    /// Bound on the event log; oldest entries are evicted past it.
    pub log_capacity: usize,
    /// Whether descriptions of newly registered achievements are visible
    /// before they unlock.
    pub default_description_visible: bool,
    /// Event name whose first occurrence pins the registration timestamp.
    pub registration_event: String,
    /// Time source for event stamps and toast pacing.
    pub clock: Arc<dyn Clock>,
    /// Renders toast batches.
    pub presenter: Arc<dyn ToastPresenter>,
    /// Plays the unlock sting.
    pub chime: Arc<dyn UnlockChime>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            log_capacity: DEFAULT_LOG_CAPACITY,
            default_description_visible: true,
            registration_event: REGISTRATION_EVENT.to_string(),
            clock: Arc::new(SystemClock),
            presenter: Arc::new(NullPresenter),
            chime: Arc::new(NullChime),
        }
    }
}

/// Errors from the registration surface.
///
/// Everything else the engine can get wrong degrades to a log line; an
/// id-less rule is a catalog bug, caught at startup, and so is the one
/// hard error.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("achievement id must not be empty")]
    EmptyId,
}

/// Payload delivered to unlock listeners.
#[derive(Debug, Clone)]
pub struct UnlockNotice {
    /// Achievement id that just unlocked.
    pub id: String,
    /// Display metadata at unlock time, with the description already
    /// revealed. Ids with no registered rule get a stub titled by id.
    pub meta: AchievementMeta,
}

type UnlockListener = Arc<dyn Fn(&UnlockNotice) + Send + Sync>;

/// The rule-evaluation core.
///
/// All methods take `&self`; the engine is meant to be shared behind an
/// [`Arc`] and called from any thread. Collaborator callouts (predicates,
/// listeners, presenter, store, chime) always run with no internal lock
/// held.
pub struct AchievementEngine {
    clock: Arc<dyn Clock>,
    store: Arc<dyn ProfileStore>,
    chime: Arc<dyn UnlockChime>,
    toasts: ToastQueue,
    registration_event: String,
    log: Mutex<EventLog>,
    registry: Mutex<Registry>,
    unlocked: Mutex<BTreeSet<String>>,
    in_flight: Mutex<BTreeSet<String>>,
    registered_at: Mutex<Option<u64>>,
    deferred: Mutex<Vec<String>>,
    listeners: Mutex<Vec<UnlockListener>>,
    bus: Mutex<Option<Arc<dyn EventBus>>>,
    store_gate: Mutex<()>,
}

impl AchievementEngine {
    /// Engine with default settings over the given store.
    pub fn new(store: Arc<dyn ProfileStore>) -> Self {
        Self::with_settings(store, EngineSettings::default())
    }

    /// Engine with explicit settings.
    ///
    /// Unlock and toast history previously persisted under this store is
    /// loaded up front, so an id unlocked in an earlier session stays
    /// unlocked and never re-toasts.
    pub fn with_settings(store: Arc<dyn ProfileStore>, settings: EngineSettings) -> Self {
        let unlocked = load_id_set(&*store, UNLOCKED_KEY);
        if !unlocked.is_empty() {
            log::info!("Loaded {} persisted unlocks", unlocked.len());
        }
        let toasts = ToastQueue::new(Arc::clone(&store), settings.presenter);
        Self {
            clock: settings.clock,
            store,
            chime: settings.chime,
            toasts,
            registration_event: settings.registration_event,
            log: Mutex::new(EventLog::with_capacity(settings.log_capacity)),
            registry: Mutex::new(Registry::new(settings.default_description_visible)),
            unlocked: Mutex::new(unlocked),
            in_flight: Mutex::new(BTreeSet::new()),
            registered_at: Mutex::new(None),
            deferred: Mutex::new(Vec::new()),
            listeners: Mutex::new(Vec::new()),
            bus: Mutex::new(None),
            store_gate: Mutex::new(()),
        }
    }

    // === Registration ===

    /// Register a declarative unlock rule.
    ///
    /// Returns `Ok(true)` when the rule was added and `Ok(false)` when the
    /// id was already registered; the existing rule wins, since catalog
    /// modules may re-declare defensively. A fresh rule gets one evaluation
    /// on the next [`pump`](Self::pump), so conditions already satisfied by
    /// earlier events unlock without waiting for another event.
    pub fn register<F>(
        &self,
        id: &str,
        meta: AchievementMeta,
        predicate: F,
    ) -> Result<bool, EngineError>
    where
        F: Fn(&EvalContext<'_>) -> Result<bool, PredicateError> + Send + Sync + 'static,
    {
        self.register_rule(id, meta, Arc::new(predicate))
    }

    /// [`register`](Self::register) for an already-shared predicate.
    pub fn register_rule(
        &self,
        id: &str,
        meta: AchievementMeta,
        predicate: Predicate,
    ) -> Result<bool, EngineError> {
        if id.is_empty() {
            return Err(EngineError::EmptyId);
        }
        if !self.registry.lock().insert(id, meta, predicate) {
            log::warn!("Achievement {} is already registered; keeping the existing rule", id);
            return Ok(false);
        }
        log::debug!("Registered achievement {}", id);
        if self.unlocked.lock().contains(id) {
            // the id unlocked before its rule arrived; restore the
            // unlocked-means-visible invariant instead of re-evaluating
            self.registry.lock().reveal(id);
        } else {
            self.deferred.lock().push(id.to_string());
        }
        Ok(true)
    }

    /// Change the visibility default applied to future registrations.
    /// Already-registered rules keep whatever they resolved to.
    pub fn set_default_description_visible(&self, visible: bool) {
        self.registry.lock().set_default_visible(visible);
    }

    /// Override one registered achievement's description visibility.
    /// Returns `false` for unknown ids.
    pub fn set_description_visible(&self, id: &str, visible: bool) -> bool {
        let changed = self.registry.lock().set_visible(id, visible);
        if !changed {
            log::warn!("Cannot set visibility for unknown achievement {}", id);
        }
        changed
    }

    // === Events ===

    /// Record an application event and evaluate every rule against it.
    ///
    /// The event is in the log before any predicate runs, so evaluations
    /// always see their trigger. An attached bus receives the event too,
    /// best-effort. Never fails: the name is free-form and recorded as
    /// given, and nothing a predicate or collaborator does propagates
    /// back to the caller.
    pub fn record_event(&self, name: &str, payload: Option<Value>) {
        self.record_inner(name, payload, true);
    }

    pub(crate) fn record_from_bus(&self, name: &str, payload: Option<Value>) {
        // no forwarding, or an attached bus would echo forever
        self.record_inner(name, payload, false);
    }

    fn record_inner(&self, name: &str, payload: Option<Value>, forward: bool) {
        let event = Event::new(name, payload, self.clock.now_ms());
        if name == self.registration_event {
            let mut registered_at = self.registered_at.lock();
            if registered_at.is_none() {
                *registered_at = Some(event.timestamp);
                log::info!("Registration timestamp pinned at {}", event.timestamp);
            }
        }
        self.log.lock().push(event.clone());
        if forward {
            let bus = self.bus.lock().clone();
            if let Some(bus) = bus {
                if let Err(e) = bus.publish(&event) {
                    log::debug!("Event bus refused {}: {}", event.name, e);
                }
            }
        }
        self.evaluate_all();
    }

    // === Evaluation ===

    fn evaluate_all(&self) {
        // The guard must drop before evaluation: evaluate_rule locks the
        // registry again, and a loop-header temporary lives to loop end.
        let ids = self.registry.lock().ids();
        for id in ids {
            self.evaluate_rule(&id);
        }
    }

    /// Evaluate one rule, honoring the per-id in-flight guard.
    ///
    /// The log copy is taken fresh for each rule, so auxiliary events
    /// appended by rules earlier in the same pass are visible here.
    fn evaluate_rule(&self, id: &str) -> bool {
        if self.unlocked.lock().contains(id) {
            return false;
        }
        let Some(_slot) = InFlightSlot::claim(&self.in_flight, id) else {
            return false;
        };
        let Some(predicate) = self.registry.lock().predicate_of(id) else {
            return false;
        };
        let registered_at = *self.registered_at.lock();
        let events = self.log.lock().snapshot();
        let aux = |name: &str, payload: Option<Value>| self.append_aux(name, payload);
        let ctx = EvalContext::new(&events, registered_at, &aux);
        match predicate(&ctx) {
            Ok(true) => self.commit_unlock(id),
            Ok(false) => false,
            Err(e) => {
                log::warn!("Predicate for {} failed: {}; retrying on the next event", id, e);
                false
            }
        }
    }

    /// Auxiliary events reach the live log only: no bus forwarding, no new
    /// evaluation pass, no registration-timestamp effect.
    fn append_aux(&self, name: &str, payload: Option<Value>) {
        let event = Event::new(name, payload, self.clock.now_ms());
        self.log.lock().push(event);
    }

    // === Unlocking ===

    /// Force an unlock without consulting any rule.
    ///
    /// Unknown ids unlock anyway; the unlocked set is the source of truth
    /// independent of whatever catalog happens to be loaded. Returns
    /// `false` if the id was already unlocked.
    pub fn unlock(&self, id: &str) -> bool {
        if id.is_empty() {
            log::warn!("Ignoring forced unlock with empty id");
            return false;
        }
        if !self.registry.lock().contains(id) {
            log::warn!("Forcing unlock of {} with no registered rule", id);
        }
        self.commit_unlock(id)
    }

    /// The single unlock transition.
    ///
    /// The insert into the unlocked set is the at-most-once gate: whoever
    /// loses the race (a concurrent forced unlock, a stale evaluation)
    /// sees `false` and skips every side effect. The set is persisted
    /// before anything user-visible happens.
    fn commit_unlock(&self, id: &str) -> bool {
        if !self.unlocked.lock().insert(id.to_string()) {
            return false;
        }
        self.persist_unlocked();
        let meta = self
            .registry
            .lock()
            .reveal(id)
            .unwrap_or_else(|| AchievementMeta::new(id, ""));
        log::info!("Achievement unlocked: {}", id);
        self.chime.play();
        self.toasts
            .enqueue(Toast::new(id, meta.title.clone(), meta.description.clone()));
        let notice = UnlockNotice {
            id: id.to_string(),
            meta,
        };
        let listeners: Vec<UnlockListener> = self.listeners.lock().clone();
        for listener in &listeners {
            listener(&notice);
        }
        true
    }

    /// Persist the unlocked set. The gate serializes writers and the
    /// snapshot is taken inside it, so a later write always carries a
    /// superset of an earlier one.
    fn persist_unlocked(&self) {
        let _gate = self.store_gate.lock();
        let snapshot = self.unlocked.lock().clone();
        save_id_set(&*self.store, UNLOCKED_KEY, &snapshot);
    }

    /// Forget every unlock, the whole event log, and the toast history, in
    /// memory and in the store, and clear anything currently displayed.
    ///
    /// Returns `false` if either persisted collection could not be
    /// removed; the in-memory reset happens regardless. The registration
    /// timestamp is deliberately left alone.
    pub fn clear_all(&self) -> bool {
        let unlocked_cleared = {
            let _gate = self.store_gate.lock();
            self.unlocked.lock().clear();
            self.log.lock().clear();
            match self.store.remove(UNLOCKED_KEY) {
                Ok(()) => true,
                Err(e) => {
                    log::warn!("Could not clear persisted unlocks: {}", e);
                    false
                }
            }
        };
        let toasts_cleared = self.toasts.reset();
        log::info!("Achievement state cleared");
        unlocked_cleared && toasts_cleared
    }

    // === Timing ===

    /// Drive deferred work: one-shot evaluations scheduled by
    /// registration, then the toast pipeline. Hosts call this once per
    /// frame or timer tick with the current clock reading.
    pub fn pump(&self, now_ms: u64) {
        let deferred = mem::take(&mut *self.deferred.lock());
        for id in deferred {
            self.evaluate_rule(&id);
        }
        self.toasts.pump(now_ms);
    }

    /// [`pump`](Self::pump) against the engine's own clock.
    pub fn tick(&self) {
        self.pump(self.clock.now_ms());
    }

    // === Queries ===

    /// True when the id is unlocked for the current profile.
    pub fn is_unlocked(&self, id: &str) -> bool {
        self.unlocked.lock().contains(id)
    }

    /// Defensive copy of the unlocked set.
    pub fn unlocked(&self) -> BTreeSet<String> {
        self.unlocked.lock().clone()
    }

    /// Snapshot of every registered achievement with its unlock state,
    /// ordered by id. Metadata is copied; mutating it changes nothing.
    pub fn list_registered(&self) -> Vec<RegisteredAchievement> {
        let unlocked = self.unlocked.lock().clone();
        self.registry.lock().snapshot(&unlocked)
    }

    /// Timestamp of the first registration event this session, if any.
    pub fn registered_at(&self) -> Option<u64> {
        *self.registered_at.lock()
    }

    /// Milliseconds since the registration event, floored at zero, or
    /// `None` if no registration event was recorded. `at_ms` defaults to
    /// the engine clock's current reading.
    pub fn elapsed_since_registered(&self, at_ms: Option<u64>) -> Option<u64> {
        let registered = (*self.registered_at.lock())?;
        let at = at_ms.unwrap_or_else(|| self.clock.now_ms());
        Some(at.saturating_sub(registered))
    }

    /// Copy of the current event log, oldest first.
    pub fn events(&self) -> Vec<Event> {
        self.log.lock().snapshot()
    }

    /// Number of events currently held.
    pub fn event_count(&self) -> usize {
        self.log.lock().len()
    }

    /// Whether a toast for this id has ever been displayed.
    pub fn has_toasted(&self, id: &str) -> bool {
        self.toasts.has_shown(id)
    }

    /// Toasts currently on screen.
    pub fn displayed_toasts(&self) -> Vec<Toast> {
        self.toasts.displayed()
    }

    /// Number of toasts waiting for the next batch.
    pub fn pending_toasts(&self) -> usize {
        self.toasts.pending_len()
    }

    // === Listeners and bus ===

    /// Listen for unlocks. Listeners run on whichever thread commits the
    /// unlock, after state is persisted and with no engine lock held, so
    /// they may call back into the engine.
    pub fn on_unlock<F>(&self, listener: F)
    where
        F: Fn(&UnlockNotice) + Send + Sync + 'static,
    {
        self.listeners.lock().push(Arc::new(listener));
    }

    /// Forward every recorded event to this bus from now on. Usually
    /// wired both ways through [`crate::bus::attach`].
    pub fn set_bus(&self, bus: Arc<dyn EventBus>) {
        *self.bus.lock() = Some(bus);
    }

    /// Stop forwarding to the attached bus, if any.
    pub fn detach_bus(&self) {
        *self.bus.lock() = None;
    }
}

/// Claim on an id's single evaluation slot. Released on drop, so a
/// panicking predicate cannot leave its id permanently stuck.
struct InFlightSlot<'a> {
    marks: &'a Mutex<BTreeSet<String>>,
    id: String,
}

impl<'a> InFlightSlot<'a> {
    fn claim(marks: &'a Mutex<BTreeSet<String>>, id: &str) -> Option<Self> {
        if marks.lock().insert(id.to_string()) {
            Some(Self {
                marks,
                id: id.to_string(),
            })
        } else {
            None
        }
    }
}

impl Drop for InFlightSlot<'_> {
    fn drop(&mut self) {
        self.marks.lock().remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::{MemoryStore, StoreError, TOASTED_KEY};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    fn engine_over(store: Arc<MemoryStore>) -> (Arc<AchievementEngine>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::starting_at(1_000));
        let settings = EngineSettings {
            clock: clock.clone(),
            ..EngineSettings::default()
        };
        let engine = Arc::new(AchievementEngine::with_settings(store, settings));
        (engine, clock)
    }

    fn engine() -> (Arc<AchievementEngine>, Arc<ManualClock>) {
        engine_over(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn event_unlocks_matching_rule() {
        let (engine, _) = engine();
        let notices: Arc<Mutex<Vec<UnlockNotice>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = notices.clone();
        engine.on_unlock(move |notice| sink.lock().push(notice.clone()));

        let meta = AchievementMeta::new("First Step", "Saw an x");
        engine
            .register("first-step", meta, |ctx: &EvalContext<'_>| Ok(ctx.seen("x")))
            .unwrap();

        assert!(!engine.is_unlocked("first-step"));
        engine.record_event("x", None);

        assert!(engine.is_unlocked("first-step"));
        assert_eq!(engine.pending_toasts(), 1);
        let notices = notices.lock();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].id, "first-step");
        assert_eq!(notices[0].meta.title, "First Step");
    }

    #[test]
    fn repeat_events_unlock_once() {
        let (engine, _) = engine();
        let unlocks = Arc::new(AtomicUsize::new(0));
        let counter = unlocks.clone();
        engine.on_unlock(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        engine
            .register(
                "steady",
                AchievementMeta::new("Steady", ""),
                |ctx: &EvalContext<'_>| Ok(ctx.seen("x")),
            )
            .unwrap();
        for _ in 0..5 {
            engine.record_event("x", None);
        }

        assert_eq!(unlocks.load(Ordering::SeqCst), 1);
        assert_eq!(engine.pending_toasts(), 1);
        assert_eq!(engine.unlocked().len(), 1);
    }

    // A worker thread does the recording so a registry lock held across
    // the evaluation pass shows up as a timeout instead of a hung suite.
    #[test]
    fn record_event_returns_with_rules_registered() {
        let (engine, _) = engine();
        engine
            .register(
                "first",
                AchievementMeta::new("First", ""),
                |ctx: &EvalContext<'_>| Ok(ctx.seen("x")),
            )
            .unwrap();
        engine
            .register(
                "second",
                AchievementMeta::new("Second", ""),
                |ctx: &EvalContext<'_>| Ok(ctx.seen("never")),
            )
            .unwrap();

        let (done_tx, done_rx) = mpsc::channel();
        let recorder = engine.clone();
        thread::spawn(move || {
            recorder.record_event("x", None);
            let _ = done_tx.send(());
        });

        done_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("record_event must return while rules are registered");
        assert!(engine.is_unlocked("first"));
        assert!(!engine.is_unlocked("second"));
    }

    #[test]
    fn empty_id_registration_is_refused() {
        let (engine, _) = engine();
        let result = engine.register("", AchievementMeta::new("Nameless", ""), |_: &EvalContext<'_>| {
            Ok(true)
        });
        assert!(matches!(result, Err(EngineError::EmptyId)));
        assert!(engine.list_registered().is_empty());
    }

    #[test]
    fn duplicate_registration_keeps_the_first_rule() {
        let (engine, _) = engine();
        engine
            .register(
                "dup",
                AchievementMeta::new("Original", ""),
                |_: &EvalContext<'_>| Ok(false),
            )
            .unwrap();
        let second = engine
            .register(
                "dup",
                AchievementMeta::new("Impostor", ""),
                |_: &EvalContext<'_>| Ok(true),
            )
            .unwrap();

        assert!(!second);
        engine.record_event("anything", None);
        assert!(!engine.is_unlocked("dup"), "the first predicate must win");

        let listed = engine.list_registered();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].meta.title, "Original");
    }

    #[test]
    fn re_registration_does_not_reset_unlocked_state() {
        let (engine, _) = engine();
        engine
            .register("done", AchievementMeta::new("Done", ""), |_: &EvalContext<'_>| {
                Ok(false)
            })
            .unwrap();
        engine.unlock("done");

        engine
            .register("done", AchievementMeta::new("Done again", ""), |_: &EvalContext<'_>| {
                Ok(false)
            })
            .unwrap();
        assert!(engine.is_unlocked("done"));
    }

    #[test]
    fn registration_after_events_unlocks_on_pump() {
        let (engine, clock) = engine();
        engine.record_event("early", None);

        engine
            .register(
                "latecomer",
                AchievementMeta::new("Latecomer", ""),
                |ctx: &EvalContext<'_>| Ok(ctx.seen("early")),
            )
            .unwrap();
        assert!(
            !engine.is_unlocked("latecomer"),
            "registration alone must not evaluate"
        );

        clock.advance(16);
        engine.tick();
        assert!(engine.is_unlocked("latecomer"));
    }

    #[test]
    fn registration_timestamp_is_first_writer_wins() {
        let (engine, clock) = engine();
        assert_eq!(engine.registered_at(), None);
        assert_eq!(engine.elapsed_since_registered(None), None);

        engine.record_event(REGISTRATION_EVENT, None);
        assert_eq!(engine.registered_at(), Some(1_000));

        clock.set(4_000);
        engine.record_event(REGISTRATION_EVENT, None);
        assert_eq!(engine.registered_at(), Some(1_000), "later events do not move it");

        clock.set(6_000);
        assert_eq!(engine.elapsed_since_registered(None), Some(5_000));
        assert_eq!(engine.elapsed_since_registered(Some(1_250)), Some(250));
        assert_eq!(engine.elapsed_since_registered(Some(500)), Some(0));
    }

    #[test]
    fn aux_events_reach_later_rules_in_the_same_pass() {
        let (engine, _) = engine();
        // registry iterates in id order, so a_scout runs before b_follower
        engine
            .register(
                "a_scout",
                AchievementMeta::new("Scout", ""),
                |ctx: &EvalContext<'_>| {
                    if ctx.seen("x") && !ctx.seen("bridge") {
                        ctx.record_aux("bridge", None);
                    }
                    Ok(false)
                },
            )
            .unwrap();
        engine
            .register(
                "b_follower",
                AchievementMeta::new("Follower", ""),
                |ctx: &EvalContext<'_>| Ok(ctx.seen("bridge")),
            )
            .unwrap();

        engine.record_event("x", None);

        assert!(!engine.is_unlocked("a_scout"));
        assert!(engine.is_unlocked("b_follower"));
        assert_eq!(engine.event_count(), 2, "the aux event is in the live log");
    }

    #[test]
    fn forced_unlock_of_unknown_id() {
        let (engine, _) = engine();
        let notices: Arc<Mutex<Vec<UnlockNotice>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = notices.clone();
        engine.on_unlock(move |notice| sink.lock().push(notice.clone()));

        assert!(engine.unlock("mystery"));
        assert!(engine.is_unlocked("mystery"));
        assert!(engine.list_registered().is_empty());
        assert!(!engine.unlock("mystery"), "second force is a no-op");

        let notices = notices.lock();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].meta.title, "mystery");
    }

    #[test]
    fn unlock_reveals_hidden_description() {
        let (engine, _) = engine();
        engine
            .register(
                "secret",
                AchievementMeta::new("Secret", "How did you find this").hidden(),
                |_: &EvalContext<'_>| Ok(false),
            )
            .unwrap();
        assert!(!engine.list_registered()[0].meta.is_description_visible());

        engine.unlock("secret");
        assert!(engine.list_registered()[0].meta.is_description_visible());
    }

    #[test]
    fn visibility_default_applies_at_registration_time() {
        let (engine, _) = engine();
        engine.set_default_description_visible(false);
        engine
            .register("shy", AchievementMeta::new("Shy", "hidden"), |_: &EvalContext<'_>| {
                Ok(false)
            })
            .unwrap();
        engine.set_default_description_visible(true);
        engine
            .register("bold", AchievementMeta::new("Bold", "shown"), |_: &EvalContext<'_>| {
                Ok(false)
            })
            .unwrap();

        let listed = engine.list_registered();
        assert!(!listed[1].meta.is_description_visible(), "shy stays hidden");
        assert!(listed[0].meta.is_description_visible());

        assert!(engine.set_description_visible("shy", true));
        assert!(!engine.set_description_visible("nobody", true));
    }

    #[test]
    fn clear_all_resets_state_and_allows_re_unlock() {
        let store = Arc::new(MemoryStore::new());
        let (engine, _) = engine_over(store.clone());
        engine
            .register("again", AchievementMeta::new("Again", ""), |_: &EvalContext<'_>| {
                Ok(false)
            })
            .unwrap();
        engine.record_event(REGISTRATION_EVENT, None);
        engine.unlock("again");
        engine.unlock("loose-end");
        assert_eq!(engine.pending_toasts(), 2);

        assert!(engine.clear_all());
        assert!(engine.unlocked().is_empty());
        assert_eq!(engine.event_count(), 0);
        assert_eq!(engine.pending_toasts(), 0);
        assert!(store.get(UNLOCKED_KEY).is_none());
        assert!(store.get(TOASTED_KEY).is_none());
        // the registration timestamp survives a reset
        assert_eq!(engine.registered_at(), Some(1_000));

        // previously-unlocked ids can unlock and toast again
        assert!(engine.unlock("again"));
        assert_eq!(engine.pending_toasts(), 1);
    }

    #[test]
    fn persisted_unlocks_survive_reload() {
        let store = Arc::new(MemoryStore::new());
        {
            let (engine, _) = engine_over(store.clone());
            engine.unlock("kept");
        }
        let (reloaded, _) = engine_over(store);
        assert!(reloaded.is_unlocked("kept"));
        assert!(!reloaded.unlock("kept"), "already unlocked after reload");
    }

    #[test]
    fn numeric_ids_in_storage_are_read_as_strings() {
        let store = Arc::new(MemoryStore::new());
        store.set(UNLOCKED_KEY, "[7, \"eight\"]").unwrap();
        let (engine, _) = engine_over(store);
        assert!(engine.is_unlocked("7"));
        assert!(engine.is_unlocked("eight"));
    }

    #[test]
    fn a_failing_store_never_blocks_unlocks() {
        struct BrokenStore;

        impl ProfileStore for BrokenStore {
            fn get(&self, _key: &str) -> Option<String> {
                None
            }
            fn set(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
                Err(StoreError::Io("disk on fire".into()))
            }
            fn remove(&self, _key: &str) -> Result<(), StoreError> {
                Err(StoreError::Io("disk on fire".into()))
            }
        }

        let clock = Arc::new(ManualClock::starting_at(0));
        let settings = EngineSettings {
            clock: clock.clone(),
            ..EngineSettings::default()
        };
        let engine = AchievementEngine::with_settings(Arc::new(BrokenStore), settings);
        engine
            .register(
                "undaunted",
                AchievementMeta::new("Undaunted", ""),
                |ctx: &EvalContext<'_>| Ok(ctx.seen("x")),
            )
            .unwrap();

        engine.record_event("x", None);
        assert!(engine.is_unlocked("undaunted"));
        assert_eq!(engine.pending_toasts(), 1);

        engine.tick();
        assert_eq!(
            engine.displayed_toasts().len(),
            1,
            "toasts display without persistence"
        );

        assert!(!engine.clear_all(), "failed removals are reported");
        assert!(engine.unlocked().is_empty(), "memory is cleared anyway");
    }

    #[test]
    fn predicate_errors_are_swallowed_and_retried() {
        let (engine, _) = engine();
        let attempts = Arc::new(AtomicUsize::new(0));
        let seen = attempts.clone();
        engine
            .register(
                "flaky",
                AchievementMeta::new("Flaky", ""),
                move |_: &EvalContext<'_>| {
                    if seen.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(PredicateError::msg("payload was garbage"))
                    } else {
                        Ok(true)
                    }
                },
            )
            .unwrap();
        engine
            .register(
                "solid",
                AchievementMeta::new("Solid", ""),
                |ctx: &EvalContext<'_>| Ok(ctx.seen("x")),
            )
            .unwrap();

        engine.record_event("x", None);
        assert!(!engine.is_unlocked("flaky"), "first attempt failed");
        assert!(engine.is_unlocked("solid"), "other rules are unaffected");

        engine.record_event("x", None);
        assert!(engine.is_unlocked("flaky"), "retried on the next event");
    }

    #[test]
    fn payload_fields_are_readable_defensively() {
        let (engine, _) = engine();
        engine
            .register(
                "high-score",
                AchievementMeta::new("High Score", ""),
                |ctx: &EvalContext<'_>| {
                    let best = ctx
                        .events()
                        .iter()
                        .filter(|e| e.name == "score")
                        .filter_map(|e| e.field("points").and_then(Value::as_u64))
                        .max()
                        .unwrap_or(0);
                    Ok(best >= 100)
                },
            )
            .unwrap();

        engine.record_event("score", Some(json!({ "points": 40 })));
        engine.record_event("score", None); // payload missing entirely
        assert!(!engine.is_unlocked("high-score"));
        engine.record_event("score", Some(json!({ "points": 120 })));
        assert!(engine.is_unlocked("high-score"));
    }

    #[test]
    fn event_names_are_free_form() {
        let (engine, _) = engine();
        engine
            .register(
                "nameless",
                AchievementMeta::new("Nameless", ""),
                |ctx: &EvalContext<'_>| Ok(ctx.seen("")),
            )
            .unwrap();

        engine.record_event("", None);
        assert_eq!(engine.event_count(), 1, "empty names are recorded as given");
        assert!(engine.is_unlocked("nameless"));
    }

    #[test]
    fn toast_batch_flows_through_pump() {
        let (engine, clock) = engine();
        engine.unlock("one");
        engine.unlock("two");
        assert_eq!(engine.pending_toasts(), 2);
        assert!(engine.displayed_toasts().is_empty());

        engine.tick();
        assert_eq!(engine.pending_toasts(), 0);
        assert_eq!(engine.displayed_toasts().len(), 2);
        assert!(engine.has_toasted("one"));
        assert!(engine.has_toasted("two"));

        clock.advance(10_000);
        engine.tick();
        clock.advance(1_000);
        engine.tick();
        assert!(engine.displayed_toasts().is_empty());
    }
}
