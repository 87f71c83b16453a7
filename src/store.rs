use std::cell::RefCell;
use std::rc::Rc;
use std::time::Instant;

use crate::clock::Clock;
use crate::coalesce::{AddBatcher, WriteCoalescer};
use crate::error::Result;
use crate::mirror::MirrorStore;
use crate::record::{SettingId, SettingPatch, SettingRecord};
use crate::reducer::{StateAction, reduce};
use crate::registry::{ObserverRegistry, Subscription};
use crate::source::{ObservationHandle, SettingsSource, SourceObserver};

/// Immutable view of the store handed to listeners and derived views.
#[derive(Debug, Clone)]
pub struct StoreSnapshot {
    /// Whether the source is still initializing.
    pub is_loading: bool,
    /// Live collection, possibly user-edited, sorted by
    /// (section, sorter, label).
    pub state: Rc<Vec<SettingRecord>>,
    /// Server-synchronized baseline, same ordering and id set.
    pub persisted_state: Rc<Vec<SettingRecord>>,
}

struct CoreState {
    is_loading: bool,
    live: Vec<SettingRecord>,
    persisted: Vec<SettingRecord>,
    mirror: MirrorStore,
    add_batcher: AddBatcher,
    write_coalescer: WriteCoalescer,
}

pub(crate) struct StoreCore {
    state: RefCell<CoreState>,
    registry: Rc<ObserverRegistry>,
    clock: Rc<dyn Clock>,
}

impl StoreCore {
    fn new(clock: Rc<dyn Clock>) -> Self {
        Self {
            state: RefCell::new(CoreState {
                is_loading: true,
                live: Vec::new(),
                persisted: Vec::new(),
                mirror: MirrorStore::new(),
                add_batcher: AddBatcher::new(),
                write_coalescer: WriteCoalescer::new(),
            }),
            registry: Rc::new(ObserverRegistry::new()),
            clock,
        }
    }

    fn snapshot(&self) -> StoreSnapshot {
        let state = self.state.borrow();
        StoreSnapshot {
            is_loading: state.is_loading,
            state: Rc::new(state.live.clone()),
            persisted_state: Rc::new(state.persisted.clone()),
        }
    }

    // Listeners run with no outstanding borrow, so they may re-enter the
    // store (snapshot, hydrate, unsubscribe) freely.
    fn notify(&self) {
        let snapshot = self.snapshot();
        self.registry.notify(&snapshot);
    }

    fn subscribe(&self, listener: impl Fn(&StoreSnapshot) + 'static) -> Subscription {
        let id = self.registry.add(Rc::new(listener));
        Subscription::new(Rc::clone(&self.registry), id)
    }

    fn set_loaded(&self) {
        self.state.borrow_mut().is_loading = false;
        self.notify();
    }

    fn source_added(&self, record: SettingRecord) {
        let now = self.clock.now();
        let mut state = self.state.borrow_mut();
        state.mirror.insert(record.clone());
        state.add_batcher.push(record, now);
    }

    fn source_changed(&self, record: SettingRecord) {
        {
            let mut state = self.state.borrow_mut();
            state.mirror.update(record.clone());
            let action = StateAction::Change(record);
            reduce(&mut state.live, &action);
            reduce(&mut state.persisted, &action);
        }
        self.notify();
    }

    fn source_removed(&self, id: &SettingId) {
        {
            let mut state = self.state.borrow_mut();
            state.mirror.remove(id);
            let action = StateAction::Remove(id.clone());
            reduce(&mut state.live, &action);
            reduce(&mut state.persisted, &action);
        }
        self.notify();
    }

    fn hydrate(&self, changes: Vec<SettingPatch>) {
        {
            let mut state = self.state.borrow_mut();
            let now = self.clock.now();
            for patch in &changes {
                state.write_coalescer.push(patch.clone(), now);
            }
            let action = StateAction::Hydrate(changes);
            reduce(&mut state.live, &action);
        }
        self.notify();
    }

    fn is_disabled(&self, setting: &SettingRecord) -> Result<bool> {
        if setting.blocked {
            return Ok(true);
        }

        let Some(enable_query) = &setting.enable_query else {
            return Ok(false);
        };

        let queries = enable_query.queries()?;
        let state = self.state.borrow();
        Ok(!queries
            .iter()
            .all(|query| state.mirror.find_one(query).is_some()))
    }

    fn tick_at(&self, now: Instant) {
        let committed = {
            let mut state = self.state.borrow_mut();
            let batch = state.add_batcher.flush_due(now);
            let committed = match batch {
                Some(batch) => {
                    let action = StateAction::Add(batch);
                    reduce(&mut state.live, &action);
                    reduce(&mut state.persisted, &action);
                    true
                },
                None => false,
            };
            for patch in state.write_coalescer.flush_due(now) {
                state.mirror.update_fields(&patch);
            }
            committed
        };
        if committed {
            self.notify();
        }
    }

    fn flush(&self) {
        let committed = {
            let mut state = self.state.borrow_mut();
            let batch = state.add_batcher.flush();
            let committed = match batch {
                Some(batch) => {
                    let action = StateAction::Add(batch);
                    reduce(&mut state.live, &action);
                    reduce(&mut state.persisted, &action);
                    true
                },
                None => false,
            };
            for patch in state.write_coalescer.flush() {
                state.mirror.update_fields(&patch);
            }
            committed
        };
        if committed {
            self.notify();
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        let state = self.state.borrow();
        match (
            state.add_batcher.next_deadline(),
            state.write_coalescer.next_deadline(),
        ) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (deadline, None) | (None, deadline) => deadline,
        }
    }

    fn clear_pending(&self) {
        let mut state = self.state.borrow_mut();
        state.add_batcher.clear();
        state.write_coalescer.clear();
    }
}

/// Cloneable read/write surface over a running [`SettingsStore`].
///
/// Derived views and selectors hold one of these; the store itself keeps
/// ownership of the source and the observation lifecycle.
#[derive(Clone)]
pub struct StoreHandle {
    core: Rc<StoreCore>,
}

impl StoreHandle {
    /// Current state snapshot.
    pub fn snapshot(&self) -> StoreSnapshot {
        self.core.snapshot()
    }

    /// Register a listener invoked synchronously after every committed
    /// state transition. Dropping the returned guard unsubscribes.
    pub fn subscribe(&self, listener: impl Fn(&StoreSnapshot) + 'static) -> Subscription {
        self.core.subscribe(listener)
    }

    /// Apply a batch of value changes: each patch is written to the live
    /// collection immediately and queued as a coalesced mirror write.
    pub fn hydrate(&self, changes: Vec<SettingPatch>) {
        self.core.hydrate(changes);
    }

    /// Whether the setting is currently non-editable: blocked, or carrying
    /// an enable condition that the mirror does not satisfy. A malformed
    /// JSON-encoded condition is an error.
    pub fn is_disabled(&self, setting: &SettingRecord) -> Result<bool> {
        self.core.is_disabled(setting)
    }
}

/// Reactive settings store.
///
/// Mirrors the source collection into a live and a persisted ordered
/// collection. `added` events are debounced into one batch; `changed` and
/// `removed` commit immediately; [`hydrate`](StoreHandle::hydrate) patches
/// the live collection and coalesces mirror writes per identifier.
///
/// The embedder drives time: sleep until
/// [`next_deadline`](SettingsStore::next_deadline) and call
/// [`tick`](SettingsStore::tick).
pub struct SettingsStore {
    core: Rc<StoreCore>,
    source: Box<dyn SettingsSource>,
    observation: Option<Box<dyn ObservationHandle>>,
}

struct StoreObserver {
    core: Rc<StoreCore>,
}

impl SourceObserver for StoreObserver {
    fn added(&self, record: SettingRecord) {
        self.core.source_added(record);
    }

    fn changed(&self, record: SettingRecord) {
        self.core.source_changed(record);
    }

    fn removed(&self, id: &SettingId) {
        self.core.source_removed(id);
    }
}

impl SettingsStore {
    /// Create a store over the given source; observation starts on
    /// [`init`](SettingsStore::init).
    pub fn new(source: Box<dyn SettingsSource>, clock: Rc<dyn Clock>) -> Self {
        Self {
            core: Rc::new(StoreCore::new(clock)),
            source,
            observation: None,
        }
    }

    /// Initialize the source and start observing. Initialization failure
    /// is logged and swallowed; loading ends either way.
    pub fn init(&mut self) {
        if self.observation.is_some() {
            return;
        }

        if let Err(err) = self.source.init() {
            log::warn!("settings source init failed: {err}");
        }
        self.core.set_loaded();

        let observer: Rc<dyn SourceObserver> = Rc::new(StoreObserver {
            core: Rc::clone(&self.core),
        });
        self.observation = Some(self.source.observe(observer));
    }

    /// Shared surface for views, selectors and other consumers.
    pub fn handle(&self) -> StoreHandle {
        StoreHandle {
            core: Rc::clone(&self.core),
        }
    }

    /// Flush whatever batching deadlines have passed.
    pub fn tick(&self) {
        self.core.tick_at(self.core.clock.now());
    }

    /// Flush all pending batches and writes regardless of deadlines.
    pub fn flush(&self) {
        self.core.flush();
    }

    /// Earliest pending batching deadline, for the embedder's poll
    /// timeout.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.core.next_deadline()
    }

    /// Stop observation and drop pending batches. Idempotent.
    pub fn dispose(&mut self) {
        if let Some(mut observation) = self.observation.take() {
            observation.stop();
        }
        self.core.clear_pending();
    }
}

impl Drop for SettingsStore {
    fn drop(&mut self) {
        self.dispose();
    }
}
