use std::rc::Rc;

use crate::error::Result;
use crate::record::{SettingId, SettingRecord};

/// Observation callbacks delivered by a [`SettingsSource`].
///
/// Each callback carries a full record keyed by its unique identifier.
pub trait SourceObserver {
    /// A record appeared in the source collection.
    fn added(&self, record: SettingRecord);

    /// A record in the source collection was replaced.
    fn changed(&self, record: SettingRecord);

    /// A record disappeared from the source collection.
    fn removed(&self, id: &SettingId);
}

/// Handle returned by [`SettingsSource::observe`].
pub trait ObservationHandle {
    /// Stop delivering callbacks. Idempotent.
    fn stop(&mut self);
}

/// External reactive settings collection.
///
/// Implementations are constructed by the embedder and handed to
/// [`SettingsStore::new`](crate::SettingsStore::new); the store drives the
/// `init` → `observe` → `stop` lifecycle.
pub trait SettingsSource {
    /// Establish the connection to the backing collection.
    fn init(&mut self) -> Result<()>;

    /// Start delivering collection events to the observer.
    fn observe(&mut self, observer: Rc<dyn SourceObserver>) -> Box<dyn ObservationHandle>;
}
