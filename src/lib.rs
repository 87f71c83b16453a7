//! Reactive state layer for an admin settings panel.
//!
//! Mirrors a server-held settings collection into local observable state,
//! tracks per-setting dirty status against both a live baseline and a
//! packaged default, and exposes sectioned views with reset semantics.
//!
//! The main entry points are:
//! - [`SettingsStore`], which owns a [`SettingsSource`], keeps a live and a
//!   persisted ordered collection plus a queryable [`MirrorStore`], and
//!   fans committed transitions out to subscribers.
//! - [`StoreHandle`], the cloneable surface consumers use to snapshot,
//!   subscribe, hydrate value changes and evaluate enable conditions.
//! - [`SectionView`], a per-group/per-section projection deriving
//!   `changed` / `can_reset` flags and a scoped reset.
//! - [`Selector`], a memoized per-consumer derived value.
//!
//! Embedders usually:
//! 1. Implement [`SettingsSource`] over their reactive collection.
//! 2. Construct a [`SettingsStore`] with a [`Clock`] and call `init`.
//! 3. Drive batching by sleeping until `next_deadline()` and calling
//!    `tick()`; bursts of added records and rapid per-setting edits each
//!    collapse into single commits.

mod clock;
mod coalesce;
mod error;
mod mirror;
mod record;
mod reducer;
mod registry;
mod section;
mod selector;
mod source;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Error, Result};
pub use mirror::MirrorStore;
pub use record::{EnableQuery, SettingId, SettingPatch, SettingRecord};
pub use registry::Subscription;
pub use section::{SectionValue, SectionView};
pub use selector::Selector;
pub use source::{ObservationHandle, SettingsSource, SourceObserver};
pub use store::{SettingsStore, StoreHandle, StoreSnapshot};
