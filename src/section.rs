use std::cell::RefCell;
use std::rc::Rc;

use crate::record::{SettingId, SettingPatch, SettingRecord};
use crate::store::StoreHandle;

/// Derived value exposed by a [`SectionView`].
#[derive(Debug, Clone, PartialEq)]
pub struct SectionValue {
    /// Requested section name; empty for the unnamed default subset.
    pub name: String,
    /// Any filtered setting differs from its persisted baseline.
    pub changed: bool,
    /// Any filtered setting differs from its packaged default. Independent
    /// of `changed`, which hydration timing may have already cleared.
    pub can_reset: bool,
    /// Identifiers of the filtered settings, in collection order.
    pub settings: Vec<SettingId>,
}

/// Per-section projection over the live settings state.
///
/// Filters the store's live collection down to one group and one section
/// (or the unnamed subset) and derives aggregate flags. Every read goes
/// through the latest snapshot; nothing is captured at construction time,
/// so [`reset`](SectionView::reset) never acts on stale state.
pub struct SectionView {
    handle: StoreHandle,
    group: String,
    name: String,
    cache: RefCell<Option<Rc<SectionValue>>>,
}

impl SectionView {
    /// Create a projection for `group` and the given section name; `None`
    /// or an empty name selects settings with no section.
    pub fn new(handle: StoreHandle, group: impl Into<String>, name: Option<&str>) -> Self {
        Self {
            handle,
            group: group.into(),
            name: name.unwrap_or_default().to_string(),
            cache: RefCell::new(None),
        }
    }

    fn matches(&self, record: &SettingRecord) -> bool {
        record.group == self.group
            && if self.name.is_empty() {
                record.section.is_empty()
            } else {
                record.section == self.name
            }
    }

    /// Derive the section value from the latest snapshot.
    ///
    /// Returns the previously derived `Rc` when name, flags and matched
    /// id set are unchanged, so downstream consumers can gate on
    /// [`Rc::ptr_eq`].
    pub fn value(&self) -> Rc<SectionValue> {
        let snapshot = self.handle.snapshot();

        let mut changed = false;
        let mut can_reset = false;
        let mut settings = Vec::new();
        for record in snapshot.state.iter().filter(|r| self.matches(r)) {
            changed = changed || record.changed;
            can_reset = can_reset || record.value != record.package_value;
            settings.push(record.id.clone());
        }

        let next = SectionValue {
            name: self.name.clone(),
            changed,
            can_reset,
            settings,
        };

        let mut cache = self.cache.borrow_mut();
        if let Some(previous) = &*cache {
            if **previous == next {
                return Rc::clone(previous);
            }
        }
        let value = Rc::new(next);
        *cache = Some(Rc::clone(&value));
        value
    }

    /// Restore every filtered setting to its packaged default.
    ///
    /// Reads the filtered set and the persisted baseline at call time,
    /// skips settings already equal to their package value, and submits
    /// one hydrate batch with `changed` recomputed against the baseline.
    pub fn reset(&self) {
        let snapshot = self.handle.snapshot();

        let mut changes = Vec::new();
        for record in snapshot.state.iter().filter(|r| self.matches(r)) {
            let Some(persisted) = snapshot
                .persisted_state
                .iter()
                .find(|p| p.id == record.id)
            else {
                continue;
            };
            if persisted.value == persisted.package_value {
                continue;
            }
            changes.push(SettingPatch {
                id: persisted.id.clone(),
                value: persisted.package_value.clone(),
                editor: persisted.editor.clone(),
                changed: persisted.package_value != persisted.value,
            });
        }

        if !changes.is_empty() {
            self.handle.hydrate(changes);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use serde_json::{Value, json};

    use super::*;
    use crate::clock::ManualClock;
    use crate::error::Result;
    use crate::source::{ObservationHandle, SettingsSource, SourceObserver};
    use crate::store::SettingsStore;

    fn record(id: &str, group: &str, section: &str) -> SettingRecord {
        SettingRecord {
            id: id.into(),
            value: Value::Null,
            package_value: Value::Null,
            editor: None,
            group: group.into(),
            section: section.into(),
            sorter: id.into(),
            i18n_label: String::new(),
            changed: false,
            enable_query: None,
            blocked: false,
        }
    }

    struct NoopHandle;

    impl ObservationHandle for NoopHandle {
        fn stop(&mut self) {}
    }

    type SharedObserver = Rc<RefCell<Option<Rc<dyn SourceObserver>>>>;

    struct TestSource {
        observer: SharedObserver,
    }

    impl SettingsSource for TestSource {
        fn init(&mut self) -> Result<()> {
            Ok(())
        }

        fn observe(&mut self, observer: Rc<dyn SourceObserver>) -> Box<dyn ObservationHandle> {
            *self.observer.borrow_mut() = Some(observer);
            Box::new(NoopHandle)
        }
    }

    struct Fixture {
        store: SettingsStore,
        clock: ManualClock,
        observer: SharedObserver,
    }

    impl Fixture {
        fn with_settings(settings: Vec<SettingRecord>) -> Self {
            let observer: SharedObserver = Rc::new(RefCell::new(None));
            let clock = ManualClock::new();
            let source = TestSource {
                observer: Rc::clone(&observer),
            };
            let mut store =
                SettingsStore::new(Box::new(source), Rc::new(clock.clone()));
            store.init();
            let fixture = Fixture {
                store,
                clock,
                observer,
            };
            for setting in settings {
                fixture
                    .observer
                    .borrow()
                    .as_ref()
                    .unwrap()
                    .added(setting);
            }
            fixture.settle();
            fixture
        }

        fn settle(&self) {
            self.clock.advance(crate::coalesce::DEBOUNCE_WINDOW);
            self.store.tick();
        }
    }

    #[test]
    fn given_no_name_then_only_sectionless_settings_match() {
        let fixture = Fixture::with_settings(vec![
            record("plain", "General", ""),
            record("sectioned", "General", "Url"),
            record("foreign", "Accounts", ""),
        ]);
        let view =
            SectionView::new(fixture.store.handle(), "General", None);

        let value = view.value();

        assert_eq!(value.settings, vec![String::from("plain")]);
    }

    #[test]
    fn given_section_name_then_only_exact_matches_included() {
        let fixture = Fixture::with_settings(vec![
            record("plain", "General", ""),
            record("sectioned", "General", "Url"),
        ]);
        let view =
            SectionView::new(fixture.store.handle(), "General", Some("Url"));

        let value = view.value();

        assert_eq!(value.settings, vec![String::from("sectioned")]);
        assert_eq!(value.name, "Url");
    }

    #[test]
    fn given_value_differs_from_package_then_can_reset_regardless_of_changed() {
        let mut drifted = record("drifted", "General", "");
        drifted.value = json!("x");
        drifted.package_value = json!("y");
        drifted.changed = false;
        let fixture = Fixture::with_settings(vec![drifted]);
        let view =
            SectionView::new(fixture.store.handle(), "General", None);

        let value = view.value();

        assert!(value.can_reset);
        assert!(!value.changed);
    }

    #[test]
    fn given_unchanged_state_then_value_returns_same_allocation() {
        let fixture =
            Fixture::with_settings(vec![record("a", "General", "")]);
        let view =
            SectionView::new(fixture.store.handle(), "General", None);

        let first = view.value();
        let second = view.value();
        assert!(Rc::ptr_eq(&first, &second));

        fixture
            .observer
            .borrow()
            .as_ref()
            .unwrap()
            .added(record("b", "General", ""));
        fixture.settle();

        let third = view.value();
        assert!(!Rc::ptr_eq(&second, &third));
        assert_eq!(third.settings.len(), 2);
    }

    #[test]
    fn given_mixed_section_then_reset_patches_only_drifted_settings() {
        let mut drifted = record("1", "General", "");
        drifted.value = json!("x");
        drifted.package_value = json!("y");
        drifted.editor = Some(String::from("string"));
        let mut pristine = record("2", "General", "");
        pristine.value = json!("y");
        pristine.package_value = json!("y");
        let fixture = Fixture::with_settings(vec![drifted, pristine]);
        let view =
            SectionView::new(fixture.store.handle(), "General", None);

        view.reset();

        let snapshot = fixture.store.handle().snapshot();
        let restored = snapshot.state.iter().find(|r| r.id == "1").unwrap();
        assert_eq!(restored.value, json!("y"));
        assert!(restored.changed, "package value differs from baseline");
        assert_eq!(restored.editor.as_deref(), Some("string"));
        let untouched = snapshot.state.iter().find(|r| r.id == "2").unwrap();
        assert_eq!(untouched.value, json!("y"));
        assert!(!untouched.changed);
    }

    #[test]
    fn given_reset_after_later_edits_then_latest_snapshot_is_used() {
        let mut setting = record("1", "General", "");
        setting.value = json!("y");
        setting.package_value = json!("y");
        let fixture = Fixture::with_settings(vec![setting]);
        let view =
            SectionView::new(fixture.store.handle(), "General", None);
        assert!(!view.value().can_reset);

        // A server-side change lands after the view was derived.
        let mut drifted = record("1", "General", "");
        drifted.value = json!("x");
        drifted.package_value = json!("y");
        fixture
            .observer
            .borrow()
            .as_ref()
            .unwrap()
            .changed(drifted);

        view.reset();

        let snapshot = fixture.store.handle().snapshot();
        assert_eq!(snapshot.state[0].value, json!("y"));
    }
}
