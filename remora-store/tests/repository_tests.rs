mod common;

use common::{post_repo, registry, seed_posts};
use pretty_assertions::assert_eq;
use remora_model::{Record, RecordHooks, RecordId};
use remora_store::{Repository, SaveOptions, Saved, StoreError};
use serde_json::json;
use std::sync::{Arc, Mutex};

// ── Construction ─────────────────────────────────────────────────

#[test]
fn new_repository_starts_with_an_empty_default_dataset() {
    let repo = post_repo();
    assert_eq!(repo.count(), 0);
    assert!(repo.dataset_exists("all"));
    assert!(!repo.dataset_exists("drafts"));
}

#[test]
fn unknown_entity_type_is_rejected() {
    let result = Repository::new("unregistered", registry());
    assert!(matches!(result, Err(StoreError::UnknownEntityType(_))));
}

// ── Reads ────────────────────────────────────────────────────────

#[test]
fn find_and_exists() {
    let mut repo = post_repo();
    seed_posts(&mut repo);

    assert_eq!(repo.find(2).unwrap().get_str("title"), Some("B Post"));
    assert!(repo.find(9).is_none());
    assert!(repo.exists(1));
    assert!(!repo.exists(9));
}

#[test]
fn reads_against_a_missing_dataset_degrade_to_empty() {
    let repo = post_repo();
    assert!(repo.find_in("nope", 1).is_none());
    assert!(repo.all_in("nope").is_empty());
    assert!(repo.first_in("nope").is_none());
    assert!(repo.last_in("nope").is_none());
    assert_eq!(repo.count_in("nope"), 0);
    assert!(!repo.exists_in("nope", 1));
    assert!(repo.take_in("nope", 3).is_empty());
}

#[test]
fn first_last_take_count() {
    let mut repo = post_repo();
    seed_posts(&mut repo);

    assert_eq!(repo.first().unwrap().id(), Some(RecordId::new(1)));
    assert_eq!(repo.last().unwrap().id(), Some(RecordId::new(3)));
    assert_eq!(repo.take(2).len(), 2);
    assert_eq!(repo.take(10).len(), 3);
    assert_eq!(repo.count(), 3);
}

#[test]
fn empty_dataset_name_is_the_default_dataset() {
    let mut repo = post_repo();
    seed_posts(&mut repo);
    assert_eq!(repo.count_in(""), 3);
    assert!(repo.find_in("", 1).is_some());
}

// ── Save: shape & basics ─────────────────────────────────────────

#[test]
fn save_single_returns_one() {
    let mut repo = post_repo();
    let saved = repo
        .save(json!({"id": 1, "title": "A Post"}), SaveOptions::default())
        .unwrap();
    let Saved::One(record) = saved else {
        panic!("expected a single record");
    };
    assert_eq!(record.id(), Some(RecordId::new(1)));
    assert!(record.persisted);
    assert_eq!(repo.count(), 1);
}

#[test]
fn save_batch_returns_many() {
    let mut repo = post_repo();
    let saved = repo
        .save(
            json!([{"id": 1, "title": "A"}, {"id": 2, "title": "B"}]),
            SaveOptions::default(),
        )
        .unwrap();
    assert_eq!(saved.len(), 2);
    assert_eq!(repo.count(), 2);
}

#[test]
fn save_creates_the_target_dataset() {
    let mut repo = post_repo();
    repo.save(
        json!({"id": 1, "title": "draft"}),
        SaveOptions::default().in_dataset("drafts"),
    )
    .unwrap();

    assert!(repo.dataset_exists("drafts"));
    assert_eq!(repo.count_in("drafts"), 1);
    assert_eq!(repo.count(), 0);
}

#[test]
fn items_without_an_identity_field_are_silently_skipped() {
    let mut repo = post_repo();
    let saved = repo
        .save(
            json!([
                {"id": 1, "title": "kept"},
                {"title": "no identity"},
                {"id": 2, "title": "also kept"},
            ]),
            SaveOptions::default(),
        )
        .unwrap();

    assert_eq!(saved.len(), 2);
    assert_eq!(repo.count(), 2);
    assert!(repo.exists(1));
    assert!(repo.exists(2));
}

#[test]
fn single_item_without_identity_yields_none() {
    let mut repo = post_repo();
    let saved = repo
        .save(json!({"title": "no identity"}), SaveOptions::default())
        .unwrap();
    assert_eq!(saved, Saved::None);
    assert_eq!(repo.count(), 0);
}

#[test]
fn replace_and_update_together_are_refused() {
    let mut repo = post_repo();
    seed_posts(&mut repo);

    let result = repo.save(
        json!({"id": 1, "title": "conflict"}),
        SaveOptions {
            replace: true,
            update: true,
            ..SaveOptions::default()
        },
    );

    assert!(matches!(result, Err(StoreError::ReplaceUpdateConflict)));
    assert_eq!(repo.count(), 3);
    assert_eq!(repo.find(1).unwrap().get_str("title"), Some("A Post"));
}

// ── Save: identity resolution ────────────────────────────────────

#[test]
fn existing_identity_without_a_strategy_is_skipped() {
    let mut repo = post_repo();
    seed_posts(&mut repo);

    let saved = repo
        .save(json!({"id": 1, "title": "ignored"}), SaveOptions::default())
        .unwrap();

    assert_eq!(saved, Saved::None);
    assert_eq!(repo.count(), 3);
    assert_eq!(repo.find(1).unwrap().get_str("title"), Some("A Post"));
}

#[test]
fn replace_swaps_the_record_in_place() {
    let mut repo = post_repo();
    seed_posts(&mut repo);

    let saved = repo
        .save(json!({"id": 2, "title": "Replaced"}), SaveOptions::replace())
        .unwrap();

    assert_eq!(saved.len(), 1);
    assert_eq!(repo.count(), 3);
    // position preserved
    assert_eq!(repo.all()[1].get_str("title"), Some("Replaced"));
}

#[test]
fn replacing_all_items_keeps_the_count() {
    let mut repo = post_repo();
    seed_posts(&mut repo);

    repo.save(
        json!([
            {"id": 1, "title": "A2"},
            {"id": 2, "title": "B2"},
            {"id": 3, "title": "C2"},
        ]),
        SaveOptions::replace(),
    )
    .unwrap();

    assert_eq!(repo.count(), 3);
    assert_eq!(repo.find(1).unwrap().get_str("title"), Some("A2"));
}

#[test]
fn update_option_routes_into_the_deep_merge() {
    let mut repo = post_repo();
    seed_posts(&mut repo);

    let saved = repo
        .save(json!({"id": 1, "title": "Merged"}), SaveOptions::update())
        .unwrap();

    // updated in place, nothing joins the result batch
    assert_eq!(saved, Saved::None);
    assert_eq!(repo.count(), 3);
    assert_eq!(repo.find(1).unwrap().get_str("title"), Some("Merged"));
}

#[test]
fn null_identity_materializes_a_new_record() {
    let mut repo = post_repo();
    let saved = repo
        .save(json!({"id": null, "title": "unmatched"}), SaveOptions::default())
        .unwrap();
    assert_eq!(saved.len(), 1);
    assert_eq!(repo.count(), 1);
}

#[test]
fn prepend_places_new_records_at_the_front() {
    let mut repo = post_repo();
    seed_posts(&mut repo);

    repo.save(
        json!({"id": 5, "title": "newest"}),
        SaveOptions::default().prepended(),
    )
    .unwrap();

    assert_eq!(repo.first().unwrap().id(), Some(RecordId::new(5)));
    assert_eq!(repo.count(), 4);
}

#[test]
fn unsaved_transform_does_not_touch_the_dataset() {
    let mut repo = post_repo();
    let saved = repo
        .save(
            json!({"id": 1, "title": "ghost"}),
            SaveOptions::default().unsaved(),
        )
        .unwrap();

    assert_eq!(saved.len(), 1);
    assert!(!saved.first().unwrap().persisted);
    assert_eq!(repo.count(), 0);
}

#[test]
fn resubmitting_a_stored_record_contributes_nothing_without_replace() {
    let mut repo = post_repo();
    seed_posts(&mut repo);

    let stored = repo.find(1).unwrap().clone();
    let saved = repo.save(stored, SaveOptions::default()).unwrap();

    assert_eq!(saved, Saved::None);
    assert_eq!(repo.count(), 3);
}

// ── Drafts ───────────────────────────────────────────────────────

#[test]
fn drafts_get_monotonic_provisional_ids() {
    let mut repo = post_repo();
    let a = repo.draft(json!({"title": "first"})).unwrap();
    let b = repo.draft(json!({"title": "second"})).unwrap();

    assert_eq!(a.id(), Some(RecordId::new(-1)));
    assert_eq!(b.id(), Some(RecordId::new(-2)));
    assert!(a.id().unwrap().is_provisional());
    assert!(!a.persisted);
}

#[test]
fn draft_with_an_identity_keeps_it() {
    let mut repo = post_repo();
    let record = repo.draft(json!({"id": 10, "title": "remote"})).unwrap();
    assert_eq!(record.id(), Some(RecordId::new(10)));
}

#[test]
fn drafts_persist_like_any_payload() {
    let mut repo = post_repo();
    let draft = repo.draft(json!({"title": "local"})).unwrap();
    repo.save(draft.to_value(), SaveOptions::default()).unwrap();

    assert_eq!(repo.count(), 1);
    assert!(repo.first().unwrap().id().unwrap().is_provisional());
}

// ── Delete / clear / reset ───────────────────────────────────────

#[test]
fn delete_by_single_id() {
    let mut repo = post_repo();
    seed_posts(&mut repo);

    repo.delete(1);

    assert_eq!(repo.count(), 2);
    assert!(repo.find(1).is_none());
}

#[test]
fn delete_by_id_list() {
    let mut repo = post_repo();
    seed_posts(&mut repo);

    repo.delete(vec![1_i64, 3]);

    assert_eq!(repo.count(), 1);
    assert_eq!(repo.first().unwrap().id(), Some(RecordId::new(2)));
}

#[test]
fn delete_by_field_value() {
    let mut repo = post_repo();
    seed_posts(&mut repo);

    repo.delete(("title", json!("B Post")));

    assert_eq!(repo.count(), 2);
    assert!(repo.find(2).is_none());
}

#[test]
fn delete_against_a_missing_dataset_is_a_noop() {
    let mut repo = post_repo();
    seed_posts(&mut repo);
    repo.delete_in("nope", 1);
    assert_eq!(repo.count(), 3);
}

#[test]
fn clear_empties_one_dataset() {
    let mut repo = post_repo();
    seed_posts(&mut repo);
    repo.save(
        json!({"id": 9, "title": "draft"}),
        SaveOptions::default().in_dataset("drafts"),
    )
    .unwrap();

    repo.clear_in("drafts");

    assert_eq!(repo.count_in("drafts"), 0);
    assert!(repo.dataset_exists("drafts"));
    assert_eq!(repo.count(), 3);
}

#[test]
fn reset_drops_every_dataset() {
    let mut repo = post_repo();
    seed_posts(&mut repo);
    repo.save(
        json!({"id": 9, "title": "draft"}),
        SaveOptions::default().in_dataset("drafts"),
    )
    .unwrap();

    repo.reset();

    assert_eq!(repo.count(), 0);
    assert!(repo.dataset_exists("all"));
    assert!(!repo.dataset_exists("drafts"));
}

// ── Hooks ────────────────────────────────────────────────────────

#[derive(Default)]
struct Recording {
    calls: Mutex<Vec<String>>,
}

impl Recording {
    fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.calls.lock().unwrap())
    }
}

impl RecordHooks for Recording {
    fn before_create(&self, record: &mut Record) {
        let _ = record;
        self.calls.lock().unwrap().push("before_create".into());
    }

    fn after_create(&self, record: &Record) {
        let _ = record;
        self.calls.lock().unwrap().push("after_create".into());
    }

    fn before_update(&self, record: &mut Record) {
        let _ = record;
        self.calls.lock().unwrap().push("before_update".into());
    }

    fn after_update(&self, record: &Record, replacement: Option<&Record>) {
        let tag = if replacement.is_some() {
            format!("after_update(replaced {})", record.get_str("title").unwrap_or("?"))
        } else {
            "after_update".to_string()
        };
        self.calls.lock().unwrap().push(tag);
    }

    fn before_delete(&self, record: &Record) {
        self.calls
            .lock()
            .unwrap()
            .push(format!("before_delete {}", record.id().map_or(0, |id| id.get())));
    }

    fn after_delete(&self, record: &Record) {
        self.calls
            .lock()
            .unwrap()
            .push(format!("after_delete {}", record.id().map_or(0, |id| id.get())));
    }
}

fn recording_repo() -> (Repository, Arc<Recording>) {
    let hooks = Arc::new(Recording::default());
    let repo = Repository::with_hooks("post", registry(), hooks.clone()).unwrap();
    (repo, hooks)
}

#[test]
fn create_hooks_fire_around_insertion() {
    let (mut repo, hooks) = recording_repo();
    repo.save(json!({"id": 1, "title": "A"}), SaveOptions::default())
        .unwrap();

    assert_eq!(hooks.take(), vec!["before_create", "after_create"]);
}

#[test]
fn replace_fires_update_hooks_on_the_old_record() {
    let (mut repo, hooks) = recording_repo();
    repo.save(json!({"id": 1, "title": "old"}), SaveOptions::default())
        .unwrap();
    hooks.take();

    repo.save(json!({"id": 1, "title": "new"}), SaveOptions::replace())
        .unwrap();

    // before_update runs on the stored record, after_update observes the
    // pre-replacement record and receives the replacement
    assert_eq!(hooks.take(), vec!["before_update", "after_update(replaced old)"]);
}

#[test]
fn delete_hooks_are_batched_not_interleaved() {
    let (mut repo, hooks) = recording_repo();
    seed_posts(&mut repo);
    hooks.take();

    repo.delete(vec![1_i64, 2]);

    assert_eq!(
        hooks.take(),
        vec![
            "before_delete 1",
            "before_delete 2",
            "after_delete 1",
            "after_delete 2",
        ]
    );
}

#[test]
fn resubmitting_a_stored_record_fires_before_update() {
    let (mut repo, hooks) = recording_repo();
    repo.save(json!({"id": 1, "title": "A"}), SaveOptions::default())
        .unwrap();
    hooks.take();

    let stored = repo.find(1).unwrap().clone();
    repo.save(stored, SaveOptions::default()).unwrap();

    assert_eq!(hooks.take(), vec!["before_update"]);
}
