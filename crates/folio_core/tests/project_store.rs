mod common;

use common::{demo_fields, fields_with, FakeGateway, FAKE_STORAGE_URL};
use folio_core::{
    FallbackReason, ImageFile, ProjectGateway, ProjectId, ProjectStore, ProjectValidationError,
    SqliteGateway, StoreError, StoreSettings, UploadedImage, FALLBACK_IMAGE_URL,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

fn fake_store() -> (Arc<FakeGateway>, ProjectStore) {
    let gateway = Arc::new(FakeGateway::new());
    let store = ProjectStore::open(gateway.clone(), StoreSettings::default()).unwrap();
    (gateway, store)
}

fn counter(store: &ProjectStore) -> Arc<AtomicUsize> {
    let hits = Arc::new(AtomicUsize::new(0));
    let hits_in_listener = Arc::clone(&hits);
    let _subscription = store.subscribe(move || {
        hits_in_listener.fetch_add(1, Ordering::SeqCst);
    });
    hits
}

#[test]
fn create_update_delete_scenario_over_sqlite_gateway() {
    let gateway: Arc<dyn ProjectGateway> =
        Arc::new(SqliteGateway::open_in_memory("http://localhost/media").unwrap());
    let store = ProjectStore::open(gateway, StoreSettings::default()).unwrap();

    let created = store.create(demo_fields()).unwrap();
    assert_eq!(store.list_all().len(), 1);

    let mut fields = created.fields();
    fields.tags = vec!["a".to_string()];
    store.update(&created.id, fields).unwrap().unwrap();
    assert_eq!(store.get_by_id(&created.id).unwrap().tags, vec!["a"]);

    assert!(store.delete(&created.id).unwrap());
    assert!(store.list_all().is_empty());
}

#[test]
fn non_canonical_ids_leave_sqlite_backed_cache_consistent() {
    let gateway: Arc<dyn ProjectGateway> =
        Arc::new(SqliteGateway::open_in_memory("http://localhost/media").unwrap());
    let store = ProjectStore::open(gateway, StoreSettings::default()).unwrap();
    let created = store.create(fields_with("A", &[], false)).unwrap();

    let updated = store
        .update(&ProjectId::from("01"), fields_with("B", &[], false))
        .unwrap();
    assert!(updated.is_none());
    assert!(!store.delete(&ProjectId::from("+1")).unwrap());

    assert_eq!(store.list_all(), vec![created.clone()]);
    store.refresh().unwrap();
    assert_eq!(store.list_all(), vec![created]);
}

#[test]
fn create_assigns_fresh_id_appends_and_keeps_fields_verbatim() {
    let (_gateway, store) = fake_store();
    let first = store.create(fields_with("one", &["x"], false)).unwrap();

    let mut input = fields_with("two", &["y", "y"], true);
    input.github_url = Some("https://github.com/me/two".to_string());
    let second = store.create(input.clone()).unwrap();

    assert_ne!(first.id, second.id);
    assert_eq!(second.fields(), input);
    let all = store.list_all();
    assert_eq!(all.len(), 2);
    assert_eq!(all[1], second);
}

#[test]
fn create_with_empty_image_fails_without_mutation_or_notification() {
    let (gateway, store) = fake_store();
    let hits = counter(&store);

    let mut fields = demo_fields();
    fields.image = String::new();
    let err = store.create(fields).unwrap_err();

    assert!(matches!(
        err,
        StoreError::Validation(ProjectValidationError::MissingImage)
    ));
    assert!(store.list_all().is_empty());
    assert_eq!(gateway.record_count(), 0);
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[test]
fn create_rejects_blank_title_and_description() {
    let (_gateway, store) = fake_store();
    let mut no_title = demo_fields();
    no_title.title = "   ".to_string();
    let mut no_description = demo_fields();
    no_description.description = String::new();

    assert!(matches!(
        store.create(no_title).unwrap_err(),
        StoreError::Validation(ProjectValidationError::MissingTitle)
    ));
    assert!(matches!(
        store.create(no_description).unwrap_err(),
        StoreError::Validation(ProjectValidationError::MissingDescription)
    ));
    assert!(store.list_all().is_empty());
}

#[test]
fn update_replaces_fields_in_place_and_keeps_id() {
    let (_gateway, store) = fake_store();
    let first = store.create(fields_with("one", &["x"], false)).unwrap();
    let second = store.create(fields_with("two", &["y"], false)).unwrap();
    let third = store.create(fields_with("three", &["z"], false)).unwrap();

    let replacement = fields_with("two v2", &["q"], true);
    let updated = store
        .update(&second.id, replacement.clone())
        .unwrap()
        .unwrap();

    assert_eq!(updated.id, second.id);
    assert_eq!(updated.fields(), replacement);
    let ids: Vec<ProjectId> = store.list_all().into_iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![first.id, second.id, third.id]);
    assert_eq!(store.list_all()[1].title, "two v2");
}

#[test]
fn update_unknown_id_returns_none_without_changes() {
    let (_gateway, store) = fake_store();
    store.create(demo_fields()).unwrap();
    let before = store.list_all();
    let hits = counter(&store);

    let result = store
        .update(&ProjectId::from("missing"), demo_fields())
        .unwrap();

    assert!(result.is_none());
    assert_eq!(store.list_all(), before);
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[test]
fn update_with_empty_image_is_a_validation_error() {
    let (_gateway, store) = fake_store();
    let created = store.create(demo_fields()).unwrap();
    let mut fields = created.fields();
    fields.image = " ".to_string();

    let err = store.update(&created.id, fields).unwrap_err();
    assert!(matches!(err, StoreError::Validation(_)));
    assert_eq!(store.get_by_id(&created.id).unwrap(), created);
}

#[test]
fn delete_removes_exactly_one_and_unknown_ids_return_false() {
    let (_gateway, store) = fake_store();
    let keep = store.create(fields_with("keep", &[], false)).unwrap();
    let gone = store.create(fields_with("gone", &[], false)).unwrap();

    assert!(store.delete(&gone.id).unwrap());
    assert_eq!(store.list_all(), vec![keep.clone()]);
    assert!(store.get_by_id(&gone.id).is_none());

    assert!(!store.delete(&gone.id).unwrap());
    assert!(!store.delete(&ProjectId::from("nope")).unwrap());
    assert_eq!(store.list_all(), vec![keep]);
}

#[test]
fn list_featured_is_the_ordered_featured_subset() {
    let (_gateway, store) = fake_store();
    let a = store.create(fields_with("a", &[], true)).unwrap();
    store.create(fields_with("b", &[], false)).unwrap();
    let c = store.create(fields_with("c", &[], true)).unwrap();
    let d = store.create(fields_with("d", &[], true)).unwrap();

    assert_eq!(store.list_featured(), vec![a.clone(), c.clone(), d]);
    assert_eq!(store.featured_preview(2), vec![a, c]);
}

#[test]
fn subscribers_are_notified_once_per_mutation_until_unsubscribed() {
    let (_gateway, store) = fake_store();
    let hits = Arc::new(AtomicUsize::new(0));
    let hits_in_listener = Arc::clone(&hits);
    let subscription = store.subscribe(move || {
        hits_in_listener.fetch_add(1, Ordering::SeqCst);
    });

    let created = store.create(demo_fields()).unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    store.update(&created.id, demo_fields()).unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 2);
    store.delete(&created.id).unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 3);

    subscription.unsubscribe();
    subscription.unsubscribe();
    assert_eq!(store.subscriber_count(), 0);
    store.create(demo_fields()).unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[test]
fn listeners_can_read_the_store_during_notification() {
    let (_gateway, store) = fake_store();
    let store = Arc::new(store);
    let seen = Arc::new(AtomicUsize::new(0));

    let weak = Arc::downgrade(&store);
    let seen_in_listener = Arc::clone(&seen);
    store.subscribe(move || {
        if let Some(store) = weak.upgrade() {
            seen_in_listener.store(store.list_all().len(), Ordering::SeqCst);
        }
    });

    store.create(demo_fields()).unwrap();
    store.create(demo_fields()).unwrap();
    assert_eq!(seen.load(Ordering::SeqCst), 2);
}

#[test]
fn gateway_failure_on_mutation_is_reported_and_leaves_cache_untouched() {
    let (gateway, store) = fake_store();
    let created = store.create(demo_fields()).unwrap();
    let hits = counter(&store);
    gateway.set(&gateway.fail_records, true);

    assert!(matches!(
        store.create(demo_fields()).unwrap_err(),
        StoreError::Gateway(_)
    ));
    assert!(matches!(
        store.update(&created.id, demo_fields()).unwrap_err(),
        StoreError::Gateway(_)
    ));
    assert!(matches!(
        store.delete(&created.id).unwrap_err(),
        StoreError::Gateway(_)
    ));
    assert!(store.refresh().is_err());

    assert_eq!(store.list_all(), vec![created]);
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[test]
fn snapshots_are_detached_from_the_collection() {
    let (_gateway, store) = fake_store();
    store.create(demo_fields()).unwrap();

    let mut snapshot = store.list_all();
    snapshot[0].title = "mutated".to_string();
    snapshot.clear();

    assert_eq!(store.list_all().len(), 1);
    assert_eq!(store.list_all()[0].title, "Demo");
}

#[test]
fn later_update_wins_when_two_writers_target_the_same_id() {
    let (_gateway, store) = fake_store();
    let created = store.create(demo_fields()).unwrap();

    let mut first = created.fields();
    first.title = "first writer".to_string();
    let mut second = created.fields();
    second.title = "second writer".to_string();

    store.update(&created.id, first).unwrap();
    store.update(&created.id, second).unwrap();
    assert_eq!(store.get_by_id(&created.id).unwrap().title, "second writer");
}

#[test]
fn concurrent_creates_get_distinct_ids() {
    let (_gateway, store) = fake_store();
    let store = Arc::new(store);

    let handles: Vec<_> = (0..8)
        .map(|worker| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                (0..10)
                    .map(|n| {
                        store
                            .create(fields_with(&format!("w{worker}-{n}"), &[], false))
                            .unwrap()
                            .id
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let ids: HashSet<ProjectId> = handles
        .into_iter()
        .flat_map(|handle| handle.join().unwrap())
        .collect();
    assert_eq!(ids.len(), 80);
    assert_eq!(store.list_all().len(), 80);
}

#[test]
fn refresh_adopts_external_changes_and_notifies_only_on_change() {
    let (gateway, store) = fake_store();
    let hits = counter(&store);

    assert_eq!(store.refresh().unwrap(), 0);
    assert_eq!(hits.load(Ordering::SeqCst), 0);

    let external = gateway.insert_external(&demo_fields());
    assert_eq!(store.refresh().unwrap(), 1);
    assert_eq!(store.get_by_id(&external.id), Some(external));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn open_loads_existing_records() {
    let gateway = Arc::new(FakeGateway::new());
    let existing = gateway.insert_external(&demo_fields());
    let store = ProjectStore::open(gateway, StoreSettings::default()).unwrap();
    assert_eq!(store.list_all(), vec![existing]);
}

#[test]
fn upload_stores_blob_under_stamped_name_and_returns_public_url() {
    let (gateway, store) = fake_store();
    let before = store.list_all();

    let uploaded = store.upload_image(&ImageFile::new("my cover.png", vec![1, 2, 3]));

    let UploadedImage::Stored { url, path } = &uploaded else {
        panic!("expected stored upload, got {uploaded:?}");
    };
    assert!(path.ends_with("_my_cover.png"));
    assert_eq!(url, &format!("{FAKE_STORAGE_URL}/projects/{path}"));
    assert_eq!(gateway.blob_names(), vec![path.clone()]);
    assert_eq!(store.list_all(), before);
}

#[test]
fn repeated_uploads_of_the_same_file_do_not_collide() {
    let (gateway, store) = fake_store();
    for _ in 0..20 {
        let uploaded = store.upload_image(&ImageFile::new("same.png", vec![0]));
        assert!(!uploaded.is_placeholder());
    }
    assert_eq!(gateway.blob_names().len(), 20);
}

#[test]
fn upload_falls_back_to_placeholder_when_gateway_fails() {
    let (gateway, store) = fake_store();
    gateway.set(&gateway.fail_blobs, true);

    let uploaded = store.upload_image(&ImageFile::new("cover.png", vec![1]));

    assert_eq!(uploaded.url(), FALLBACK_IMAGE_URL);
    assert!(matches!(
        uploaded,
        UploadedImage::Placeholder {
            reason: FallbackReason::Gateway(_),
            ..
        }
    ));
    assert!(gateway.blob_names().is_empty());
}

#[test]
fn upload_falls_back_when_bucket_is_missing() {
    let gateway = Arc::new(FakeGateway::with_buckets(&[]));
    let settings = StoreSettings {
        fallback_image_url: "https://example.com/placeholder.png".to_string(),
        ..StoreSettings::default()
    };
    let store = ProjectStore::open(gateway, settings).unwrap();

    let uploaded = store.upload_image(&ImageFile::new("cover.png", vec![1]));
    assert_eq!(
        uploaded,
        UploadedImage::Placeholder {
            url: "https://example.com/placeholder.png".to_string(),
            reason: FallbackReason::BucketMissing,
        }
    );
}

#[test]
fn delete_removes_gateway_owned_image_best_effort() {
    let (gateway, store) = fake_store();
    let uploaded = store.upload_image(&ImageFile::new("cover.png", vec![1]));
    let mut fields = demo_fields();
    fields.image = uploaded.url().to_string();
    let owned = store.create(fields).unwrap();
    let foreign = store.create(demo_fields()).unwrap();

    assert!(store.delete(&owned.id).unwrap());
    assert_eq!(gateway.removed_blobs().len(), 1);
    assert!(gateway.blob_names().is_empty());

    assert!(store.delete(&foreign.id).unwrap());
    assert_eq!(gateway.removed_blobs().len(), 1);
}

#[test]
fn delete_removes_image_of_record_not_yet_cached() {
    let (gateway, store) = fake_store();
    let uploaded = store.upload_image(&ImageFile::new("cover.png", vec![1]));
    let mut fields = demo_fields();
    fields.image = uploaded.url().to_string();
    let external = gateway.insert_external(&fields);
    assert!(store.get_by_id(&external.id).is_none());

    assert!(store.delete(&external.id).unwrap());
    assert_eq!(gateway.record_count(), 0);
    assert_eq!(gateway.removed_blobs().len(), 1);
    assert!(gateway.blob_names().is_empty());
}

#[test]
fn failed_image_removal_does_not_block_record_deletion() {
    let (gateway, store) = fake_store();
    let uploaded = store.upload_image(&ImageFile::new("cover.png", vec![1]));
    let mut fields = demo_fields();
    fields.image = uploaded.into_url();
    let created = store.create(fields).unwrap();
    let hits = counter(&store);
    gateway.set(&gateway.fail_remove, true);

    assert!(store.delete(&created.id).unwrap());
    assert!(store.list_all().is_empty());
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(gateway.blob_names().len(), 1);
}

#[test]
fn catalog_queries_follow_collection_order() {
    let (_gateway, store) = fake_store();
    let web = store.create(fields_with("web", &["Rust", "Web"], true)).unwrap();
    let cli = store.create(fields_with("cli", &["Rust", "CLI"], false)).unwrap();
    let app = store.create(fields_with("app", &["Mobile"], false)).unwrap();
    let site = store.create(fields_with("site", &["Web"], false)).unwrap();

    assert_eq!(store.all_tags(), vec!["CLI", "Mobile", "Rust", "Web"]);
    assert_eq!(store.list_by_tag("Rust"), vec![web.clone(), cli.clone()]);
    assert!(store.list_by_tag("rust").is_empty());

    assert_eq!(store.related(&web.id, 3), vec![cli.clone(), site]);
    assert_eq!(store.related(&web.id, 1), vec![cli]);
    assert!(store.related(&app.id, 3).is_empty());
    assert!(store.related(&ProjectId::from("missing"), 3).is_empty());
}

#[test]
fn seed_if_empty_inserts_builtin_catalog_once() {
    let (_gateway, store) = fake_store();
    let hits = counter(&store);

    assert_eq!(store.seed_if_empty().unwrap(), 4);
    assert_eq!(store.list_all().len(), 4);
    assert_eq!(store.list_featured().len(), 1);
    assert_eq!(hits.load(Ordering::SeqCst), 4);

    assert_eq!(store.seed_if_empty().unwrap(), 0);
    assert_eq!(store.list_all().len(), 4);
}
