mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use collection_literals::btree;
use prefstore::{Interest, JsonFileStore, Key, Store, StoreAdapter, Value};
use uuid::Uuid;

use common::{memory, Account, Direction, Point};

#[test]
fn volume_scenario() {
    let (store, shared) = memory();
    let key = Key::from_static("volume");

    let volume: StoreAdapter<f64> = StoreAdapter::builder("volume", shared)
        .default(42.0)
        .build();
    assert_eq!(volume.get(), 42.0);

    volume.set(17.5).unwrap();
    assert_eq!(volume.get(), 17.5);
    assert_eq!(store.get(&key).unwrap(), Some(Value::Float(17.5)));

    store.remove(&key).unwrap();
    assert_eq!(volume.get(), 42.0);
}

#[test]
fn dir_scenario() {
    let (store, shared) = memory();
    let key = Key::from_static("dir");

    let dir: StoreAdapter<Direction> = StoreAdapter::builder("dir", shared)
        .default(Direction::North)
        .build();

    store.set(&key, Value::Integer(2)).unwrap();
    assert_eq!(dir.get(), Direction::South);

    store.set(&key, Value::Integer(99)).unwrap();
    assert_eq!(dir.get(), Direction::North);
}

#[test]
fn drifted_raw_value_at_construction_reads_as_default() {
    let (store, shared) = memory();
    store.set(&Key::from_static("dir"), Value::Integer(7)).unwrap();

    let dir: StoreAdapter<Direction> = StoreAdapter::builder("dir", shared)
        .default(Direction::West)
        .build();

    assert_eq!(dir.get(), Direction::West);
}

#[test]
fn never_written_key_reads_default_expression() {
    let (_, shared) = memory();

    let account: StoreAdapter<Account> = StoreAdapter::builder("account", shared)
        .default_with(|| Account {
            name: "guest".to_string(),
            tags: vec![],
        })
        .build();

    assert_eq!(account.get().name, "guest");
}

#[test]
fn each_codec_variant_round_trips_through_the_store() {
    let (_, shared) = memory();

    let name: StoreAdapter<String> = StoreAdapter::builder("name", shared.clone())
        .default(String::new())
        .build();
    let dir: StoreAdapter<Direction> = StoreAdapter::builder("dir", shared.clone())
        .default(Direction::North)
        .build();
    let origin: StoreAdapter<Point> = StoreAdapter::builder("origin", shared.clone())
        .default(Point { x: 0.0, y: 0.0 })
        .build();
    let account: StoreAdapter<Account> = StoreAdapter::builder("account", shared.clone())
        .default(Account {
            name: String::new(),
            tags: vec![],
        })
        .build();
    let id: StoreAdapter<Uuid> = StoreAdapter::builder("id", shared.clone())
        .default(Uuid::nil())
        .build();

    let new_id = Uuid::new_v4();
    let bob = Account {
        name: "Bob".to_string(),
        tags: vec!["admin".to_string()],
    };
    name.set("Alice".to_string()).unwrap();
    dir.set(Direction::East).unwrap();
    origin.set(Point { x: 1.5, y: -2.0 }).unwrap();
    account.set(bob.clone()).unwrap();
    id.set(new_id).unwrap();

    // Fresh handles decode what the first ones wrote.
    let reread = |key: &'static str| -> Option<Value> { shared.get(&Key::from(key)).unwrap() };
    assert_eq!(reread("name"), Some(Value::from("Alice")));
    assert_eq!(reread("dir"), Some(Value::Integer(3)));
    assert_eq!(
        reread("origin"),
        Some(Value::Map(btree! {
            "x".to_string() => Value::Float(1.5),
            "y".to_string() => Value::Float(-2.0),
        }))
    );

    let account_again: StoreAdapter<Account> = StoreAdapter::builder("account", shared.clone())
        .default(Account {
            name: "unused".to_string(),
            tags: vec![],
        })
        .register_default(false)
        .build();
    let id_again: StoreAdapter<Uuid> = StoreAdapter::builder("id", shared)
        .default(Uuid::nil())
        .build();

    assert_eq!(account_again.get(), bob);
    assert_eq!(id_again.get(), new_id);
    assert_eq!(origin.get(), Point { x: 1.5, y: -2.0 });
    assert_eq!(dir.get(), Direction::East);
}

#[test]
fn point_missing_a_field_reads_as_default() {
    let (store, shared) = memory();
    let origin: StoreAdapter<Point> = StoreAdapter::builder("origin", shared)
        .default(Point { x: 0.0, y: 0.0 })
        .build();

    store
        .set(
            &Key::from_static("origin"),
            Value::Map(btree! { "x".to_string() => Value::Float(3.0) }),
        )
        .unwrap();

    assert_eq!(origin.get(), Point { x: 0.0, y: 0.0 });
}

#[test]
fn own_write_fires_both_subscriber_kinds_exactly_once() {
    let (_, shared) = memory();
    let volume: StoreAdapter<f64> = StoreAdapter::builder("volume", shared)
        .default(42.0)
        .build();

    let notified = Arc::new(AtomicUsize::new(0));
    let invalidated = Arc::new(AtomicUsize::new(0));
    let n = Arc::clone(&notified);
    let i = Arc::clone(&invalidated);
    let _notify = volume
        .subscribe(move |_| {
            n.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    let _invalidate = volume
        .subscribe_invalidation(move || {
            i.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    volume.set(17.5).unwrap();

    assert_eq!(notified.load(Ordering::SeqCst), 1);
    assert_eq!(invalidated.load(Ordering::SeqCst), 1);
}

#[test]
fn external_write_fires_both_subscriber_kinds_exactly_once() {
    let (store, shared) = memory();
    let volume: StoreAdapter<f64> = StoreAdapter::builder("volume", shared)
        .default(42.0)
        .build();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let invalidated = Arc::new(AtomicUsize::new(0));
    let sink = Arc::clone(&seen);
    let i = Arc::clone(&invalidated);
    let _notify = volume
        .subscribe(move |v: &f64| sink.lock().unwrap().push(*v))
        .unwrap();
    let _invalidate = volume
        .subscribe_invalidation(move || {
            i.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    store.set(&Key::from_static("volume"), Value::Float(3.0)).unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![3.0]);
    assert_eq!(invalidated.load(Ordering::SeqCst), 1);
}

#[test]
fn write_after_a_no_op_remove_is_still_relayed() {
    let (store, shared) = memory();
    let key = Key::from_static("maybe");
    let maybe: StoreAdapter<Option<i32>> = StoreAdapter::builder("maybe", shared)
        .default(None)
        .build();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let _sub = maybe
        .subscribe(move |v: &Option<i32>| sink.lock().unwrap().push(*v))
        .unwrap();

    // Nothing to remove, so the store sends no echo.
    maybe.set(None).unwrap();
    // This external change must not be mistaken for that echo.
    store.set(&key, Value::Integer(5)).unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![None, Some(5)]);
    assert_eq!(maybe.get(), Some(5));
}

#[test]
fn two_handles_on_one_key_see_each_other() {
    let (_, shared) = memory();
    let a: StoreAdapter<String> = StoreAdapter::builder("theme", shared.clone())
        .default("light".to_string())
        .build();
    let b: StoreAdapter<String> = StoreAdapter::builder("theme", shared)
        .default("light".to_string())
        .build();

    let b_changes = b.changes().unwrap();
    a.set("dark".to_string()).unwrap();

    assert_eq!(b.get(), "dark");
    assert_eq!(b_changes.drain(), vec!["dark".to_string()]);
}

#[test]
fn subscriber_interest_shares_one_store_observer() {
    let (store, shared) = memory();
    let key = Key::from_static("k");
    let k: StoreAdapter<i64> = StoreAdapter::builder("k", shared).default(0).build();

    // The adapter's own cache sync already counts as notification interest.
    assert_eq!(k.relay().interest(), Interest::NotificationOnly);
    assert_eq!(store.observer_count(&key), 1);

    let invalidation = k.subscribe_invalidation(|| {}).unwrap();
    let notification = k.subscribe(|_| {}).unwrap();
    assert_eq!(k.relay().interest(), Interest::Both);
    assert_eq!(store.observer_count(&key), 1);

    drop(invalidation);
    assert_eq!(k.relay().interest(), Interest::NotificationOnly);
    assert_eq!(store.observer_count(&key), 1);

    drop(notification);
    drop(k);
    assert_eq!(store.observer_count(&key), 0);
}

#[test]
fn on_change_callbacks_live_as_long_as_the_adapter() {
    let (store, shared) = memory();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);

    let dir: StoreAdapter<Direction> = StoreAdapter::builder("dir", shared)
        .default(Direction::North)
        .on_change(move |d| sink.lock().unwrap().push(*d))
        .build();

    dir.set(Direction::West).unwrap();
    store.set(&Key::from_static("dir"), Value::Integer(2)).unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        vec![Direction::West, Direction::South]
    );
}

#[test]
fn factory_reset_restores_defaults() {
    let (store, shared) = memory();
    let volume: StoreAdapter<f64> = StoreAdapter::builder("volume", shared.clone())
        .default(42.0)
        .build();
    let name: StoreAdapter<String> = StoreAdapter::builder("name", shared)
        .default("Alice".to_string())
        .build();

    volume.set(1.0).unwrap();
    name.set("Bob".to_string()).unwrap();
    store.reset().unwrap();

    assert_eq!(volume.get(), 42.0);
    assert_eq!(name.get(), "Alice");
}

#[test]
fn adapter_over_json_file_store_persists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("preferences.json");

    {
        let store: Arc<dyn Store> = Arc::new(JsonFileStore::open(&path).unwrap());
        let origin: StoreAdapter<Point> = StoreAdapter::builder("origin", store)
            .default(Point { x: 0.0, y: 0.0 })
            .build();
        origin.set(Point { x: 4.0, y: 2.0 }).unwrap();
    }

    let store = Arc::new(JsonFileStore::open(&path).unwrap());
    let origin: StoreAdapter<Point> = StoreAdapter::builder("origin", store.clone())
        .default(Point { x: 0.0, y: 0.0 })
        .build();
    assert_eq!(origin.get(), Point { x: 4.0, y: 2.0 });

    // Another process clears the file; reload brings the default back.
    std::fs::write(&path, br#"{"version": 1, "values": {}}"#).unwrap();
    store.reload().unwrap();
    assert_eq!(origin.get(), Point { x: 0.0, y: 0.0 });
}
