//! End-to-end tests for the engine over a real JSON file store.
//!
//! Each test builds its state in a temp directory through the public
//! engine surface, the way a screen would drive it.

use std::sync::Arc;

use tempfile::TempDir;

use lattice::model::ItemKind;
use lattice::ops::check::check_tree;
use lattice::store::{JsonFileStore, MemoryStore};
use lattice::sync::{ChangeNotifier, Engine, Operation};
use lattice::view::ViewOptions;

fn engine(store: Arc<JsonFileStore>, notifier: ChangeNotifier, origin: &str) -> Engine {
    Engine::new(store, notifier, origin, Some("user-1".into()))
}

async fn apply(engine: &mut Engine, op: Operation) {
    let handle = engine.apply(op).unwrap();
    handle.await.unwrap();
    let errors = engine.drain_errors();
    assert!(errors.is_empty(), "persistence failed: {:?}", errors);
}

async fn create(engine: &mut Engine, parent: Option<&str>, title: &str) -> String {
    apply(
        engine,
        Operation::Create {
            parent_id: parent.map(str::to_string),
            kind: ItemKind::Task,
            title: title.into(),
        },
    )
    .await;
    engine
        .tree()
        .iter()
        .find(|i| i.title == title)
        .expect("created item present")
        .id
        .clone()
}

#[tokio::test]
async fn worked_example_auto_complete_then_direct_uncomplete() {
    let tmp = TempDir::new().unwrap();
    let store = Arc::new(JsonFileStore::open(tmp.path().join("state.json")).unwrap());
    let mut engine = engine(Arc::clone(&store), ChangeNotifier::new(), "today");

    let p = create(&mut engine, None, "parent").await;
    let a = create(&mut engine, Some(&p), "a").await;
    let b = create(&mut engine, Some(&p), "b").await;
    let c = create(&mut engine, Some(&p), "c").await;

    // Complete A, then B, then C — the last toggle auto-completes P
    for id in [&a, &b, &c] {
        apply(&mut engine, Operation::ToggleCompletion { id: id.clone() }).await;
    }
    let parent = engine.tree().get(&p).unwrap();
    assert!(parent.is_completed);
    // The auto path captured no snapshot
    assert!(parent.previous_completion_state.is_none());

    // Direct toggle of P back to incomplete: no snapshot, so the children
    // keep their completed state
    apply(&mut engine, Operation::ToggleCompletion { id: p.clone() }).await;
    assert!(!engine.tree().get(&p).unwrap().is_completed);
    for id in [&a, &b, &c] {
        assert!(engine.tree().get(id.as_str()).unwrap().is_completed);
    }

    // And a fresh engine sees the same picture after a refetch
    let mut fresh = engine2(&store);
    fresh.load().await.unwrap();
    assert!(!fresh.tree().get(&p).unwrap().is_completed);
    assert!(fresh.tree().get(&a).unwrap().is_completed);
    assert!(check_tree(fresh.tree()).valid);
}

fn engine2(store: &Arc<JsonFileStore>) -> Engine {
    Engine::new(
        Arc::clone(store) as Arc<dyn lattice::store::ItemStore>,
        ChangeNotifier::new(),
        "fresh",
        Some("user-1".into()),
    )
}

#[tokio::test]
async fn direct_completion_snapshot_round_trips_through_the_store() {
    let tmp = TempDir::new().unwrap();
    let store = Arc::new(JsonFileStore::open(tmp.path().join("state.json")).unwrap());
    let mut engine = engine(Arc::clone(&store), ChangeNotifier::new(), "today");

    let p = create(&mut engine, None, "trip").await;
    let packing = create(&mut engine, Some(&p), "packing").await;
    let tickets = create(&mut engine, Some(&p), "tickets").await;

    // tickets done, packing not; then complete the whole trip directly
    apply(
        &mut engine,
        Operation::ToggleCompletion {
            id: tickets.clone(),
        },
    )
    .await;
    apply(&mut engine, Operation::ToggleCompletion { id: p.clone() }).await;

    // A different session loads the persisted snapshot and un-completes
    // the parent: exact prior child states come back
    let mut other = engine2(&store);
    other.load().await.unwrap();
    assert!(other.tree().get(&p).unwrap().previous_completion_state.is_some());

    let handle = other
        .apply(Operation::ToggleCompletion { id: p.clone() })
        .unwrap();
    handle.await.unwrap();
    assert!(other.drain_errors().is_empty());

    assert!(!other.tree().get(&packing).unwrap().is_completed);
    assert!(other.tree().get(&tickets).unwrap().is_completed);

    // The restore also reached the store
    let mut third = engine2(&store);
    third.load().await.unwrap();
    assert!(!third.tree().get(&packing).unwrap().is_completed);
    assert!(third.tree().get(&tickets).unwrap().is_completed);
}

#[tokio::test]
async fn two_screens_stay_in_sync_over_the_notifier() {
    let tmp = TempDir::new().unwrap();
    let store = Arc::new(JsonFileStore::open(tmp.path().join("state.json")).unwrap());
    let notifier = ChangeNotifier::new();

    let mut today = engine(Arc::clone(&store), notifier.clone(), "today");
    let id = create(&mut today, None, "shared task").await;

    let mut project = engine(Arc::clone(&store), notifier.clone(), "project");
    project.load().await.unwrap();
    let mut rx = notifier.subscribe();

    // Screen A toggles; screen B hears it and patches its copy
    apply(&mut today, Operation::ToggleCompletion { id: id.clone() }).await;
    let update = rx.recv().await.unwrap();
    assert!(project.absorb(&update));
    assert!(project.tree().get(&id).unwrap().is_completed);

    // The originating screen ignores its own update
    assert!(!today.absorb(&update));
}

#[tokio::test]
async fn reorders_and_deletes_keep_scopes_contiguous_on_disk() {
    let tmp = TempDir::new().unwrap();
    let store = Arc::new(JsonFileStore::open(tmp.path().join("state.json")).unwrap());
    let mut engine = engine(Arc::clone(&store), ChangeNotifier::new(), "today");

    let mut ids = Vec::new();
    for title in ["one", "two", "three", "four"] {
        ids.push(create(&mut engine, None, title).await);
    }
    // Creation inserts at the front: four, three, two, one
    let rows = engine.rows(&ViewOptions::default());
    assert_eq!(rows.len(), 4);

    // Drag the front item onto the back one, then delete a middle one
    apply(
        &mut engine,
        Operation::Reorder {
            parent_id: None,
            dropped_id: ids[3].clone(),
            target_id: ids[0].clone(),
        },
    )
    .await;
    apply(
        &mut engine,
        Operation::Delete {
            id: ids[1].clone(),
        },
    )
    .await;

    let mut fresh = engine2(&store);
    fresh.load().await.unwrap();
    assert_eq!(fresh.tree().len(), 3);
    assert!(check_tree(fresh.tree()).valid);

    let orders: Vec<usize> = fresh
        .tree()
        .roots(false)
        .iter()
        .map(|i| i.sort_order)
        .collect();
    assert_eq!(orders, vec![0, 1, 2]);
}

#[tokio::test]
async fn store_failure_surfaces_but_does_not_roll_back() {
    let store = Arc::new(MemoryStore::new());
    let mut engine = Engine::new(
        Arc::clone(&store) as Arc<dyn lattice::store::ItemStore>,
        ChangeNotifier::new(),
        "today",
        Some("user-1".into()),
    );

    let handle = engine
        .apply(Operation::Create {
            parent_id: None,
            kind: ItemKind::List,
            title: "groceries".into(),
        })
        .unwrap();
    handle.await.unwrap();
    assert!(engine.drain_errors().is_empty());
    let id = engine.tree().roots(false)[0].id.clone();

    store.set_offline(true);
    let handle = engine
        .apply(Operation::ToggleCompletion { id: id.clone() })
        .unwrap();
    handle.await.unwrap();

    // Local state moved on, the store did not, and the user sees why
    assert!(engine.tree().get(&id).unwrap().is_completed);
    assert!(!store.item(&id).unwrap().is_completed);
    let errors = engine.drain_errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("connection lost"));
}
