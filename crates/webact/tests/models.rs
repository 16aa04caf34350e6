//! Integration tests wiring models, filters, tag indexes and trees together.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Value, json};
use webact::prelude::*;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn item(title: &str, tags: &[&str]) -> Value {
    json!({ "title": title, "tags": tags })
}

fn record<T: Clone + Send + Sync + 'static>(source: &Broadcaster<ListEvent<T>>) -> Arc<Mutex<Vec<ListEvent<T>>>> {
    let log = Arc::new(Mutex::new(Vec::new()));
    for kind in ListEventKind::ALL {
        let log = log.clone();
        source.add_listener(kind, move |event: &ListEvent<T>| log.lock().push(event.clone()));
    }
    log
}

#[test]
fn tag_index_tracks_list_model() {
    init_tracing();
    let items = Arc::new(ListModel::new(vec![
        item("one", &["a", "b"]),
        item("two", &["b"]),
        item("three", &["c"]),
    ]));
    let tags = TagIndex::new(items.clone());

    assert_eq!(tags.locations("b"), vec![0, 1]);
    assert_eq!(tags.frequency("b"), 2.0 / 3.0);
    assert_eq!(tags.collect_locations(&["a", "b"], true), vec![0]);
    assert_eq!(tags.collect_locations(&["a", "c"], false), vec![0, 2]);

    items.push(item("four", &["c", "d"]));
    assert_eq!(tags.locations("c"), vec![2, 3]);
    assert_eq!(tags.locations("d"), vec![3]);

    items.set(1, item("two", &["d"])).unwrap();
    assert_eq!(tags.locations("b"), vec![0]);
    assert_eq!(tags.locations("d"), vec![1, 3]);

    items.remove(0).unwrap();
    assert!(tags.locations("a").is_empty());
    assert!(!tags.tags().contains(&"a".to_string()));
}

#[test]
fn filter_over_model_maps_positions() {
    let numbers = Arc::new(ListModel::new(vec![5, 3, 8, 1]));
    let filter = ListFilter::builder(numbers.clone())
        .filter(|value: &i32, _| *value > 2)
        .order(|a: &i32, b: &i32| a.cmp(b))
        .build();

    assert_eq!(filter.to_vec(), vec![3, 5, 8]);
    assert_eq!(filter.source_index(0), Some(1));
    assert_eq!(filter.source_index(1), Some(0));
    assert_eq!(filter.source_index(2), Some(2));
    assert_eq!(filter.back_index(3), None);

    let log = record(filter.events());
    numbers.push(4);
    assert_eq!(filter.to_vec(), vec![3, 4, 5, 8]);
    assert_eq!(*log.lock(), vec![ListEvent::Added { index: 1, value: 4 }]);
}

#[test]
fn filter_feeds_tag_index() {
    let items = Arc::new(ListModel::new(vec![
        item("one", &["rust"]),
        item("two", &["web"]),
        item("three", &["rust", "web"]),
    ]));
    let rusty = ListFilter::builder(items.clone())
        .filter(|value: &Value, _| value.tags().iter().any(|tag| tag == "rust"))
        .build();
    let tags = TagIndex::new(rusty.clone());

    assert_eq!(tags.locations("rust"), vec![0, 1]);
    assert_eq!(tags.locations("web"), vec![1]);

    items.push(item("four", &["rust", "cli"]));
    assert_eq!(tags.locations("cli"), vec![2]);
    assert_eq!(tags.frequency("rust"), 1.0);
}

#[test]
fn tree_paths_and_change_tracking() {
    init_tracing();
    let tree: Tree = Tree::new();
    let root = tree.create_node("/");
    let leaf = tree.add_node(root, "/a/b/c").unwrap();

    assert_eq!(tree.absolute_path(leaf), "/a/b/c");
    assert_eq!(tree.get_node(leaf, "/a/b"), tree.parent(leaf));
    assert_eq!(tree.add_node(root, "a/b/c"), Ok(leaf));

    tree.set_property(leaf, "title", json!("Hello")).unwrap();
    tree.set_field(leaf, "title", json!("Edited")).unwrap();
    assert!(tree.is_changed(leaf));
    assert_eq!(tree.changes(leaf).get("title"), Some(&json!("Edited")));

    tree.revert(leaf).unwrap();
    assert!(!tree.is_changed(leaf));

    tree.set_field(leaf, "title", json!("Edited")).unwrap();
    tree.commit(leaf, None).unwrap();
    assert!(!tree.is_changed(leaf));
    assert_eq!(tree.property(leaf, "title"), Some(json!("Edited")));
}

#[test]
fn tree_events_bubble_to_root() {
    let tree: Tree = Tree::new();
    let root = tree.create_node("/");
    let seen = Arc::new(Mutex::new(Vec::new()));
    for kind in [TreeEventKind::Added, TreeEventKind::Changed] {
        let seen = seen.clone();
        tree.add_listener(root, kind, move |event| seen.lock().push(event.clone()))
            .unwrap();
    }

    let docs = tree.add_node(root, "docs").unwrap();
    tree.set_property(docs, "title", "Docs").unwrap();
    assert!(!tree.set_property(docs, "title", "Docs").unwrap());

    let seen = seen.lock();
    assert_eq!(seen.len(), 2);
    assert_eq!(
        seen[0],
        TreeEvent::Added {
            source: root,
            index: 0,
            child: docs
        }
    );
    assert_eq!(seen[1].source(), docs);
}
