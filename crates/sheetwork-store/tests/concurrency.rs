use futures::StreamExt;
use sheetwork_model::{Entity, FieldPatch, FieldPath, Item, WriteSet};
use sheetwork_store::{
    BatchCommitCoordinator, CommitConfig, DocumentStore, LocalCollection, MemoryStore, Optimistic, Query,
};
use std::sync::Arc;

fn reorder(assignments: &[(&str, u32)]) -> WriteSet {
    let mut writes = WriteSet::new();
    for (id, order) in assignments {
        writes.update(
            Item::new(*id, "s1", 0).path(),
            FieldPatch::new().set(FieldPath::field("order"), *order),
        );
    }
    writes
}

#[tokio::test]
async fn last_successful_commit_wins_and_subscribers_converge() {
    let store = Arc::new(MemoryStore::new());
    let mut seed = WriteSet::new();
    for (i, id) in ["a", "b", "c"].iter().enumerate() {
        seed.create(&Item::new(*id, "s1", u32::try_from(i).unwrap())).unwrap();
    }
    store.commit_batch(seed.as_slice()).await.unwrap();

    let collection = Item::new("a", "s1", 0).path().collection();
    let mut feed = store.subscribe(&collection, Query::new().order_by("order"));
    let initial = feed.next().await.unwrap();
    let snapshot: LocalCollection<Item> = LocalCollection::from_documents(collection.clone(), &initial).unwrap();

    let coordinator = BatchCommitCoordinator::new(store.clone(), CommitConfig::default());
    let mut alice = Optimistic::new(snapshot.clone());
    let mut bob = Optimistic::new(snapshot);

    let alice_moves = reorder(&[("a", 1), ("b", 0), ("c", 2)]);
    let bob_moves = reorder(&[("a", 0), ("b", 2), ("c", 1)]);
    let (first, second) = tokio::join!(alice.run(&coordinator, &alice_moves), async {
        tokio::task::yield_now().await;
        bob.run(&coordinator, &bob_moves).await
    });
    first.unwrap();
    second.unwrap();

    feed.next().await.unwrap();
    let latest = feed.next().await.unwrap();
    let converged = LocalCollection::<Item>::from_documents(collection.clone(), &latest).unwrap();
    let order: Vec<&str> = converged.records().iter().map(|i| i.id.as_str()).collect();
    assert_eq!(order, vec!["a", "c", "b"]);

    alice.confirm(converged.clone());
    assert_eq!(alice.current(), bob.current());
}
