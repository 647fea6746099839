use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use repokit::cache::{CacheBroker, CacheEntryOptions, MemoryCache};
use repokit::context::{Database, EntityState};
use repokit::migrations::migrate;
use repokit::repository::{
    CachedPrimaryEntityRepository, EntityRepository, PrimaryEntityRepository,
    PrimaryEntityRepositoryBase,
};
use repokit::storage::InMemoryStore;
use repokit_core::cache::{entity_key, Cache};
use repokit_core::entity::{Entity, PrimaryEntity};
use repokit_core::model::{ContextDefinition, ModelBuilder};
use repokit_core::options::{CommandOptions, QueryOptions};
use repokit_core::query::{Assignment, Filter};
use repokit_core::storage::RepositoryError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Product {
    id: Uuid,
    sku: String,
    price: i64,
}

impl Entity for Product {
    const TABLE: &'static str = "products";

    fn row_key(&self) -> String {
        self.id.to_string()
    }
}

impl PrimaryEntity for Product {
    type Key = Uuid;

    fn id(&self) -> &Uuid {
        &self.id
    }

    fn set_id(&mut self, id: Uuid) {
        self.id = id;
    }
}

struct Catalog;

impl ContextDefinition for Catalog {
    const NAME: &'static str = "catalog";

    fn register_entities(builder: &mut ModelBuilder) {
        builder.configure::<Product, _>(|p| {
            p.has_unique_index(&["sku"]);
        });
    }
}

fn product(sku: &str, price: i64) -> Product {
    Product {
        id: Uuid::nil(),
        sku: sku.to_string(),
        price,
    }
}

async fn setup() -> (InMemoryStore, Database, Arc<MemoryCache>) {
    let store = InMemoryStore::new();
    let database = Database::new(Arc::new(store.clone()), Catalog::build_model().unwrap());
    migrate(&database).await.unwrap();
    (store, database, Arc::new(MemoryCache::new(1_000)))
}

fn repository(database: &Database) -> PrimaryEntityRepositoryBase<Product> {
    PrimaryEntityRepositoryBase::with_generated_keys(database.context())
}

fn cached(
    database: &Database,
    cache: &Arc<MemoryCache>,
) -> CachedPrimaryEntityRepository<Product, PrimaryEntityRepositoryBase<Product>, MemoryCache> {
    CachedPrimaryEntityRepository::new(
        Arc::new(repository(database)),
        CacheBroker::new(
            Arc::clone(cache),
            CacheEntryOptions::with_ttl(Duration::from_secs(300)),
        ),
    )
}

#[tokio::test]
async fn test_creates_get_fresh_distinct_ids() {
    let (_, database, _) = setup().await;
    let repo = repository(&database);

    let mut ids = HashSet::new();
    for i in 0..10 {
        let created = repo
            .create(product(&format!("SKU-{i}"), 100), CommandOptions::default())
            .await
            .unwrap();
        assert_ne!(created.id, Uuid::nil());
        ids.insert(created.id);
    }

    assert_eq!(ids.len(), 10);
}

#[tokio::test]
async fn test_get_by_id_after_unsaved_create_reads_local_snapshot() {
    let (store, database, _) = setup().await;
    let repo = repository(&database);
    store.reset_counters();

    let created = repo
        .create(product("SKU-1", 100), CommandOptions::deferred())
        .await
        .unwrap();
    let found = repo
        .get_by_id(&created.id, QueryOptions::default())
        .await
        .unwrap();

    assert_eq!(found, Some(created.clone()));
    assert_eq!(store.read_count(), 0);
    assert_eq!(store.write_count(), 0);
    assert_eq!(
        repo.context()
            .entry_state::<Product>(&created.id.to_string())
            .await,
        Some(EntityState::Added)
    );
}

#[tokio::test]
async fn test_cached_get_by_id_survives_unavailable_store() {
    let (store, database, cache) = setup().await;
    let created = cached(&database, &cache)
        .create(product("SKU-1", 100), CommandOptions::default())
        .await
        .unwrap();

    store.set_unavailable(true);
    let found = cached(&database, &cache)
        .get_by_id(&created.id, QueryOptions::no_tracking())
        .await
        .unwrap();

    assert_eq!(found, Some(created));
}

#[tokio::test]
async fn test_delete_by_missing_id_fails_without_writing() {
    let (store, database, _) = setup().await;
    store.reset_counters();
    let id = Uuid::new_v4();

    let result = repository(&database)
        .delete_by_id(&id, CommandOptions::default())
        .await;

    assert_eq!(
        result,
        Err(RepositoryError::NotFound {
            entity_type: "products",
            id: id.to_string(),
        })
    );
    assert_eq!(store.write_count(), 0);
}

#[tokio::test]
async fn test_cached_delete_empties_cache_and_store() {
    let (_, database, cache) = setup().await;
    let repo = cached(&database, &cache);
    let created = repo
        .create(product("SKU-1", 100), CommandOptions::default())
        .await
        .unwrap();
    assert!(!cache.is_empty().await);

    repo.delete(created.clone(), CommandOptions::default())
        .await
        .unwrap();

    assert!(cache.is_empty().await);
    let found = repository(&database)
        .get_by_id(&created.id, QueryOptions::default())
        .await
        .unwrap();
    assert!(found.is_none());
}

#[tokio::test]
async fn test_update_batch_changes_rows_but_not_cache() {
    let (_, database, cache) = setup().await;
    let repo = cached(&database, &cache);
    let cheap = repo
        .create(product("SKU-1", 100), CommandOptions::default())
        .await
        .unwrap();
    repo.create(product("SKU-2", 200), CommandOptions::default())
        .await
        .unwrap();
    repo.create(product("SKU-3", 900), CommandOptions::default())
        .await
        .unwrap();

    let affected = repo
        .update_batch(
            vec![Assignment::new("price", 150)],
            Some(Filter::lt("price", 500)),
        )
        .await
        .unwrap();
    assert_eq!(affected, 2);

    let stored = repository(&database)
        .get(Some(Filter::key(cheap.id.to_string())), QueryOptions::no_tracking())
        .first()
        .await
        .unwrap();
    assert_eq!(stored.map(|p| p.price), Some(150));

    let bytes = cache
        .get(&entity_key(Product::TABLE, cheap.id))
        .await
        .unwrap()
        .unwrap();
    let cached_copy: Product = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(cached_copy.price, 100);
}

#[tokio::test]
async fn test_write_then_read_tracked_and_untracked() {
    let (_, database, _) = setup().await;
    let created = repository(&database)
        .create(product("SKU-1", 100), CommandOptions::default())
        .await
        .unwrap();

    let tracked_repo = repository(&database);
    let tracked = tracked_repo
        .get_by_id(&created.id, QueryOptions::tracked())
        .await
        .unwrap();
    let untracked_repo = repository(&database);
    let untracked = untracked_repo
        .get_by_id(&created.id, QueryOptions::no_tracking())
        .await
        .unwrap();

    assert_eq!(tracked, Some(created.clone()));
    assert_eq!(untracked, Some(created.clone()));
    let key = created.id.to_string();
    assert_eq!(
        tracked_repo.context().entry_state::<Product>(&key).await,
        Some(EntityState::Unchanged)
    );
    assert_eq!(
        untracked_repo.context().entry_state::<Product>(&key).await,
        None
    );
}

#[tokio::test]
async fn test_concurrent_creates_on_distinct_contexts_never_collide() {
    let (_, database, _) = setup().await;

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let database = database.clone();
            tokio::spawn(async move {
                repository(&database)
                    .create(product(&format!("SKU-{i}"), i), CommandOptions::default())
                    .await
            })
        })
        .collect();

    let mut ids = HashSet::new();
    for handle in handles {
        ids.insert(handle.await.unwrap().unwrap().id);
    }

    assert_eq!(ids.len(), 16);
    let stored = repository(&database)
        .get(None, QueryOptions::no_tracking())
        .count()
        .await
        .unwrap();
    assert_eq!(stored, 16);
}

#[tokio::test]
async fn test_unique_index_rejects_duplicate_sku() {
    let (_, database, _) = setup().await;
    repository(&database)
        .create(product("SKU-1", 100), CommandOptions::default())
        .await
        .unwrap();

    let result = repository(&database)
        .create(product("SKU-1", 200), CommandOptions::default())
        .await;

    assert!(matches!(result, Err(RepositoryError::AlreadyExists { .. })));
}
