#![cfg(feature = "sqlite")]

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use repokit::context::{Database, EntityState};
use repokit::migrations::{pending_migrations, MigrationRunner};
use repokit::repository::{EntityRepository, PrimaryEntityRepository, PrimaryEntityRepositoryBase};
use repokit::storage::SqliteStore;
use repokit_core::entity::{Entity, PrimaryEntity};
use repokit_core::model::ModelBuilder;
use repokit_core::options::{CommandOptions, QueryOptions};
use repokit_core::query::{Assignment, Filter, MemberCheck};
use repokit_core::storage::RepositoryError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Vendor {
    name: String,
    country: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Part {
    code: String,
    stock: i64,
    active: bool,
    vendor: Vendor,
}

impl Entity for Part {
    const TABLE: &'static str = "parts";

    fn row_key(&self) -> String {
        self.code.clone()
    }
}

impl PrimaryEntity for Part {
    type Key = String;
    const ID_FIELD: &'static str = "code";

    fn id(&self) -> &String {
        &self.code
    }

    fn set_id(&mut self, id: String) {
        self.code = id;
    }
}

fn part(code: &str, stock: i64, country: Option<&str>) -> Part {
    Part {
        code: code.to_string(),
        stock,
        active: true,
        vendor: Vendor {
            name: "Acme".to_string(),
            country: country.map(str::to_string),
        },
    }
}

async fn database() -> Database {
    let store = SqliteStore::new_in_memory().await.unwrap();
    let mut builder = ModelBuilder::new("inventory");
    builder.configure::<Part, _>(|p| {
        p.has_index(&["vendor.country"]).has_unique_index(&["code"]);
    });
    let database = Database::new(Arc::new(store), builder.build().unwrap());

    let mut runner = MigrationRunner::new();
    runner.register(database.clone());
    runner.migrate("inventory").await.unwrap();
    database
}

fn parts(database: &Database) -> PrimaryEntityRepositoryBase<Part> {
    PrimaryEntityRepositoryBase::new(database.context())
}

#[tokio::test]
async fn test_migrations_leave_nothing_pending() {
    let database = database().await;

    assert!(pending_migrations(&database).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_round_trip_preserves_nested_documents() {
    let database = database().await;
    let created = parts(&database)
        .create(part("P-1", 5, Some("UY")), CommandOptions::default())
        .await
        .unwrap();

    let repo = parts(&database);
    let found = repo
        .get_by_id(&"P-1".to_string(), QueryOptions::default())
        .await
        .unwrap();

    assert_eq!(found, Some(created));
    assert_eq!(
        repo.context().entry_state::<Part>("P-1").await,
        Some(EntityState::Unchanged)
    );
}

#[tokio::test]
async fn test_queries_filter_order_and_page() {
    let database = database().await;
    let repo = parts(&database);
    for (code, stock, country) in [
        ("P-1", 5, Some("UY")),
        ("P-2", 0, Some("AR")),
        ("P-3", 12, None),
        ("P-4", 7, Some("UY")),
    ] {
        repo.create(part(code, stock, country), CommandOptions::deferred())
            .await
            .unwrap();
    }
    assert_eq!(repo.context().save_changes().await.unwrap(), 4);

    let reader = parts(&database);
    let in_uy = reader
        .get(Some(Filter::eq("vendor.country", "UY")), QueryOptions::no_tracking())
        .order_by_descending("stock")
        .keys()
        .await
        .unwrap();
    assert_eq!(in_uy, vec!["P-4", "P-1"]);

    // Missing country never equals or differs from a value
    let not_uy = reader
        .get(Some(Filter::ne("vendor.country", "UY")), QueryOptions::no_tracking())
        .count()
        .await
        .unwrap();
    assert_eq!(not_uy, 1);

    let page = reader
        .get(None, QueryOptions::no_tracking())
        .order_by("stock")
        .skip(1)
        .take(2)
        .select::<i64>("stock")
        .to_list()
        .await
        .unwrap();
    assert_eq!(page, vec![5, 7]);
}

#[tokio::test]
async fn test_check_distinguishes_null_members() {
    let database = database().await;
    let repo = parts(&database);
    repo.create(part("P-1", 0, None), CommandOptions::default())
        .await
        .unwrap();

    let country: MemberCheck<String> = repo
        .check_member(Filter::key("P-1"), "vendor.country")
        .await
        .unwrap();
    assert_eq!(country, MemberCheck::Null);

    let missing: MemberCheck<String> = repo
        .check_member(Filter::key("P-9"), "vendor.country")
        .await
        .unwrap();
    assert_eq!(missing, MemberCheck::NoMatch);

    let stock = repo
        .get(Some(Filter::key("P-1")), QueryOptions::no_tracking())
        .select::<i64>("stock");
    assert!(!repo.check(stock, None).await.unwrap());
}

#[tokio::test]
async fn test_batch_update_and_delete() {
    let database = database().await;
    let repo = parts(&database);
    for (code, stock) in [("P-1", 0), ("P-2", 3), ("P-3", 0)] {
        repo.create(part(code, stock, Some("UY")), CommandOptions::default())
            .await
            .unwrap();
    }

    let affected = repo
        .update_batch(vec![Assignment::new("active", false)], Some(Filter::eq("stock", 0)))
        .await
        .unwrap();
    assert_eq!(affected, 2);

    repo.delete_batch(|q| q.filter(Filter::eq("active", false)))
        .await
        .unwrap();

    let left = parts(&database)
        .get(None, QueryOptions::no_tracking())
        .keys()
        .await
        .unwrap();
    assert_eq!(left, vec!["P-2"]);
}

#[tokio::test]
async fn test_failed_save_commits_nothing() {
    let database = database().await;
    parts(&database)
        .create(part("P-1", 1, None), CommandOptions::default())
        .await
        .unwrap();

    let repo = parts(&database);
    repo.create(part("P-2", 1, None), CommandOptions::deferred())
        .await
        .unwrap();
    let result = repo
        .create(part("P-1", 9, None), CommandOptions::default())
        .await;

    assert!(matches!(result, Err(RepositoryError::AlreadyExists { .. })));
    let stored = parts(&database)
        .get(None, QueryOptions::no_tracking())
        .count()
        .await
        .unwrap();
    assert_eq!(stored, 1);
}

#[tokio::test]
async fn test_delete_by_id_removes_row() {
    let database = database().await;
    parts(&database)
        .create(part("P-1", 1, None), CommandOptions::default())
        .await
        .unwrap();

    let deleted = parts(&database)
        .delete_by_id(&"P-1".to_string(), CommandOptions::default())
        .await
        .unwrap();

    assert_eq!(deleted.code, "P-1");
    assert!(!parts(&database)
        .get(None, QueryOptions::no_tracking())
        .any()
        .await
        .unwrap());
}
