//! Integration tests for schema initialization using in-memory SurrealDB.

use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};

async fn table_names(db: &Surreal<Db>) -> Vec<String> {
    let mut result = db.query("INFO FOR DB").await.unwrap();
    let info: Option<serde_json::Value> = result.take(0).unwrap();
    let info = info.expect("INFO FOR DB should return a value");
    info["tables"]
        .as_object()
        .expect("INFO FOR DB lists tables")
        .keys()
        .cloned()
        .collect()
}

#[tokio::test]
async fn master_migration_applies_successfully() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();

    tessera_db::migrate_master(&db).await.unwrap();

    let tables = table_names(&db).await;
    for table in [
        "tenant",
        "subscription_type",
        "subscription_info",
        "master_user",
        "session",
        "_migration",
    ] {
        assert!(tables.iter().any(|t| t == table), "missing {table} table");
    }
}

#[tokio::test]
async fn master_migration_is_idempotent() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();

    tessera_db::migrate_master(&db).await.unwrap();
    tessera_db::migrate_master(&db).await.unwrap();

    let mut result = db.query("SELECT * FROM _migration").await.unwrap();
    let records: Vec<surrealdb_types::Value> = result.take(0).unwrap();
    assert_eq!(records.len(), 1, "expected exactly one migration record");
}

#[tokio::test]
async fn tenant_migration_creates_user_table_only() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("acme_tenant").await.unwrap();

    tessera_db::migrate_tenant(&db).await.unwrap();
    tessera_db::migrate_tenant(&db).await.unwrap();

    let mut tables = table_names(&db).await;
    tables.sort();
    assert_eq!(tables, vec!["_migration".to_string(), "user".to_string()]);

    let mut result = db.query("SELECT * FROM _migration").await.unwrap();
    let records: Vec<surrealdb_types::Value> = result.take(0).unwrap();
    assert_eq!(records.len(), 1);
}

#[tokio::test]
async fn duplicate_subdomain_rejected_by_index() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    tessera_db::migrate_master(&db).await.unwrap();

    let insert = "CREATE tenant SET subdomain_identifier = 'acme', \
                  connection_descriptor = 'mem://#test/acme_tenant', \
                  status = 'Registered'";
    db.query(insert).await.unwrap().check().unwrap();

    let second = db.query(insert).await.unwrap().check();
    assert!(second.is_err(), "unique index should reject the duplicate");
}

#[tokio::test]
async fn unknown_status_rejected_by_assert() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    tessera_db::migrate_master(&db).await.unwrap();

    let result = db
        .query(
            "CREATE tenant SET subdomain_identifier = 'acme', \
             connection_descriptor = 'mem://#test/acme_tenant', \
             status = 'Half-done'",
        )
        .await
        .unwrap()
        .check();
    assert!(result.is_err());
}
