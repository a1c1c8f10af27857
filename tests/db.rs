use courier::config::Config;
use courier::db::Db;

#[actix_web::test]
async fn open_creates_the_database_and_schema() {
    let path = std::env::temp_dir().join(format!("courier-{}.sqlite3", uuid::Uuid::new_v4()));
    let mut cfg = Config::default();
    cfg.database_path = path.to_string_lossy().into_owned();
    cfg.database_max_connections = 2;

    let db = Db::open(&cfg).await.unwrap();
    assert!(path.exists());

    let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM jobs")
        .fetch_one(&db.0)
        .await
        .unwrap();
    assert_eq!(n, 0);

    // Reopening against the existing file must not re-run migrations.
    db.0.close().await;
    let db = Db::open(&cfg).await.unwrap();
    db.0.close().await;

    for suffix in ["", "-wal", "-shm"] {
        let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
    }
}
