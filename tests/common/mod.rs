#![allow(dead_code)]

use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use courier::config::Config;
use courier::db::Db;
use courier::jobs::{Job, JobContext, JobQueue};
use courier::models::{Chat, Message, User};
use courier::publisher::EventPublisher;
use courier::store;

/// Fresh in-memory database with the full schema. One connection, so every
/// caller sees the same memory database.
pub async fn test_db() -> Db {
    let opts = SqliteConnectOptions::from_str("sqlite::memory:")
        .unwrap()
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(opts)
        .await
        .unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    Db(pool)
}

pub fn test_config() -> Config {
    Config::default()
}

pub fn job_ctx(db: &Db, cfg: &Config) -> JobContext {
    JobContext {
        db: db.clone(),
        cfg: cfg.clone(),
        queue: JobQueue::new(db),
        publisher: EventPublisher::new(cfg),
    }
}

pub async fn seed_user(db: &Db, username: &str) -> String {
    let now = Utc::now();
    let user = User {
        id: uuid::Uuid::new_v4().to_string(),
        username: username.to_string(),
        first_name: username.to_string(),
        last_name: "Tester".to_string(),
        bio: None,
        avatar: None,
        is_online: false,
        last_online_at: now,
        created_at: now,
    };
    let mut conn = db.0.acquire().await.unwrap();
    store::users::insert(&mut conn, &user, "not-a-real-hash")
        .await
        .unwrap();
    user.id
}

pub async fn seed_chat(db: &Db, creator: &str, members: &[&str], is_private: bool) -> String {
    let now = Utc::now();
    let chat = Chat {
        id: uuid::Uuid::new_v4().to_string(),
        title: if is_private { None } else { Some("test chat".to_string()) },
        avatar: None,
        creator_id: Some(creator.to_string()),
        is_private,
        created_at: now,
        updated_at: now,
    };
    let mut conn = db.0.acquire().await.unwrap();
    store::chats::insert(&mut conn, &chat).await.unwrap();
    for member in members {
        store::chats::add_member(&mut conn, &chat.id, member).await.unwrap();
    }
    chat.id
}

pub async fn seed_message(
    db: &Db,
    chat_id: &str,
    sender_id: &str,
    text: &str,
    created_at: DateTime<Utc>,
) -> String {
    let msg = Message {
        id: uuid::Uuid::new_v4().to_string(),
        chat_id: chat_id.to_string(),
        sender_id: Some(sender_id.to_string()),
        text: Some(text.to_string()),
        voice: None,
        created_at,
        updated_at: created_at,
    };
    let mut conn = db.0.acquire().await.unwrap();
    store::messages::insert(&mut conn, &msg).await.unwrap();
    msg.id
}

/// Decoded queue contents, enqueue order.
pub async fn queued_jobs(db: &Db) -> Vec<Job> {
    let rows: Vec<(String,)> =
        sqlx::query_as("SELECT args FROM jobs ORDER BY created_at ASC, id ASC")
            .fetch_all(&db.0)
            .await
            .unwrap();
    rows.iter()
        .map(|(args,)| serde_json::from_str(args).unwrap())
        .collect()
}

pub async fn message_count(db: &Db, chat_id: &str) -> i64 {
    let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM messages WHERE chat_id = ?")
        .bind(chat_id)
        .fetch_one(&db.0)
        .await
        .unwrap();
    n
}
