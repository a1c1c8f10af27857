mod common;

use chrono::{Duration, Utc};
use common::*;
use courier::jobs::{quota, throttle};

#[actix_web::test]
async fn trim_removes_exact_excess_then_noops() {
    let db = test_db().await;
    let cfg = test_config();
    let a = seed_user(&db, "alice").await;
    let chat = seed_chat(&db, &a, &[&a], false).await;

    let max = cfg.limits.max_chat_messages_per_user;
    let batch = cfg.limits.messages_amount_to_delete_on_limit;

    let base = Utc::now() - Duration::days(1);
    for i in 0..(max + 1) {
        seed_message(&db, &chat, &a, &format!("msg {i}"), base + Duration::seconds(i)).await;
    }

    // count = MAX + 1 deletes (1 + batch) oldest, leaving MAX - batch.
    let deleted = quota::enforce_user_quota(&db, &cfg, &a, &chat).await.unwrap();
    assert_eq!(deleted as i64, 1 + batch);
    assert_eq!(message_count(&db, &chat).await, max - batch);

    // Oldest went first: the survivors start right after the trimmed span.
    let (oldest_text,): (String,) =
        sqlx::query_as("SELECT text FROM messages WHERE chat_id = ? ORDER BY created_at ASC LIMIT 1")
            .bind(&chat)
            .fetch_one(&db.0)
            .await
            .unwrap();
    assert_eq!(oldest_text, format!("msg {}", 1 + batch));

    // Re-running immediately is a no-op.
    let deleted = quota::enforce_user_quota(&db, &cfg, &a, &chat).await.unwrap();
    assert_eq!(deleted, 0);
    assert_eq!(message_count(&db, &chat).await, max - batch);
}

#[actix_web::test]
async fn below_cap_is_untouched() {
    let db = test_db().await;
    let cfg = test_config();
    let a = seed_user(&db, "alice").await;
    let chat = seed_chat(&db, &a, &[&a], false).await;

    let base = Utc::now() - Duration::hours(1);
    for i in 0..(cfg.limits.max_chat_messages_per_user - 1) {
        seed_message(&db, &chat, &a, &format!("msg {i}"), base + Duration::seconds(i)).await;
    }

    let deleted = quota::enforce_user_quota(&db, &cfg, &a, &chat).await.unwrap();
    assert_eq!(deleted, 0);
}

#[actix_web::test]
async fn trim_only_touches_the_offending_sender() {
    let db = test_db().await;
    let cfg = test_config();
    let a = seed_user(&db, "alice").await;
    let b = seed_user(&db, "bob").await;
    let chat = seed_chat(&db, &a, &[&a, &b], false).await;

    let base = Utc::now() - Duration::days(1);
    for i in 0..(cfg.limits.max_chat_messages_per_user + 1) {
        seed_message(&db, &chat, &a, &format!("a {i}"), base + Duration::seconds(i)).await;
    }
    seed_message(&db, &chat, &b, "b keeps this", base).await;

    quota::enforce_user_quota(&db, &cfg, &a, &chat).await.unwrap();

    let (bobs,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM messages WHERE chat_id = ? AND sender_id = ?")
            .bind(&chat)
            .bind(&b)
            .fetch_one(&db.0)
            .await
            .unwrap();
    assert_eq!(bobs, 1);
}

#[actix_web::test]
async fn bot_account_is_exempt() {
    let db = test_db().await;
    let cfg = test_config();
    let bot = seed_user(&db, &cfg.bot_username).await;
    let chat = seed_chat(&db, &bot, &[&bot], false).await;

    let base = Utc::now() - Duration::days(1);
    for i in 0..(cfg.limits.max_chat_messages_per_user + 10) {
        seed_message(&db, &chat, &bot, &format!("bot {i}"), base + Duration::seconds(i)).await;
    }

    let deleted = quota::enforce_user_quota(&db, &cfg, &bot, &chat).await.unwrap();
    assert_eq!(deleted, 0);
    assert_eq!(
        message_count(&db, &chat).await,
        cfg.limits.max_chat_messages_per_user + 10
    );
}

#[actix_web::test]
async fn throttle_window_is_consumed_only_by_a_stamp() {
    let db = test_db().await;
    let mut conn = db.0.acquire().await.unwrap();

    let interval = Duration::minutes(10);
    let ttl = Duration::minutes(20);

    // Checking is read-only: a failed run leaves the window open.
    assert!(throttle::ready(&mut conn, "quota:u:c", interval).await.unwrap());
    assert!(throttle::ready(&mut conn, "quota:u:c", interval).await.unwrap());

    throttle::stamp(&mut conn, "quota:u:c", ttl).await.unwrap();
    assert!(!throttle::ready(&mut conn, "quota:u:c", interval).await.unwrap());

    // Different key, different window.
    assert!(throttle::ready(&mut conn, "quota:u:other", interval).await.unwrap());

    // Age the entry past the interval: the key opens up again.
    sqlx::query("UPDATE throttle SET last_run_at = ? WHERE key = ?")
        .bind(Utc::now() - Duration::minutes(11))
        .bind("quota:u:c")
        .execute(&mut *conn)
        .await
        .unwrap();
    assert!(throttle::ready(&mut conn, "quota:u:c", interval).await.unwrap());
}
