mod common;

use chrono::{DateTime, Duration, Utc};
use common::*;
use courier::jobs::{self, Job, JobQueue};
use serde_json::json;

async fn job_rows(db: &courier::db::Db) -> Vec<(String, i64, DateTime<Utc>)> {
    sqlx::query_as("SELECT kind, attempts, run_at FROM jobs ORDER BY created_at ASC, id ASC")
        .fetch_all(&db.0)
        .await
        .unwrap()
}

#[actix_web::test]
async fn successful_job_is_removed_from_the_queue() {
    let db = test_db().await;
    let cfg = test_config();
    let ctx = job_ctx(&db, &cfg);

    ctx.queue.enqueue(&Job::SetUsersOffline).await.unwrap();
    assert_eq!(ctx.queue.pending_count().await.unwrap(), 1);

    jobs::drain_due(&ctx).await.unwrap();
    assert_eq!(ctx.queue.pending_count().await.unwrap(), 0);
}

#[actix_web::test]
async fn undecodable_args_are_dropped_not_retried() {
    let db = test_db().await;
    let cfg = test_config();
    let ctx = job_ctx(&db, &cfg);

    let now = Utc::now();
    sqlx::query("INSERT INTO jobs(id, kind, args, run_at, attempts, created_at) VALUES (?, ?, ?, ?, 0, ?)")
        .bind("bad-job")
        .bind("publish")
        .bind("{not json")
        .bind(now)
        .bind(now)
        .execute(&db.0)
        .await
        .unwrap();

    jobs::drain_due(&ctx).await.unwrap();
    assert_eq!(ctx.queue.pending_count().await.unwrap(), 0);
}

#[actix_web::test]
async fn failing_job_backs_off_then_gives_up() {
    let db = test_db().await;
    let cfg = test_config();
    let ctx = job_ctx(&db, &cfg);
    let a = seed_user(&db, "alice").await;
    let chat = seed_chat(&db, &a, &[&a], false).await;

    // Sabotage the throttle table so the quota job errors on every run.
    sqlx::query("DROP TABLE throttle").execute(&db.0).await.unwrap();

    ctx.queue
        .enqueue(&Job::EnforceUserQuota { user_id: a.clone(), chat_id: chat.clone() })
        .await
        .unwrap();

    let before = Utc::now();
    jobs::drain_due(&ctx).await.unwrap();

    let rows = job_rows(&db).await;
    assert_eq!(rows.len(), 1);
    let (kind, attempts, run_at) = &rows[0];
    assert_eq!(kind, "enforce_user_quota");
    assert_eq!(*attempts, 1);
    // Backed off into the future, so an immediate re-drain skips it.
    assert!(*run_at > before + Duration::seconds(30));
    jobs::drain_due(&ctx).await.unwrap();
    assert_eq!(job_rows(&db).await[0].1, 1);

    // On the final allowed attempt the job is dropped instead of rescheduled.
    sqlx::query("UPDATE jobs SET attempts = 2, run_at = ?")
        .bind(Utc::now() - Duration::seconds(1))
        .execute(&db.0)
        .await
        .unwrap();
    jobs::drain_due(&ctx).await.unwrap();
    assert_eq!(ctx.queue.pending_count().await.unwrap(), 0);
}

#[actix_web::test]
async fn enqueue_on_commits_and_rolls_back_with_the_transaction() {
    let db = test_db().await;
    let cfg = test_config();
    let ctx = job_ctx(&db, &cfg);
    let job = Job::SweepOldMessages;

    let mut tx = db.0.begin().await.unwrap();
    JobQueue::enqueue_on(&mut tx, &job).await.unwrap();
    tx.rollback().await.unwrap();
    assert_eq!(ctx.queue.pending_count().await.unwrap(), 0);

    let mut tx = db.0.begin().await.unwrap();
    JobQueue::enqueue_on(&mut tx, &job).await.unwrap();
    tx.commit().await.unwrap();
    assert_eq!(ctx.queue.pending_count().await.unwrap(), 1);
    assert_eq!(queued_jobs(&db).await, vec![job]);
}

#[actix_web::test]
async fn quota_window_is_consumed_only_by_a_successful_run() {
    let db = test_db().await;
    let cfg = test_config();
    let ctx = job_ctx(&db, &cfg);
    let a = seed_user(&db, "alice").await;
    let chat = seed_chat(&db, &a, &[&a], false).await;

    let max = cfg.limits.max_chat_messages_per_user;
    let base = Utc::now() - Duration::days(1);
    for i in 0..(max + 1) {
        seed_message(&db, &chat, &a, &format!("msg {i}"), base + Duration::seconds(i)).await;
    }

    let job = Job::EnforceUserQuota { user_id: a.clone(), chat_id: chat.clone() };
    jobs::run_job(&ctx, &job).await.unwrap();
    let trimmed = message_count(&db, &chat).await;
    assert!(trimmed < max + 1);

    // Refill over the cap: the successful run stamped the window, so the
    // next trigger within it is a no-op.
    for i in 0..(max + 1 - trimmed) {
        let at = base + Duration::hours(1) + Duration::seconds(i);
        seed_message(&db, &chat, &a, &format!("more {i}"), at).await;
    }
    jobs::run_job(&ctx, &job).await.unwrap();
    assert_eq!(message_count(&db, &chat).await, max + 1);
}

#[actix_web::test]
async fn publish_to_an_emptied_chat_is_a_quiet_success() {
    let db = test_db().await;
    let cfg = test_config();
    let ctx = job_ctx(&db, &cfg);
    let a = seed_user(&db, "alice").await;
    let chat = seed_chat(&db, &a, &[], false).await;

    // No members left: nothing to send, no gateway call, job succeeds.
    let job = Job::Publish {
        event: "delete".to_string(),
        message: json!({"id": "gone"}),
        chat_id: chat,
    };
    jobs::run_job(&ctx, &job).await.unwrap();
}

#[actix_web::test]
async fn read_chat_messages_job_marks_reads_and_survives_gateway_outage() {
    let db = test_db().await;
    let mut cfg = test_config();
    // Point the gateway somewhere unreachable; broadcast failures are
    // swallowed, so the job must still succeed.
    cfg.gateway_url = "http://127.0.0.1:1/api".to_string();
    let ctx = job_ctx(&db, &cfg);

    let a = seed_user(&db, "alice").await;
    let b = seed_user(&db, "bob").await;
    let chat = seed_chat(&db, &a, &[&a, &b], false).await;
    let base = Utc::now() - Duration::minutes(5);
    let m1 = seed_message(&db, &chat, &a, "one", base).await;
    let m2 = seed_message(&db, &chat, &a, "two", base + Duration::seconds(1)).await;

    let job = Job::ReadChatMessages { user_id: b.clone(), chat_id: chat.clone() };
    jobs::run_job(&ctx, &job).await.unwrap();

    let mut conn = db.0.acquire().await.unwrap();
    for id in [&m1, &m2] {
        let readers = courier::store::messages::readers_for(&mut conn, id).await.unwrap();
        assert_eq!(readers.len(), 1);
        assert_eq!(readers[0].id, b);
    }
    drop(conn);

    // Nothing left unread: the job reports nothing to do on a second run.
    let again = courier::services::messages::read_chat_messages(&db, &chat, &b)
        .await
        .unwrap();
    assert!(again.is_none());
}
