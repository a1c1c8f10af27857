mod common;

use chrono::{Duration, Utc};
use common::*;
use courier::jobs::{presence, retention};
use courier::store;

#[actix_web::test]
async fn old_messages_are_swept_new_ones_survive() {
    let db = test_db().await;
    let cfg = test_config();
    let a = seed_user(&db, "alice").await;
    let bot = seed_user(&db, &cfg.bot_username).await;
    let chat = seed_chat(&db, &a, &[&a, &bot], false).await;

    let old = seed_message(&db, &chat, &a, "old", Utc::now() - Duration::days(8)).await;
    let fresh = seed_message(&db, &chat, &a, "fresh", Utc::now() - Duration::days(6)).await;
    let bot_old = seed_message(&db, &chat, &bot, "bot old", Utc::now() - Duration::days(30)).await;

    // A message whose sender deleted their account still ages out.
    let orphan = seed_message(&db, &chat, &a, "orphan", Utc::now() - Duration::days(9)).await;
    sqlx::query("UPDATE messages SET sender_id = NULL WHERE id = ?")
        .bind(&orphan)
        .execute(&db.0)
        .await
        .unwrap();

    let deleted = retention::sweep_old_messages(&db, &cfg).await.unwrap();
    assert_eq!(deleted, 2);

    let mut conn = db.0.acquire().await.unwrap();
    assert!(store::messages::get(&mut conn, &old).await.unwrap().is_none());
    assert!(store::messages::get(&mut conn, &orphan).await.unwrap().is_none());
    assert!(store::messages::get(&mut conn, &fresh).await.unwrap().is_some());
    assert!(store::messages::get(&mut conn, &bot_old).await.unwrap().is_some());
}

#[actix_web::test]
async fn inactive_chats_are_swept_with_their_messages() {
    let db = test_db().await;
    let cfg = test_config();
    let a = seed_user(&db, "alice").await;
    let bot = seed_user(&db, &cfg.bot_username).await;

    let stale = seed_chat(&db, &a, &[&a], false).await;
    let active = seed_chat(&db, &a, &[&a], false).await;
    let bot_stale = seed_chat(&db, &bot, &[&bot], false).await;

    let msg = seed_message(&db, &stale, &a, "buried", Utc::now() - Duration::days(20)).await;

    let stale_since = Utc::now() - Duration::days(15);
    for id in [&stale, &bot_stale] {
        sqlx::query("UPDATE chats SET updated_at = ? WHERE id = ?")
            .bind(stale_since)
            .bind(id)
            .execute(&db.0)
            .await
            .unwrap();
    }

    let deleted = retention::sweep_old_chats(&db, &cfg).await.unwrap();
    assert_eq!(deleted, 1);

    let mut conn = db.0.acquire().await.unwrap();
    assert!(store::chats::get(&mut conn, &stale).await.unwrap().is_none());
    assert!(store::chats::get(&mut conn, &active).await.unwrap().is_some());
    assert!(store::chats::get(&mut conn, &bot_stale).await.unwrap().is_some());
    // Cascade took the buried message along.
    assert!(store::messages::get(&mut conn, &msg).await.unwrap().is_none());
}

#[actix_web::test]
async fn quiet_users_decay_to_offline() {
    let db = test_db().await;
    let cfg = test_config();
    let quiet = seed_user(&db, "quiet").await;
    let active = seed_user(&db, "active").await;

    let mut conn = db.0.acquire().await.unwrap();
    store::users::touch_online(&mut conn, &quiet, Utc::now() - Duration::minutes(10)).await.unwrap();
    store::users::touch_online(&mut conn, &active, Utc::now()).await.unwrap();
    drop(conn);

    let flipped = presence::set_users_offline(&db, &cfg).await.unwrap();
    assert_eq!(flipped, 1);

    let mut conn = db.0.acquire().await.unwrap();
    assert!(!store::users::get(&mut conn, &quiet).await.unwrap().unwrap().is_online);
    assert!(store::users::get(&mut conn, &active).await.unwrap().unwrap().is_online);
}
