use chrono::{DateTime, Utc};
use sqlx::{Row, SqliteConnection, sqlite::SqliteRow};

use crate::models::User;

fn map_user(r: &SqliteRow) -> User {
    User {
        id: r.get("id"),
        username: r.get("username"),
        first_name: r.get("first_name"),
        last_name: r.get("last_name"),
        bio: r.get("bio"),
        avatar: r.get("avatar"),
        is_online: r.get("is_online"),
        last_online_at: r.get("last_online_at"),
        created_at: r.get("created_at"),
    }
}

const USER_COLS: &str =
    "id, username, first_name, last_name, bio, avatar, is_online, last_online_at, created_at";

pub async fn insert(
    conn: &mut SqliteConnection,
    user: &User,
    password_hash: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO users(id, username, password_hash, first_name, last_name, bio, avatar, is_online, last_online_at, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&user.id)
    .bind(&user.username)
    .bind(password_hash)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(&user.bio)
    .bind(&user.avatar)
    .bind(user.is_online)
    .bind(user.last_online_at)
    .bind(user.created_at)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn get(conn: &mut SqliteConnection, id: &str) -> Result<Option<User>, sqlx::Error> {
    let row = sqlx::query(&format!("SELECT {USER_COLS} FROM users WHERE id = ?"))
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(row.as_ref().map(map_user))
}

pub async fn get_by_username(
    conn: &mut SqliteConnection,
    username: &str,
) -> Result<Option<User>, sqlx::Error> {
    let row = sqlx::query(&format!("SELECT {USER_COLS} FROM users WHERE username = ?"))
        .bind(username)
        .fetch_optional(conn)
        .await?;
    Ok(row.as_ref().map(map_user))
}

pub async fn credentials(
    conn: &mut SqliteConnection,
    username: &str,
) -> Result<Option<(String, String)>, sqlx::Error> {
    let row = sqlx::query("SELECT id, password_hash FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(conn)
        .await?;
    Ok(row.map(|r| (r.get("id"), r.get("password_hash"))))
}

pub async fn touch_online(
    conn: &mut SqliteConnection,
    id: &str,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET is_online = 1, last_online_at = ? WHERE id = ?")
        .bind(now)
        .bind(id)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn set_stale_offline(
    conn: &mut SqliteConnection,
    threshold: DateTime<Utc>,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("UPDATE users SET is_online = 0 WHERE is_online = 1 AND last_online_at < ?")
        .bind(threshold)
        .execute(conn)
        .await?;
    Ok(result.rows_affected())
}

pub async fn accounts_on_ip(
    conn: &mut SqliteConnection,
    ip_address: &str,
) -> Result<i64, sqlx::Error> {
    let row = sqlx::query("SELECT COUNT(*) AS n FROM user_ips WHERE ip_address = ?")
        .bind(ip_address)
        .fetch_one(conn)
        .await?;
    Ok(row.get("n"))
}

pub async fn record_ip(
    conn: &mut SqliteConnection,
    user_id: &str,
    ip_address: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO user_ips(id, user_id, ip_address) VALUES (?, ?, ?)")
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(user_id)
        .bind(ip_address)
        .execute(conn)
        .await?;
    Ok(())
}
