use chrono::{DateTime, Utc};
use sqlx::{Row, SqliteConnection, sqlite::SqliteRow};

use crate::models::Chat;

fn map_chat(r: &SqliteRow) -> Chat {
    Chat {
        id: r.get("id"),
        title: r.get("title"),
        avatar: r.get("avatar"),
        creator_id: r.get("creator_id"),
        is_private: r.get("is_private"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    }
}

const CHAT_COLS: &str = "id, title, avatar, creator_id, is_private, created_at, updated_at";

pub async fn insert(conn: &mut SqliteConnection, chat: &Chat) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO chats(id, title, avatar, creator_id, is_private, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&chat.id)
    .bind(&chat.title)
    .bind(&chat.avatar)
    .bind(&chat.creator_id)
    .bind(chat.is_private)
    .bind(chat.created_at)
    .bind(chat.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn get(conn: &mut SqliteConnection, id: &str) -> Result<Option<Chat>, sqlx::Error> {
    let row = sqlx::query(&format!("SELECT {CHAT_COLS} FROM chats WHERE id = ?"))
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(row.as_ref().map(map_chat))
}

pub async fn is_member(
    conn: &mut SqliteConnection,
    chat_id: &str,
    user_id: &str,
) -> Result<bool, sqlx::Error> {
    let row = sqlx::query("SELECT 1 FROM chat_members WHERE chat_id = ? AND user_id = ?")
        .bind(chat_id)
        .bind(user_id)
        .fetch_optional(conn)
        .await?;
    Ok(row.is_some())
}

pub async fn member_ids(
    conn: &mut SqliteConnection,
    chat_id: &str,
) -> Result<Vec<String>, sqlx::Error> {
    let rows = sqlx::query("SELECT user_id FROM chat_members WHERE chat_id = ?")
        .bind(chat_id)
        .fetch_all(conn)
        .await?;
    Ok(rows.into_iter().map(|r| r.get("user_id")).collect())
}

pub async fn add_member(
    conn: &mut SqliteConnection,
    chat_id: &str,
    user_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT OR IGNORE INTO chat_members(chat_id, user_id) VALUES (?, ?)")
        .bind(chat_id)
        .bind(user_id)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn remove_member(
    conn: &mut SqliteConnection,
    chat_id: &str,
    user_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM chat_members WHERE chat_id = ? AND user_id = ?")
        .bind(chat_id)
        .bind(user_id)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn member_count(
    conn: &mut SqliteConnection,
    chat_id: &str,
) -> Result<i64, sqlx::Error> {
    let row = sqlx::query("SELECT COUNT(*) AS n FROM chat_members WHERE chat_id = ?")
        .bind(chat_id)
        .fetch_one(conn)
        .await?;
    Ok(row.get("n"))
}

pub async fn touch_updated(
    conn: &mut SqliteConnection,
    chat_id: &str,
    ts: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE chats SET updated_at = ? WHERE id = ?")
        .bind(ts)
        .bind(chat_id)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn set_title_avatar(
    conn: &mut SqliteConnection,
    chat_id: &str,
    title: Option<&str>,
    avatar: Option<&str>,
    ts: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE chats SET title = COALESCE(?, title), avatar = COALESCE(?, avatar), updated_at = ? WHERE id = ?",
    )
    .bind(title)
    .bind(avatar)
    .bind(ts)
    .bind(chat_id)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn delete(conn: &mut SqliteConnection, id: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM chats WHERE id = ?")
        .bind(id)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn list_for_user(
    conn: &mut SqliteConnection,
    user_id: &str,
) -> Result<Vec<Chat>, sqlx::Error> {
    let rows = sqlx::query(&format!(
        "SELECT {CHAT_COLS} FROM chats
         WHERE id IN (SELECT chat_id FROM chat_members WHERE user_id = ?)
         ORDER BY updated_at DESC"
    ))
    .bind(user_id)
    .fetch_all(conn)
    .await?;
    Ok(rows.iter().map(map_chat).collect())
}

pub async fn find_private_pair(
    conn: &mut SqliteConnection,
    user_a: &str,
    user_b: &str,
) -> Result<Option<Chat>, sqlx::Error> {
    let row = sqlx::query(&format!(
        "SELECT {CHAT_COLS} FROM chats c
         WHERE c.is_private = 1
           AND EXISTS (SELECT 1 FROM chat_members WHERE chat_id = c.id AND user_id = ?)
           AND EXISTS (SELECT 1 FROM chat_members WHERE chat_id = c.id AND user_id = ?)
           AND (SELECT COUNT(*) FROM chat_members WHERE chat_id = c.id) = 2
         LIMIT 1"
    ))
    .bind(user_a)
    .bind(user_b)
    .fetch_optional(conn)
    .await?;
    Ok(row.as_ref().map(map_chat))
}

pub async fn count_created_by(
    conn: &mut SqliteConnection,
    creator_id: &str,
    is_private: bool,
) -> Result<i64, sqlx::Error> {
    let row = sqlx::query("SELECT COUNT(*) AS n FROM chats WHERE creator_id = ? AND is_private = ?")
        .bind(creator_id)
        .bind(is_private)
        .fetch_one(conn)
        .await?;
    Ok(row.get("n"))
}

// A null creator (deleted user) still sweeps; only the bot is exempt.
pub async fn delete_inactive_before(
    conn: &mut SqliteConnection,
    threshold: DateTime<Utc>,
    bot_username: &str,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "DELETE FROM chats
         WHERE updated_at < ?
           AND (creator_id IS NULL
                OR creator_id NOT IN (SELECT id FROM users WHERE username = ?))",
    )
    .bind(threshold)
    .bind(bot_username)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}
