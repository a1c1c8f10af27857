use chrono::{DateTime, Utc};
use sqlx::{Row, SqliteConnection, sqlite::SqliteRow};

use crate::models::{Message, MessageFile, User};

fn map_message(r: &SqliteRow) -> Message {
    Message {
        id: r.get("id"),
        chat_id: r.get("chat_id"),
        sender_id: r.get("sender_id"),
        text: r.get("text"),
        voice: r.get("voice"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    }
}

const MESSAGE_COLS: &str = "id, chat_id, sender_id, text, voice, created_at, updated_at";

pub async fn insert(conn: &mut SqliteConnection, msg: &Message) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO messages(id, chat_id, sender_id, text, voice, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&msg.id)
    .bind(&msg.chat_id)
    .bind(&msg.sender_id)
    .bind(&msg.text)
    .bind(&msg.voice)
    .bind(msg.created_at)
    .bind(msg.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn insert_file(
    conn: &mut SqliteConnection,
    file: &MessageFile,
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO message_files(id, message_id, item) VALUES (?, ?, ?)")
        .bind(&file.id)
        .bind(&file.message_id)
        .bind(&file.item)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn get(conn: &mut SqliteConnection, id: &str) -> Result<Option<Message>, sqlx::Error> {
    let row = sqlx::query(&format!("SELECT {MESSAGE_COLS} FROM messages WHERE id = ?"))
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(row.as_ref().map(map_message))
}

pub async fn files_for(
    conn: &mut SqliteConnection,
    message_id: &str,
) -> Result<Vec<String>, sqlx::Error> {
    let rows = sqlx::query("SELECT item FROM message_files WHERE message_id = ?")
        .bind(message_id)
        .fetch_all(conn)
        .await?;
    Ok(rows.into_iter().map(|r| r.get("item")).collect())
}

pub async fn readers_for(
    conn: &mut SqliteConnection,
    message_id: &str,
) -> Result<Vec<User>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT u.id, u.username, u.first_name, u.last_name, u.bio, u.avatar, u.is_online, u.last_online_at, u.created_at
         FROM message_reads mr
         INNER JOIN users u ON u.id = mr.user_id
         WHERE mr.message_id = ?",
    )
    .bind(message_id)
    .fetch_all(conn)
    .await?;
    Ok(rows
        .into_iter()
        .map(|r| User {
            id: r.get("id"),
            username: r.get("username"),
            first_name: r.get("first_name"),
            last_name: r.get("last_name"),
            bio: r.get("bio"),
            avatar: r.get("avatar"),
            is_online: r.get("is_online"),
            last_online_at: r.get("last_online_at"),
            created_at: r.get("created_at"),
        })
        .collect())
}

pub async fn set_text(
    conn: &mut SqliteConnection,
    id: &str,
    text: &str,
    updated_at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE messages SET text = ?, updated_at = ? WHERE id = ?")
        .bind(text)
        .bind(updated_at)
        .bind(id)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn delete(conn: &mut SqliteConnection, id: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM messages WHERE id = ?")
        .bind(id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Idempotent read mark. Returns whether the mark was newly added.
pub async fn mark_read(
    conn: &mut SqliteConnection,
    message_id: &str,
    user_id: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("INSERT OR IGNORE INTO message_reads(message_id, user_id) VALUES (?, ?)")
        .bind(message_id)
        .bind(user_id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn unread_ids_for(
    conn: &mut SqliteConnection,
    chat_id: &str,
    user_id: &str,
) -> Result<Vec<String>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT id FROM messages
         WHERE chat_id = ?
           AND id NOT IN (SELECT message_id FROM message_reads WHERE user_id = ?)
         ORDER BY created_at ASC, rowid ASC",
    )
    .bind(chat_id)
    .bind(user_id)
    .fetch_all(conn)
    .await?;
    Ok(rows.into_iter().map(|r| r.get("id")).collect())
}

pub async fn mark_chat_read(
    conn: &mut SqliteConnection,
    chat_id: &str,
    user_id: &str,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "INSERT OR IGNORE INTO message_reads(message_id, user_id)
         SELECT id, ? FROM messages WHERE chat_id = ?",
    )
    .bind(user_id)
    .bind(chat_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

pub async fn count_by_sender(
    conn: &mut SqliteConnection,
    chat_id: &str,
    sender_id: &str,
) -> Result<i64, sqlx::Error> {
    let row = sqlx::query("SELECT COUNT(*) AS n FROM messages WHERE chat_id = ? AND sender_id = ?")
        .bind(chat_id)
        .bind(sender_id)
        .fetch_one(conn)
        .await?;
    Ok(row.get("n"))
}

pub async fn delete_oldest_by_sender(
    conn: &mut SqliteConnection,
    chat_id: &str,
    sender_id: &str,
    limit: i64,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "DELETE FROM messages WHERE id IN (
             SELECT id FROM messages
             WHERE chat_id = ? AND sender_id = ?
             ORDER BY created_at ASC, rowid ASC
             LIMIT ?
         )",
    )
    .bind(chat_id)
    .bind(sender_id)
    .bind(limit)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

// Null-sender messages are swept like the rest; only the bot is exempt.
pub async fn delete_created_before(
    conn: &mut SqliteConnection,
    threshold: DateTime<Utc>,
    bot_username: &str,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "DELETE FROM messages
         WHERE created_at < ?
           AND (sender_id IS NULL
                OR sender_id NOT IN (SELECT id FROM users WHERE username = ?))",
    )
    .bind(threshold)
    .bind(bot_username)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

pub async fn latest_in_chat(
    conn: &mut SqliteConnection,
    chat_id: &str,
) -> Result<Option<Message>, sqlx::Error> {
    let row = sqlx::query(&format!(
        "SELECT {MESSAGE_COLS} FROM messages WHERE chat_id = ? ORDER BY created_at DESC, rowid DESC LIMIT 1"
    ))
    .bind(chat_id)
    .fetch_optional(conn)
    .await?;
    Ok(row.as_ref().map(map_message))
}

pub async fn list_for_chat(
    conn: &mut SqliteConnection,
    chat_id: &str,
    before: Option<DateTime<Utc>>,
    limit: i64,
) -> Result<Vec<Message>, sqlx::Error> {
    let rows = if let Some(before) = before {
        sqlx::query(&format!(
            "SELECT {MESSAGE_COLS} FROM messages
             WHERE chat_id = ? AND created_at < ?
             ORDER BY created_at DESC, rowid DESC LIMIT ?"
        ))
        .bind(chat_id)
        .bind(before)
        .bind(limit)
        .fetch_all(conn)
        .await?
    } else {
        sqlx::query(&format!(
            "SELECT {MESSAGE_COLS} FROM messages
             WHERE chat_id = ?
             ORDER BY created_at DESC, rowid DESC LIMIT ?"
        ))
        .bind(chat_id)
        .bind(limit)
        .fetch_all(conn)
        .await?
    };
    Ok(rows.iter().map(map_message).collect())
}
