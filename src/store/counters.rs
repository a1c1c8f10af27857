use sqlx::{Row, SqliteConnection};

use crate::models::ChatCounter;

/// Recomputes the (chat, user) tallies and upserts the cache row.
pub async fn refresh(
    conn: &mut SqliteConnection,
    chat_id: &str,
    user_id: &str,
) -> Result<ChatCounter, sqlx::Error> {
    let row = sqlx::query(
        "SELECT
            (SELECT COUNT(*) FROM chat_members WHERE user_id = ?) AS chats_count,
            (SELECT COUNT(*) FROM messages WHERE chat_id = ? AND sender_id = ?) AS messages_count,
            (SELECT COUNT(*) FROM messages
             WHERE chat_id = ?
               AND id NOT IN (SELECT message_id FROM message_reads WHERE user_id = ?)) AS unread_messages_count",
    )
    .bind(user_id)
    .bind(chat_id)
    .bind(user_id)
    .bind(chat_id)
    .bind(user_id)
    .fetch_one(&mut *conn)
    .await?;

    let counter = ChatCounter {
        id: uuid::Uuid::new_v4().to_string(),
        chat_id: Some(chat_id.to_string()),
        user_id: Some(user_id.to_string()),
        chats_count: row.get("chats_count"),
        messages_count: row.get("messages_count"),
        unread_messages_count: row.get("unread_messages_count"),
    };

    sqlx::query(
        "INSERT INTO chat_counters(id, chat_id, user_id, chats_count, messages_count, unread_messages_count)
         VALUES (?, ?, ?, ?, ?, ?)
         ON CONFLICT(chat_id, user_id) DO UPDATE SET
            chats_count = excluded.chats_count,
            messages_count = excluded.messages_count,
            unread_messages_count = excluded.unread_messages_count",
    )
    .bind(&counter.id)
    .bind(&counter.chat_id)
    .bind(&counter.user_id)
    .bind(counter.chats_count)
    .bind(counter.messages_count)
    .bind(counter.unread_messages_count)
    .execute(conn)
    .await?;

    Ok(counter)
}
