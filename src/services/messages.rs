//! Message lifecycle: create, edit, delete, read receipts. Side effects
//! (publish, quota) are enqueued inside the operation's transaction, so
//! they only become visible if it commits.

use chrono::Utc;
use serde::Deserialize;
use sqlx::SqliteConnection;

use crate::config::Config;
use crate::db::Db;
use crate::errors::ApiError;
use crate::jobs::{Job, JobQueue};
use crate::models::{render_user, Message, MessageFile, MessageView};
use crate::store;

const VOICE_EXTENSIONS: [&str; 3] = ["mp3", "wav", "ogg"];

#[derive(Deserialize, Debug, Clone, Default)]
pub struct NewMessage {
    pub text: Option<String>,
    pub voice: Option<String>,
    #[serde(default)]
    pub files: Vec<String>,
}

pub async fn load_view(
    conn: &mut SqliteConnection,
    msg: &Message,
) -> Result<MessageView, sqlx::Error> {
    let sender = match &msg.sender_id {
        Some(id) => store::users::get(conn, id).await?,
        None => None,
    };
    let files = store::messages::files_for(conn, &msg.id).await?;
    let readers = store::messages::readers_for(conn, &msg.id).await?;

    Ok(MessageView {
        id: msg.id.clone(),
        chat: msg.chat_id.clone(),
        text: msg.text.clone(),
        voice: msg.voice.clone(),
        files,
        sender: render_user(sender.as_ref()),
        was_read_by: readers.iter().map(|u| render_user(Some(u))).collect(),
        created_at: msg.created_at,
        updated_at: msg.updated_at,
    })
}

fn validate_body(cfg: &Config, body: &NewMessage) -> Result<(), ApiError> {
    let has_text = body.text.as_deref().map(|t| !t.trim().is_empty()).unwrap_or(false);
    let has_voice = body.voice.as_deref().map(|v| !v.is_empty()).unwrap_or(false);
    let has_files = !body.files.is_empty();

    let present = has_text as u8 + has_voice as u8 + has_files as u8;
    if present == 0 {
        return Err(ApiError::BadRequest(
            "message must contain text, voice or files".into(),
        ));
    }
    if present > 1 {
        return Err(ApiError::BadRequest(
            "text, voice and files are mutually exclusive".into(),
        ));
    }

    if has_text {
        let len = body.text.as_deref().unwrap_or("").chars().count();
        if len > cfg.limits.max_message_text_length {
            return Err(ApiError::BadRequest(format!(
                "text must be at most {} characters",
                cfg.limits.max_message_text_length
            )));
        }
    }

    if has_voice {
        let voice = body.voice.as_deref().unwrap_or("");
        let ok = VOICE_EXTENSIONS
            .iter()
            .any(|ext| voice.to_ascii_lowercase().ends_with(&format!(".{ext}")));
        if !ok {
            return Err(ApiError::BadRequest("voice must be mp3, wav or ogg".into()));
        }
    }

    if has_files && cfg.production && body.files.len() > cfg.limits.max_message_files_count {
        return Err(ApiError::BadRequest(format!(
            "max files count is {}",
            cfg.limits.max_message_files_count
        )));
    }

    Ok(())
}

pub async fn create(
    db: &Db,
    cfg: &Config,
    chat_id: &str,
    sender_id: &str,
    body: &NewMessage,
) -> Result<MessageView, ApiError> {
    let mut tx = db.0.begin().await?;

    store::chats::get(&mut tx, chat_id).await?.ok_or(ApiError::NotFound)?;
    if !store::chats::is_member(&mut tx, chat_id, sender_id).await? {
        return Err(ApiError::NotMember);
    }

    validate_body(cfg, body)?;

    let now = Utc::now();
    let msg = Message {
        id: uuid::Uuid::new_v4().to_string(),
        chat_id: chat_id.to_string(),
        sender_id: Some(sender_id.to_string()),
        text: body.text.clone().filter(|t| !t.trim().is_empty()),
        voice: body.voice.clone().filter(|v| !v.is_empty()),
        created_at: now,
        updated_at: now,
    };

    store::messages::insert(&mut tx, &msg).await?;
    for item in &body.files {
        store::messages::insert_file(
            &mut tx,
            &MessageFile {
                id: uuid::Uuid::new_v4().to_string(),
                message_id: msg.id.clone(),
                item: item.clone(),
            },
        )
        .await?;
    }

    store::chats::touch_updated(&mut tx, chat_id, now).await?;

    let view = load_view(&mut tx, &msg).await?;

    JobQueue::enqueue_on(
        &mut tx,
        &Job::Publish {
            event: "create".to_string(),
            message: serde_json::to_value(&view)?,
            chat_id: chat_id.to_string(),
        },
    )
    .await?;

    if cfg.production {
        JobQueue::enqueue_on(
            &mut tx,
            &Job::EnforceUserQuota {
                user_id: sender_id.to_string(),
                chat_id: chat_id.to_string(),
            },
        )
        .await?;
    }

    tx.commit().await?;
    Ok(view)
}

/// Editing to the identical text is a no-op: no write, no publish.
pub async fn update(
    db: &Db,
    cfg: &Config,
    message_id: &str,
    editor_id: &str,
    new_text: &str,
) -> Result<MessageView, ApiError> {
    let mut tx = db.0.begin().await?;

    let mut msg = store::messages::get(&mut tx, message_id)
        .await?
        .ok_or(ApiError::NotFound)?;

    if msg.sender_id.as_deref() != Some(editor_id) {
        return Err(ApiError::NotSender);
    }
    if !store::chats::is_member(&mut tx, &msg.chat_id, editor_id).await? {
        return Err(ApiError::NotMember);
    }
    if msg.text.is_none() {
        return Err(ApiError::BadRequest("only text messages can be edited".into()));
    }
    if new_text.trim().is_empty() {
        return Err(ApiError::BadRequest("text must not be empty".into()));
    }
    if new_text.chars().count() > cfg.limits.max_message_text_length {
        return Err(ApiError::BadRequest(format!(
            "text must be at most {} characters",
            cfg.limits.max_message_text_length
        )));
    }

    if msg.text.as_deref() == Some(new_text) {
        return load_view(&mut tx, &msg).await.map_err(Into::into);
    }

    let now = Utc::now();
    store::messages::set_text(&mut tx, message_id, new_text, now).await?;
    store::chats::touch_updated(&mut tx, &msg.chat_id, now).await?;
    msg.text = Some(new_text.to_string());
    msg.updated_at = now;

    let view = load_view(&mut tx, &msg).await?;

    JobQueue::enqueue_on(
        &mut tx,
        &Job::Publish {
            event: "update".to_string(),
            message: serde_json::to_value(&view)?,
            chat_id: msg.chat_id.clone(),
        },
    )
    .await?;

    tx.commit().await?;
    Ok(view)
}

/// The "delete" publish carries the pre-delete snapshot, enqueued in the
/// same transaction that removes the row.
pub async fn delete(
    db: &Db,
    message_id: &str,
    requester_id: &str,
) -> Result<(), ApiError> {
    let mut tx = db.0.begin().await?;

    let msg = store::messages::get(&mut tx, message_id)
        .await?
        .ok_or(ApiError::NotFound)?;

    if !store::chats::is_member(&mut tx, &msg.chat_id, requester_id).await? {
        return Err(ApiError::NotMember);
    }
    if msg.sender_id.as_deref() != Some(requester_id) {
        return Err(ApiError::NotSender);
    }

    let snapshot = load_view(&mut tx, &msg).await?;
    JobQueue::enqueue_on(
        &mut tx,
        &Job::Publish {
            event: "delete".to_string(),
            message: serde_json::to_value(&snapshot)?,
            chat_id: msg.chat_id.clone(),
        },
    )
    .await?;

    store::messages::delete(&mut tx, message_id).await?;

    tx.commit().await?;
    Ok(())
}

pub async fn read(
    db: &Db,
    message_id: &str,
    reader_id: &str,
) -> Result<MessageView, ApiError> {
    let mut tx = db.0.begin().await?;

    let msg = store::messages::get(&mut tx, message_id)
        .await?
        .ok_or(ApiError::NotFound)?;

    if !store::chats::is_member(&mut tx, &msg.chat_id, reader_id).await? {
        return Err(ApiError::NotMember);
    }
    if msg.sender_id.as_deref() == Some(reader_id) {
        return Err(ApiError::IsSender);
    }

    store::messages::mark_read(&mut tx, message_id, reader_id).await?;

    let view = load_view(&mut tx, &msg).await?;

    JobQueue::enqueue_on(
        &mut tx,
        &Job::Publish {
            event: "read".to_string(),
            message: serde_json::to_value(&view)?,
            chat_id: msg.chat_id.clone(),
        },
    )
    .await?;

    tx.commit().await?;
    Ok(view)
}

/// Synchronous half of mark-all-read; the marking runs as a job.
pub async fn read_all(
    db: &Db,
    queue: &JobQueue,
    chat_id: &str,
    reader_id: &str,
) -> Result<(), ApiError> {
    let mut conn = db.0.acquire().await?;

    store::chats::get(&mut conn, chat_id).await?.ok_or(ApiError::NotFound)?;
    if !store::chats::is_member(&mut conn, chat_id, reader_id).await? {
        return Err(ApiError::NotMember);
    }
    drop(conn);

    queue
        .enqueue(&Job::ReadChatMessages {
            user_id: reader_id.to_string(),
            chat_id: chat_id.to_string(),
        })
        .await?;
    Ok(())
}

/// Job body for mark-all-read. Returns the `read_all` payload (an id
/// batch) plus the current member set, or `None` when there was nothing
/// to mark. Tolerates re-execution and membership changes since enqueue.
pub async fn read_chat_messages(
    db: &Db,
    chat_id: &str,
    user_id: &str,
) -> Result<Option<(serde_json::Value, Vec<String>)>, sqlx::Error> {
    let mut tx = db.0.begin().await?;

    if store::chats::get(&mut tx, chat_id).await?.is_none() {
        return Ok(None);
    }
    if !store::chats::is_member(&mut tx, chat_id, user_id).await? {
        return Ok(None);
    }

    let unread = store::messages::unread_ids_for(&mut tx, chat_id, user_id).await?;
    if unread.is_empty() {
        return Ok(None);
    }

    store::messages::mark_chat_read(&mut tx, chat_id, user_id).await?;
    store::counters::refresh(&mut tx, chat_id, user_id).await?;
    let members = store::chats::member_ids(&mut tx, chat_id).await?;

    tx.commit().await?;

    let payload = serde_json::json!({
        "user": user_id,
        "chat": chat_id,
        "messages": unread,
    });
    Ok(Some((payload, members)))
}

pub async fn list(
    db: &Db,
    chat_id: &str,
    viewer_id: &str,
    before: Option<chrono::DateTime<chrono::Utc>>,
    limit: i64,
) -> Result<Vec<MessageView>, ApiError> {
    let mut conn = db.0.acquire().await?;

    store::chats::get(&mut conn, chat_id).await?.ok_or(ApiError::NotFound)?;
    if !store::chats::is_member(&mut conn, chat_id, viewer_id).await? {
        return Err(ApiError::NotMember);
    }

    let rows = store::messages::list_for_chat(&mut conn, chat_id, before, limit).await?;
    let mut views = Vec::with_capacity(rows.len());
    for msg in &rows {
        views.push(load_view(&mut conn, msg).await?);
    }
    Ok(views)
}

pub async fn get(
    db: &Db,
    message_id: &str,
    viewer_id: &str,
) -> Result<MessageView, ApiError> {
    let mut conn = db.0.acquire().await?;

    let msg = store::messages::get(&mut conn, message_id)
        .await?
        .ok_or(ApiError::NotFound)?;
    if !store::chats::is_member(&mut conn, &msg.chat_id, viewer_id).await? {
        return Err(ApiError::NotMember);
    }

    load_view(&mut conn, &msg).await.map_err(Into::into)
}
