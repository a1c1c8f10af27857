//! Chat management: creation, the viewer-specific chat list, group edits,
//! leave and delete.

use chrono::Utc;
use serde::Deserialize;
use sqlx::SqliteConnection;

use crate::config::Config;
use crate::db::Db;
use crate::errors::ApiError;
use crate::models::{deleted_user_full_name, render_user, Chat, ChatView};
use crate::services::messages::load_view;
use crate::store;

#[derive(Deserialize, Debug, Clone)]
pub struct NewChat {
    pub title: Option<String>,
    #[serde(default)]
    pub members: Vec<String>,
    pub is_private: bool,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ChatPatch {
    pub title: Option<String>,
    pub avatar: Option<String>,
}

/// Private chats take the companion's name and avatar at render time.
pub async fn render_chat(
    conn: &mut SqliteConnection,
    chat: &Chat,
    viewer_id: &str,
) -> Result<ChatView, sqlx::Error> {
    let member_ids = store::chats::member_ids(conn, &chat.id).await?;
    let mut members = Vec::with_capacity(member_ids.len());
    for id in &member_ids {
        if let Some(u) = store::users::get(conn, id).await? {
            members.push(u);
        }
    }

    let creator = match &chat.creator_id {
        Some(id) => store::users::get(conn, id).await?,
        None => None,
    };

    let (title, avatar) = if chat.is_private {
        let companion = members.iter().find(|u| u.id != viewer_id);
        match companion {
            Some(c) => (Some(c.full_name()), c.avatar.clone()),
            None => (Some(deleted_user_full_name()), None),
        }
    } else {
        (chat.title.clone(), chat.avatar.clone())
    };

    let last_message = match store::messages::latest_in_chat(conn, &chat.id).await? {
        Some(msg) => Some(load_view(conn, &msg).await?),
        None => None,
    };

    let counter = store::counters::refresh(conn, &chat.id, viewer_id).await?;

    Ok(ChatView {
        id: chat.id.clone(),
        title,
        avatar,
        creator: render_user(creator.as_ref()),
        members: members.iter().map(|u| render_user(Some(u))).collect(),
        is_private: chat.is_private,
        created_at: chat.created_at,
        updated_at: chat.updated_at,
        last_message,
        unread_messages_count: counter.unread_messages_count,
    })
}

/// The `fallback` flag returns an existing private pair chat instead of
/// rejecting the duplicate.
pub async fn create(
    db: &Db,
    cfg: &Config,
    creator_id: &str,
    body: &NewChat,
    fallback: bool,
) -> Result<ChatView, ApiError> {
    let mut tx = db.0.begin().await?;

    if cfg.production {
        let cap = if body.is_private {
            cfg.limits.max_private_chats_per_user
        } else {
            cfg.limits.max_group_chats_per_user
        };
        let count = store::chats::count_created_by(&mut tx, creator_id, body.is_private).await?;
        if count >= cap {
            let kind = if body.is_private { "private" } else { "group" };
            return Err(ApiError::BadRequest(format!(
                "you can't create more than {cap} {kind} chats"
            )));
        }
    }

    let mut member_ids: Vec<String>;
    if body.is_private {
        if body.members.len() != 1 {
            return Err(ApiError::BadRequest(
                "private chat must contain exactly one companion".into(),
            ));
        }
        let companion = &body.members[0];
        if companion == creator_id {
            return Err(ApiError::BadRequest("can't append current user".into()));
        }
        if store::users::get(&mut tx, companion).await?.is_none() {
            return Err(ApiError::NotFound);
        }

        if let Some(existing) = store::chats::find_private_pair(&mut tx, creator_id, companion).await? {
            if fallback {
                let view = render_chat(&mut tx, &existing, creator_id).await?;
                tx.commit().await?;
                return Ok(view);
            }
            return Err(ApiError::BadRequest(
                "private chat with these members already exists".into(),
            ));
        }

        member_ids = vec![creator_id.to_string(), companion.clone()];
    } else {
        let title = body.title.as_deref().map(str::trim).unwrap_or("");
        if title.is_empty() {
            return Err(ApiError::BadRequest("group chat requires a title".into()));
        }
        if title.chars().count() > cfg.limits.max_chat_title_length {
            return Err(ApiError::BadRequest(format!(
                "title must be at most {} characters",
                cfg.limits.max_chat_title_length
            )));
        }
        for id in &body.members {
            if store::users::get(&mut tx, id).await?.is_none() {
                return Err(ApiError::NotFound);
            }
        }
        member_ids = body.members.clone();
        if !member_ids.iter().any(|id| id == creator_id) {
            member_ids.push(creator_id.to_string());
        }
    }

    let now = Utc::now();
    let chat = Chat {
        id: uuid::Uuid::new_v4().to_string(),
        title: if body.is_private { None } else { body.title.clone() },
        avatar: None,
        creator_id: Some(creator_id.to_string()),
        is_private: body.is_private,
        created_at: now,
        updated_at: now,
    };

    store::chats::insert(&mut tx, &chat).await?;
    for id in &member_ids {
        store::chats::add_member(&mut tx, &chat.id, id).await?;
    }

    let view = render_chat(&mut tx, &chat, creator_id).await?;
    tx.commit().await?;
    Ok(view)
}

pub async fn list(db: &Db, viewer_id: &str) -> Result<Vec<ChatView>, ApiError> {
    let mut conn = db.0.acquire().await?;
    let chats = store::chats::list_for_user(&mut conn, viewer_id).await?;
    let mut views = Vec::with_capacity(chats.len());
    for chat in &chats {
        views.push(render_chat(&mut conn, chat, viewer_id).await?);
    }
    Ok(views)
}

pub async fn get(db: &Db, chat_id: &str, viewer_id: &str) -> Result<ChatView, ApiError> {
    let mut conn = db.0.acquire().await?;
    let chat = store::chats::get(&mut conn, chat_id).await?.ok_or(ApiError::NotFound)?;
    if !store::chats::is_member(&mut conn, chat_id, viewer_id).await? {
        return Err(ApiError::NotMember);
    }
    render_chat(&mut conn, &chat, viewer_id).await.map_err(Into::into)
}

pub async fn patch(
    db: &Db,
    cfg: &Config,
    chat_id: &str,
    requester_id: &str,
    patch: &ChatPatch,
) -> Result<ChatView, ApiError> {
    let mut tx = db.0.begin().await?;

    let chat = store::chats::get(&mut tx, chat_id).await?.ok_or(ApiError::NotFound)?;
    if !store::chats::is_member(&mut tx, chat_id, requester_id).await? {
        return Err(ApiError::NotMember);
    }
    if chat.creator_id.as_deref() != Some(requester_id) {
        return Err(ApiError::Forbidden);
    }
    if chat.is_private {
        return Err(ApiError::BadRequest("private chats can't be edited".into()));
    }
    if let Some(title) = patch.title.as_deref() {
        if title.trim().is_empty() {
            return Err(ApiError::BadRequest("title must not be empty".into()));
        }
        if title.chars().count() > cfg.limits.max_chat_title_length {
            return Err(ApiError::BadRequest(format!(
                "title must be at most {} characters",
                cfg.limits.max_chat_title_length
            )));
        }
    }

    let now = Utc::now();
    store::chats::set_title_avatar(
        &mut tx,
        chat_id,
        patch.title.as_deref(),
        patch.avatar.as_deref(),
        now,
    )
    .await?;

    let updated = store::chats::get(&mut tx, chat_id).await?.ok_or(ApiError::NotFound)?;
    let view = render_chat(&mut tx, &updated, requester_id).await?;
    tx.commit().await?;
    Ok(view)
}

pub async fn delete(db: &Db, chat_id: &str, requester_id: &str) -> Result<(), ApiError> {
    let mut tx = db.0.begin().await?;

    let chat = store::chats::get(&mut tx, chat_id).await?.ok_or(ApiError::NotFound)?;
    if !store::chats::is_member(&mut tx, chat_id, requester_id).await? {
        return Err(ApiError::NotMember);
    }
    if chat.creator_id.as_deref() != Some(requester_id) {
        return Err(ApiError::Forbidden);
    }

    store::chats::delete(&mut tx, chat_id).await?;
    tx.commit().await?;
    Ok(())
}

/// A chat whose member set empties out is deleted in the same transaction.
pub async fn leave(
    db: &Db,
    cfg: &Config,
    chat_id: &str,
    requester_id: &str,
) -> Result<(), ApiError> {
    let mut tx = db.0.begin().await?;

    let chat = store::chats::get(&mut tx, chat_id).await?.ok_or(ApiError::NotFound)?;
    if !store::chats::is_member(&mut tx, chat_id, requester_id).await? {
        return Err(ApiError::NotMember);
    }
    if chat.is_private {
        return Err(ApiError::BadRequest("chat must not be private".into()));
    }

    if let Some(creator_id) = &chat.creator_id {
        if let Some(creator) = store::users::get(&mut tx, creator_id).await? {
            if creator.username == cfg.bot_username {
                return Err(ApiError::Forbidden);
            }
        }
        if creator_id == requester_id {
            return Err(ApiError::BadRequest("creator can't leave the chat".into()));
        }
    }

    store::chats::remove_member(&mut tx, chat_id, requester_id).await?;
    if store::chats::member_count(&mut tx, chat_id).await? == 0 {
        store::chats::delete(&mut tx, chat_id).await?;
    }

    tx.commit().await?;
    Ok(())
}
