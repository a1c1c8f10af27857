use crate::config::Config;
use crate::db::Db;
use crate::store;

/// With `count >= MAX`, deletes the `count - MAX + BATCH` oldest messages,
/// leaving `MAX - BATCH` behind. The excess is recomputed on every run, so
/// a duplicate trigger never deletes below that floor.
pub async fn enforce_user_quota(
    db: &Db,
    cfg: &Config,
    user_id: &str,
    chat_id: &str,
) -> Result<u64, sqlx::Error> {
    let mut tx = db.0.begin().await?;

    // Bot traffic is exempt from trimming.
    match store::users::get(&mut tx, user_id).await? {
        Some(u) if u.username == cfg.bot_username => {
            return Ok(0);
        }
        Some(_) => {}
        None => return Ok(0),
    }

    let count = store::messages::count_by_sender(&mut tx, chat_id, user_id).await?;
    if count < cfg.limits.max_chat_messages_per_user {
        return Ok(0);
    }

    let limit = count - cfg.limits.max_chat_messages_per_user
        + cfg.limits.messages_amount_to_delete_on_limit;

    let deleted = store::messages::delete_oldest_by_sender(&mut tx, chat_id, user_id, limit).await?;
    tx.commit().await?;

    if deleted > 0 {
        log::info!("quota trim: removed {deleted} messages of user {user_id} in chat {chat_id}");
    }
    Ok(deleted)
}
